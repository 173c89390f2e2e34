//! Base64 image payloads as sent by the browser.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Every accepted visitor photo starts with this.
pub const IMAGE_MARKER: &str = "data:image";

/// Whether the payload claims to be an image data URL.
pub fn has_image_marker(payload: &str) -> bool {
    payload.starts_with(IMAGE_MARKER)
}

/// Drop a leading `data:image/<type>;base64,`. Anything else is returned
/// unchanged, so bare base64 is accepted too.
pub fn strip_data_url(payload: &str) -> &str {
    payload
        .strip_prefix("data:image/")
        .and_then(|rest| {
            let pos = rest.rfind(";base64,")?;
            (pos > 0).then(|| &rest[pos + ";base64,".len()..])
        })
        .unwrap_or(payload)
}

/// Strip the data-URL prefix and decode the base64 body.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let body: String = strip_data_url(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(body)
}
