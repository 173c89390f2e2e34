//! Router-level tests: requests go through the full axum stack with a fake
//! face encoder, an in-memory database and a scratch media directory.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use tower::ServiceExt;
use wardgate_face::{EncodeError, Embedding, FaceEncoder};
use wardgate_store::{MediaStore, RecordStore};
use wardgated::config::SmtpConfig;
use wardgated::engine::spawn_engine;
use wardgated::mailer::Mailer;
use wardgated::{router, AppState, SharedState};

const BOUNDARY: &str = "wardgate-test-boundary";

/// Any non-black image holds one face whose encoding is its mean colour.
struct MeanColourEncoder;

impl FaceEncoder for MeanColourEncoder {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
        let n = (image.width() * image.height()).max(1) as f32;
        let mut sum = [0.0f32; 3];
        for p in image.pixels() {
            for c in 0..3 {
                sum[c] += p.0[c] as f32;
            }
        }
        if sum.iter().all(|&s| s == 0.0) {
            return Ok(Vec::new());
        }
        Ok(vec![Embedding { values: sum.iter().map(|s| s / n).collect(), model_version: None }])
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    state: SharedState,
    app: Router,
}

impl TestApp {
    async fn new(with_engine: bool) -> Self {
        Self::with_limit(with_engine, 8 * 1024 * 1024).await
    }

    async fn with_limit(with_engine: bool, max_upload_bytes: usize) -> Self {
        Self::build(with_engine, max_upload_bytes, None).await
    }

    async fn with_mailer(mailer: Mailer) -> Self {
        Self::build(false, 8 * 1024 * 1024, Some(mailer)).await
    }

    async fn build(with_engine: bool, max_upload_bytes: usize, mailer: Option<Mailer>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open_in_memory().await.unwrap();
        let media = MediaStore::open(dir.path()).unwrap();
        let engine = with_engine
            .then(|| spawn_engine(Box::new(MeanColourEncoder), media.clone(), 0.9).unwrap());
        let state = Arc::new(AppState { store, media, engine, mailer });
        let app = router(state.clone(), max_upload_bytes);
        Self { _dir: dir, state, app }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.send(Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn register_patient(&self, fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> (StatusCode, String) {
        let req = Request::post("/register")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(fields, image)))
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, String::from_utf8(body).unwrap())
    }

    async fn register_visitor(&self, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let req = Request::post("/register_visitor")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_encode(fields)))
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn verify(&self, body: impl Into<Body>) -> (StatusCode, Value) {
        let req = Request::post("/verify_exit_face")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        let (status, body) = self.send(req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn file_names(&self, dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn png(colour: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    RgbImage::from_pixel(8, 8, Rgb(colour))
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

fn data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((filename, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_encode(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(s: &str) -> String {
    s.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

const JO_DOE: &[(&str, &str)] = &[
    ("fullname", "Jo Doe"),
    ("email", "jo@example.com"),
    ("phone", "9876543210"),
    ("aadhaar", "123456789"),
];

fn visitor_fields<'a>(name: &'a str, image: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("name", name),
        ("phone", "5550001"),
        ("patient_id", "JO789210"),
        ("ward", "W3"),
        ("visitor_image", image),
    ]
}

#[tokio::test]
async fn test_register_then_lookup() {
    let t = TestApp::new(false).await;
    let photo = png([10, 20, 30]);

    let (status, page) = t.register_patient(JO_DOE, Some(("jo.png", photo.as_slice()))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Jo Doe"));
    assert!(page.contains("JO789210"));
    // Email is disabled
    assert!(!page.contains("sent to your email"));

    let stored = t.state.media.patients_dir().join("Jo Doe_9876543210.png");
    assert_eq!(std::fs::read(&stored).unwrap(), photo);

    let patients = t.state.store.patients_by_code("JO789210").await.unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].email, "jo@example.com");
    assert_eq!(patients[0].image_path.as_deref(), Some(stored.to_string_lossy().as_ref()));

    assert_eq!(t.get_json("/check_patient/JO789210").await, (StatusCode::OK, json!({ "exists": true })));
    assert_eq!(t.get_json("/check_patient/AB123456").await, (StatusCode::OK, json!({ "exists": false })));
    assert_eq!(
        t.get_json("/check_patient/SHORT").await,
        (StatusCode::OK, json!({ "exists": false, "error": "Invalid length" }))
    );
}

#[tokio::test]
async fn test_register_without_photo() {
    let t = TestApp::new(false).await;
    let (status, _) = t.register_patient(JO_DOE, Some(("", &[][..]))).await;
    assert_eq!(status, StatusCode::OK);

    let patients = t.state.store.patients_by_code("JO789210").await.unwrap();
    assert_eq!(patients[0].image_path, None);
    assert!(t.file_names(t.state.media.patients_dir()).is_empty());
}

#[tokio::test]
async fn test_duplicate_codes_are_both_stored() {
    let t = TestApp::new(false).await;
    assert_eq!(t.register_patient(JO_DOE, None).await.0, StatusCode::OK);
    assert_eq!(t.register_patient(JO_DOE, None).await.0, StatusCode::OK);
    assert_eq!(t.state.store.patients_by_code("JO789210").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_register_rejects_short_phone() {
    let t = TestApp::new(false).await;
    let fields = [("fullname", "Jo Doe"), ("email", "jo@example.com"), ("phone", "12"), ("aadhaar", "123456789")];
    let (status, body) = t.register_patient(&fields, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("Error: "));
    assert_eq!(t.state.store.counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_register_rejects_missing_field() {
    let t = TestApp::new(false).await;
    let (status, body) = t.register_patient(&JO_DOE[..3], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Error: missing field: aadhaar");
}

#[tokio::test]
async fn test_register_rejects_non_multipart_post() {
    let t = TestApp::new(false).await;
    let req = Request::post("/register")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_encode(JO_DOE)))
        .unwrap();
    let (status, body) = t.send(req).await;
    let body = String::from_utf8(body).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with("Error: "), "{body}");
    assert_eq!(t.state.store.counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_register_oversized_upload_is_payload_too_large() {
    let t = TestApp::with_limit(false, 1024).await;
    let photo = vec![0u8; 4096];
    let (status, body) = t.register_patient(JO_DOE, Some(("jo.png", photo.as_slice()))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body.starts_with("Error: "), "{body}");
    assert_eq!(t.state.store.counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_email_failure_does_not_fail_registration() {
    // Nothing listens on port 1, so every send is refused.
    let smtp = SmtpConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        username: String::new(),
        password: String::new(),
        from: "desk@hospital.example".to_string(),
        timeout_secs: 2,
    };
    let mailer = Mailer::from_config(&smtp).unwrap().unwrap();
    let t = TestApp::with_mailer(mailer).await;

    let (status, page) = t.register_patient(JO_DOE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("JO789210"));
    assert!(!page.contains("sent to your email"));
    assert_eq!(t.state.store.counts().await.unwrap(), (1, 0));
}

#[tokio::test]
async fn test_register_visitor() {
    let t = TestApp::new(false).await;
    let photo = png([200, 0, 0]);
    let image = data_url(&photo);

    let (status, body) = t.register_visitor(&visitor_fields("Ann", &image)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Visitor registered successfully!" }));

    let files = t.file_names(t.state.media.visitors_dir());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("Ann_5550001_"));
    assert_eq!(std::fs::read(t.state.media.visitors_dir().join(&files[0])).unwrap(), photo);

    // No patient existence check
    let visitors = t.state.store.visitors_for_patient("JO789210").await.unwrap();
    assert_eq!(visitors.len(), 1);
    assert_eq!(visitors[0].ward, "W3");
}

#[tokio::test]
async fn test_register_visitor_rejects_bare_base64() {
    let t = TestApp::new(false).await;
    let bare = STANDARD.encode(png([200, 0, 0]));

    let (status, body) = t.register_visitor(&visitor_fields("Ann", &bare)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid image data" }));
    assert!(t.file_names(t.state.media.visitors_dir()).is_empty());
    assert_eq!(t.state.store.counts().await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_verify_matches_registered_visitor() {
    let t = TestApp::new(true).await;
    for (name, colour) in [("Gus", [0, 200, 0]), ("Ann", [180, 0, 0]), ("Bo", [0, 0, 200])] {
        let (status, _) = t.register_visitor(&visitor_fields(name, &data_url(&png(colour)))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let face = data_url(&png([220, 0, 0]));
    assert_eq!(t.verify(json!({ "face": face }).to_string()).await, (StatusCode::OK, json!({ "match": true })));

    // Bare base64 is fine on the exit side
    let bare = STANDARD.encode(png([220, 0, 0]));
    assert_eq!(t.verify(json!({ "face": bare }).to_string()).await.1, json!({ "match": true }));
}

#[tokio::test]
async fn test_verify_stranger_does_not_match() {
    let t = TestApp::new(true).await;
    t.register_visitor(&visitor_fields("Gus", &data_url(&png([0, 200, 0])))).await;

    let face = data_url(&png([220, 0, 0]));
    assert_eq!(t.verify(json!({ "face": face }).to_string()).await, (StatusCode::OK, json!({ "match": false })));
}

#[tokio::test]
async fn test_verify_empty_directory_and_faceless_capture() {
    let t = TestApp::new(true).await;
    let face = data_url(&png([220, 0, 0]));
    assert_eq!(t.verify(json!({ "face": face }).to_string()).await.1, json!({ "match": false }));

    t.register_visitor(&visitor_fields("Ann", &data_url(&png([180, 0, 0])))).await;
    let faceless = data_url(&png([0, 0, 0]));
    assert_eq!(t.verify(json!({ "face": faceless }).to_string()).await.1, json!({ "match": false }));
}

#[tokio::test]
async fn test_verify_failures_still_answer() {
    let t = TestApp::new(true).await;

    let (status, body) = t.verify(json!({ "face": "data:image/png;base64,@@@" }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], json!(false));
    assert_eq!(body["error"], json!("Invalid image data"));

    let not_an_image = STANDARD.encode(b"plain text");
    let (status, body) = t.verify(json!({ "face": not_an_image }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], json!(false));
    assert_eq!(body["error"], json!("Unreadable image"));

    let (status, body) = t.verify("{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_verify_without_models() {
    let t = TestApp::new(false).await;
    let face = data_url(&png([220, 0, 0]));
    let (status, body) = t.verify(json!({ "face": face }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "match": false, "error": "Face recognition is unavailable" }));
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let t = TestApp::with_limit(true, 256).await;
    let face = data_url(&png([220, 0, 0]));
    let padded = format!("{}{}", face, "A".repeat(1024));
    let (status, body) = t.verify(json!({ "face": padded }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_status() {
    let t = TestApp::new(true).await;
    t.register_patient(JO_DOE, None).await;
    t.register_visitor(&visitor_fields("Ann", &data_url(&png([180, 0, 0])))).await;

    let (status, body) = t.get_json("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models_loaded"], json!(true));
    assert_eq!(body["email_enabled"], json!(false));
    assert_eq!(body["patients"], json!(1));
    assert_eq!(body["visitors"], json!(1));
    assert_eq!(body["visitor_images"], json!(1));
}

#[tokio::test]
async fn test_pages_are_served() {
    let t = TestApp::new(false).await;
    for uri in ["/", "/patient", "/visitor", "/check", "/exit"] {
        let resp = t.app.clone().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"), "{uri}: {content_type}");
    }
}
