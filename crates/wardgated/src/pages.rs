//! Static front-desk pages.

use axum::response::Html;

const HOME: &str = include_str!("../assets/home.html");
const PATIENT: &str = include_str!("../assets/patient.html");
const VISITOR: &str = include_str!("../assets/visitor.html");
const CHECK_PATIENT: &str = include_str!("../assets/check_patient.html");
const EXIT: &str = include_str!("../assets/exit.html");
const SUCCESS: &str = include_str!("../assets/success.html");

pub async fn home() -> Html<&'static str> {
    Html(HOME)
}

pub async fn patient() -> Html<&'static str> {
    Html(PATIENT)
}

pub async fn visitor() -> Html<&'static str> {
    Html(VISITOR)
}

pub async fn check() -> Html<&'static str> {
    Html(CHECK_PATIENT)
}

pub async fn exit() -> Html<&'static str> {
    Html(EXIT)
}

const EMAILED_NOTE: &str = "<p>A copy has been sent to your email.</p>";

/// Registration confirmation showing the patient's name and code. The email
/// note only appears when the code was actually sent.
pub fn success(name: &str, patient_code: &str, emailed: bool) -> Html<String> {
    Html(
        SUCCESS
            .replace("{{name}}", &escape_html(name))
            .replace("{{patient_id}}", &escape_html(patient_code))
            .replace("{{email_note}}", if emailed { EMAILED_NOTE } else { "" }),
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
