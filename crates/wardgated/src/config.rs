use std::path::PathBuf;
use std::str::FromStr;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:5000).
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Root holding the `patients/` and `visitors/` photo directories.
    pub media_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity at or above which two faces match.
    pub similarity_threshold: f32,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
    pub smtp: SmtpConfig,
}

/// Outbound mail settings. An empty host or sender disables email.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 means implicit TLS; any other port uses STARTTLS.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; falls back to `username`.
    pub from: String,
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub fn enabled(&self) -> bool {
        !self.host.trim().is_empty() && !self.from.trim().is_empty()
    }
}

impl Config {
    /// Load configuration from `WARDGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("wardgate");

        let username = lookup("WARDGATE_SMTP_USERNAME").unwrap_or_default();
        let from = lookup("WARDGATE_SMTP_FROM").unwrap_or_else(|| username.clone());

        Self {
            bind_addr: lookup("WARDGATE_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:5000".to_string()),
            db_path: lookup("WARDGATE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("hospital.db")),
            media_dir: lookup("WARDGATE_MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static/uploads")),
            model_dir: lookup("WARDGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("models")),
            similarity_threshold: parse_or(
                &lookup,
                "WARDGATE_SIMILARITY_THRESHOLD",
                wardgate_face::DEFAULT_SIMILARITY_THRESHOLD,
            ),
            max_upload_bytes: parse_or(&lookup, "WARDGATE_MAX_UPLOAD_BYTES", 80 * 1024 * 1024),
            smtp: SmtpConfig {
                host: lookup("WARDGATE_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or(&lookup, "WARDGATE_SMTP_PORT", 465),
                username,
                password: lookup("WARDGATE_SMTP_PASSWORD").unwrap_or_default(),
                from,
                timeout_secs: parse_or(&lookup, "WARDGATE_SMTP_TIMEOUT_SECS", 10),
            },
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}
