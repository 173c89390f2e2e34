use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::{json, Value};
use wardgate_store::derive_patient_code;

#[derive(Parser)]
#[command(name = "wardgate", about = "Hospital front-desk admin CLI")]
struct Cli {
    /// Base URL of the running wardgated
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a patient code without contacting the server
    Code {
        #[arg(long)]
        fullname: String,
        #[arg(long)]
        aadhaar: String,
        #[arg(long)]
        phone: String,
    },
    /// Ask the server whether a patient code is registered
    Check {
        code: String,
    },
    /// Run an exit face check with an image file
    Verify {
        image: PathBuf,
    },
    /// Show server status
    Status,
}

struct Client {
    http: reqwest::Client,
    base: Url,
}

impl Client {
    fn new(server: &str) -> Result<Self> {
        let base = Url::parse(server).with_context(|| format!("invalid server URL {server:?}"))?;
        Ok(Self { http: reqwest::Client::new(), base })
    }

    /// `base` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("server URL cannot take a path: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str]) -> Result<Value> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "GET");
        let value = self.http.get(url).send().await?.error_for_status()?.json().await?;
        Ok(value)
    }

    async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value> {
        let url = self.endpoint(segments)?;
        tracing::debug!(%url, "POST");
        let value = self.http.post(url).json(body).send().await?.error_for_status()?.json().await?;
        Ok(value)
    }
}

/// Read an image file as a `data:` URL.
fn image_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let subtype = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "jpeg".to_string(),
        Some(ext) if !ext.is_empty() => ext,
        _ => "png".to_string(),
    };
    Ok(format!("data:image/{subtype};base64,{}", STANDARD.encode(bytes)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Code { fullname, aadhaar, phone } => {
            let code = derive_patient_code(&fullname, &aadhaar, &phone)?;
            println!("{code}");
        }
        Commands::Check { code } => {
            let client = Client::new(&cli.server)?;
            let reply = client.get(&["check_patient", &code]).await?;
            if let Some(error) = reply["error"].as_str() {
                bail!("{code}: {error}");
            }
            if reply["exists"].as_bool().unwrap_or(false) {
                println!("{code}: registered");
            } else {
                println!("{code}: not found");
            }
        }
        Commands::Verify { image } => {
            let client = Client::new(&cli.server)?;
            let face = image_data_url(&image)?;
            let reply = client.post_json(&["verify_exit_face"], &json!({ "face": face })).await?;
            if let Some(error) = reply["error"].as_str() {
                bail!("verification failed: {error}");
            }
            if reply["match"].as_bool().unwrap_or(false) {
                println!("match: registered visitor");
            } else {
                println!("no match");
            }
        }
        Commands::Status => {
            let client = Client::new(&cli.server)?;
            let reply = client.get(&["status"]).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }

    Ok(())
}
