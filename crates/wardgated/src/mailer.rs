use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

pub const PATIENT_CODE_SUBJECT: &str = "Your Patient ID - Hospital Registration";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address {address:?}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("building message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends patient notifications over SMTP.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    /// Build a mailer from settings. Returns `None` when email is disabled.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, MailError> {
        if !config.enabled() {
            return Ok(None);
        }

        let from = parse_mailbox(&config.from)?;
        // Port 465 speaks TLS from the first byte; anything else upgrades.
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "smtp mailer configured");
        Ok(Some(Self { transport: builder.build(), from }))
    }

    /// Email a newly registered patient their code.
    pub async fn send_patient_code(&self, to: &str, fullname: &str, code: &str) -> Result<(), MailError> {
        let message = patient_code_message(self.from.clone(), to, fullname, code)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

pub fn patient_code_message(from: Mailbox, to: &str, fullname: &str, code: &str) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(from)
        .to(parse_mailbox(to)?)
        .subject(PATIENT_CODE_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(patient_code_body(fullname, code))?;
    Ok(message)
}

pub fn patient_code_body(fullname: &str, code: &str) -> String {
    format!(
        "Hello {fullname},\n\
         \n\
         Your registration is successful!\n\
         \n\
         Your Patient ID is: {code}\n\
         \n\
         Please keep this ID safe for hospital visits.\n\
         \n\
         Thank you,\n\
         Hospital Team\n"
    )
}
