//! Outgoing email
//!
//! Registration sends the confirmation code by mail. The backend is picked
//! from configuration: a plain SMTP relay, one `.eml` file per message in an
//! outbox directory, or the log.

use lettre::message::{header::ContentType, Mailbox};
use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};
use yamdb_common::config::{EmailSettings, MailBackend};

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Failed to write message file: {0}")]
    File(#[from] lettre::transport::file::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File {
        dir: PathBuf,
        transport: AsyncFileTransport<Tokio1Executor>,
    },
    Log,
}

/// Sends plain text messages from a fixed sender address
pub struct Mailer {
    from: Mailbox,
    transport: Transport,
}

impl Mailer {
    /// Build a mailer for the configured backend
    pub fn from_settings(settings: &EmailSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings.from_address.parse()?;

        let transport = match settings.backend {
            MailBackend::Smtp => Transport::Smtp(
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
                    .port(settings.smtp_port)
                    .build(),
            ),
            MailBackend::File => Transport::File {
                dir: settings.outbox_dir.clone(),
                transport: AsyncFileTransport::<Tokio1Executor>::new(&settings.outbox_dir),
            },
            MailBackend::Log => Transport::Log,
        };

        Ok(Self { from, transport })
    }

    /// Mailer that only logs; used where delivery does not matter
    pub fn log_only(from_address: &str) -> Result<Self, MailError> {
        Ok(Self {
            from: from_address.parse()?,
            transport: Transport::Log,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self.transport {
            Transport::Smtp(_) => "smtp",
            Transport::File { .. } => "file",
            Transport::Log => "log",
        }
    }

    /// Send a plain text message to a single recipient
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        match &self.transport {
            Transport::Smtp(transport) => {
                transport.send(message).await?;
                debug!(to = %to, subject = %subject, "Sent mail over SMTP");
            }
            Transport::File { dir, transport } => {
                tokio::fs::create_dir_all(dir).await?;
                let id = transport.send(message).await?;
                debug!(to = %to, id = %id, "Wrote mail to {}", dir.display());
            }
            Transport::Log => {
                info!(to = %to, subject = %subject, body = %body, "Mail (log backend)");
            }
        }

        Ok(())
    }
}
