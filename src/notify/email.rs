use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::Delivery;
use crate::config::{ConfigError, SmtpSettings};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailSender {
    pub fn from_settings(smtp: &SmtpSettings) -> Result<Self, ConfigError> {
        let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| ConfigError::InvalidRelay {
                host: smtp.host.clone(),
                reason: e.to_string(),
            })?
            .credentials(creds)
            .build();

        let from = smtp
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| ConfigError::InvalidMailbox {
                addr: smtp.from.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Delivery for EmailSender {
    async fn send(
        &self,
        subject: &str,
        text_body: &str,
        html_body: &str,
        recipients: &[String],
    ) -> Result<()> {
        if recipients.is_empty() {
            bail!("no recipients to deliver to");
        }

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("invalid recipient {recipient}"))?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html_body.to_string(),
            ))
            .context("build email")?;

        self.mailer.send(message).await.context("send email")?;
        Ok(())
    }
}
