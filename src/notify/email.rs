// src/notify/email.rs
use anyhow::{anyhow, Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{Address, AsyncTransport, Tokio1Executor};

use super::MailTransport;
use crate::config::model::MailConfig;

/// SMTP delivery over `lettre`'s async tokio transport.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `tls` selects implicit TLS, `starttls` an upgraded plain connection;
    /// with neither the connection stays unencrypted. `skiptls` disables
    /// certificate verification.
    pub fn from_config(cfg: &MailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.server)
            .port(cfg.port)
            .timeout(Some(cfg.timeout));

        if cfg.tls || cfg.starttls {
            let params = TlsParameters::builder(cfg.server.clone())
                .dangerous_accept_invalid_certs(cfg.skiptls)
                .build_rustls()
                .context("smtp tls parameters")?;
            builder = builder.tls(if cfg.tls {
                Tls::Wrapper(params)
            } else {
                Tls::Required(params)
            });
        }

        if let Some(user) = cfg.user.as_deref().filter(|u| !u.is_empty()) {
            let pass = cfg.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(user.to_string(), pass));
        }

        let address: Address = cfg
            .from
            .mail
            .parse()
            .with_context(|| format!("invalid from address {}", cfg.from.mail))?;
        let from = Mailbox::new(Some(cfg.from.name.clone()), address);

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        if recipients.is_empty() {
            return Err(anyhow!("no recipients"));
        }
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN);
        for r in recipients {
            let to: Mailbox = r.parse().with_context(|| format!("invalid recipient {r}"))?;
            builder = builder.to(to);
        }
        let msg = builder.body(body.to_string()).context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
