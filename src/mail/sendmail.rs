use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, SinglePart, header},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Mail failures never abort the operation that triggered the mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP credentials are not set. You need to notify the user manually.")]
    NotConfigured,
    #[error("Sending e-mail failed: {0}")]
    DeliveryFailed(String),
}

/// Replace every `{{key}}` placeholder in an HTML template
pub fn render_template(template: &str, placeholders: &[(&str, &str)]) -> String {
    let mut html = template.to_string();
    for (key, value) in placeholders {
        html = html.replace(&format!("{{{{{}}}}}", key), value);
    }
    html
}

#[derive(Debug, Clone, Default)]
pub struct Mailer {
    settings: Option<SmtpSettings>,
}

impl Mailer {
    pub fn new(settings: Option<SmtpSettings>) -> Self {
        Mailer { settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    /// Send an HTML e-mail over implicit-TLS SMTP.
    ///
    /// lettre's `SmtpTransport` blocks, so delivery runs on the blocking pool.
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html: String,
    ) -> Result<(), MailError> {
        let settings = self.settings.clone().ok_or(MailError::NotConfigured)?;

        let from: Mailbox = format!("BAT App <{}>", settings.from)
            .parse()
            .map_err(|e| MailError::DeliveryFailed(format!("invalid sender: {e}")))?;
        let to: Mailbox = to_email
            .parse()
            .map_err(|e| MailError::DeliveryFailed(format!("invalid recipient: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html),
            )
            .map_err(|e| MailError::DeliveryFailed(e.to_string()))?;

        let recipient = to_email.to_string();
        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(settings.username, settings.password);
            let mailer = SmtpTransport::relay(&settings.server)
                .map_err(|e| MailError::DeliveryFailed(e.to_string()))?
                .credentials(creds)
                .port(settings.port)
                .build();

            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|e| MailError::DeliveryFailed(e.to_string()))
        })
        .await
        .map_err(|e| MailError::DeliveryFailed(e.to_string()))??;

        tracing::info!(recipient = %recipient, "Email sent successfully");
        Ok(())
    }
}
