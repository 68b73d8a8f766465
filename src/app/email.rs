//! Account confirmation email over SMTP.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, warn};

/// SMTP settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Mailbox used as sender, e.g. `Panorama Support <support@panorama.app>`.
    pub from: String,
}

#[derive(Debug)]
pub enum EmailError {
    /// Error building the email message.
    MessageError(String),
    /// Error sending the email.
    TransportError(String),
    /// Email sending is not configured.
    NotConfigured,
}

impl std::fmt::Display for EmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailError::MessageError(e) => write!(f, "Failed to build email: {}", e),
            EmailError::TransportError(e) => write!(f, "Failed to send email: {}", e),
            EmailError::NotConfigured => write!(f, "Email sending is not configured"),
        }
    }
}

impl std::error::Error for EmailError {}

/// Sends confirmation emails. Outside production, sending is a no-op.
#[derive(Clone)]
pub struct Mailer {
    config: Option<MailConfig>,
    home_url: String,
    enabled: bool,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>, home_url: String, production: bool) -> Self {
        Self {
            config,
            home_url: home_url.trim_end_matches('/').to_string(),
            enabled: production,
        }
    }

    pub fn confirmation_url(&self, token: &str) -> String {
        format!("{}/confirm/{}", self.home_url, token)
    }

    /// Sends the confirmation link for a freshly registered account.
    /// Failures are logged and never reach the caller.
    pub async fn send_confirmation_email(&self, username: &str, email: &str, token: &str) {
        if !self.enabled {
            debug!(username = %username, "skipping confirmation email outside production");
            return;
        }

        if let Err(err) = self.try_send_confirmation(username, email, token).await {
            warn!(error = %err, username = %username, "failed to send confirmation email");
        }
    }

    async fn try_send_confirmation(&self, username: &str, email: &str, token: &str) -> Result<(), EmailError> {
        let config = self.config.as_ref().ok_or(EmailError::NotConfigured)?;
        let message = self.confirmation_message(config, username, email, token)?;
        let transport = build_transport(config)?;

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::TransportError(e.to_string()))?;
        Ok(())
    }

    fn confirmation_message(
        &self,
        config: &MailConfig,
        username: &str,
        email: &str,
        token: &str,
    ) -> Result<Message, EmailError> {
        let body = format!(
            r#"<p>Hi {username},</p>
<p>Thanks for joining Panorama! Please confirm your email address by following the link below:</p>
<p><a href="{confirmation_url}">{confirmation_url}</a></p>
<p>If you did not create an account, you can ignore this email.</p>
<p><a href="{home_url}">Panorama</a></p>"#,
            username = username,
            confirmation_url = self.confirmation_url(token),
            home_url = self.home_url,
        );

        Message::builder()
            .from(
                config
                    .from
                    .parse()
                    .map_err(|e| EmailError::MessageError(format!("{}", e)))?,
            )
            .to(email
                .parse()
                .map_err(|e| EmailError::MessageError(format!("{}", e)))?)
            .subject("Confirm your Panorama account")
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| EmailError::MessageError(e.to_string()))
    }
}

fn build_transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
    let mut builder = if config.smtp_port == 465 {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| EmailError::TransportError(e.to_string()))?
            .port(465)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| EmailError::TransportError(e.to_string()))?
            .port(config.smtp_port)
    };

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    Ok(builder.build())
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("smtp_host", &self.config.as_ref().map(|c| c.smtp_host.as_str()))
            .field("enabled", &self.enabled)
            .finish()
    }
}
