use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;

use crate::config::EmailConfig;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::Notifier;
use crate::user::errors::NotifierError;

const VERIFICATION_SUBJECT: &str = "Verify your email address";

/// Sends verification mail over SMTP with STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    /// Create a notifier from the email configuration.
    ///
    /// # Arguments
    /// * `config` - SMTP host, port, credentials and sender address
    ///
    /// # Errors
    /// * `Transport` - Host or sender address is unusable
    pub fn new(config: &EmailConfig) -> Result<Self, NotifierError> {
        let sender = config
            .sender
            .parse::<Mailbox>()
            .map_err(|e| NotifierError::Transport(format!("sender: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifierError::Transport(e.to_string()))?
            .port(config.smtp_port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        verification_link: &str,
    ) -> Result<(), NotifierError> {
        let recipient = to
            .as_str()
            .parse::<Mailbox>()
            .map_err(|e| NotifierError::BuildFailed(e.to_string()))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(VERIFICATION_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(verification_body(verification_link))
            .map_err(|e| NotifierError::BuildFailed(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifierError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

fn verification_body(link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body>
    <p>Thanks for signing up.</p>
    <p>Please confirm your email address by following the link below:</p>
    <p><a href="{link}">{link}</a></p>
    <p>If you did not create an account, you can ignore this message.</p>
  </body>
</html>
"#,
        link = link
    )
}
