use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::Notifier;
use crate::user::errors::NotifierError;

/// Development notifier: logs the verification link instead of mailing it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        verification_link: &str,
    ) -> Result<(), NotifierError> {
        tracing::info!(to = %to, "Verification email not sent, no SMTP host configured");
        // The link carries a live verification token
        tracing::debug!(to = %to, link = %verification_link, "Verification link");
        Ok(())
    }
}
