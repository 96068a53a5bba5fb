use std::sync::Arc;

use auth::Authenticator;
use chrono::Duration;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::VerificationError;
use crate::user::ports::Notifier;

/// Mails in flight at once when none is configured.
pub const DEFAULT_MAX_CONCURRENT_SENDS: usize = 16;

/// A verification mail waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationJob {
    pub user_id: UserId,
    pub email: EmailAddress,
}

impl From<&User> for VerificationJob {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Submission side of the verification mail queue.
///
/// Submitting never waits and never drops a job while the worker is alive.
/// Backpressure lives in the worker, which bounds how many mails are in flight.
#[derive(Debug, Clone)]
pub struct VerificationQueue {
    sender: mpsc::UnboundedSender<VerificationJob>,
}

impl VerificationQueue {
    /// # Returns
    /// The submission handle and the receiver to hand to a `VerificationWorker`
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VerificationJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn submit(&self, job: VerificationJob) {
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            tracing::error!(
                user_id = %job.user_id,
                "Verification worker stopped, verification email dropped"
            );
        }
    }
}

/// Detached task that signs verification tokens and hands links to the
/// notifier.
///
/// Runs outside any request scope. Each job gets its own task, at most
/// `max_concurrent_sends` at a time. Failures are logged and never retried.
pub struct VerificationWorker<N>
where
    N: Notifier,
{
    authenticator: Arc<Authenticator>,
    notifier: Arc<N>,
    verify_url: String,
    ttl: Duration,
    max_concurrent_sends: usize,
}

impl<N> VerificationWorker<N>
where
    N: Notifier,
{
    /// Create a new verification worker.
    ///
    /// # Arguments
    /// * `authenticator` - Signs verification tokens
    /// * `notifier` - Delivers the verification link
    /// * `verify_url` - Absolute URL of the verify endpoint, also the token audience
    /// * `ttl` - Verification token lifetime
    pub fn new(
        authenticator: Arc<Authenticator>,
        notifier: Arc<N>,
        verify_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            authenticator,
            notifier,
            verify_url: verify_url.into(),
            ttl,
            max_concurrent_sends: DEFAULT_MAX_CONCURRENT_SENDS,
        }
    }

    pub fn with_max_concurrent_sends(mut self, max_concurrent_sends: usize) -> Self {
        self.max_concurrent_sends = max_concurrent_sends.max(1);
        self
    }

    /// Build the link for `user_id`, with a token bound to the verify URL.
    ///
    /// # Errors
    /// * `Token` - Token signing failed
    pub fn link_for(&self, user_id: &UserId) -> Result<String, VerificationError> {
        let token = self.authenticator.issue_token(
            &user_id.to_string(),
            std::slice::from_ref(&self.verify_url),
            self.ttl,
        )?;

        Ok(format!("{}?token={}", self.verify_url, token))
    }

    /// Sign and send one verification mail.
    ///
    /// # Errors
    /// * `Token` - Token signing failed
    /// * `Notifier` - Delivery failed
    pub async fn process(&self, job: &VerificationJob) -> Result<(), VerificationError> {
        let link = self.link_for(&job.user_id)?;

        self.notifier
            .send_verification_email(&job.email, &link)
            .await?;

        Ok(())
    }

    /// Take jobs until every `VerificationQueue` handle is dropped, then wait
    /// for the sends still in flight.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<VerificationJob>) {
        tracing::info!(
            max_concurrent_sends = self.max_concurrent_sends,
            "Verification worker started"
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent_sends));
        let worker = Arc::new(self);
        let mut sends = JoinSet::new();

        loop {
            tokio::select! {
                job = receiver.recv() => match job {
                    Some(job) => {
                        let worker = Arc::clone(&worker);
                        let permits = Arc::clone(&permits);
                        sends.spawn(async move {
                            // The semaphore is never closed
                            let _permit = permits.acquire_owned().await;
                            worker.send(job).await;
                        });
                    }
                    None => break,
                },
                Some(finished) = sends.join_next(), if !sends.is_empty() => {
                    log_join_failure(finished);
                }
            }
        }

        while let Some(finished) = sends.join_next().await {
            log_join_failure(finished);
        }

        tracing::info!("Verification worker stopped");
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<VerificationJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    async fn send(&self, job: VerificationJob) {
        match self.process(&job).await {
            Ok(()) => tracing::info!(user_id = %job.user_id, "Verification email sent"),
            Err(e) => tracing::error!(
                user_id = %job.user_id,
                error = %e,
                "Failed to send verification email"
            ),
        }
    }
}

fn log_join_failure(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        tracing::error!(error = %e, "Verification email task failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use auth::HashingParams;
    use auth::PasswordHasher;
    use auth::TokenSigner;

    use super::*;
    use crate::user::errors::NotifierError;

    const ISSUER: &str = "http://localhost:8888";
    const VERIFY_URL: &str = "http://localhost:8888/auth/verify";

    #[derive(Default)]
    struct CapturingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
        delay: std::time::Duration,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn send_verification_email(
            &self,
            to: &EmailAddress,
            verification_link: &str,
        ) -> Result<(), NotifierError> {
            if self.fail {
                return Err(NotifierError::SendFailed("smtp down".to_string()));
            }
            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), verification_link.to_string()));
            Ok(())
        }
    }

    fn authenticator() -> Arc<Authenticator> {
        let hasher = PasswordHasher::with_params(HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            output_len: 32,
        })
        .unwrap();
        Arc::new(Authenticator::new(
            hasher,
            TokenSigner::new(b"test_secret_key_at_least_32_bytes!", ISSUER),
        ))
    }

    fn job() -> VerificationJob {
        VerificationJob {
            user_id: UserId::new(),
            email: EmailAddress::new("a@b.com".to_string()).unwrap(),
        }
    }

    #[test]
    fn test_link_carries_verify_audience_token() {
        let authenticator = authenticator();
        let worker = VerificationWorker::new(
            Arc::clone(&authenticator),
            Arc::new(CapturingNotifier::default()),
            VERIFY_URL,
            Duration::minutes(5),
        );
        let user_id = UserId::new();

        let link = worker.link_for(&user_id).unwrap();
        let token = link
            .strip_prefix(&format!("{}?token=", VERIFY_URL))
            .expect("link should point at the verify endpoint");

        assert_eq!(
            authenticator.validate_token_for(token, VERIFY_URL).unwrap(),
            user_id.to_string()
        );
        assert!(authenticator.validate_token_for(token, ISSUER).is_err());
    }

    #[tokio::test]
    async fn test_worker_sends_queued_jobs_and_stops_when_queue_closes() {
        let notifier = Arc::new(CapturingNotifier::default());
        let worker = VerificationWorker::new(
            authenticator(),
            Arc::clone(&notifier),
            VERIFY_URL,
            Duration::minutes(5),
        );
        let (queue, receiver) = VerificationQueue::new();
        let handle = worker.spawn(receiver);

        queue.submit(job());
        queue.submit(job());
        drop(queue);

        handle.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "a@b.com");
        assert!(sent[0].1.starts_with(VERIFY_URL));
    }

    #[tokio::test]
    async fn test_burst_beyond_concurrency_limit_delivers_every_mail() {
        let notifier = Arc::new(CapturingNotifier {
            delay: std::time::Duration::from_millis(50),
            ..Default::default()
        });
        let worker = VerificationWorker::new(
            authenticator(),
            Arc::clone(&notifier),
            VERIFY_URL,
            Duration::minutes(5),
        )
        .with_max_concurrent_sends(2);
        let (queue, receiver) = VerificationQueue::new();
        let handle = worker.spawn(receiver);

        for _ in 0..5 {
            queue.submit(job());
        }
        drop(queue);

        handle.await.unwrap();

        assert_eq!(notifier.sent.lock().unwrap().len(), 5);
        assert!(notifier.peak_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_worker_survives_notifier_failure() {
        let notifier = Arc::new(CapturingNotifier {
            fail: true,
            ..Default::default()
        });
        let worker = VerificationWorker::new(
            authenticator(),
            Arc::clone(&notifier),
            VERIFY_URL,
            Duration::minutes(5),
        );

        assert!(matches!(
            worker.process(&job()).await,
            Err(VerificationError::Notifier(_))
        ));

        let (queue, receiver) = VerificationQueue::new();
        let handle = worker.spawn(receiver);
        queue.submit(job());
        drop(queue);

        // Worker keeps draining and exits cleanly
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_worker_stopped_does_not_panic() {
        let (queue, receiver) = VerificationQueue::new();
        drop(receiver);

        queue.submit(job());
    }
}
