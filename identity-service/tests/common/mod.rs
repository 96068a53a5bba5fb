use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use auth::Authenticator;
use auth::HashingParams;
use auth::PasswordHasher;
use auth::TokenSigner;
use chrono::Utc;
use identity_service::domain::user::models::EmailAddress;
use identity_service::domain::user::models::User;
use identity_service::domain::user::models::UserId;
use identity_service::domain::user::ports::AuthServicePort;
use identity_service::domain::user::ports::Notifier;
use identity_service::domain::user::ports::UserRepository;
use identity_service::domain::user::service::AuthService;
use identity_service::domain::user::service::AuthSettings;
use identity_service::domain::user::verification::VerificationQueue;
use identity_service::domain::user::verification::VerificationWorker;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::HttpSettings;
use identity_service::user::errors::AuthError;
use identity_service::user::errors::NotifierError;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
pub const COOKIE_NAME: &str = "refresh_token";

/// Test application that spawns a real server over in-memory collaborators
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub repository: Arc<InMemoryUserRepository>,
    pub notifier: Arc<CapturingNotifier>,
    pub authenticator: Arc<Authenticator>,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);
        let verify_url = format!("{}/auth/verify", address);

        // Cheap argon2 parameters keep the suite fast
        let password_hasher = PasswordHasher::with_params(HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            output_len: 32,
        })
        .expect("Failed to create password hasher");
        let authenticator = Arc::new(Authenticator::new(
            password_hasher,
            TokenSigner::new(JWT_SECRET, address.as_str()),
        ));

        let repository = Arc::new(InMemoryUserRepository::default());
        let notifier = Arc::new(CapturingNotifier::default());

        let (queue, jobs) = VerificationQueue::new();
        VerificationWorker::new(
            Arc::clone(&authenticator),
            Arc::clone(&notifier),
            verify_url.as_str(),
            chrono::Duration::hours(1),
        )
        .spawn(jobs);

        let auth_service: Arc<dyn AuthServicePort> = Arc::new(AuthService::new(
            Arc::clone(&repository),
            Arc::clone(&authenticator),
            queue,
            AuthSettings {
                issuer_audience: address.clone(),
                verify_audience: verify_url,
                access_ttl: chrono::Duration::minutes(15),
                refresh_ttl: chrono::Duration::days(7),
            },
        ));

        let router = create_router(
            auth_service,
            Arc::clone(&authenticator),
            HttpSettings {
                issuer_audience: address.clone(),
                cookie_name: COOKIE_NAME.to_string(),
                refresh_ttl: chrono::Duration::days(7),
                request_timeout: Duration::from_secs(5),
            },
        );

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            // No cookie store: the refresh cookie is Secure and the test
            // server speaks plain http, so cookies are handled by hand
            api_client: reqwest::Client::builder()
                .build()
                .expect("Failed to create reqwest client"),
            repository,
            notifier,
            authenticator,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request carrying the refresh cookie
    pub fn post_with_cookie(&self, path: &str, refresh_token: &str) -> reqwest::RequestBuilder {
        self.post(path).header(
            reqwest::header::COOKIE,
            format!("{}={}", COOKIE_NAME, refresh_token),
        )
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/register")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "password_confirm": password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/auth/login")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register, follow the mailed verification link and return nothing.
    pub async fn register_verified(&self, email: &str, password: &str) {
        let response = self.register(email, password).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let token = self.notifier.wait_for_token(email).await;
        let response = self
            .get(&format!("/auth/verify?token={}", token))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
}

/// Value of the refresh cookie in a response's `Set-Cookie` headers, and the
/// full header line it came from.
pub fn refresh_cookie(response: &reqwest::Response) -> Option<(String, String)> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|line| line.starts_with(&format!("{}=", COOKIE_NAME)))
        .map(|line| {
            let value = line[COOKIE_NAME.len() + 1..]
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string();
            (value, line.to_string())
        })
}

/// User store kept in memory, with the same uniqueness rule as the
/// `users_email_key` constraint
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
    unavailable: AtomicBool,
}

impl InMemoryUserRepository {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn find(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.email.as_str() == email)
            .cloned()
    }

    pub fn remove(&self, email: &str) {
        self.users
            .lock()
            .unwrap()
            .retain(|user| user.email.as_str() != email);
    }

    fn check_available(&self) -> Result<(), AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.check_available()?;
        Ok(self.find(email))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        self.check_available()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| &user.id == id)
            .cloned())
    }

    async fn create(&self, email: &EmailAddress, password_hash: &str) -> Result<User, AuthError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| &user.email == email) {
            return Err(AuthError::UserExists);
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email: email.clone(),
            password_hash: password_hash.to_string(),
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, id: &UserId) -> Result<(), AuthError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|user| &user.id == id)
            .ok_or(AuthError::UserNotFound)?;

        let now = Utc::now();
        user.verified_at.get_or_insert(now);
        user.updated_at = now;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.check_available()
    }
}

/// Notifier that records every verification link it is asked to send
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    pub fn links_for(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, link)| link.clone())
            .collect()
    }

    /// Wait for the worker to deliver a link to `email` and return its token.
    pub async fn wait_for_token(&self, email: &str) -> String {
        for _ in 0..200 {
            if let Some(link) = self.links_for(email).pop() {
                let (_, token) = link
                    .split_once("?token=")
                    .expect("Verification link carries no token");
                return token.to_string();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("No verification email sent to {}", email);
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        verification_link: &str,
    ) -> Result<(), NotifierError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.as_str().to_string(), verification_link.to_string()));
        Ok(())
    }
}
