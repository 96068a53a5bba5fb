use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use auth::PasswordHasher;
use auth::TokenSigner;
use identity_service::config::Config;
use identity_service::domain::user::ports::AuthServicePort;
use identity_service::domain::user::service::AuthService;
use identity_service::domain::user::service::AuthSettings;
use identity_service::domain::user::verification::VerificationQueue;
use identity_service::domain::user::verification::VerificationWorker;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::HttpSettings;
use identity_service::outbound::notifier::LogNotifier;
use identity_service::outbound::notifier::SmtpNotifier;
use identity_service::outbound::repositories::PostgresUserRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,auth=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        url = %config.server.url,
        http_port = config.server.http_port,
        smtp_host = %config.email.smtp_host,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let password_hasher = PasswordHasher::with_params(config.hashing.params())?;
    let token_signer = TokenSigner::new(config.jwt.secret.as_bytes(), config.jwt.issuer.as_str());
    let authenticator = Arc::new(Authenticator::new(password_hasher, token_signer));

    let (verification_queue, verification_jobs) = VerificationQueue::new();
    let verify_url = config.verify_url();
    let verify_ttl = chrono::Duration::seconds(config.email.verify_ttl_secs);

    let worker = if config.email.smtp_host.is_empty() {
        tracing::warn!("No SMTP host configured, verification links are only logged");
        VerificationWorker::new(
            Arc::clone(&authenticator),
            Arc::new(LogNotifier),
            verify_url.as_str(),
            verify_ttl,
        )
        .with_max_concurrent_sends(config.email.max_concurrent_sends)
        .spawn(verification_jobs)
    } else {
        VerificationWorker::new(
            Arc::clone(&authenticator),
            Arc::new(SmtpNotifier::new(&config.email)?),
            verify_url.as_str(),
            verify_ttl,
        )
        .with_max_concurrent_sends(config.email.max_concurrent_sends)
        .spawn(verification_jobs)
    };

    let user_repository = Arc::new(PostgresUserRepository::new(pg_pool.clone()));
    let auth_service: Arc<dyn AuthServicePort> = Arc::new(AuthService::new(
        user_repository,
        Arc::clone(&authenticator),
        verification_queue,
        AuthSettings {
            issuer_audience: config.jwt.issuer.clone(),
            verify_audience: verify_url,
            access_ttl: chrono::Duration::minutes(config.jwt.access_ttl_minutes),
            refresh_ttl: chrono::Duration::days(config.jwt.refresh_ttl_days),
        },
    ));

    let http_application = create_router(
        auth_service,
        authenticator,
        HttpSettings {
            issuer_audience: config.jwt.issuer.clone(),
            cookie_name: config.cookie.name.clone(),
            refresh_ttl: chrono::Duration::days(config.jwt.refresh_ttl_days),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        },
    );

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Http server stopped");

    // The router owned the last queue handle, so the worker drains and exits
    let drained = tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await;
    if drained.is_err() {
        tracing::warn!("Verification worker did not drain in time");
    }

    pg_pool.close().await;
    tracing::info!("Service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
