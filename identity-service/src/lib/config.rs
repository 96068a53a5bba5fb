use std::env;
use std::fmt;
use std::str::FromStr;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub hashing: HashingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Public base URL, used for verification links
    pub url: String,
    pub http_port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    pub name: String,
}

#[derive(Deserialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub verify_ttl_secs: i64,
    /// Verification mails in flight at once
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: usize,
}

fn default_refresh_ttl_days() -> i64 {
    7
}

fn default_max_concurrent_sends() -> usize {
    crate::domain::user::verification::DEFAULT_MAX_CONCURRENT_SENDS
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "refresh_token".to_string(),
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        let params = auth::HashingParams::default();
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
            output_len: params.output_len,
        }
    }
}

impl HashingConfig {
    pub fn params(&self) -> auth::HashingParams {
        auth::HashingParams {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
            output_len: self.output_len,
        }
    }
}

// Secrets are kept out of Debug output so a logged config never leaks them.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"*")
            .field("issuer", &self.issuer)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"*")
            .field("sender", &self.sender)
            .field("verify_ttl_secs", &self.verify_ttl_secs)
            .field("max_concurrent_sends", &self.max_concurrent_sends)
            .finish()
    }
}

/// One conventional single-name environment variable and how it lands in
/// the config tree.
struct EnvOverride {
    var: &'static str,
    apply: fn(&mut Config, &str) -> Result<(), ConfigError>,
}

const ENV_OVERRIDES: &[EnvOverride] = &[
    EnvOverride {
        var: "APP_URL",
        apply: set_app_url,
    },
    EnvOverride {
        var: "APP_KEY",
        apply: set_app_key,
    },
    EnvOverride {
        var: "PORT",
        apply: set_port,
    },
    EnvOverride {
        var: "DATABASE_URL",
        apply: set_database_url,
    },
    EnvOverride {
        var: "EMAIL_HOST",
        apply: set_email_host,
    },
    EnvOverride {
        var: "EMAIL_PORT",
        apply: set_email_port,
    },
    EnvOverride {
        var: "EMAIL_USER",
        apply: set_email_user,
    },
    EnvOverride {
        var: "EMAIL_PASSWORD",
        apply: set_email_password,
    },
    EnvOverride {
        var: "EMAIL_SENDER",
        apply: set_email_sender,
    },
];

fn parse_number<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Message(format!("{} must be a number: {}", var, e)))
}

fn set_app_url(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.server.url = value.to_string();
    config.jwt.issuer = value.to_string();
    Ok(())
}

fn set_app_key(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.jwt.secret = value.to_string();
    Ok(())
}

fn set_port(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.server.http_port = parse_number("PORT", value)?;
    Ok(())
}

fn set_database_url(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.database.url = value.to_string();
    Ok(())
}

fn set_email_host(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.email.smtp_host = value.to_string();
    Ok(())
}

fn set_email_port(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.email.smtp_port = parse_number("EMAIL_PORT", value)?;
    Ok(())
}

fn set_email_user(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.email.username = value.to_string();
    Ok(())
}

fn set_email_password(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.email.password = value.to_string();
    Ok(())
}

fn set_email_sender(config: &mut Config, value: &str) -> Result<(), ConfigError> {
    config.email.sender = value.to_string();
    Ok(())
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Conventional variables (APP_URL, APP_KEY, PORT, DATABASE_URL, EMAIL_*)
    /// 2. Nested environment variables (DATABASE__URL, JWT__SECRET, etc.)
    /// 3. Environment-specific config file (config/{environment}.toml)
    /// 4. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: DATABASE__URL=postgres://... overrides database.url
            .add_source(Environment::default().separator("__"))
            .build()?;

        let mut config: Config = configuration.try_deserialize()?;
        config.apply_env_overrides(|var| env::var(var).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Apply the conventional single-name variables on top of the loaded tree.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, if set
    ///
    /// # Errors
    /// * `Message` - A numeric variable does not parse
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for entry in ENV_OVERRIDES {
            if let Some(value) = lookup(entry.var) {
                (entry.apply)(self, &value)?;
            }
        }
        Ok(())
    }

    /// Reject configurations the service cannot run safely with.
    ///
    /// # Errors
    /// * `Message` - Secret shorter than 32 bytes or a non-positive lifetime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.jwt.access_ttl_minutes <= 0 || self.jwt.refresh_ttl_days <= 0 {
            return Err(ConfigError::Message(
                "jwt token lifetimes must be positive".to_string(),
            ));
        }
        if self.email.verify_ttl_secs <= 0 {
            return Err(ConfigError::Message(
                "email.verify_ttl_secs must be positive".to_string(),
            ));
        }
        if self.server.url.is_empty() || self.jwt.issuer.is_empty() {
            return Err(ConfigError::Message(
                "server.url and jwt.issuer must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL of the verify endpoint. Also the audience of
    /// verification tokens.
    pub fn verify_url(&self) -> String {
        format!("{}/auth/verify", self.server.url.trim_end_matches('/'))
    }
}
