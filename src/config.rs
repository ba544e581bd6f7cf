use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::subscriber::email::Email;
use crate::email::EmailClient;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub log_level: String,
    pub store: StoreSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub email_client: EmailClientSettings,
    pub waitlist: WaitlistSettings,
    pub bulk_email: BulkEmailSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
    Redis,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> Secret<String> {
        Secret::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name
        ))
    }

    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone)]
pub struct RedisSettings {
    pub url: Secret<String>,
    /// Name of the hash holding the subscribers.
    pub key: String,
    pub max_connections: u32,
}

#[derive(Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    /// Provider credential. Join and bulk email report a configuration error
    /// while this is missing.
    pub authorization_token: Option<Secret<String>>,
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<Email, String> {
        Email::try_from(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    /// Build the client once for the whole process. `Ok(None)` means the
    /// integration is not configured.
    pub fn client(&self) -> anyhow::Result<Option<EmailClient>> {
        let token = match &self.authorization_token {
            Some(token) if !token.expose_secret().trim().is_empty() => token.clone(),
            _ => {
                tracing::warn!("no email provider token configured, emails will not be sent");
                return Ok(None);
            }
        };

        let sender = self.sender().map_err(anyhow::Error::msg)?;
        let client = EmailClient::new(self.base_url.clone(), sender, token, self.timeout())?;
        Ok(Some(client))
    }
}

/// What to do when the welcome email for a freshly stored subscriber cannot
/// be sent.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WelcomeEmailFailurePolicy {
    /// Report the admission as failed and keep the stored record.
    #[default]
    Fail,
    /// Log the failure and report the admission as successful.
    Ignore,
    /// Delete the stored record again and report the admission as failed.
    Rollback,
}

#[derive(Deserialize, Clone)]
pub struct WaitlistSettings {
    #[serde(default)]
    pub on_welcome_email_failure: WelcomeEmailFailurePolicy,
    /// Answer count queries with zero when the store fails.
    #[serde(default = "default_true")]
    pub mask_count_errors: bool,
}

#[derive(Deserialize, Clone)]
pub struct BulkEmailSettings {
    pub max_concurrency: usize,
    #[serde(default)]
    pub escape_html: bool,
}

fn default_true() -> bool {
    true
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // E.g. `APP_EMAIL_CLIENT__AUTHORIZATION_TOKEN=...` sets
        // `Settings.email_client.authorization_token`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
