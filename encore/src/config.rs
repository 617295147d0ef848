use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;

use encore_auth::server::{OAuthConfiguration, ServerConfiguration};

#[derive(Debug, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfiguration,
    pub oauth: OAuthConfiguration,
    pub telegram: TelegramConfiguration,
    pub events: EventsConfiguration,
    #[serde(default)]
    pub storage: StorageConfiguration,
    #[serde(default)]
    pub logging: LoggingConfiguration,
    #[serde(default)]
    pub notifications: NotificationConfiguration,
    #[serde(default)]
    pub messages: Messages,
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfiguration {
    pub token: SecretString,

    /// Server-side wait of each long-polling request.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct EventsConfiguration {
    pub api_token: SecretString,

    #[serde(default = "default_concerts_category")]
    pub concerts_category_id: String,

    /// Bound on every catalog and events lookup.
    #[serde(default = "default_lookup_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfiguration {
    #[serde(default)]
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfiguration {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct LoggingConfiguration {
    /// Also write daily-rotated log files here.
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfiguration {
    #[serde(default = "default_notification_capacity")]
    pub capacity: usize,
}

impl Default for NotificationConfiguration {
    fn default() -> Self {
        Self {
            capacity: default_notification_capacity(),
        }
    }
}

/// Every text the bot sends.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Messages {
    pub start: String,
    pub help: String,
    pub auth_prompt: String,
    pub auth_success: String,
    pub enter_city: String,
    pub city_success: String,
    pub favorite_artists: String,
    pub no_favorites: String,
    pub wait_for_concerts: String,
    pub concerts: String,
    pub no_concerts: String,
    pub only_commands: String,
    pub unknown_command: String,
    pub failure: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            start: "Hi! I find concerts of the artists you listen to most.".to_string(),
            help: "/auth - connect your music account\n\
                   /changecity - set the city to search in\n\
                   /favorites - show your favorite artists\n\
                   /concerts - find upcoming concerts\n\
                   /help - show this message"
                .to_string(),
            auth_prompt: "Open this link to connect your music account:\n".to_string(),
            auth_success: "Your music account is connected.".to_string(),
            enter_city: "Which city should I look for concerts in?".to_string(),
            city_success: "City saved:".to_string(),
            favorite_artists: "Your favorite artists:\n".to_string(),
            no_favorites: "No favorite artists found.".to_string(),
            wait_for_concerts: "Looking for concerts, this can take a moment...".to_string(),
            concerts: "Upcoming concerts:\n".to_string(),
            no_concerts: "No upcoming concerts found.".to_string(),
            only_commands: "Only commands are supported for now, see /help.".to_string(),
            unknown_command: "Unknown command, see /help.".to_string(),
            failure: "Something went wrong, please try again.".to_string(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    60
}

fn default_concerts_category() -> String {
    encore_api::endpoints::CONCERTS_CATEGORY_ID.to_string()
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_notification_capacity() -> usize {
    encore_auth::server::services::notifier::DEFAULT_CAPACITY
}

impl Configuration {
    /// `config.toml` (or the file named by `ENCORE_CONFIG`), overridden by
    /// `ENCORE__SECTION__KEY` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("ENCORE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("ENCORE").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.oauth.validate()?;
        if self.telegram.token.expose_secret().is_empty() {
            return Err("telegram.token is required".to_string());
        }
        if self.events.api_token.expose_secret().is_empty() {
            return Err("events.api_token is required".to_string());
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none()
        {
            return Err("storage.database_url is required for the postgres backend".to_string());
        }
        if self.notifications.capacity == 0 {
            return Err("notifications.capacity must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MINIMAL: &str = r#"
        [oauth]
        client_id = "client"
        client_secret = "secret"
        redirect_uri = "https://bot.example.com/callback"

        [telegram]
        token = "123:abc"

        [events]
        api_token = "events-token"
    "#;

    fn load(toml: &str) -> Configuration {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn minimal_configuration_gets_defaults() {
        let config = load(MINIMAL);

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telegram.poll_timeout_seconds, 60);
        assert_eq!(config.events.concerts_category_id, "460");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.notifications.capacity, 100);
        assert_eq!(config.oauth.timeout_seconds, 10);
        assert!(!config.messages.failure.is_empty());
    }

    #[test]
    fn messages_can_be_partially_overridden() {
        let config = load(&format!(
            "{}\n[messages]\nhelp = \"custom help\"\n",
            MINIMAL
        ));

        assert_eq!(config.messages.help, "custom help");
        assert_eq!(config.messages.start, Messages::default().start);
    }

    #[test]
    fn postgres_backend_requires_url() {
        let config = load(&format!("{}\n[storage]\nbackend = \"postgres\"\n", MINIMAL));
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_telegram_token_is_rejected() {
        let config = load(&MINIMAL.replace("123:abc", ""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn secrets_are_not_printed() {
        let printed = format!("{:?}", load(MINIMAL).telegram);
        assert!(!printed.contains("123:abc"));
    }
}
