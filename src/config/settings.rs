use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tail: TailConfig,
}

/// How the bearer token travels in the WebSocket handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Sole entry of `Sec-WebSocket-Protocol`
    #[default]
    Subprotocol,
    /// `Authorization: Bearer <token>`
    Header,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReconnectConfig {
    /// Automatic attempts after consecutive failed connections
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay before each attempt, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

/// Static session used by the `realtime-tail` binary
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    pub token: Option<String>,
    pub identity_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TailConfig {
    /// Event types to subscribe to besides the global ones
    #[serde(default)]
    pub events: Vec<String>,
}

fn default_endpoint() -> String {
    "ws://localhost:8081/ws".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("realtime.endpoint", default_endpoint())?
            .set_default("realtime.auth_mode", "subprotocol")?
            .set_default("reconnect.max_attempts", i64::from(default_max_attempts()))?
            .set_default("reconnect.delay_ms", default_delay_ms() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // REALTIME__ENDPOINT, RECONNECT__DELAY_MS, SESSION__TOKEN, TAIL__EVENTS=a,b ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tail.events"),
            );

        builder.build()?.try_deserialize()
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_mode: AuthMode::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
