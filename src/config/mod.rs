mod settings;

pub use settings::{
    AuthMode, LogFormat, LoggingConfig, RealtimeConfig, ReconnectConfig, SessionConfig, Settings,
    TailConfig,
};
