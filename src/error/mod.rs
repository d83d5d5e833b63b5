use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session has no token or identity")]
    MissingCredentials,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Realtime client event loop is not running")]
    ClientStopped,

    #[error("A realtime client is already installed for this process")]
    AlreadyInstalled,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Why an inbound frame was discarded before reaching subscribers.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("binary frames are not supported")]
    Binary,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no `type` field")]
    MissingType,
}

impl FrameError {
    /// Stable label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            FrameError::Binary => "binary",
            FrameError::InvalidJson(_) => "invalid_json",
            FrameError::NotAnObject => "not_an_object",
            FrameError::MissingType => "missing_type",
        }
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_reasons_are_distinct() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let reasons = [
            FrameError::Binary.reason(),
            FrameError::InvalidJson(json_err).reason(),
            FrameError::NotAnObject.reason(),
            FrameError::MissingType.reason(),
        ];

        for (i, a) in reasons.iter().enumerate() {
            for b in reasons.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_missing_credentials_message() {
        assert_eq!(
            RealtimeError::MissingCredentials.to_string(),
            "Session has no token or identity"
        );
    }
}
