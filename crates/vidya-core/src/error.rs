use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("stream error: {0}")]
    StreamError(String),
}

/// Failures decoding a single inbound audio payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid base64 audio: {0}")]
    InvalidBase64(String),

    #[error("PCM16 payload has odd length: {0} bytes")]
    OddLength(usize),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport not found: {0}")]
    TransportNotFound(String),

    #[error("transport initialization failed: {0}")]
    InitializationFailed(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("failed to send audio: {0}")]
    SendFailed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("audio unavailable: {0}")]
    Audio(#[from] AudioError),
}

impl SessionError {
    /// Short message suitable for showing to the student.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Audio(AudioError::StreamError(msg)) => {
                format!("Audio device error: {msg}")
            }
            SessionError::Audio(e) => format!("Microphone unavailable: {e}"),
            SessionError::TransportNotFound(name) => format!("Unknown transport: {name}"),
            SessionError::InitializationFailed(msg) => format!("Session setup failed: {msg}"),
            _ => "Connection error".to_string(),
        }
    }
}
