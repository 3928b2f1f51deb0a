pub mod config;
pub mod error;
pub mod tui_types;
pub mod types;

pub use config::{AppConfig, CaptureConfig, GeneralConfig, PlaybackConfig, SessionConfig};
pub use error::{AudioError, CodecError, ConfigError, SessionError};
pub use tui_types::{SessionView, UiCommand};
pub use types::{AudioChunk, MediaBlob, SessionState};
