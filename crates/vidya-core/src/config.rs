use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_capture_rate")]
    pub sample_rate: u32,

    /// Samples per outbound frame.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            sample_rate: default_capture_rate(),
            frame_size: default_frame_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaybackConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_playback_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// How often finished playback buffers are reaped.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            sample_rate: default_playback_rate(),
            channels: default_channels(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_transport")]
    pub transport: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Upper bound on opening the connection and sending setup.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            voice: default_voice(),
            system_instruction: default_system_instruction(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_capture_rate() -> u32 {
    16000
}

fn default_frame_size() -> usize {
    4096
}

fn default_playback_rate() -> u32 {
    24000
}

fn default_channels() -> u16 {
    1
}

fn default_poll_interval_ms() -> u64 {
    20
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_transport() -> String {
    "websocket".to_string()
}

fn default_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_model() -> String {
    "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_voice() -> String {
    "Zephyr".to_string()
}

fn default_system_instruction() -> String {
    "You are Vidya, a friendly and patient tutor. Explain concepts step by step, \
     check the student's understanding with short questions, and keep spoken \
     answers brief."
        .to_string()
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let val = std::env::var(var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &val);
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.sample_rate == 0 {
            return Err(ConfigError::Invalid("capture.sample_rate must be > 0".into()));
        }
        if self.capture.frame_size == 0 {
            return Err(ConfigError::Invalid("capture.frame_size must be > 0".into()));
        }
        if self.playback.sample_rate == 0 {
            return Err(ConfigError::Invalid("playback.sample_rate must be > 0".into()));
        }
        // Server audio is always mono.
        if self.playback.channels != 1 {
            return Err(ConfigError::Invalid(format!(
                "playback.channels must be 1, got {}",
                self.playback.channels
            )));
        }
        if self.playback.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("playback.poll_interval_ms must be > 0".into()));
        }
        if self.session.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("session.connect_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
