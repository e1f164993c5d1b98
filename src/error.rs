//! Error types for echogate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EchogateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio device errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio stream failed: {message}")]
    AudioStream { message: String },

    // Enrollment / verification errors
    #[error("Enrollment sample not found at {path}")]
    EnrollmentNotFound { path: String },

    #[error("Enrollment sample unusable: {message}")]
    EnrollmentInvalid { message: String },

    #[error("Speaker embedding failed: {message}")]
    Embedding { message: String },

    // Speech classification / recognition errors
    #[error("Voice activity detection failed: {message}")]
    Vad { message: String },

    #[error("Recognizer failed: {message}")]
    Recognition { message: String },

    // Device-mode control errors (best-effort path)
    #[error("Device control tool not found: {tool}")]
    DeviceToolNotFound { tool: String },

    #[error("Device mode switch failed: {message}")]
    DeviceSwitch { message: String },

    // Recording errors
    #[error("Recording write failed: {message}")]
    Recording { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, EchogateError>;
