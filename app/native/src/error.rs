//! Error types for SpeedChat.
//!
//! This module provides the unified error type returned by the controller
//! and the CLI. Component-level errors (`StoreError`, `ConfigError`) convert
//! into it.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors that can occur during application execution.
#[derive(Debug, Error)]
pub enum SpeedchatError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Persisted state could not be read or written.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    /// The trial has expired and no license is installed.
    #[error("License required: the trial has expired. Enter a license key to keep using SpeedChat.")]
    LicenseRequired,
    /// A license key failed validation.
    #[error("Invalid license key: {0}")]
    InvalidLicenseKey(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
    /// Generic command error.
    #[error("{0}")]
    CommandError(String),
}

impl From<std::io::Error> for SpeedchatError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for SpeedchatError {
    fn from(err: serde_json::Error) -> Self { Self::CommandError(err.to_string()) }
}

impl From<ConfigError> for SpeedchatError {
    fn from(err: ConfigError) -> Self { Self::ConfigError(err.to_string()) }
}

impl From<String> for SpeedchatError {
    fn from(msg: String) -> Self { Self::CommandError(msg) }
}

impl From<&str> for SpeedchatError {
    fn from(msg: &str) -> Self { Self::CommandError(msg.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_display() {
        let err = SpeedchatError::InvalidArguments("window must be a number".to_string());
        assert!(err.to_string().contains("window must be a number"));
    }

    #[test]
    fn test_store_error_from_conversion() {
        let err: SpeedchatError = StoreError::Unavailable("disk full".to_string()).into();
        assert!(matches!(err, SpeedchatError::StoreError(_)));
        assert!(err.to_string().contains("Store error"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_license_required_display() {
        let msg = SpeedchatError::LicenseRequired.to_string();
        assert!(msg.contains("License required"));
    }

    #[test]
    fn test_invalid_license_key_display() {
        let err = SpeedchatError::InvalidLicenseKey("SPD-AB-PRO".to_string());
        assert!(err.to_string().contains("SPD-AB-PRO"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err: SpeedchatError = io_err.into();
        assert!(matches!(err, SpeedchatError::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: SpeedchatError = ConfigError::NotFound.into();
        assert!(matches!(err, SpeedchatError::ConfigError(_)));
    }

    #[test]
    fn test_from_str() {
        let err: SpeedchatError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
