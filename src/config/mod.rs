//! Configuration schema and loading
//!
//! Configuration comes from three layers: built-in defaults, an optional
//! JSON file, and command line overrides applied by the binary.

mod schema;

pub use schema::{
    AppConfig, CaptureConfig, SessionConfig, StreamConfig, WebConfig, WebRtcConfig,
};

use std::path::Path;

use crate::error::{AppError, Result};

/// Load configuration from a JSON file, or defaults when no file is given
pub async fn load(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let config: AppConfig = serde_json::from_str(&raw).map_err(|e| {
        AppError::Config(format!("Invalid config {}: {}", path.display(), e))
    })?;

    tracing::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_defaults_without_file() {
        let config = load(None).await.unwrap();
        assert_eq!(config.web.http_port, 8080);
        assert_eq!(config.capture.program, "parec");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"capture": {{"device": "alsa_output.monitor"}}}}"#).unwrap();

        let config = load(Some(file.path())).await.unwrap();
        assert_eq!(config.capture.device, "alsa_output.monitor");
        assert_eq!(config.capture.sample_rate, 48000);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load(Some(file.path())).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load(Some(Path::new("/nonexistent/smart-clock.json")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
