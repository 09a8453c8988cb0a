use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bundled OCR server process to launch at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SidecarConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_startup_timeout() -> u64 {
    30
}

/// OCR engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    pub server_url: String,
    pub timeout_secs: u64,
    pub sidecar: Option<SidecarConfig>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:39835".to_string(),
            timeout_secs: 5,
            sidecar: None,
        }
    }
}

/// Photo storage and file sharing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Overrides the app-private pictures directory
    pub pictures_dir: Option<PathBuf>,
    pub provider_authority: String,
    pub share_grant_ttl_secs: u64,
    pub delete_superseded_photos: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pictures_dir: None,
            provider_authority: "text-ocr.provider".to_string(),
            share_grant_ttl_secs: 120,
            delete_superseded_photos: true,
        }
    }
}

impl CaptureConfig {
    /// Resolve the directory camera photos are written to
    pub fn resolve_pictures_dir(&self) -> Result<PathBuf, String> {
        if let Some(dir) = &self.pictures_dir {
            return Ok(dir.clone());
        }

        Ok(dirs::data_local_dir()
            .ok_or("Failed to determine local data directory")?
            .join("text-ocr")
            .join("Pictures"))
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject settings the app cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.ocr.server_url.trim().is_empty() {
            return Err("OCR server URL must not be empty".to_string());
        }

        if self.ocr.timeout_secs == 0 {
            return Err("OCR timeout must be at least 1 second".to_string());
        }

        if self.capture.share_grant_ttl_secs == 0 {
            return Err("Share grant TTL must be at least 1 second".to_string());
        }

        if self.capture.provider_authority.trim().is_empty() {
            return Err("Provider authority must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.ocr.server_url, "http://127.0.0.1:39835");
        assert_eq!(config.ocr.timeout_secs, 5);
        assert!(config.ocr.sidecar.is_none());

        assert!(config.capture.pictures_dir.is_none());
        assert_eq!(config.capture.share_grant_ttl_secs, 120);
        assert!(config.capture.delete_superseded_photos);

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "ocr": { "server_url": "http://localhost:9000" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.ocr.server_url, "http://localhost:9000");
        assert_eq!(config.ocr.timeout_secs, 5);
        assert_eq!(config.capture, CaptureConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_sidecar_startup_timeout_default() {
        let json = r#"{ "ocr": { "sidecar": { "program": "/opt/ocr/ocr_server" } } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        let sidecar = config.ocr.sidecar.unwrap();
        assert_eq!(sidecar.program, PathBuf::from("/opt/ocr/ocr_server"));
        assert!(sidecar.args.is_empty());
        assert_eq!(sidecar.startup_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.ocr.server_url = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ocr.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.capture.share_grant_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pictures_dir_override() {
        let mut capture = CaptureConfig::default();
        capture.pictures_dir = Some(PathBuf::from("/tmp/photos"));

        assert_eq!(capture.resolve_pictures_dir().unwrap(), PathBuf::from("/tmp/photos"));
    }
}
