use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use log::LevelFilter;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Runtime configuration for the service, loaded once at start and passed explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Tesseract language codes joined with `+`
    pub ocr_languages: String,
    /// Directory holding `*.traineddata`; probed from well-known locations when unset
    pub tessdata_path: Option<PathBuf>,
    pub log_level: LevelFilter,
    /// Log file appended to in addition to stderr
    pub log_file: Option<PathBuf>,
    pub max_upload_bytes: usize,
    /// Parent directory for staged uploads; the system temp dir when unset
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            ocr_languages: "eng+hin".to_string(),
            tessdata_path: None,
            log_level: LevelFilter::Info,
            log_file: None,
            max_upload_bytes: 100 * 1024 * 1024,
            upload_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment, honouring a local `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: parse_or(get("TRANSFORMO_HOST"), "TRANSFORMO_HOST", defaults.host)?,
            port: parse_or(get("TRANSFORMO_PORT"), "TRANSFORMO_PORT", defaults.port)?,
            ocr_languages: get("TRANSFORMO_OCR_LANGUAGES")
                .map(|value| value.trim().to_string())
                .unwrap_or(defaults.ocr_languages),
            tessdata_path: get("TESSDATA_PREFIX").map(PathBuf::from),
            log_level: parse_or(get("TRANSFORMO_LOG_LEVEL"), "TRANSFORMO_LOG_LEVEL", defaults.log_level)?,
            log_file: get("TRANSFORMO_LOG_FILE").map(PathBuf::from),
            max_upload_bytes: parse_or(
                get("TRANSFORMO_MAX_UPLOAD_BYTES"),
                "TRANSFORMO_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
            upload_dir: get("TRANSFORMO_UPLOAD_DIR").map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}
