//! Configuration management for AgentFlow.
//!
//! Configuration can be set via environment variables:
//! - `OLLAMA_BASE_URL` - Optional. OpenAI-compatible endpoint. Defaults to `http://localhost:11434/v1`.
//! - `OLLAMA_API_KEY` - Optional. Bearer token for the endpoint. Defaults to `ollama`.
//! - `DEFAULT_MODEL` - Optional. Model used when an agent has none. Defaults to `mistral:7b`.
//! - `VISION_MODEL` - Optional. Model used for image analysis. Defaults to `llama3.2-vision:11b`.
//! - `MAX_REACT_STEPS` - Optional. Reasoning loop step budget. Defaults to `10`.
//! - `AGENTFLOW_DATABASE_PATH` - Optional. SQLite file. Defaults to `agentflow.db`.
//! - `REPORTS_DIR` - Optional. Output directory for generated documents. Defaults to `reports`.
//! - `UPLOADS_DIR` - Optional. Directory image analysis may read from. Defaults to `uploads`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `AGENTFLOW_SMTP_HOST`, `AGENTFLOW_SMTP_PORT`, `AGENTFLOW_SMTP_USER`,
//!   `AGENTFLOW_SMTP_PASS`, `AGENTFLOW_SMTP_FROM` - Optional. Mail dispatch settings.
//! - `AGENTFLOW_PDF_FONT_PATH` - Optional. TTF font used for report text.
//! - `SCRAPER_TIMEOUT_SECS` - Optional. Web extraction timeout. Defaults to `15`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_API_KEY: &str = "ollama";
pub const DEFAULT_MODEL: &str = "mistral:7b";
pub const DEFAULT_VISION_MODEL: &str = "llama3.2-vision:11b";
pub const DEFAULT_MAX_STEPS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// SMTP settings for the mail capability.
///
/// Every field is optional at load time; the mailer reports an incomplete
/// configuration when a send is attempted.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_addr: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            user: None,
            password: None,
            from_addr: None,
        }
    }
}

impl SmtpConfig {
    /// Whether enough is configured to attempt delivery.
    pub fn is_complete(&self) -> bool {
        self.host.is_some() && self.user.is_some() && self.password.is_some()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible model server
    pub base_url: String,

    /// API key sent as a bearer token
    pub api_key: String,

    /// Model used when an agent does not name one
    pub default_model: String,

    /// Model used by the image analysis tool
    pub vision_model: String,

    /// Maximum think/act/observe steps per run
    pub max_steps: usize,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Where generated documents are written
    pub reports_dir: PathBuf,

    /// The only directory images may be read from
    pub uploads_dir: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Mail dispatch settings
    pub smtp: SmtpConfig,

    /// Optional TTF font for document rendering
    pub pdf_font_path: Option<PathBuf>,

    /// Timeout for web extraction requests
    pub scraper_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
    /// or `MAX_REACT_STEPS` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or("OLLAMA_BASE_URL", DEFAULT_BASE_URL);
        let api_key = env_or("OLLAMA_API_KEY", DEFAULT_API_KEY);
        let default_model = env_or("DEFAULT_MODEL", DEFAULT_MODEL);
        let vision_model = env_or("VISION_MODEL", DEFAULT_VISION_MODEL);

        let max_steps: usize = parse_env("MAX_REACT_STEPS", DEFAULT_MAX_STEPS)?;
        if max_steps == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_REACT_STEPS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let smtp = SmtpConfig {
            host: std::env::var("AGENTFLOW_SMTP_HOST").ok(),
            port: parse_env("AGENTFLOW_SMTP_PORT", 587)?,
            user: std::env::var("AGENTFLOW_SMTP_USER").ok(),
            password: std::env::var("AGENTFLOW_SMTP_PASS").ok(),
            from_addr: std::env::var("AGENTFLOW_SMTP_FROM").ok(),
        };

        Ok(Self {
            base_url,
            api_key,
            default_model,
            vision_model,
            max_steps,
            database_path: PathBuf::from(env_or("AGENTFLOW_DATABASE_PATH", "agentflow.db")),
            reports_dir: PathBuf::from(env_or("REPORTS_DIR", "reports")),
            uploads_dir: PathBuf::from(env_or("UPLOADS_DIR", "uploads")),
            host: env_or("HOST", "127.0.0.1"),
            port: parse_env("PORT", 8000)?,
            smtp,
            pdf_font_path: std::env::var("AGENTFLOW_PDF_FONT_PATH").ok().map(PathBuf::from),
            scraper_timeout: Duration::from_secs(parse_env("SCRAPER_TIMEOUT_SECS", 15)?),
        })
    }

    /// Create a config rooted at `data_dir` (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            database_path: data_dir.join("agentflow.db"),
            reports_dir: data_dir.join("reports"),
            uploads_dir: data_dir.join("uploads"),
            host: "127.0.0.1".to_string(),
            port: 8000,
            smtp: SmtpConfig::default(),
            pdf_font_path: None,
            scraper_timeout: Duration::from_secs(15),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_roots_directories_under_data_dir() {
        let config = Config::new(PathBuf::from("/tmp/af"));
        assert_eq!(config.reports_dir, PathBuf::from("/tmp/af/reports"));
        assert_eq!(config.uploads_dir, PathBuf::from("/tmp/af/uploads"));
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert!(!config.smtp.is_complete());
    }

    #[test]
    fn test_parse_env_reports_variable_name() {
        std::env::set_var("AGENTFLOW_TEST_BAD_PORT", "not-a-port");
        let err = parse_env::<u16>("AGENTFLOW_TEST_BAD_PORT", 1).unwrap_err();
        assert!(err.to_string().contains("AGENTFLOW_TEST_BAD_PORT"));
        std::env::remove_var("AGENTFLOW_TEST_BAD_PORT");
    }

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value = parse_env::<usize>("AGENTFLOW_TEST_UNSET_VALUE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
