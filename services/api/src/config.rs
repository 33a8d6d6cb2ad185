//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which hosted model backend answers generation requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    Gemini,
    OpenAi,
}

impl GenerationProvider {
    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("'{}' is not one of gemini, openai", other)),
        }
    }
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,

    // --- Generation backend ---
    pub provider: GenerationProvider,
    pub generation_api_key: String,
    pub generation_model: String,
    pub generation_base_url: Option<String>,
    pub generation_timeout: Duration,

    // --- Object storage ---
    pub storage: StorageConfig,
    pub pdf_bucket: String,
    pub image_bucket: String,

    // --- Limits and policies ---
    pub max_payload_bytes: usize,
    pub max_upload_bytes: usize,
    pub allow_any_document_fallback: bool,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &or_default("BIND_ADDRESS", "0.0.0.0:5000"))?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation Backend ---
        let provider: GenerationProvider =
            parse_var("GENERATION_PROVIDER", &or_default("GENERATION_PROVIDER", "gemini"))?;
        let generation_api_key = match provider {
            GenerationProvider::Gemini => lookup("GOOGLE_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .ok_or_else(|| ConfigError::MissingVar("GOOGLE_API_KEY".to_string()))?,
            GenerationProvider::OpenAi => required("OPENAI_API_KEY")?,
        };
        let generation_model = or_default("GENERATION_MODEL", provider.default_model());
        let generation_base_url = lookup("GENERATION_BASE_URL");
        let timeout_secs: u64 =
            parse_var("GENERATION_TIMEOUT_SECS", &or_default("GENERATION_TIMEOUT_SECS", "120"))?;

        // --- Object Storage ---
        let storage = StorageConfig {
            endpoint: required("STORAGE_ENDPOINT")?,
            region: or_default("STORAGE_REGION", "us-east-1"),
            access_key: required("STORAGE_ACCESS_KEY")?,
            secret_key: required("STORAGE_SECRET_KEY")?,
        };

        // --- Limits and Policies ---
        let max_payload_bytes =
            parse_var("MAX_PAYLOAD_BYTES", &or_default("MAX_PAYLOAD_BYTES", "10485760"))?;
        let max_upload_bytes =
            parse_var("MAX_UPLOAD_BYTES", &or_default("MAX_UPLOAD_BYTES", "67108864"))?;
        let allow_any_document_fallback = parse_var(
            "ALLOW_ANY_DOCUMENT_FALLBACK",
            &or_default("ALLOW_ANY_DOCUMENT_FALLBACK", "true"),
        )?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            provider,
            generation_api_key,
            generation_model,
            generation_base_url,
            generation_timeout: Duration::from_secs(timeout_secs),
            storage,
            pdf_bucket: or_default("PDF_BUCKET", "pdfs"),
            image_bucket: or_default("IMAGE_BUCKET", "images"),
            max_payload_bytes,
            max_upload_bytes,
            allow_any_document_fallback,
            cors_origin: or_default("CORS_ORIGIN", "*"),
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/pdfs"),
            ("GOOGLE_API_KEY", "g-key"),
            ("STORAGE_ENDPOINT", "http://localhost:9000"),
            ("STORAGE_ACCESS_KEY", "minio"),
            ("STORAGE_SECRET_KEY", "minio123"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base()).unwrap();
        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.provider, GenerationProvider::Gemini);
        assert_eq!(config.generation_api_key, "g-key");
        assert_eq!(config.generation_model, "gemini-1.5-flash");
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.pdf_bucket, "pdfs");
        assert_eq!(config.image_bucket, "images");
        assert_eq!(config.max_payload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_upload_bytes, 64 * 1024 * 1024);
        assert!(config.allow_any_document_fallback);
        assert_eq!(config.cors_origin, "*");
    }

    #[test]
    fn gemini_key_alias_is_accepted() {
        let mut vars = base();
        vars.remove("GOOGLE_API_KEY");
        vars.insert("GEMINI_API_KEY", "alias");
        assert_eq!(load(&vars).unwrap().generation_api_key, "alias");
    }

    #[test]
    fn openai_provider_needs_its_own_key() {
        let mut vars = base();
        vars.insert("GENERATION_PROVIDER", "OpenAI");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingVar(key)) if key == "OPENAI_API_KEY"
        ));

        vars.insert("OPENAI_API_KEY", "sk-test");
        let config = load(&vars).unwrap();
        assert_eq!(config.provider, GenerationProvider::OpenAi);
        assert_eq!(config.generation_model, "gpt-4o-mini");
    }

    #[test]
    fn missing_database_url_is_reported() {
        let mut vars = base();
        vars.remove("DATABASE_URL");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingVar(key)) if key == "DATABASE_URL"
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = base();
        vars.insert("ALLOW_ANY_DOCUMENT_FALLBACK", "sometimes");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue(key, _)) if key == "ALLOW_ANY_DOCUMENT_FALLBACK"
        ));

        let mut vars = base();
        vars.insert("GENERATION_PROVIDER", "claude");
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(..))));

        let mut vars = base();
        vars.insert("RUST_LOG", "chatty");
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(..))));
    }
}
