use std::fmt;
use std::path::PathBuf;

use taxlens_classify::{AiConfig, AiProvider, DEFAULT_CONCURRENCY};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("Unknown log format: '{0}'")]
    InvalidLogFormat(String),
    #[error(transparent)]
    Provider(#[from] taxlens_classify::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` when no API key is configured; classification then uses rules only.
    pub ai: Option<AiConfig>,
    pub jwt_secret: String,
    pub classify_concurrency: usize,
    pub rules_file: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("PORT") {
            Some(v) => parse_number("PORT", &v)?,
            None => 8080,
        };
        let classify_concurrency = match get("CLASSIFY_CONCURRENCY") {
            Some(v) => parse_number::<usize>("CLASSIFY_CONCURRENCY", &v)?.max(1),
            None => DEFAULT_CONCURRENCY,
        };

        let ai = match get("AI_API_KEY") {
            Some(key) => {
                let provider: AiProvider = get("AI_PROVIDER")
                    .as_deref()
                    .unwrap_or("gemini")
                    .parse()?;
                let mut ai = AiConfig::new(provider, key);
                ai.model = get("AI_MODEL");
                ai.base_url = get("AI_BASE_URL");
                Some(ai)
            }
            None => None,
        };

        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None if environment == "production" => LogFormat::Json,
            None => LogFormat::Pretty,
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            port,
            ai,
            jwt_secret: get("AUTH_JWT_SECRET").unwrap_or_default(),
            classify_concurrency,
            rules_file: get("RULES_FILE").map(PathBuf::from),
            cors_origins,
            environment,
            log_format,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.is_production() {
            "info"
        } else {
            "info,taxlens=debug,tower_http=debug"
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}
