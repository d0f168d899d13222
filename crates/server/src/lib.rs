pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod telemetry;

use anyhow::Context;
use taxlens_classify::{AiClassifier, HybridClassifier, RuleClassifier};
use taxlens_import::ImportProfile;

use crate::auth::TokenVerifier;
use crate::config::Config;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub classifier: HybridClassifier,
    pub tokens: TokenVerifier,
    pub import_profile: ImportProfile,
}

impl AppState {
    pub fn new(classifier: HybridClassifier, tokens: TokenVerifier) -> Self {
        Self {
            classifier,
            tokens,
            import_profile: ImportProfile::default(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let rules = match &config.rules_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading rules file {}", path.display()))?;
                RuleClassifier::from_toml(&content).map_err(anyhow::Error::msg)?
            }
            None => RuleClassifier::new(),
        };

        let ai = config.ai.clone().map(AiClassifier::new).transpose()?;
        if let Some(ai) = &ai {
            tracing::info!(provider = %ai.provider(), model = ai.model(), "AI classifier configured");
        }
        let classifier =
            HybridClassifier::new(ai, rules).with_concurrency(config.classify_concurrency);

        Ok(Self::new(classifier, TokenVerifier::new(&config.jwt_secret)))
    }
}
