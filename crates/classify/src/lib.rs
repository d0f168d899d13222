pub mod ai;
pub mod hybrid;
pub mod rules;

pub use ai::{AiBackend, AiClassifier, AiConfig, AiError, AiProvider, ConfigError, MockBackend};
pub use hybrid::{HybridClassifier, AI_ACCEPT_THRESHOLD, DEFAULT_CONCURRENCY};
pub use rules::{PatternRule, RuleClassifier};
