use std::sync::Arc;

use taxlens_core::{ClassificationResult, ParsedTransaction};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ai::{AiBackend, AiClassifier};
use crate::rules::RuleClassifier;

/// An AI answer is kept only above this confidence.
pub const AI_ACCEPT_THRESHOLD: f32 = 0.70;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Prefers a confident AI answer and falls back to the rule tables otherwise.
pub struct HybridClassifier<B = AiClassifier> {
    ai: Option<Arc<B>>,
    rules: Arc<RuleClassifier>,
    concurrency: usize,
}

impl<B> Clone for HybridClassifier<B> {
    fn clone(&self) -> Self {
        Self {
            ai: self.ai.clone(),
            rules: Arc::clone(&self.rules),
            concurrency: self.concurrency,
        }
    }
}

impl HybridClassifier<AiClassifier> {
    pub fn rules_only(rules: RuleClassifier) -> Self {
        Self::new(None, rules)
    }
}

impl<B: AiBackend + 'static> HybridClassifier<B> {
    pub fn new(ai: Option<B>, rules: RuleClassifier) -> Self {
        Self {
            ai: ai.map(Arc::new),
            rules: Arc::new(rules),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Maximum AI requests in flight during a batch. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn rules(&self) -> &RuleClassifier {
        &self.rules
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.as_ref().is_some_and(|ai| ai.is_available())
    }

    pub async fn classify(
        &self,
        tx: &ParsedTransaction,
        cancel: &CancellationToken,
    ) -> ClassificationResult {
        if let Some(ai) = self.ai.as_ref().filter(|ai| ai.is_available()) {
            match ai
                .classify(&tx.description, tx.direction, tx.amount, cancel)
                .await
            {
                Ok(result) if result.confidence > AI_ACCEPT_THRESHOLD => return result,
                Ok(result) => tracing::debug!(
                    confidence = result.confidence,
                    "AI answer below threshold, using rules"
                ),
                Err(e) => tracing::debug!(error = %e, "AI classification failed, using rules"),
            }
        }
        self.rules.classify(&tx.description, tx.direction)
    }

    /// Classify every transaction, returning results in input order.
    pub async fn classify_batch(
        &self,
        transactions: &[ParsedTransaction],
        cancel: &CancellationToken,
    ) -> Vec<ClassificationResult> {
        if !self.ai_enabled() {
            return transactions
                .iter()
                .map(|tx| self.rules.classify(&tx.description, tx.direction))
                .collect();
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (idx, tx) in transactions.iter().cloned().enumerate() {
            let this = self.clone();
            let cancel = cancel.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => this.classify(&tx, &cancel).await,
                    // `permits` is never closed, so acquiring cannot fail here.
                    Err(_) => this.rules.classify(&tx.description, tx.direction),
                };
                (idx, result)
            });
        }

        let mut results: Vec<Option<ClassificationResult>> = vec![None; transactions.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => tracing::warn!(error = %e, "classification task failed"),
            }
        }

        results
            .into_iter()
            .zip(transactions)
            .map(|(result, tx)| {
                result.unwrap_or_else(|| self.rules.classify(&tx.description, tx.direction))
            })
            .collect()
    }
}
