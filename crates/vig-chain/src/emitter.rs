//! Weight-submission boundary toward the consensus layer.
//!
//! The emission cycle hands a normalized weight vector to a
//! [`WeightEmitter`]; everything past that call — transaction
//! construction, signing, inclusion — belongs to the consensus layer's
//! client and is out of the engine's scope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vig_types::Uid;

use crate::{ChainError, Result};

/// Submits a score vector to the consensus layer.
#[async_trait]
pub trait WeightEmitter: Send + Sync {
    /// Submit normalized weights for the epoch ending at `block_number`.
    ///
    /// The vector contains every participant with nonzero weight and
    /// sums to 1 within the documented tolerance. An empty vector means
    /// "no active participants this epoch" and is a valid submission.
    async fn submit_weights(&self, block_number: u64, weights: &[(Uid, f64)]) -> Result<()>;
}

/// Emitter that only logs the vector.
///
/// Used until a consensus-layer client is wired in, and in dry-run
/// deployments where operators want the full cycle without on-chain
/// effects.
#[derive(Debug, Default)]
pub struct LogWeightEmitter;

impl LogWeightEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WeightEmitter for LogWeightEmitter {
    async fn submit_weights(&self, block_number: u64, weights: &[(Uid, f64)]) -> Result<()> {
        tracing::info!(
            block_number,
            participants = weights.len(),
            "weights computed (dry-run emitter, not submitted)"
        );
        for (uid, weight) in weights {
            tracing::debug!(uid, weight, "weight entry");
        }
        Ok(())
    }
}

/// Emitter that records every submission in memory (for tests).
#[derive(Debug, Default)]
pub struct MemoryWeightEmitter {
    submissions: Mutex<Vec<(u64, Vec<(Uid, f64)>)>>,
    failing: AtomicBool,
}

impl MemoryWeightEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded submissions, in order.
    pub fn submissions(&self) -> Vec<(u64, Vec<(Uid, f64)>)> {
        self.submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make subsequent submissions fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl WeightEmitter for MemoryWeightEmitter {
    async fn submit_weights(&self, block_number: u64, weights: &[(Uid, f64)]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChainError::SubmitRejected(
                "memory emitter set to fail".into(),
            ));
        }
        self.submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((block_number, weights.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_emitter_accepts_vector() {
        let emitter = LogWeightEmitter::new();
        emitter
            .submit_weights(360, &[(1, 0.3), (2, 0.7)])
            .await
            .expect("submit");
    }

    #[tokio::test]
    async fn test_memory_emitter_records() {
        let emitter = MemoryWeightEmitter::new();
        emitter.submit_weights(360, &[(1, 1.0)]).await.expect("submit");
        emitter.submit_weights(720, &[]).await.expect("submit");

        let subs = emitter.submissions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].0, 360);
        assert_eq!(subs[0].1, vec![(1, 1.0)]);
        assert!(subs[1].1.is_empty());
    }

    #[tokio::test]
    async fn test_memory_emitter_failure_injection() {
        let emitter = MemoryWeightEmitter::new();
        emitter.set_failing(true);
        let result = emitter.submit_weights(360, &[(1, 1.0)]).await;
        assert!(matches!(result, Err(ChainError::SubmitRejected(_))));
        assert!(emitter.submissions().is_empty());
    }
}
