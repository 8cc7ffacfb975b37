//! # vig-chain
//!
//! External-chain boundaries of the reward engine:
//!
//! - [`ledger`] — read-only adapter over the betting ledger's indexer,
//!   returning authoritative per-day volume totals per address
//! - [`emitter`] — the weight-submission boundary toward the consensus
//!   layer
//!
//! Both sides are traits so the scheduler and tests can run against
//! in-memory implementations; the network-backed implementations live
//! next to them.

pub mod emitter;
pub mod ledger;

/// Error types for chain operations.
///
/// Everything here is transient from the engine's point of view: the
/// next scheduled cycle retries, and a single address's failure never
/// aborts a cycle for the others.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Network-level failure reaching the endpoint.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded its deadline.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with something other than the expected shape.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The consensus layer refused the weight submission.
    #[error("weight submission rejected: {0}")]
    SubmitRejected(String),
}

/// Convenience result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
