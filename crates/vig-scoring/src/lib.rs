//! # vig-scoring
//!
//! Pure decay-scoring math for the reward engine. No I/O: the scheduler
//! and the query surface feed volume windows in and get scores, ranks,
//! and normalized weight vectors out.
//!
//! ## Modules
//!
//! - [`decay`] — time-decayed weighted volume over the 7-day window
//! - [`weights`] — normalization to a weight vector and leaderboard ranking

pub mod decay;
pub mod weights;

/// Error types for scoring operations.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Weighted volume exceeded the representable range.
    #[error("weighted volume overflow")]
    Overflow,
}

/// Convenience result type for scoring operations.
pub type Result<T> = std::result::Result<T, ScoringError>;
