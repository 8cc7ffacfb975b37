//! # vig-crypto
//!
//! Signature primitives for the vig validator.
//!
//! Registration requests are authenticated by recovering the signer from
//! an Ed25519 signature and comparing it against the participant's
//! network identity key. Verification sits behind the [`Verifier`] trait
//! so the scheme can be swapped per target network without touching the
//! registry or the API layer.

pub mod ed25519;

/// Error types for crypto operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Malformed key, signature, or message input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Signature did not verify.
    #[error("signature verification failed")]
    SignatureVerification,
}

/// Convenience result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// A signature-verification capability.
///
/// `identity_key` is the participant's network identity key in the
/// encoding the target network uses (hex for Ed25519). Returns
/// `Ok(true)` when the signature is valid for the message under that
/// key, `Ok(false)` when it is not, and `Err` only for malformed inputs.
pub trait Verifier: Send + Sync {
    fn verify(&self, identity_key: &str, message: &[u8], signature: &[u8]) -> Result<bool>;
}
