//! # vig-registry
//!
//! Identity registration for the reward engine: binds a participant's
//! network identity key (coldkey) to a betting-ledger address through a
//! signed, replay-protected request.
//!
//! The server never trusts a client's claim of verification. It rebuilds
//! the canonical message from the request fields, verifies the signature
//! against the coldkey through the [`Verifier`] capability, enforces the
//! timestamp rules, and only then supersedes the stored mapping.

pub mod message;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use vig_crypto::{CryptoError, Verifier};
use vig_types::Uid;

/// Oldest acceptable registration timestamp, relative to server time.
pub const MAX_REGISTRATION_AGE_MS: u64 = 10 * 60 * 1_000;

/// Allowed clock drift for timestamps ahead of server time.
pub const FUTURE_DRIFT_TOLERANCE_MS: u64 = 60 * 1_000;

/// Error types for registration operations.
///
/// Everything except [`RegistryError::Db`] is a client-side failure and
/// surfaces as a 4xx at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Ledger address is not 0x-prefixed 20-byte hex.
    #[error("invalid ledger address: {0}")]
    BadAddress(String),

    /// The coldkey does not parse as an identity key.
    #[error("invalid identity key: {0}")]
    BadKey(String),

    /// The submitted message does not reproduce the canonical binding.
    #[error("message does not match canonical binding")]
    BadMessage,

    /// The signature does not verify against the coldkey.
    #[error("signature verification failed")]
    BadSignature,

    /// The timestamp is older than the staleness window.
    #[error("registration timestamp too old: {age_ms}ms > {max_ms}ms")]
    StaleTimestamp { age_ms: u64, max_ms: u64 },

    /// The timestamp is further in the future than clock drift allows.
    #[error("registration timestamp in the future by {ahead_ms}ms")]
    FutureTimestamp { ahead_ms: u64 },

    /// A newer mapping already exists; the request is a replay.
    #[error("registration superseded: submitted {submitted} < current {current}")]
    SupersededTimestamp { submitted: u64, current: u64 },

    /// Storage failure.
    #[error("database error: {0}")]
    Db(#[from] vig_db::DbError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// A wallet-registration request as received from the frontend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Hex-encoded network identity key.
    pub coldkey: String,
    /// Betting-ledger address to link.
    pub ledger_address: String,
    /// Hex signature over the wrapped canonical message.
    pub signature: String,
    /// The canonical binding string the client signed (unwrapped).
    pub message: String,
    /// Client Unix timestamp in milliseconds.
    pub timestamp: u64,
}

/// Verify a registration request and persist the mapping.
///
/// On success the new mapping atomically supersedes any prior mapping
/// for the coldkey. On any error nothing is written.
pub fn register(
    conn: &Connection,
    verifier: &dyn Verifier,
    req: &RegistrationRequest,
    now_ms: u64,
) -> Result<()> {
    let normalized_address = normalize_address(&req.ledger_address)?;

    // The message must bind exactly the submitted fields.
    let canonical =
        message::canonical_message(&req.coldkey, &req.ledger_address, req.timestamp);
    if req.message != canonical {
        return Err(RegistryError::BadMessage);
    }

    // Timestamp window checks.
    if req.timestamp > now_ms + FUTURE_DRIFT_TOLERANCE_MS {
        return Err(RegistryError::FutureTimestamp {
            ahead_ms: req.timestamp - now_ms,
        });
    }
    let age_ms = now_ms.saturating_sub(req.timestamp);
    if age_ms > MAX_REGISTRATION_AGE_MS {
        return Err(RegistryError::StaleTimestamp {
            age_ms,
            max_ms: MAX_REGISTRATION_AGE_MS,
        });
    }

    // Replay protection against the stored mapping.
    if let Some(stored) = vig_db::queries::mappings::mapping_for(conn, &req.coldkey)? {
        if req.timestamp < stored.timestamp {
            return Err(RegistryError::SupersededTimestamp {
                submitted: req.timestamp,
                current: stored.timestamp,
            });
        }
    }

    // Signature verification over the wrapped canonical message.
    let sig_bytes = hex::decode(req.signature.trim_start_matches("0x"))
        .map_err(|_| RegistryError::BadSignature)?;
    let wrapped = message::wrap_message(&req.message);
    let valid = verifier
        .verify(&req.coldkey, wrapped.as_bytes(), &sig_bytes)
        .map_err(|e| match e {
            CryptoError::InvalidInput(detail) => RegistryError::BadKey(detail),
            CryptoError::SignatureVerification => RegistryError::BadSignature,
        })?;
    if !valid {
        return Err(RegistryError::BadSignature);
    }

    vig_db::queries::mappings::upsert_mapping(
        conn,
        &req.coldkey,
        &normalized_address,
        &req.signature,
        &req.message,
        req.timestamp,
        now_ms / 1_000,
    )?;

    tracing::info!(
        coldkey = %truncate(&req.coldkey),
        address = %truncate(&normalized_address),
        "wallet mapping registered"
    );

    Ok(())
}

/// The ledger address registered for a uid, if any.
pub fn resolve(conn: &Connection, uid: Uid) -> Result<Option<String>> {
    Ok(vig_db::queries::mappings::resolve(conn, uid)?)
}

/// Validate and lowercase a ledger address (0x + 40 hex chars).
fn normalize_address(address: &str) -> Result<String> {
    let hex_part = address
        .strip_prefix("0x")
        .ok_or_else(|| RegistryError::BadAddress("missing 0x prefix".into()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RegistryError::BadAddress(
            "expected 20-byte hex address".into(),
        ));
    }
    Ok(address.to_lowercase())
}

/// Shorten long hex strings for log lines.
fn truncate(s: &str) -> String {
    if s.len() > 10 {
        format!("{}...", &s[..10])
    } else {
        s.to_string()
    }
}
