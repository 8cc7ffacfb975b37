//! Canonical registration message construction.
//!
//! The signed message binds identity, ledger address, and timestamp in
//! one string so no field can be swapped after signing. Wallet tooling
//! wraps raw payloads in `<Bytes>` tags before signing; the server
//! applies the same wrapping before verification.

/// Build the canonical binding string for a registration.
///
/// `timestamp_ms` is the client's Unix timestamp in milliseconds; it
/// doubles as the replay-protection counter.
pub fn canonical_message(coldkey: &str, ledger_address: &str, timestamp_ms: u64) -> String {
    format!("vig-link:{coldkey}:{ledger_address}:{timestamp_ms}")
}

/// Apply the wallet signing wrapper to a payload.
pub fn wrap_message(payload: &str) -> String {
    format!("<Bytes>{payload}</Bytes>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_message_format() {
        let msg = canonical_message("aa11", "0xAbC0", 1_700_000_000_000);
        assert_eq!(msg, "vig-link:aa11:0xAbC0:1700000000000");
    }

    #[test]
    fn test_canonical_message_binds_all_fields() {
        let base = canonical_message("k", "a", 1);
        assert_ne!(base, canonical_message("k2", "a", 1));
        assert_ne!(base, canonical_message("k", "a2", 1));
        assert_ne!(base, canonical_message("k", "a", 2));
    }

    #[test]
    fn test_wrap_message() {
        assert_eq!(wrap_message("payload"), "<Bytes>payload</Bytes>");
    }
}
