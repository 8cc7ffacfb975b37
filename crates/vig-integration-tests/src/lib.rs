//! Integration tests for the vig workspace.
//!
//! See the `tests/` directory. This crate intentionally has no library
//! code of its own.
