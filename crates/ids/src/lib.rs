//! Identifier utilities for HIP tooling.
//!
//! Every generation or export request works inside its own directory, and every generated
//! message carries its own envelope id. Both are derived from the same *canonical* identifier
//! representation: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`HexId`], a random 128-bit identifier that guarantees the canonical format once
//!   constructed. It is used for workspace tokens and message ids.
//! - [`CreationTime`], a second-granularity local timestamp rendered as `YYYYMMDDHHMMSS`, the
//!   format HL7 v3 envelopes use for `creationTime/@value`.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Identifiers are random (UUID v4), not counters, so requests that run concurrently never need
//! to coordinate to stay collision-free.

mod service;

pub use service::{CreationTime, HexId};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
