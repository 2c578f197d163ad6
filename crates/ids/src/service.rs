//! Internal implementation of identifier services.

use crate::{IdError, IdResult};
use chrono::{Local, NaiveDateTime, Timelike};
use std::{fmt, str::FromStr};
use uuid::Uuid;

const CREATION_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// HIP's canonical random identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained value is guaranteed to be canonical, so it can be embedded
/// in directory names, archive names and XML attributes without further checks.
///
/// # Construction
/// - [`HexId::new`] generates a fresh identifier from 128 random bits (UUID v4).
/// - [`HexId::parse`] validates an externally supplied identifier (for example a token taken
///   from a download URL).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId(Uuid);

impl Default for HexId {
    fn default() -> Self {
        Self::new()
    }
}

impl HexId {
    /// Generates a new identifier in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// Hyphenated or uppercase forms are rejected rather than normalised, so a token read back
    /// from a path always maps to exactly one directory name.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> IdResult<Self> {
        if !Self::is_canonical(input) {
            return Err(IdError::InvalidInput(format!(
                "identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| IdError::InvalidInput(format!("invalid identifier '{}': {}", input, e)))
    }

    /// Returns true if `input` is canonical: exactly 32 bytes of `0-9a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for HexId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for HexId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for HexId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HexId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A message creation timestamp at second granularity.
///
/// Format: `YYYYMMDDHHMMSS` in local time, e.g. `20250104094500`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreationTime(NaiveDateTime);

impl CreationTime {
    /// Captures the current local time, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// Wraps a naive timestamp, dropping any sub-second component.
    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value.with_nanosecond(0).unwrap_or(value))
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for CreationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CREATION_TIME_FORMAT))
    }
}

impl FromStr for CreationTime {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidInput(format!(
                "creation time must be 14 digits (YYYYMMDDHHMMSS), got: '{}'",
                s
            )));
        }
        NaiveDateTime::parse_from_str(s, CREATION_TIME_FORMAT)
            .map(Self)
            .map_err(|e| IdError::InvalidInput(format!("invalid creation time '{}': {}", s, e)))
    }
}
