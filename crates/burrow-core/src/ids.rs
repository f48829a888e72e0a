//! Core identifier types for burrow.
//!
//! Tunnel IDs are assigned by the record store from a monotonic counter and
//! are never reused, so a deleted tunnel's ID cannot alias a newer one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The string is not a decimal integer.
    #[error("invalid tunnel id: {0:?}")]
    NotANumber(String),

    /// Zero is reserved and never assigned.
    #[error("tunnel id must be greater than zero")]
    Zero,
}

/// A store-assigned tunnel identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelId(u64);

impl TunnelId {
    /// Create a new `TunnelId` from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian bytes, so lexicographic key order matches numeric order.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode from big-endian key bytes.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Debug for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TunnelId({})", self.0)
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TunnelId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s
            .trim()
            .parse()
            .map_err(|_| IdError::NotANumber(s.to_string()))?;
        if raw == 0 {
            return Err(IdError::Zero);
        }
        Ok(Self(raw))
    }
}

impl From<TunnelId> for u64 {
    fn from(id: TunnelId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: TunnelId = "17".parse().unwrap();
        assert_eq!(id, TunnelId::new(17));
        assert_eq!(id.to_string(), "17");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            "abc".parse::<TunnelId>(),
            Err(IdError::NotANumber(_))
        ));
        assert!(matches!("-1".parse::<TunnelId>(), Err(IdError::NotANumber(_))));
        assert_eq!("0".parse::<TunnelId>(), Err(IdError::Zero));
    }

    #[test]
    fn key_bytes_preserve_order() {
        let a = TunnelId::new(2).to_be_bytes();
        let b = TunnelId::new(256).to_be_bytes();
        assert!(a < b);
        assert_eq!(TunnelId::from_be_bytes(b), TunnelId::new(256));
    }

    #[test]
    fn serializes_as_number() {
        let json = serde_json::to_string(&TunnelId::new(5)).unwrap();
        assert_eq!(json, "5");
        let back: TunnelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_u64(), 5);
    }
}
