/*!
 * Core Types
 * Common types used across the permission engine
 */

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Numeric resource identifier handed in by the external registry
pub type ResourceId = u64;

/// Instant in seconds; 0 is the reserved "no access" sentinel
pub type Timestamp = u64;

/// Expiration meaning "never expires"
pub const MAX_TIMESTAMP: Timestamp = Timestamp::MAX;

/// Width of a principal identifier in bytes
pub const PRINCIPAL_LEN: usize = 20;

/// Opaque, fixed-width identity of a caller or grantee
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, SerializeDisplay, DeserializeFromStr,
)]
pub struct Principal([u8; PRINCIPAL_LEN]);

impl Principal {
    /// Principal whose trailing eight bytes hold `value` (big-endian)
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; PRINCIPAL_LEN];
        bytes[PRINCIPAL_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl From<[u8; PRINCIPAL_LEN]> for Principal {
    fn from(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self)
    }
}

/// Principal parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalParseError {
    #[error("expected {expected} hex digits, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("invalid hex digit {0:?}")]
    InvalidDigit(char),
}

impl FromStr for Principal {
    type Err = PrincipalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != PRINCIPAL_LEN * 2 {
            return Err(PrincipalParseError::InvalidLength {
                expected: PRINCIPAL_LEN * 2,
                found: digits.len(),
            });
        }

        let mut bytes = [0u8; PRINCIPAL_LEN];
        for (byte, pair) in bytes.iter_mut().zip(digits.as_bytes().chunks_exact(2)) {
            *byte = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        }

        Ok(Principal::from(bytes))
    }
}

fn hex_value(digit: u8) -> Result<u8, PrincipalParseError> {
    (digit as char)
        .to_digit(16)
        .map(|value| value as u8)
        .ok_or(PrincipalParseError::InvalidDigit(digit as char))
}

/// Which permission map of a node a grant lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Valid at and below the node it is set on
    #[default]
    Full,
    /// Valid for descendant paths without an explicit node of their own
    Fallback,
}

impl AccessMode {
    pub fn is_fallback(self) -> bool {
        matches!(self, AccessMode::Fallback)
    }
}

/// Registry key of one permission tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeKey {
    pub resource: ResourceId,
    pub owner: Principal,
}

impl TreeKey {
    pub fn new(resource: ResourceId, owner: Principal) -> Self {
        Self { resource, owner }
    }
}
