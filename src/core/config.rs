/*!
 * Engine Configuration
 *
 * Runtime limits for path validation, fragment size and audit retention
 */

use crate::core::errors::{Error, PermissionError, PermissionResult, Result};
use crate::core::limits::{
    DEFAULT_AUDIT_CAPACITY, DEFAULT_MAX_FRAGMENT_BYTES, DEFAULT_MAX_PATH_DEPTH,
    DEFAULT_MAX_SEGMENT_LEN,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable overriding `max_path_depth`
pub const ENV_MAX_PATH_DEPTH: &str = "PERMTREE_MAX_PATH_DEPTH";
/// Environment variable overriding `max_segment_len`
pub const ENV_MAX_SEGMENT_LEN: &str = "PERMTREE_MAX_SEGMENT_LEN";
/// Environment variable overriding `max_fragment_bytes`
pub const ENV_MAX_FRAGMENT_BYTES: &str = "PERMTREE_MAX_FRAGMENT_BYTES";
/// Environment variable overriding `audit_capacity`
pub const ENV_AUDIT_CAPACITY: &str = "PERMTREE_AUDIT_CAPACITY";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of segments in a path
    pub max_path_depth: usize,
    /// Maximum bytes per path segment
    pub max_segment_len: usize,
    /// Maximum bytes of an untrusted document fragment
    pub max_fragment_bytes: usize,
    /// Global audit ring buffer size
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Tight limits for hosts exposed to arbitrary callers
    pub const fn strict() -> Self {
        Self {
            max_path_depth: 8,
            max_segment_len: 64,
            max_fragment_bytes: 64 * 1024,
            audit_capacity: 1_000,
        }
    }

    /// Load defaults, overridden by `PERMTREE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = env_override(ENV_MAX_PATH_DEPTH)? {
            config.max_path_depth = value;
        }
        if let Some(value) = env_override(ENV_MAX_SEGMENT_LEN)? {
            config.max_segment_len = value;
        }
        if let Some(value) = env_override(ENV_MAX_FRAGMENT_BYTES)? {
            config.max_fragment_bytes = value;
        }
        if let Some(value) = env_override(ENV_AUDIT_CAPACITY)? {
            config.audit_capacity = value;
        }
        Ok(config)
    }

    pub fn with_max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth;
        self
    }

    pub fn with_max_segment_len(mut self, len: usize) -> Self {
        self.max_segment_len = len;
        self
    }

    pub fn with_max_fragment_bytes(mut self, bytes: usize) -> Self {
        self.max_fragment_bytes = bytes;
        self
    }

    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity;
        self
    }

    /// Reject paths that exceed the configured depth or segment size
    pub fn validate_path(&self, path: &[&str]) -> PermissionResult<()> {
        if path.len() > self.max_path_depth {
            return Err(PermissionError::PathTooDeep {
                depth: path.len(),
                max: self.max_path_depth,
            });
        }
        if let Some(segment) = path.iter().find(|s| s.len() > self.max_segment_len) {
            return Err(PermissionError::SegmentTooLong {
                length: segment.len(),
                max: self.max_segment_len,
            });
        }
        Ok(())
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
