/*!
 * Permission Tree Library
 * Path-scoped access control and injection-safe sub-document embedding
 */

pub mod core;
pub mod document;
pub mod monitoring;
pub mod permissions;

// Re-exports
pub use crate::core::{
    AccessMode, Clock, DocumentError, EngineConfig, Error, ManualClock, PermissionError,
    Principal, ResourceId, SystemClock, Timestamp, TreeKey, MAX_TIMESTAMP,
};
pub use document::{at_path, is_safe_fragment, is_safe_key, DocumentBuilder};
pub use monitoring::init_tracing;
pub use permissions::{AccessControl, PermissionTree};
