/*!
 * Permissions Module
 * Hierarchical, path-scoped, time-bounded access control
 *
 * A resource owner (and principals it delegates to) grants access to
 * sub-paths of a tree addressed by string segments. Grants carry an
 * expiration instant and come in two modes: full access covers a node and
 * everything below it; fallback access covers descendant paths that have no
 * explicit node of their own.
 *
 * ## Usage
 * ```ignore
 * use permission_tree::permissions::AccessControl;
 * use permission_tree::{AccessMode, Principal, MAX_TIMESTAMP};
 *
 * let acl = AccessControl::new();
 * let owner = Principal::from_low_u64(1);
 * let editor = Principal::from_low_u64(2);
 *
 * acl.grant(owner, 7, owner, &["docs"], editor, MAX_TIMESTAMP, AccessMode::Full)?;
 * assert!(acl.has_access_now(7, owner, &["docs", "intro"], editor)?);
 * ```
 */

pub mod audit;
pub mod manager;
pub mod map;
pub mod node;
pub mod tree;

// Re-export commonly used items
pub use audit::{AuditLog, AuditRecord, AuditSeverity, AuditStats, PermissionEvent};
pub use manager::AccessControl;
pub use map::{IndexedMap, PermissionMap, PrincipalEntry};
pub use node::{NodeId, PermissionNode};
pub use tree::{PermissionTree, TreeStats};
