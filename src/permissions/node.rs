/*!
 * Permission Tree Node
 * One path position: its grants and its explicit children
 */

use super::map::{IndexedMap, PermissionMap};
use crate::core::types::AccessMode;

/// Handle of a node inside a tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node of the permission tree
///
/// `children` doubles as the enumerable child-key list: a segment is present
/// there exactly when its child node is materialized.
#[derive(Debug, Clone, Default)]
pub struct PermissionNode {
    pub(crate) exists: bool,
    pub(crate) full: PermissionMap,
    pub(crate) fallback: PermissionMap,
    pub(crate) children: IndexedMap<String, NodeId>,
}

impl PermissionNode {
    #[inline]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// No children and no grants of either kind (independent of `exists`)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.full.is_empty() && self.fallback.is_empty()
    }

    #[inline]
    pub fn grants(&self, mode: AccessMode) -> &PermissionMap {
        match mode {
            AccessMode::Full => &self.full,
            AccessMode::Fallback => &self.fallback,
        }
    }

    #[inline]
    pub(crate) fn grants_mut(&mut self, mode: AccessMode) -> &mut PermissionMap {
        match mode {
            AccessMode::Full => &mut self.full,
            AccessMode::Fallback => &mut self.fallback,
        }
    }

    #[inline]
    pub fn child(&self, segment: &str) -> Option<NodeId> {
        self.children.get(segment).copied()
    }

    pub fn child_keys(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Drop all grants and child links, keeping `exists`
    pub(crate) fn clear(&mut self) {
        self.full.clear();
        self.fallback.clear();
        self.children.clear();
    }
}
