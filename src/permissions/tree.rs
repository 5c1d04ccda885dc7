/*!
 * Permission Tree
 * Arena-backed path tree and the grant/check/revoke/expire algorithms
 *
 * Nodes are addressed by `NodeId` handles into a flat arena. Pruned slots go
 * onto a free list and are reused by later grants. Recursion depth in every
 * walk is bounded by the depth of the tree, which only grows through grant
 * paths (validated against `EngineConfig` by the facade).
 */

use super::map::PrincipalEntry;
use super::node::{NodeId, PermissionNode};
use crate::core::errors::{PermissionError, PermissionResult};
use crate::core::limits::INITIAL_TREE_CAPACITY;
use crate::core::types::{AccessMode, Principal, Timestamp};
use serde::{Deserialize, Serialize};

const ROOT: NodeId = NodeId(0);

/// Size of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeStats {
    /// Materialized nodes, root included
    pub nodes: usize,
    pub full_grants: usize,
    pub fallback_grants: usize,
}

/// Path-scoped permission tree rooted at a single node
#[derive(Debug, Clone)]
pub struct PermissionTree {
    nodes: Vec<PermissionNode>,
    free: Vec<NodeId>,
}

impl PermissionTree {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(INITIAL_TREE_CAPACITY);
        nodes.push(PermissionNode::default());
        Self {
            nodes,
            free: Vec::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        ROOT
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &PermissionNode {
        &self.nodes[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut PermissionNode {
        &mut self.nodes[id.index()]
    }

    /// Root holds no children and no grants
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node(ROOT).is_empty()
    }

    /// Follow `path` without creating anything
    pub fn resolve(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(ROOT, |id, segment| self.node(id).child(segment))
    }

    /// Whether `principal` may access `path` at `at_time`
    ///
    /// Full access anywhere along the walk grants access. Fallback access is
    /// consulted only at the deepest explicit node, and only when the path
    /// continues past it; an explicit child on the path shadows it whether or
    /// not that child still holds live grants.
    pub fn check(
        &self,
        path: &[&str],
        principal: &Principal,
        at_time: Timestamp,
    ) -> PermissionResult<bool> {
        if at_time == 0 {
            return Err(PermissionError::InvalidTime);
        }

        let mut id = ROOT;
        let mut depth = 0;
        loop {
            let node = self.node(id);
            if node.full.is_valid(principal, at_time) {
                return Ok(true);
            }
            if depth == path.len() {
                return Ok(false);
            }
            match node.child(path[depth]) {
                Some(child) => {
                    id = child;
                    depth += 1;
                }
                None => return Ok(node.fallback.is_valid(principal, at_time)),
            }
        }
    }

    /// Set or extend a grant, materializing missing nodes along `path`
    ///
    /// Grants are monotonic: an expiration below the stored one fails with
    /// `GrantNotExtending` and leaves the tree untouched.
    pub fn grant(
        &mut self,
        path: &[&str],
        principal: Principal,
        expiration: Timestamp,
        mode: AccessMode,
    ) -> PermissionResult<()> {
        if expiration == 0 {
            return Err(PermissionError::ZeroExpiration);
        }

        let current = self.entry(path, &principal, mode).expiration;
        if expiration < current {
            return Err(PermissionError::GrantNotExtending {
                current,
                requested: expiration,
            });
        }

        let id = self.materialize(path);
        self.node_mut(id).grants_mut(mode).set(principal, expiration);
        Ok(())
    }

    /// Remove one grant and prune emptied nodes along `path`
    ///
    /// Returns whether an entry was removed. Missing nodes or entries are a
    /// successful no-op. The root itself is never released.
    pub fn revoke(&mut self, path: &[&str], principal: &Principal, mode: AccessMode) -> bool {
        let Some(id) = self.resolve(path) else {
            return false;
        };
        let removed = self.node_mut(id).grants_mut(mode).remove(principal).is_some();
        self.prune_along(path);
        removed
    }

    /// Clear every grant and descendant below `id`
    ///
    /// Descendants are released; `id` itself is released only with
    /// `delete_self`.
    pub fn revoke_subtree(&mut self, id: NodeId, delete_self: bool) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for (_, child) in children {
            self.revoke_subtree(child, true);
        }

        if delete_self && id != ROOT {
            self.release(id);
        } else {
            self.node_mut(id).clear();
        }
    }

    /// Path-addressed `revoke_subtree` keeping the node at `path` itself
    ///
    /// Returns false if nothing is materialized at `path`.
    pub fn reset_subtree_at(&mut self, path: &[&str]) -> bool {
        match self.resolve(path) {
            Some(id) => {
                self.revoke_subtree(id, false);
                true
            }
            None => false,
        }
    }

    /// Drop grants expired before `at_time` in the subtree at `path`, then
    /// prune emptied nodes both inside the subtree and along `path`
    ///
    /// Returns the number of entries removed.
    pub fn expire_subtree(&mut self, path: &[&str], at_time: Timestamp) -> usize {
        let Some(id) = self.resolve(path) else {
            return 0;
        };
        let removed = self.expire_node(id, at_time);
        self.prune_along(path);
        removed
    }

    /// Prunes strictly below `id`
    fn expire_node(&mut self, id: NodeId, at_time: Timestamp) -> usize {
        let node = self.node_mut(id);
        let mut removed = node.full.expire_before(at_time) + node.fallback.expire_before(at_time);

        // Last to first: swap-removal only moves already visited children
        let mut slot = self.node(id).children.len();
        while slot > 0 {
            slot -= 1;
            let Some((_, &child)) = self.node(id).children.get_index(slot) else {
                continue;
            };
            removed += self.expire_node(child, at_time);
            if self.node(child).is_empty() {
                if let Some((_, child)) = self.node_mut(id).children.swap_remove_index(slot) {
                    self.release(child);
                }
            }
        }

        removed
    }

    /// Post-order prune of empty nodes on `path`, deepest first
    pub fn prune_along(&mut self, path: &[&str]) {
        self.prune_below(ROOT, path);
    }

    fn prune_below(&mut self, parent: NodeId, path: &[&str]) {
        let Some((segment, rest)) = path.split_first() else {
            return;
        };
        let Some(child) = self.node(parent).child(segment) else {
            return;
        };

        self.prune_below(child, rest);

        if self.node(child).is_empty() {
            self.node_mut(parent).children.remove(*segment);
            self.release(child);
        }
    }

    fn materialize(&mut self, path: &[&str]) -> NodeId {
        let mut id = ROOT;
        self.node_mut(ROOT).exists = true;
        for segment in path {
            id = match self.node(id).child(segment) {
                Some(child) => child,
                None => {
                    let child = self.allocate();
                    self.node_mut(id)
                        .children
                        .insert((*segment).to_string(), child);
                    child
                }
            };
        }
        id
    }

    fn allocate(&mut self) -> NodeId {
        let node = PermissionNode {
            exists: true,
            ..PermissionNode::default()
        };
        match self.free.pop() {
            Some(id) => {
                *self.node_mut(id) = node;
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(node);
                id
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        debug_assert_ne!(id, ROOT);
        let node = self.node_mut(id);
        node.clear();
        node.exists = false;
        self.free.push(id);
    }

    // =========================================================================
    // Read-only accessors
    // =========================================================================

    pub fn node_exists(&self, path: &[&str]) -> bool {
        self.resolve(path)
            .map(|id| self.node(id).exists())
            .unwrap_or(false)
    }

    /// Whether the node at `path` is empty; absent nodes count as empty
    pub fn is_empty_at(&self, path: &[&str]) -> bool {
        self.resolve(path)
            .map(|id| self.node(id).is_empty())
            .unwrap_or(true)
    }

    pub fn entry(&self, path: &[&str], principal: &Principal, mode: AccessMode) -> PrincipalEntry {
        self.resolve(path)
            .map(|id| self.node(id).grants(mode).entry(principal))
            .unwrap_or_default()
    }

    pub fn child_keys(&self, path: &[&str]) -> Vec<String> {
        self.resolve(path)
            .map(|id| self.node(id).child_keys())
            .unwrap_or_default()
    }

    pub fn principals(&self, path: &[&str], mode: AccessMode) -> Vec<Principal> {
        self.resolve(path)
            .map(|id| self.node(id).grants(mode).principals())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> TreeStats {
        self.nodes.iter().fold(
            TreeStats {
                nodes: self.nodes.len() - self.free.len(),
                ..TreeStats::default()
            },
            |mut stats, node| {
                stats.full_grants += node.full.len();
                stats.fallback_grants += node.fallback.len();
                stats
            },
        )
    }
}

impl Default for PermissionTree {
    fn default() -> Self {
        Self::new()
    }
}
