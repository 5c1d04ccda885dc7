/*!
 * Access Control Manager
 * Registry of permission trees keyed by (resource, owner), with authorization
 *
 * Every mutation runs under the DashMap shard write lock of its key, so the
 * authorization check and the change it guards observe the same tree. Reads
 * take the shard read lock. Trees are created on first grant and dropped
 * from the registry as soon as their root is empty.
 */

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::EngineConfig;
use crate::core::errors::{PermissionError, PermissionResult};
use crate::core::types::{AccessMode, Principal, ResourceId, Timestamp, TreeKey, MAX_TIMESTAMP};
use crate::permissions::audit::{AuditLog, PermissionEvent};
use crate::permissions::map::PrincipalEntry;
use crate::permissions::tree::{PermissionTree, TreeStats};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Central access control facade
#[derive(Clone)]
pub struct AccessControl<C = SystemClock> {
    trees: Arc<DashMap<TreeKey, PermissionTree, RandomState>>,
    clock: C,
    config: EngineConfig,
    audit: Arc<AuditLog>,
}

impl AccessControl<SystemClock> {
    /// Create a facade on the wall clock with default limits
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_clock_and_config(SystemClock, config)
    }
}

impl Default for AccessControl<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> AccessControl<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::with_clock_and_config(clock, EngineConfig::default())
    }

    pub fn with_clock_and_config(clock: C, config: EngineConfig) -> Self {
        debug!(?config, "Initializing access control registry");
        Self {
            trees: Arc::new(DashMap::with_hasher(RandomState::new())),
            clock,
            audit: Arc::new(AuditLog::new(config.audit_capacity)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether `principal` may access `path` at `at_time`
    ///
    /// The owner always has access, whatever the tree holds.
    pub fn has_access(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        at_time: Timestamp,
    ) -> PermissionResult<bool> {
        if principal == owner {
            return Ok(true);
        }
        self.config.validate_path(path)?;

        match self.trees.get(&TreeKey::new(resource, owner)) {
            Some(tree) => tree.check(path, &principal, at_time),
            None if at_time == 0 => Err(PermissionError::InvalidTime),
            None => Ok(false),
        }
    }

    /// `has_access` at the clock's current instant
    pub fn has_access_now(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
    ) -> PermissionResult<bool> {
        self.has_access(resource, owner, path, principal, self.now())
    }

    /// Check several paths against one consistent snapshot of the tree
    pub fn check_batch(
        &self,
        resource: ResourceId,
        owner: Principal,
        paths: &[&[&str]],
        principal: Principal,
        at_time: Timestamp,
    ) -> Vec<PermissionResult<bool>> {
        let tree = self.trees.get(&TreeKey::new(resource, owner));
        paths
            .iter()
            .map(|path| {
                if principal == owner {
                    return Ok(true);
                }
                self.config.validate_path(path)?;
                match &tree {
                    Some(tree) => tree.check(path, &principal, at_time),
                    None if at_time == 0 => Err(PermissionError::InvalidTime),
                    None => Ok(false),
                }
            })
            .collect()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Grant `principal` access at `path` until `expiration`
    ///
    /// The caller must itself hold access at `path` for the whole window it
    /// grants, judged against the tree before the change.
    #[instrument(level = "debug", skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub fn grant(
        &self,
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        expiration: Timestamp,
        mode: AccessMode,
    ) -> PermissionResult<()> {
        self.config.validate_path(path)?;
        if expiration == 0 {
            return Err(PermissionError::ZeroExpiration);
        }

        let key = TreeKey::new(resource, owner);
        self.mutate(key, |tree| {
            if !authorized(tree, owner, caller, path, expiration)? {
                return Err(PermissionError::Unauthorized { caller });
            }
            tree.grant(path, principal, expiration, mode)?;
            self.emit(PermissionEvent::Granted {
                resource,
                owner,
                path: owned(path),
                grantor: caller,
                principal,
                expiration,
                mode,
            });
            Ok(())
        })
        .map_err(|e| self.rejected("grant", caller, key, e))
    }

    /// Remove `principal`'s grant at `path`
    ///
    /// Anyone may drop their own grant; revoking someone else's needs
    /// unlimited full access at `path`.
    #[instrument(level = "debug", skip(self))]
    pub fn revoke(
        &self,
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        mode: AccessMode,
    ) -> PermissionResult<()> {
        self.config.validate_path(path)?;

        let key = TreeKey::new(resource, owner);
        let removed = self
            .mutate(key, |tree| {
                if caller != principal && !authorized(tree, owner, caller, path, MAX_TIMESTAMP)? {
                    return Err(PermissionError::Unauthorized { caller });
                }
                let removed = tree.revoke(path, &principal, mode);
                self.emit(PermissionEvent::Revoked {
                    resource,
                    owner,
                    path: owned(path),
                    revoker: caller,
                    principal,
                    mode,
                });
                Ok(removed)
            })
            .map_err(|e| self.rejected("revoke", caller, key, e))?;

        if !removed {
            debug!(%principal, ?path, "Revoke found no matching grant");
        }
        Ok(())
    }

    /// Wipe every grant at and below `path`
    ///
    /// Needs unlimited full access at `path`. A non-owner caller is re-granted
    /// unlimited full access at `path` so it keeps control of what it reset.
    /// The emptied node at `path` stays in place and keeps shadowing ancestor
    /// fallback grants until a later revoke or expire prunes it; only an empty
    /// root drops the tree.
    #[instrument(level = "debug", skip(self))]
    pub fn reset_subtree(
        &self,
        caller: Principal,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
    ) -> PermissionResult<()> {
        self.config.validate_path(path)?;

        let key = TreeKey::new(resource, owner);
        self.mutate(key, |tree| {
            if !authorized(tree, owner, caller, path, MAX_TIMESTAMP)? {
                return Err(PermissionError::Unauthorized { caller });
            }
            tree.reset_subtree_at(path);
            if caller != owner {
                tree.grant(path, caller, MAX_TIMESTAMP, AccessMode::Full)?;
            }
            self.emit(PermissionEvent::SubtreeReset {
                resource,
                owner,
                path: owned(path),
                caller,
            });
            Ok(())
        })
        .map_err(|e| self.rejected("reset_subtree", caller, key, e))
    }

    /// Garbage-collect grants below `path` that expired before now
    ///
    /// Open to any caller. Only stale records and the nodes they leave empty
    /// are removed; pruning an explicit node can unshadow an ancestor's
    /// fallback grant. Returns the number of entries removed.
    #[instrument(level = "debug", skip(self))]
    pub fn expire_subtree(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
    ) -> PermissionResult<usize> {
        self.config.validate_path(path)?;

        let at_time = self.now();
        self.mutate(TreeKey::new(resource, owner), |tree| {
            let removed = tree.expire_subtree(path, at_time);
            self.emit(PermissionEvent::SubtreeExpired {
                resource,
                owner,
                path: owned(path),
                at_time,
                removed,
            });
            Ok(removed)
        })
    }

    /// Run `op` under the key's write lock, then drop the tree if it is empty
    ///
    /// A missing tree is presented to `op` as a fresh one and only stored if
    /// `op` leaves something in it. Events are emitted from inside `op`, so
    /// their sequence numbers follow the order mutations were applied in.
    fn mutate<R>(
        &self,
        key: TreeKey,
        op: impl FnOnce(&mut PermissionTree) -> PermissionResult<R>,
    ) -> PermissionResult<R> {
        let result = match self.trees.entry(key) {
            Entry::Occupied(mut entry) => op(entry.get_mut()),
            Entry::Vacant(entry) => {
                let mut tree = PermissionTree::new();
                let result = op(&mut tree);
                if !tree.is_empty() {
                    entry.insert(tree);
                }
                result
            }
        };

        if self
            .trees
            .remove_if(&key, |_, tree| tree.is_empty())
            .is_some()
        {
            debug!(resource = key.resource, owner = %key.owner, "Pruned empty tree root");
        }
        result
    }

    fn rejected(
        &self,
        operation: &'static str,
        caller: Principal,
        key: TreeKey,
        error: PermissionError,
    ) -> PermissionError {
        if let PermissionError::Unauthorized { .. } = error {
            warn!(
                operation,
                %caller,
                resource = key.resource,
                owner = %key.owner,
                "Unauthorized permission mutation"
            );
            self.audit.record_denial(caller);
        } else {
            debug!(operation, %caller, error = %error, "Permission mutation rejected");
        }
        error
    }

    fn emit(&self, event: PermissionEvent) {
        let key = event.key();
        info!(
            event = event.name(),
            resource = key.resource,
            owner = %key.owner,
            path = ?event.path(),
            "Permission event"
        );
        self.audit.record(event);
    }

    // =========================================================================
    // Read-only accessors
    // =========================================================================

    fn read<R: Default>(
        &self,
        resource: ResourceId,
        owner: Principal,
        f: impl FnOnce(&PermissionTree) -> R,
    ) -> R {
        self.trees
            .get(&TreeKey::new(resource, owner))
            .map(|tree| f(&tree))
            .unwrap_or_default()
    }

    pub fn node_exists(&self, resource: ResourceId, owner: Principal, path: &[&str]) -> bool {
        self.read(resource, owner, |tree| tree.node_exists(path))
    }

    /// Absent nodes count as empty
    pub fn is_empty_at(&self, resource: ResourceId, owner: Principal, path: &[&str]) -> bool {
        self.trees
            .get(&TreeKey::new(resource, owner))
            .map(|tree| tree.is_empty_at(path))
            .unwrap_or(true)
    }

    pub fn entry(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        mode: AccessMode,
    ) -> PrincipalEntry {
        self.read(resource, owner, |tree| tree.entry(path, &principal, mode))
    }

    pub fn entry_exists(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        mode: AccessMode,
    ) -> bool {
        self.entry(resource, owner, path, principal, mode).exists
    }

    /// Stored expiration, 0 if absent
    pub fn expiration(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
        principal: Principal,
        mode: AccessMode,
    ) -> Timestamp {
        self.entry(resource, owner, path, principal, mode).expiration
    }

    pub fn child_keys(&self, resource: ResourceId, owner: Principal, path: &[&str]) -> Vec<String> {
        self.read(resource, owner, |tree| tree.child_keys(path))
    }

    pub fn full_access_principals(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
    ) -> Vec<Principal> {
        self.read(resource, owner, |tree| tree.principals(path, AccessMode::Full))
    }

    pub fn fallback_access_principals(
        &self,
        resource: ResourceId,
        owner: Principal,
        path: &[&str],
    ) -> Vec<Principal> {
        self.read(resource, owner, |tree| {
            tree.principals(path, AccessMode::Fallback)
        })
    }

    pub fn tree_exists(&self, resource: ResourceId, owner: Principal) -> bool {
        self.trees.contains_key(&TreeKey::new(resource, owner))
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn tree_stats(&self, resource: ResourceId, owner: Principal) -> Option<TreeStats> {
        self.trees
            .get(&TreeKey::new(resource, owner))
            .map(|tree| tree.stats())
    }
}

/// Owner override on top of the tree check
fn authorized(
    tree: &PermissionTree,
    owner: Principal,
    caller: Principal,
    path: &[&str],
    at_time: Timestamp,
) -> PermissionResult<bool> {
    if caller == owner {
        return Ok(true);
    }
    tree.check(path, &caller, at_time)
}

fn owned(path: &[&str]) -> Vec<String> {
    path.iter().map(|segment| (*segment).to_string()).collect()
}
