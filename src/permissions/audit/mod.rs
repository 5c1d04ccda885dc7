/*!
 * Permission Audit Trail
 * Records grant, revoke, reset and expiry events for off-engine indexers
 */

use crate::core::limits::MAX_AUDIT_EVENTS_PER_KEY;
use crate::core::types::{AccessMode, Principal, ResourceId, Timestamp, TreeKey};
use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// Observable side effect of a mutating facade operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PermissionEvent {
    Granted {
        resource: ResourceId,
        owner: Principal,
        path: Vec<String>,
        grantor: Principal,
        principal: Principal,
        expiration: Timestamp,
        mode: AccessMode,
    },
    Revoked {
        resource: ResourceId,
        owner: Principal,
        path: Vec<String>,
        revoker: Principal,
        principal: Principal,
        mode: AccessMode,
    },
    SubtreeReset {
        resource: ResourceId,
        owner: Principal,
        path: Vec<String>,
        caller: Principal,
    },
    SubtreeExpired {
        resource: ResourceId,
        owner: Principal,
        path: Vec<String>,
        at_time: Timestamp,
        removed: usize,
    },
}

impl PermissionEvent {
    pub fn key(&self) -> TreeKey {
        match self {
            PermissionEvent::Granted {
                resource, owner, ..
            }
            | PermissionEvent::Revoked {
                resource, owner, ..
            }
            | PermissionEvent::SubtreeReset {
                resource, owner, ..
            }
            | PermissionEvent::SubtreeExpired {
                resource, owner, ..
            } => TreeKey::new(*resource, *owner),
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            PermissionEvent::Granted { path, .. }
            | PermissionEvent::Revoked { path, .. }
            | PermissionEvent::SubtreeReset { path, .. }
            | PermissionEvent::SubtreeExpired { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PermissionEvent::Granted { .. } => "granted",
            PermissionEvent::Revoked { .. } => "revoked",
            PermissionEvent::SubtreeReset { .. } => "subtree_reset",
            PermissionEvent::SubtreeExpired { .. } => "subtree_expired",
        }
    }

    fn severity(&self) -> AuditSeverity {
        match self {
            // Wipes every grant below the path
            PermissionEvent::SubtreeReset { .. } => AuditSeverity::Critical,
            PermissionEvent::Revoked { .. } => AuditSeverity::Warning,
            _ => AuditSeverity::Info,
        }
    }
}

/// Logged event with ordering and wall-clock metadata
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditRecord {
    pub sequence: u64,
    pub event: PermissionEvent,
    pub severity: AuditSeverity,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub logged_at: SystemTime,
}

/// Bounded in-memory audit log
pub struct AuditLog {
    /// Global event log (ring buffer)
    events: parking_lot::RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
    /// Per-tree event logs
    key_events: DashMap<TreeKey, VecDeque<AuditRecord>, RandomState>,
    /// Rejected mutation attempts per caller
    denial_counts: DashMap<Principal, u64, RandomState>,
    sequence: AtomicU64,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: parking_lot::RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            key_events: DashMap::with_hasher(RandomState::new()),
            denial_counts: DashMap::with_hasher(RandomState::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Append an event; returns its sequence number
    pub fn record(&self, event: PermissionEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let key = event.key();
        let record = AuditRecord {
            sequence,
            severity: event.severity(),
            event,
            logged_at: SystemTime::now(),
        };

        {
            let mut events = self.events.write();
            if events.len() >= self.capacity {
                events.pop_front();
            }
            events.push_back(record.clone());
        }

        let mut per_key = self.key_events.entry(key).or_default();
        if per_key.len() >= MAX_AUDIT_EVENTS_PER_KEY {
            per_key.pop_front();
        }
        per_key.push_back(record);

        sequence
    }

    /// Count a rejected mutation attempt by `caller`
    pub fn record_denial(&self, caller: Principal) {
        self.denial_counts
            .entry(caller)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    /// Most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent events for one tree, newest first
    pub fn for_key(&self, key: &TreeKey, limit: usize) -> Vec<AuditRecord> {
        self.key_events
            .get(key)
            .map(|entry| entry.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn denial_count(&self, caller: &Principal) -> u64 {
        self.denial_counts.get(caller).map(|e| *e).unwrap_or(0)
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.key_events.clear();
        self.denial_counts.clear();
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            total_events: self.events.read().len(),
            total_recorded: self.sequence.load(Ordering::Relaxed),
            total_denials: self.denial_counts.iter().map(|e| *e.value()).sum(),
            keys_tracked: self.key_events.len(),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(crate::core::limits::DEFAULT_AUDIT_CAPACITY)
    }
}

/// Audit statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    /// Events currently retained in the global log
    pub total_events: usize,
    /// Events ever recorded
    pub total_recorded: u64,
    pub total_denials: u64,
    pub keys_tracked: usize,
}
