/*!
 * Indexed Maps
 * Dense key/value storage with O(1) insert, lookup and swap-removal
 *
 * Entries live in a contiguous vector; a companion hash index maps each key
 * to its slot. Removal moves the last entry into the freed slot and patches
 * the index of the moved key, so enumeration order is insertion order only
 * until the first removal.
 */

use crate::core::types::{Principal, Timestamp};
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Vector-backed map with a hash index for O(1) removal
#[derive(Debug, Clone)]
pub struct IndexedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize, RandomState>,
}

impl<K, V> IndexedMap<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Insert or update in place; returns the previous value
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[slot].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.index.remove(key)?;
        Some(self.take_slot(slot).1)
    }

    /// Remove the entry stored at `slot` (swap with last, shrink)
    pub fn swap_remove_index(&mut self, slot: usize) -> Option<(K, V)> {
        if slot >= self.entries.len() {
            return None;
        }
        self.index.remove(&self.entries[slot].0);
        Some(self.take_slot(slot))
    }

    /// Index entry for `slot` must already be gone
    fn take_slot(&mut self, slot: usize) -> (K, V) {
        let removed = self.entries.swap_remove(slot);
        if let Some((moved, _)) = self.entries.get(slot) {
            if let Some(position) = self.index.get_mut(moved) {
                *position = slot;
            }
        }
        removed
    }

    #[inline]
    pub fn get_index(&self, slot: usize) -> Option<(&K, &V)> {
        self.entries.get(slot).map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Keep only the entries matching `keep`; returns how many were removed
    ///
    /// Walks slots from last to first so a swapped-in entry has always been
    /// visited already.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut removed = 0;
        let mut slot = self.entries.len();
        while slot > 0 {
            slot -= 1;
            let (key, value) = &self.entries[slot];
            if !keep(key, value) {
                self.swap_remove_index(slot);
                removed += 1;
            }
        }
        removed
    }
}

impl<K, V> Default for IndexedMap<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> IntoIterator for IndexedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Lookup result for one principal in a permission map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrincipalEntry {
    /// 0 when the entry is absent
    pub expiration: Timestamp,
    pub exists: bool,
}

/// Principals holding one kind of grant at a node, with their expirations
#[derive(Debug, Clone, Default)]
pub struct PermissionMap {
    grants: IndexedMap<Principal, Timestamp>,
}

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, principal: &Principal) -> PrincipalEntry {
        match self.grants.get(principal) {
            Some(&expiration) => PrincipalEntry {
                expiration,
                exists: true,
            },
            None => PrincipalEntry::default(),
        }
    }

    /// Stored expiration, or 0 if the principal holds nothing here
    #[inline]
    pub fn expiration(&self, principal: &Principal) -> Timestamp {
        self.grants.get(principal).copied().unwrap_or(0)
    }

    /// Whether `principal` holds a grant still valid at `at_time`
    #[inline]
    pub fn is_valid(&self, principal: &Principal, at_time: Timestamp) -> bool {
        matches!(self.grants.get(principal), Some(&expiration) if expiration >= at_time)
    }

    #[inline]
    pub fn contains(&self, principal: &Principal) -> bool {
        self.grants.contains_key(principal)
    }

    /// Create or overwrite the entry; the caller enforces monotonicity
    pub fn set(&mut self, principal: Principal, expiration: Timestamp) {
        debug_assert!(expiration > 0);
        self.grants.insert(principal, expiration);
    }

    pub fn remove(&mut self, principal: &Principal) -> Option<Timestamp> {
        self.grants.remove(principal)
    }

    /// Drop every entry with `expiration < at_time`; returns the number removed
    pub fn expire_before(&mut self, at_time: Timestamp) -> usize {
        self.grants.retain(|_, &expiration| expiration >= at_time)
    }

    pub fn principals(&self) -> Vec<Principal> {
        self.grants.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Principal, &Timestamp)> + '_ {
        self.grants.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn clear(&mut self) {
        self.grants.clear();
    }
}
