/*!
 * Access Control Facade Integration Tests
 */

use permission_tree::permissions::{AccessControl, PermissionEvent};
use permission_tree::{
    AccessMode, EngineConfig, ManualClock, PermissionError, Principal, ResourceId, MAX_TIMESTAMP,
};
use std::sync::Arc;

const RES: ResourceId = 42;

fn p(n: u64) -> Principal {
    Principal::from_low_u64(n)
}

fn setup(now: u64) -> (AccessControl<Arc<ManualClock>>, Arc<ManualClock>, Principal) {
    let clock = Arc::new(ManualClock::new(now));
    (AccessControl::with_clock(clock.clone()), clock, p(1000))
}

#[test]
fn test_stranger_cannot_grant_under_fallback_holder() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &[], p(1), MAX_TIMESTAMP, AccessMode::Fallback)
        .unwrap();

    assert_eq!(
        acl.grant(p(2), RES, owner, &["g"], p(2), 100, AccessMode::Full),
        Err(PermissionError::Unauthorized { caller: p(2) })
    );
}

#[test]
fn test_fallback_holder_can_delegate_below() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &[], p(1), MAX_TIMESTAMP, AccessMode::Fallback)
        .unwrap();

    acl.grant(p(1), RES, owner, &["g"], p(3), 100, AccessMode::Full)
        .unwrap();
    assert_eq!(acl.has_access(RES, owner, &["g"], p(3), 100), Ok(true));
    // The new explicit node now shadows p(1)'s fallback at "g"
    assert_eq!(acl.has_access(RES, owner, &["g", "x"], p(1), 10), Ok(false));
}

#[test]
fn test_fallback_holder_cannot_revoke_others() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &[], p(1), MAX_TIMESTAMP, AccessMode::Fallback)
        .unwrap();
    acl.grant(owner, RES, owner, &["g"], p(2), 100, AccessMode::Full)
        .unwrap();

    assert_eq!(
        acl.revoke(p(1), RES, owner, &["g"], p(2), AccessMode::Full),
        Err(PermissionError::Unauthorized { caller: p(1) })
    );
    assert!(acl.entry_exists(RES, owner, &["g"], p(2), AccessMode::Full));
}

#[test]
fn test_unlimited_delegate_can_revoke_and_reset() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &["g"], p(1), MAX_TIMESTAMP, AccessMode::Full)
        .unwrap();
    acl.grant(p(1), RES, owner, &["g", "a"], p(2), 100, AccessMode::Full)
        .unwrap();
    acl.grant(p(1), RES, owner, &["g", "b"], p(3), 100, AccessMode::Full)
        .unwrap();

    acl.revoke(p(1), RES, owner, &["g", "a"], p(2), AccessMode::Full)
        .unwrap();
    assert_eq!(acl.child_keys(RES, owner, &["g"]), vec!["b".to_string()]);

    acl.reset_subtree(p(1), RES, owner, &["g"]).unwrap();
    assert!(acl.child_keys(RES, owner, &["g"]).is_empty());
    assert_eq!(acl.has_access(RES, owner, &["g", "b"], p(3), 1), Ok(false));
    assert_eq!(acl.has_access(RES, owner, &["g"], p(1), MAX_TIMESTAMP), Ok(true));
}

#[test]
fn test_time_limited_delegate_cannot_reset() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &["g"], p(1), 1_000, AccessMode::Full)
        .unwrap();
    assert_eq!(
        acl.reset_subtree(p(1), RES, owner, &["g"]),
        Err(PermissionError::Unauthorized { caller: p(1) })
    );
}

#[test]
fn test_monotonic_grant_through_facade() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &["g"], p(1), 500, AccessMode::Full)
        .unwrap();
    assert_eq!(
        acl.grant(owner, RES, owner, &["g"], p(1), 400, AccessMode::Full),
        Err(PermissionError::GrantNotExtending {
            current: 500,
            requested: 400
        })
    );
    assert_eq!(
        acl.grant(owner, RES, owner, &["g"], p(1), 0, AccessMode::Full),
        Err(PermissionError::ZeroExpiration)
    );
    assert_eq!(acl.expiration(RES, owner, &["g"], p(1), AccessMode::Full), 500);
}

#[test]
fn test_expiry_unshadows_ancestor_fallback() {
    let (acl, clock, owner) = setup(10);
    let (reader, editor) = (p(1), p(2));

    acl.grant(owner, RES, owner, &[], reader, 1_000_000, AccessMode::Fallback)
        .unwrap();
    acl.grant(owner, RES, owner, &["g"], editor, 20, AccessMode::Full)
        .unwrap();

    clock.set(30);
    assert_eq!(acl.has_access_now(RES, owner, &["g"], reader), Ok(false));

    // Anyone may trigger expiry
    assert_eq!(acl.expire_subtree(RES, owner, &["g"]), Ok(1));
    assert_eq!(acl.has_access_now(RES, owner, &["g"], reader), Ok(true));
    assert!(!acl.node_exists(RES, owner, &["g"]));
}

#[test]
fn test_owner_reset_keeps_shadowing_until_expired() {
    let (acl, _, owner) = setup(10);
    let (reader, editor) = (p(1), p(2));

    acl.grant(owner, RES, owner, &[], reader, 1_000_000, AccessMode::Fallback)
        .unwrap();
    acl.grant(owner, RES, owner, &["g"], editor, 500, AccessMode::Full)
        .unwrap();

    acl.reset_subtree(owner, RES, owner, &["g"]).unwrap();

    // The wiped node stays explicit and still shadows the root fallback
    assert!(acl.node_exists(RES, owner, &["g"]));
    assert!(acl.is_empty_at(RES, owner, &["g"]));
    assert_eq!(acl.has_access(RES, owner, &["g", "x"], reader, 20), Ok(false));
    assert_eq!(acl.has_access(RES, owner, &["g"], editor, 20), Ok(false));
    assert_eq!(acl.has_access(RES, owner, &["h"], reader, 20), Ok(true));

    // Expiry prunes the empty node and lifts the shadow
    assert_eq!(acl.expire_subtree(RES, owner, &["g"]), Ok(0));
    assert!(!acl.node_exists(RES, owner, &["g"]));
    assert_eq!(acl.has_access(RES, owner, &["g", "x"], reader, 20), Ok(true));
}

#[test]
fn test_owner_reset_then_revoke_prunes_node() {
    let (acl, _, owner) = setup(10);
    acl.grant(owner, RES, owner, &[], p(1), MAX_TIMESTAMP, AccessMode::Fallback)
        .unwrap();
    acl.grant(owner, RES, owner, &["g", "a"], p(2), 500, AccessMode::Full)
        .unwrap();

    acl.reset_subtree(owner, RES, owner, &["g"]).unwrap();
    assert_eq!(acl.child_keys(RES, owner, &[]), vec!["g".to_string()]);
    assert!(acl.child_keys(RES, owner, &["g"]).is_empty());

    // A no-op revoke on the emptied path still prunes it
    acl.revoke(owner, RES, owner, &["g"], p(2), AccessMode::Full)
        .unwrap();
    assert!(acl.child_keys(RES, owner, &[]).is_empty());
    assert_eq!(acl.has_access(RES, owner, &["g", "a"], p(1), 20), Ok(true));
}

#[test]
fn test_owner_has_access_everywhere() {
    let (acl, _, owner) = setup(1);
    let paths: [&[&str]; 3] = [&[], &["a"], &["a", "b", "c"]];
    for path in paths {
        assert_eq!(acl.has_access(RES, owner, path, owner, 1), Ok(true));
        assert_eq!(acl.has_access(RES, owner, path, owner, MAX_TIMESTAMP), Ok(true));
    }
}

#[test]
fn test_trees_are_isolated_per_resource_and_owner() {
    let (acl, _, owner) = setup(1);
    let other_owner = p(2000);
    acl.grant(owner, RES, owner, &["g"], p(1), 100, AccessMode::Full)
        .unwrap();

    assert_eq!(acl.has_access(RES + 1, owner, &["g"], p(1), 10), Ok(false));
    assert_eq!(acl.has_access(RES, other_owner, &["g"], p(1), 10), Ok(false));
    // Ownership transfer: the new owner sees a fresh tree
    assert_eq!(
        acl.grant(p(1), RES, other_owner, &["g"], p(3), 10, AccessMode::Full),
        Err(PermissionError::Unauthorized { caller: p(1) })
    );
    assert_eq!(acl.tree_count(), 1);
}

#[test]
fn test_events_are_recorded_in_order() {
    let (acl, _, owner) = setup(1);
    acl.grant(owner, RES, owner, &["g"], p(1), 100, AccessMode::Full)
        .unwrap();
    acl.revoke(p(1), RES, owner, &["g"], p(1), AccessMode::Full)
        .unwrap();
    acl.reset_subtree(owner, RES, owner, &[]).unwrap();
    acl.expire_subtree(RES, owner, &[]).unwrap();

    let records = acl.audit().recent(10);
    let names: Vec<&str> = records.iter().rev().map(|r| r.event.name()).collect();
    assert_eq!(
        names,
        vec!["granted", "revoked", "subtree_reset", "subtree_expired"]
    );
    match &records[3].event {
        PermissionEvent::Granted {
            path,
            grantor,
            principal,
            expiration,
            mode,
            ..
        } => {
            assert_eq!(path, &vec!["g".to_string()]);
            assert_eq!(*grantor, owner);
            assert_eq!(*principal, p(1));
            assert_eq!(*expiration, 100);
            assert_eq!(*mode, AccessMode::Full);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_failed_operations_emit_nothing() {
    let (acl, _, owner) = setup(1);
    let _ = acl.grant(p(5), RES, owner, &["g"], p(5), 100, AccessMode::Full);
    let _ = acl.reset_subtree(p(5), RES, owner, &["g"]);
    assert!(acl.audit().recent(10).is_empty());
    assert_eq!(acl.audit().denial_count(&p(5)), 2);
}

#[test]
fn test_configured_limits_apply_to_every_operation() {
    let acl = AccessControl::with_clock_and_config(
        ManualClock::new(1),
        EngineConfig::default()
            .with_max_path_depth(2)
            .with_max_segment_len(4),
    );
    let owner = p(1);
    let long = "toolong";

    assert_eq!(
        acl.grant(owner, RES, owner, &[long], p(2), 10, AccessMode::Full),
        Err(PermissionError::SegmentTooLong { length: 7, max: 4 })
    );
    assert_eq!(
        acl.has_access(RES, owner, &["a", "b", "c"], p(2), 10),
        Err(PermissionError::PathTooDeep { depth: 3, max: 2 })
    );
    assert_eq!(
        acl.expire_subtree(RES, owner, &["a", "b", "c"]),
        Err(PermissionError::PathTooDeep { depth: 3, max: 2 })
    );
}
