/*!
 * Concurrency Tests
 * Parallel mutations on shared and independent trees
 */

use permission_tree::permissions::AccessControl;
use permission_tree::{AccessMode, ManualClock, Principal, MAX_TIMESTAMP};
use std::sync::Arc;
use std::thread;

const THREADS: u64 = 8;
const PER_THREAD: u64 = 50;

fn p(n: u64) -> Principal {
    Principal::from_low_u64(n)
}

#[test]
fn test_independent_trees_in_parallel() {
    let acl = AccessControl::with_clock(Arc::new(ManualClock::new(1)));
    let owner = p(1);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let acl = acl.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let segment = format!("s{}", i);
                    acl.grant(owner, t, owner, &[segment.as_str()], p(100 + i), 10, AccessMode::Full)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(acl.tree_count(), THREADS as usize);
    for t in 0..THREADS {
        let stats = acl.tree_stats(t, owner).unwrap();
        assert_eq!(stats.full_grants, PER_THREAD as usize);
        assert_eq!(stats.nodes, PER_THREAD as usize + 1);
    }
}

#[test]
fn test_same_tree_grants_are_not_lost() {
    let acl = AccessControl::with_clock(Arc::new(ManualClock::new(1)));
    let owner = p(1);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let acl = acl.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let principal = p(1_000 + t * PER_THREAD + i);
                    acl.grant(owner, 7, owner, &["shared"], principal, 10, AccessMode::Fallback)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let principals = acl.fallback_access_principals(7, owner, &["shared"]);
    assert_eq!(principals.len(), (THREADS * PER_THREAD) as usize);
}

#[test]
fn test_grant_and_revoke_race_leaves_canonical_tree() {
    let acl = AccessControl::with_clock(Arc::new(ManualClock::new(1)));
    let owner = p(1);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let acl = acl.clone();
            thread::spawn(move || {
                let principal = p(10 + t);
                let segment = format!("n{}", t % 2);
                for _ in 0..PER_THREAD {
                    acl.grant(owner, 3, owner, &["a", segment.as_str()], principal, MAX_TIMESTAMP, AccessMode::Full)
                        .unwrap();
                    acl.revoke(principal, 3, owner, &["a", segment.as_str()], principal, AccessMode::Full)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Every grant was revoked by its holder, so nothing may be left behind
    assert!(!acl.tree_exists(3, owner));
    assert!(acl.is_empty_at(3, owner, &[]));
}

#[test]
fn test_readers_run_alongside_writers() {
    let acl = AccessControl::with_clock(Arc::new(ManualClock::new(1)));
    let owner = p(1);
    acl.grant(owner, 9, owner, &[], p(2), MAX_TIMESTAMP, AccessMode::Full)
        .unwrap();

    let writer = {
        let acl = acl.clone();
        thread::spawn(move || {
            for i in 0..200u64 {
                let segment = format!("w{}", i);
                acl.grant(owner, 9, owner, &[segment.as_str()], p(3), 10, AccessMode::Full)
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let acl = acl.clone();
            thread::spawn(move || {
                for i in 0..200u64 {
                    let segment = format!("w{}", i);
                    assert_eq!(acl.has_access(9, owner, &[segment.as_str()], p(2), 5), Ok(true));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(acl.child_keys(9, owner, &[]).len(), 200);
}
