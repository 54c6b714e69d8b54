// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::helpers::{Fixture, G1, G2, at, base_event, two_group_directory, user};
use crate::{EngineContext, eligible_pools, may_join, most_exclusive, partition_full_open};
use admit_domain::{MembershipDirectory, Penalty, Pool, PoolId};

fn context<'a>(fixture: &'a Fixture, now: chrono::DateTime<chrono::Utc>) -> EngineContext<'a> {
    EngineContext {
        now,
        memberships: &fixture.memberships,
        penalties: &fixture.penalties,
        penalty_config: &fixture.config,
    }
}

#[test]
fn test_may_join_requires_group_and_activation() {
    let mut fixture = Fixture::new(base_event(), two_group_directory());
    let pool_a = fixture.create_pool("Pool A", 2, vec![G1]);

    let pool = fixture.state.pool(pool_a).unwrap().clone();

    let ctx = context(&fixture, at(9));
    assert!(may_join(&fixture.state.event, &pool, user(1), &ctx).unwrap());
    assert!(!may_join(&fixture.state.event, &pool, user(2), &ctx).unwrap());

    let early = context(&fixture, at(7));
    assert!(!may_join(&fixture.state.event, &pool, user(1), &early).unwrap());
}

#[test]
fn test_penalty_delay_shifts_activation() {
    let mut fixture = Fixture::new(base_event(), two_group_directory());
    let pool_a = fixture.create_pool("Pool A", 2, vec![G1]);
    fixture.penalties.record(Penalty::new(user(1), 1, at(0)));

    let pool = fixture.state.pool(pool_a).unwrap().clone();

    // Activation 08:00 plus a three-hour delay for weight one.
    let before_delay = context(&fixture, at(10));
    assert!(!may_join(&fixture.state.event, &pool, user(1), &before_delay).unwrap());

    let after_delay = context(&fixture, at(11));
    assert!(may_join(&fixture.state.event, &pool, user(1), &after_delay).unwrap());
}

#[test]
fn test_blocking_weight_fails_every_pool() {
    let mut fixture = Fixture::new(base_event(), two_group_directory());
    fixture.create_pool("Pool A", 2, vec![G1]);
    fixture.create_pool("Pool B", 2, vec![G1, G2]);
    fixture.penalties.record(Penalty::new(user(1), 4, at(0)));

    let ctx = context(&fixture, at(16));
    let eligible = eligible_pools(&fixture.state, user(1), &ctx).unwrap();
    assert!(eligible.is_empty());
}

#[test]
fn test_group_hierarchy_grants_pool_access() {
    let mut directory = MembershipDirectory::new();
    // User 20 is only a member of the subcommittee, which rolls up into
    // the committee group the pool is gated on.
    directory.add_member(user(20), G2);
    directory.set_parent(G2, G1);

    let mut fixture = Fixture::new(base_event(), directory);
    let pool_a = fixture.create_pool("Committee", 2, vec![G1]);
    let pool = fixture.state.pool(pool_a).unwrap().clone();

    let ctx = context(&fixture, at(9));
    assert!(may_join(&fixture.state.event, &pool, user(20), &ctx).unwrap());
}

#[test]
fn test_partition_full_open() {
    let mut full_pool = Pool::new(PoolId::new(1), "Full", 1, at(8), vec![G1]).unwrap();
    full_pool.counter = 1;
    let open_pool = Pool::new(PoolId::new(2), "Open", 2, at(8), vec![G1]).unwrap();
    let unlimited = Pool::new(PoolId::new(3), "Unlimited", 0, at(8), vec![G1]).unwrap();

    let candidates = [&full_pool, &open_pool, &unlimited];
    let (full, open) = partition_full_open(&candidates);

    assert_eq!(full.len(), 1);
    assert_eq!(full[0].id, PoolId::new(1));
    assert_eq!(open.len(), 2);
}

#[test]
fn test_most_exclusive_prefers_smaller_membership() {
    let directory = two_group_directory();
    // G1 has four members, G2 has three.
    let broad = Pool::new(PoolId::new(1), "Broad", 5, at(8), vec![G1]).unwrap();
    let narrow = Pool::new(PoolId::new(2), "Narrow", 5, at(8), vec![G2]).unwrap();

    let chosen = most_exclusive(&[&broad, &narrow], &directory).unwrap();
    assert_eq!(chosen.id, PoolId::new(2));
}

#[test]
fn test_most_exclusive_tie_prefers_unlimited_capacity() {
    let directory = two_group_directory();
    let finite = Pool::new(PoolId::new(1), "Finite", 5, at(8), vec![G1]).unwrap();
    let unlimited = Pool::new(PoolId::new(2), "Unlimited", 0, at(8), vec![G1]).unwrap();

    let chosen = most_exclusive(&[&finite, &unlimited], &directory).unwrap();
    assert_eq!(chosen.id, PoolId::new(2));
}

#[test]
fn test_most_exclusive_full_tie_is_deterministic() {
    let directory = two_group_directory();
    let first = Pool::new(PoolId::new(1), "First", 5, at(8), vec![G1]).unwrap();
    let second = Pool::new(PoolId::new(2), "Second", 5, at(8), vec![G1]).unwrap();

    let chosen = most_exclusive(&[&second, &first], &directory).unwrap();
    assert_eq!(chosen.id, PoolId::new(1));
}
