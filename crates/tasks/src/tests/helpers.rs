// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{Notification, Orchestrator, PoolSpec, RetryPolicy};
use admit_domain::{Event, EventId, GroupId, MembershipDirectory, PoolId, UserId};
use admit_payment::StubGateway;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast::Receiver;

pub const G1: GroupId = GroupId::new(101);
pub const G2: GroupId = GroupId::new(102);

pub const EVENT: EventId = EventId::new(1);
pub const POOL_A: PoolId = PoolId::new(1);
pub const POOL_B: PoolId = PoolId::new(2);

/// An instant on the fixture day (2026-03-02) at the given hour.
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).single().unwrap()
}

pub fn user(id: i64) -> UserId {
    UserId::new(id)
}

/// Users 1, 3, 5 belong to group `G1`; users 2, 4 to `G2`; user 6 to both.
pub fn two_group_directory() -> MembershipDirectory {
    let mut directory = MembershipDirectory::new();
    for id in [1, 3, 5] {
        directory.add_member(user(id), G1);
    }
    for id in [2, 4] {
        directory.add_member(user(id), G2);
    }
    directory.add_member(user(6), G1);
    directory.add_member(user(6), G2);
    directory
}

/// An orchestrator over the canonical two-pool event: pool A (`G1`,
/// capacity `cap_a`) and pool B (`G2`, capacity `cap_b`). Retries run with
/// zero backoff so tests stay fast.
pub async fn setup(cap_a: u32, cap_b: u32, priced: bool) -> Orchestrator<StubGateway> {
    let orchestrator =
        Orchestrator::new(StubGateway::new()).with_retry_policy(RetryPolicy::new(3, 0, 0));
    orchestrator.set_memberships(two_group_directory()).await;

    let mut event = Event::new(EVENT, at(18), at(20)).unwrap();
    if priced {
        event = event.with_price(25_000).unwrap();
    }
    orchestrator
        .add_event(
            event,
            vec![
                PoolSpec {
                    name: String::from("Pool A"),
                    capacity: cap_a,
                    activation_date: at(8),
                    groups: vec![G1],
                },
                PoolSpec {
                    name: String::from("Pool B"),
                    capacity: cap_b,
                    activation_date: at(8),
                    groups: vec![G2],
                },
            ],
            at(7),
        )
        .await
        .unwrap();
    orchestrator
}

/// Drains every notification currently buffered on the receiver.
pub fn drain(rx: &mut Receiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        received.push(notification);
    }
    received
}
