// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{Command, CoreError, EngineContext, EventState, TransitionResult, apply};
use admit_audit::{Actor, Cause};
use admit_domain::{
    Event, EventId, GroupId, MembershipDirectory, PenaltyConfig, PenaltyLedger, PoolId,
    Registration, UserId,
};
use chrono::{DateTime, TimeZone, Utc};

pub const G1: GroupId = GroupId::new(101);
pub const G2: GroupId = GroupId::new(102);
pub const G3: GroupId = GroupId::new(103);

/// An instant on the fixture day (2026-03-02) at the given hour.
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).single().unwrap()
}

/// An instant on the fixture day at the given hour and minute.
pub fn at_min(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
        .single()
        .unwrap()
}

pub fn user(id: i64) -> UserId {
    UserId::new(id)
}

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("admin-123"), String::from("admin"))
}

pub fn create_test_cause() -> Cause {
    Cause::new(String::from("req-456"), String::from("Test request"))
}

/// A fixture event starting in the evening of the fixture day, with pools
/// activating in the morning.
pub fn base_event() -> Event {
    Event::new(EventId::new(1), at(18), at(20)).unwrap()
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

/// A complete engine fixture: state plus the context views.
pub struct Fixture {
    pub state: EventState,
    pub memberships: MembershipDirectory,
    pub penalties: PenaltyLedger,
    pub config: PenaltyConfig,
}

impl Fixture {
    pub fn new(event: Event, memberships: MembershipDirectory) -> Self {
        Self {
            state: EventState::new(event),
            memberships,
            penalties: PenaltyLedger::new(),
            // No freeze periods: penalty arithmetic stays exact in tests.
            config: PenaltyConfig::new(20, String::from("UTC"), Vec::new()).unwrap(),
        }
    }

    /// Applies a command at `now` and commits the new state on success.
    pub fn apply_at(
        &mut self,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<TransitionResult, CoreError> {
        let ctx = EngineContext {
            now,
            memberships: &self.memberships,
            penalties: &self.penalties,
            penalty_config: &self.config,
        };
        let result = apply(
            &self.state,
            command,
            &ctx,
            create_test_actor(),
            create_test_cause(),
        );
        if let Ok(transition) = &result {
            self.state = transition.new_state.clone();
        }
        result
    }

    /// Creates a pool activating at 08:00 and returns its id.
    pub fn create_pool(&mut self, name: &str, capacity: u32, groups: Vec<GroupId>) -> PoolId {
        self.apply_at(
            Command::CreatePool {
                name: String::from(name),
                capacity,
                activation_date: at(8),
                groups,
            },
            at(7),
        )
        .expect("pool creation should succeed");
        self.state.pools.last().expect("pool just created").id
    }

    /// Registers the user at `now`, committing on success.
    pub fn register_at(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<TransitionResult, CoreError> {
        self.apply_at(Command::Register { user_id }, now)
    }

    /// The single registration row for a user.
    pub fn registration_of(&self, user_id: UserId) -> &Registration {
        self.state
            .registration_for_user(user_id)
            .expect("registration should exist")
    }
}

/// The canonical two-pool fixture: pool A (capacity `cap_a`, gated on
/// `G1`) and pool B (capacity `cap_b`, gated on `G2`).
pub fn two_pool_fixture(cap_a: u32, cap_b: u32) -> (Fixture, PoolId, PoolId) {
    let mut fixture = Fixture::new(base_event(), two_group_directory());
    let pool_a = fixture.create_pool("Pool A", cap_a, vec![G1]);
    let pool_b = fixture.create_pool("Pool B", cap_b, vec![G2]);
    (fixture, pool_a, pool_b)
}
