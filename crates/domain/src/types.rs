// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use crate::payment_status::PaymentStatus;
use crate::registration_status::RegistrationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical numeric identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(i64);

/// Canonical numeric identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

/// Canonical numeric identifier for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(i64);

/// Canonical numeric identifier for a permission group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(i64);

/// Canonical numeric identifier for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationId(i64);

macro_rules! id_impl {
    ($name:ident) => {
        impl $name {
            /// Wraps a raw identifier value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_impl!(EventId);
id_impl!(UserId);
id_impl!(PoolId);
id_impl!(GroupId);
id_impl!(RegistrationId);

/// A time-boxed event that users register for.
///
/// An event owns its pools and registrations exclusively. Registrations
/// reference a pool only within the same event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The canonical event identifier.
    pub id: EventId,
    /// When the event itself begins.
    pub start_time: DateTime<Utc>,
    /// When the event ends.
    pub end_time: DateTime<Utc>,
    /// After this instant all pools behave as one unified capacity pool.
    /// `None` means the pools never merge.
    pub merge_time: Option<DateTime<Utc>>,
    /// Registrations attempted at or after this instant are rejected.
    pub registration_close_time: Option<DateTime<Utc>>,
    /// Unregistrations attempted at or after this instant are rejected.
    pub unregistration_deadline: Option<DateTime<Utc>>,
    /// Whether penalty weights delay or block registration for this event.
    pub heed_penalties: bool,
    /// Whether admission requires a payment intent.
    pub is_priced: bool,
    /// Price in minor currency units. Meaningful only when `is_priced`.
    pub price: i64,
}

impl Event {
    /// Creates a new event.
    ///
    /// # Errors
    ///
    /// Returns an error if `end_time` is not after `start_time`, or if a
    /// priced event has a non-positive price.
    pub fn new(
        id: EventId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if end_time <= start_time {
            return Err(DomainError::InvalidEventTimes {
                reason: format!("end time {end_time} is not after start time {start_time}"),
            });
        }
        Ok(Self {
            id,
            start_time,
            end_time,
            merge_time: None,
            registration_close_time: None,
            unregistration_deadline: None,
            heed_penalties: true,
            is_priced: false,
            price: 0,
        })
    }

    /// Sets the pool merge instant.
    #[must_use]
    pub const fn with_merge_time(mut self, merge_time: DateTime<Utc>) -> Self {
        self.merge_time = Some(merge_time);
        self
    }

    /// Marks the event as priced.
    ///
    /// # Errors
    ///
    /// Returns an error if the price is not positive.
    pub fn with_price(mut self, price: i64) -> Result<Self, DomainError> {
        if price <= 0 {
            return Err(DomainError::InvalidPrice { price });
        }
        self.is_priced = true;
        self.price = price;
        Ok(self)
    }

    /// Whether the pools have merged into one unified pool at `now`.
    #[must_use]
    pub fn is_merged(&self, now: DateTime<Utc>) -> bool {
        self.merge_time.is_some_and(|merge| now >= merge)
    }

    /// Whether registration is still open at `now`.
    #[must_use]
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        self.registration_close_time.is_none_or(|close| now < close)
    }

    /// Whether unregistration is still allowed at `now`.
    #[must_use]
    pub fn unregistration_open(&self, now: DateTime<Utc>) -> bool {
        self.unregistration_deadline
            .is_none_or(|deadline| now < deadline)
    }
}

/// A named capacity partition of an event, gated by an activation time and
/// a set of eligible groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    /// The canonical pool identifier.
    pub id: PoolId,
    /// Human-readable pool name.
    pub name: String,
    /// Maximum admitted registrations. Zero means unlimited.
    pub capacity: u32,
    /// The instant at which the pool opens for registration.
    pub activation_date: DateTime<Utc>,
    /// Groups whose members may register through this pool.
    pub groups: Vec<GroupId>,
    /// Count of admitted registrations referencing this pool.
    ///
    /// Must always equal the live admitted count; divergence is a
    /// consistency violation, never silently corrected.
    pub counter: u32,
}

impl Pool {
    /// Creates a new empty pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn new(
        id: PoolId,
        name: &str,
        capacity: u32,
        activation_date: DateTime<Utc>,
        groups: Vec<GroupId>,
    ) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidPoolName(String::from(
                "pool name must not be empty",
            )));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            capacity,
            activation_date,
            groups,
            counter: 0,
        })
    }

    /// Whether the pool admits an unlimited number of registrations.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.capacity == 0
    }

    /// Whether the pool has opened at `now`.
    #[must_use]
    pub fn is_activated(&self, now: DateTime<Utc>) -> bool {
        self.activation_date <= now
    }

    /// Whether at least one admission slot remains.
    #[must_use]
    pub const fn has_open_slot(&self) -> bool {
        self.is_unlimited() || self.counter < self.capacity
    }
}

/// Payment sub-state attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentInfo {
    /// Gateway intent identifier, set once an intent has been created.
    pub intent_id: Option<String>,
    /// Amount in minor currency units, set alongside the intent.
    pub amount: Option<i64>,
    /// Current payment status.
    pub status: PaymentStatus,
}

/// A user's claim on an event: either bound to a pool (admitted) or
/// unbound (waiting list).
///
/// Exactly one registration exists per `(event, user)` pair. Registrations
/// are never hard-deleted; unregistration soft-marks the row via
/// `unregistration_date` and re-registration reactivates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The canonical registration identifier.
    pub id: RegistrationId,
    /// The registered user.
    pub user_id: UserId,
    /// The admitting pool, or `None` for the waiting list.
    pub pool: Option<PoolId>,
    /// Set at creation and immutable thereafter; defines waiting-list order.
    pub registration_date: DateTime<Utc>,
    /// Non-`None` means the registration is inactive.
    pub unregistration_date: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: RegistrationStatus,
    /// Payment sub-state.
    pub payment: PaymentInfo,
}

impl Registration {
    /// Creates a new pending registration with no pool assignment.
    #[must_use]
    pub const fn new(
        id: RegistrationId,
        user_id: UserId,
        registration_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            pool: None,
            registration_date,
            unregistration_date: None,
            status: RegistrationStatus::PendingRegister,
            payment: PaymentInfo {
                intent_id: None,
                amount: None,
                status: PaymentStatus::None,
            },
        }
    }

    /// Whether the registration has not been unregistered.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.unregistration_date.is_none()
    }

    /// Whether the registration holds a pool slot.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        self.is_active() && self.pool.is_some()
    }

    /// Whether the registration sits on the waiting list.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.is_active()
            && self.pool.is_none()
            && self.status == RegistrationStatus::SuccessRegister
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).single().unwrap()
    }

    #[test]
    fn test_event_rejects_inverted_times() {
        let result = Event::new(EventId::new(1), ts(12), ts(10));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_merge_flag() {
        let event = Event::new(EventId::new(1), ts(18), ts(20))
            .unwrap()
            .with_merge_time(ts(12));
        assert!(!event.is_merged(ts(11)));
        assert!(event.is_merged(ts(12)));
    }

    #[test]
    fn test_event_rejects_non_positive_price() {
        let event = Event::new(EventId::new(1), ts(18), ts(20)).unwrap();
        assert!(event.with_price(0).is_err());
    }

    #[test]
    fn test_pool_rejects_empty_name() {
        let result = Pool::new(PoolId::new(1), "  ", 5, ts(8), vec![GroupId::new(1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_capacity_semantics() {
        let mut pool =
            Pool::new(PoolId::new(1), "Members", 2, ts(8), vec![GroupId::new(1)]).unwrap();
        assert!(pool.has_open_slot());
        pool.counter = 2;
        assert!(!pool.has_open_slot());

        let unlimited =
            Pool::new(PoolId::new(2), "Open", 0, ts(8), vec![GroupId::new(1)]).unwrap();
        assert!(unlimited.is_unlimited());
        assert!(unlimited.has_open_slot());
    }

    #[test]
    fn test_registration_lifecycle_flags() {
        let mut registration = Registration::new(RegistrationId::new(1), UserId::new(7), ts(9));
        assert!(registration.is_active());
        assert!(!registration.is_admitted());
        assert!(!registration.is_waiting());

        registration.status = RegistrationStatus::SuccessRegister;
        assert!(registration.is_waiting());

        registration.pool = Some(PoolId::new(1));
        assert!(registration.is_admitted());
        assert!(!registration.is_waiting());

        registration.unregistration_date = Some(ts(10));
        assert!(!registration.is_active());
        assert!(!registration.is_admitted());
    }
}
