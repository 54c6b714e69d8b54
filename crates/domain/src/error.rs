// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::types::{EventId, PoolId, RegistrationId, UserId};

/// Errors that can occur during domain validation.
///
/// Domain errors are terminal: they describe a rule violation that retrying
/// the same request cannot fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Event end time is not after its start time.
    InvalidEventTimes {
        /// Description of the violation.
        reason: String,
    },
    /// A priced event must have a positive price.
    InvalidPrice {
        /// The rejected price.
        price: i64,
    },
    /// Pool name is empty or invalid.
    InvalidPoolName(String),
    /// The user matches no pool's eligible groups.
    NoAvailablePools {
        /// The requesting user.
        user_id: UserId,
    },
    /// No pool the user matches has opened yet.
    RegistrationNotOpen {
        /// The requesting user.
        user_id: UserId,
    },
    /// Registration was attempted after the event's close time.
    RegistrationClosed {
        /// The event.
        event_id: EventId,
    },
    /// Unregistration was attempted after the event's deadline.
    UnregistrationDeadlinePassed {
        /// The event.
        event_id: EventId,
    },
    /// No registration exists with the given identifier.
    RegistrationNotFound {
        /// The missing registration.
        registration_id: RegistrationId,
    },
    /// No registration exists for the given user.
    RegistrationNotFoundForUser {
        /// The user.
        user_id: UserId,
    },
    /// No pool exists with the given identifier.
    PoolNotFound {
        /// The missing pool.
        pool_id: PoolId,
    },
    /// The pool has registrations referencing it and cannot be deleted.
    PoolNotEmpty {
        /// The pool.
        pool_id: PoolId,
    },
    /// The targeted pool has no open slot.
    PoolFull {
        /// The pool.
        pool_id: PoolId,
    },
    /// Pool capacity cannot shrink below the admitted count.
    CapacityBelowAdmitted {
        /// The pool.
        pool_id: PoolId,
        /// The requested capacity.
        capacity: u32,
        /// The current admitted count.
        admitted: u32,
    },
    /// Registration status string is not recognized.
    InvalidRegistrationStatus {
        /// The rejected status string.
        status: String,
    },
    /// Registration status transition is not permitted.
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },
    /// Payment status string is not recognized.
    InvalidPaymentStatus {
        /// The rejected status string.
        status: String,
    },
    /// Payment status transition is not permitted.
    InvalidPaymentTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },
    /// Timezone name is not a valid IANA identifier.
    InvalidTimezone(String),
    /// Freeze period bounds are not plausible calendar dates.
    InvalidFreezePeriod {
        /// Description of the violation.
        reason: String,
    },
    /// Penalty countdown must be positive.
    InvalidPenaltyCountdown {
        /// The rejected countdown length.
        days: u32,
    },
    /// Date arithmetic overflow.
    DateArithmeticOverflow {
        /// Description of the operation that failed.
        operation: String,
    },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEventTimes { reason } => write!(f, "Invalid event times: {reason}"),
            Self::InvalidPrice { price } => {
                write!(f, "Invalid price {price}: priced events require a positive amount")
            }
            Self::InvalidPoolName(msg) => write!(f, "Invalid pool name: {msg}"),
            Self::NoAvailablePools { user_id } => {
                write!(f, "User {user_id} matches no pool for this event")
            }
            Self::RegistrationNotOpen { user_id } => {
                write!(f, "No pool matching user {user_id} has opened yet")
            }
            Self::RegistrationClosed { event_id } => {
                write!(f, "Registration for event {event_id} has closed")
            }
            Self::UnregistrationDeadlinePassed { event_id } => {
                write!(f, "Unregistration deadline for event {event_id} has passed")
            }
            Self::RegistrationNotFound { registration_id } => {
                write!(f, "Registration {registration_id} not found")
            }
            Self::RegistrationNotFoundForUser { user_id } => {
                write!(f, "No registration found for user {user_id}")
            }
            Self::PoolNotFound { pool_id } => write!(f, "Pool {pool_id} not found"),
            Self::PoolNotEmpty { pool_id } => {
                write!(f, "Pool {pool_id} has registrations and cannot be deleted")
            }
            Self::PoolFull { pool_id } => write!(f, "Pool {pool_id} has no open slot"),
            Self::CapacityBelowAdmitted {
                pool_id,
                capacity,
                admitted,
            } => {
                write!(
                    f,
                    "Pool {pool_id} capacity cannot shrink to {capacity}: {admitted} registrants are admitted"
                )
            }
            Self::InvalidRegistrationStatus { status } => {
                write!(f, "Invalid registration status: {status}")
            }
            Self::InvalidStatusTransition { from, to } => {
                write!(f, "Registration status cannot move from {from} to {to}")
            }
            Self::InvalidPaymentStatus { status } => {
                write!(f, "Invalid payment status: {status}")
            }
            Self::InvalidPaymentTransition { from, to } => {
                write!(f, "Payment status cannot move from {from} to {to}")
            }
            Self::InvalidTimezone(name) => write!(f, "Invalid timezone: {name}"),
            Self::InvalidFreezePeriod { reason } => {
                write!(f, "Invalid freeze period: {reason}")
            }
            Self::InvalidPenaltyCountdown { days } => {
                write!(f, "Invalid penalty countdown: {days} days")
            }
            Self::DateArithmeticOverflow { operation } => {
                write!(f, "Date arithmetic overflow while {operation}")
            }
        }
    }
}

impl std::error::Error for DomainError {}
