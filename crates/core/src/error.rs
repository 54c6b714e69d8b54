// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use admit_domain::{DomainError, EventId, PoolId, RegistrationId, UserId};

/// Errors that can occur during state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A domain rule was violated. Terminal: retrying the same request
    /// cannot succeed.
    DomainViolation(DomainError),
    /// A pool counter diverged from the live admitted count. Fatal: this
    /// indicates a concurrency bug and is never silently corrected.
    CounterMismatch {
        /// The pool whose counter diverged.
        pool_id: PoolId,
        /// The stored counter value.
        counter: u32,
        /// The recomputed admitted count.
        admitted: u32,
    },
    /// A registration references a pool that does not belong to the event.
    /// Fatal: the aggregate ownership invariant has been broken.
    ForeignPool {
        /// The referenced pool.
        pool_id: PoolId,
        /// The owning event.
        event_id: EventId,
    },
    /// More than one registration row exists for a user. Fatal: the
    /// `(event, user)` uniqueness invariant has been broken.
    DuplicateRegistration {
        /// The user with duplicate rows.
        user_id: UserId,
    },
    /// The waiting-list index references a registration that does not
    /// exist. Fatal: the index has drifted from the rows.
    WaitingIndexInconsistent {
        /// The dangling registration reference.
        registration_id: RegistrationId,
    },
}

impl CoreError {
    /// Whether this error indicates a broken invariant rather than a
    /// rejected request. Consistency violations must halt the offending
    /// operation and surface loudly.
    #[must_use]
    pub const fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Self::CounterMismatch { .. }
                | Self::ForeignPool { .. }
                | Self::DuplicateRegistration { .. }
                | Self::WaitingIndexInconsistent { .. }
        )
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainViolation(err) => write!(f, "Domain violation: {err}"),
            Self::CounterMismatch {
                pool_id,
                counter,
                admitted,
            } => {
                write!(
                    f,
                    "Pool {pool_id} counter is {counter} but {admitted} registrants are admitted"
                )
            }
            Self::ForeignPool { pool_id, event_id } => {
                write!(f, "Pool {pool_id} does not belong to event {event_id}")
            }
            Self::DuplicateRegistration { user_id } => {
                write!(f, "User {user_id} has more than one registration row")
            }
            Self::WaitingIndexInconsistent { registration_id } => {
                write!(
                    f,
                    "Waiting list references missing registration {registration_id}"
                )
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        Self::DomainViolation(err)
    }
}
