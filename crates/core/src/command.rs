// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use admit_domain::{GroupId, Operation, PaymentStatus, PoolId, RegistrationId, UserId};
use chrono::{DateTime, Utc};

/// A command represents user or system intent as data only.
///
/// Commands are the only way to request state changes on an event
/// aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get-or-create the user's registration row and flip it to the
    /// pending status for the given operation. The `(event, user)`
    /// uniqueness invariant is enforced here.
    MarkPending {
        /// The user whose row enters the pending status.
        user_id: UserId,
        /// The direction of the in-flight mutation.
        op: Operation,
    },
    /// Place the user: admit into an eligible pool or append to the
    /// waiting list. Idempotent for a user already placed.
    Register {
        /// The registering user.
        user_id: UserId,
    },
    /// Administrative placement bypassing activation, penalty, and group
    /// gates. A target pool not belonging to the event is a consistency
    /// violation.
    AdminRegister {
        /// The administrator performing the placement.
        requester: UserId,
        /// The user being placed.
        user_id: UserId,
        /// The target pool, or `None` to place wherever capacity remains.
        pool_id: Option<PoolId>,
        /// Why the administrative placement was made.
        reason: String,
    },
    /// Soft-unregister: clear the pool slot, stamp the unregistration
    /// date, and run the bump/rebalance scan for a vacated pool.
    Unregister {
        /// The registration to unregister.
        registration_id: RegistrationId,
    },
    /// Force the row to the failure status for the given operation after
    /// retries have been exhausted.
    MarkFailure {
        /// The user whose operation failed.
        user_id: UserId,
        /// The direction of the failed mutation.
        op: Operation,
    },
    /// Create a new pool and bump waiting registrants into the new
    /// capacity.
    CreatePool {
        /// Human-readable pool name.
        name: String,
        /// Maximum admitted registrations. Zero means unlimited.
        capacity: u32,
        /// When the pool opens for registration.
        activation_date: DateTime<Utc>,
        /// Groups whose members may register through this pool.
        groups: Vec<GroupId>,
    },
    /// Change a pool's capacity. Growth bumps waiting registrants;
    /// shrinking below the admitted count is rejected.
    UpdatePoolCapacity {
        /// The pool to resize.
        pool_id: PoolId,
        /// The new capacity. Zero means unlimited.
        capacity: u32,
    },
    /// Delete a pool. Rejected while any registration references it.
    DeletePool {
        /// The pool to delete.
        pool_id: PoolId,
    },
    /// Re-run the bump/rebalance scan against every open slot. Idempotent:
    /// a second run with no capacity change is a no-op.
    BumpOnPoolChange,
    /// Record a created payment intent and move the payment sub-state to
    /// pending.
    PaymentInitiated {
        /// The paying registration.
        registration_id: RegistrationId,
        /// The gateway intent identifier.
        intent_id: String,
        /// Amount in minor currency units.
        amount: i64,
    },
    /// Apply a gateway-reported payment outcome.
    PaymentStatusChanged {
        /// The affected registration.
        registration_id: RegistrationId,
        /// The new payment status.
        status: PaymentStatus,
    },
}
