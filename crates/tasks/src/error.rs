// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use admit::CoreError;
use admit_domain::EventId;
use admit_payment::PaymentError;
use thiserror::Error;

/// Errors raised while orchestrating tasks.
///
/// Classification drives retry behavior: transient errors are retried with
/// bounded backoff, terminal errors are surfaced to the caller, and fatal
/// errors (broken invariants) halt the operation and alert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The per-event lock could not be acquired in time.
    #[error("timed out acquiring the lock for event {0}")]
    LockTimeout(EventId),
    /// The event is not registered with the store.
    #[error("event {0} is not registered with the store")]
    UnknownEvent(EventId),
    /// The engine rejected the transition.
    #[error(transparent)]
    Engine(#[from] CoreError),
    /// The payment boundary failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl TaskError {
    /// Whether retrying the same task may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout(_) => true,
            Self::Payment(err) => err.is_transient(),
            Self::UnknownEvent(_) | Self::Engine(_) => false,
        }
    }

    /// Whether this error indicates a broken invariant. Fatal errors are
    /// never retried and never converted into a failure status; they must
    /// surface loudly.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Engine(err) if err.is_consistency_violation())
    }
}
