// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod error;
mod groups;
mod payment_status;
mod penalty;
mod registration_status;
mod types;

pub use error::DomainError;
pub use groups::MembershipDirectory;
pub use payment_status::PaymentStatus;
pub use penalty::{
    BLOCKING_PENALTY_WEIGHT, FreezePeriod, Penalty, PenaltyConfig, PenaltyLedger,
    registration_delay,
};
pub use registration_status::{Operation, RegistrationStatus};
pub use types::{
    Event, EventId, GroupId, PaymentInfo, Pool, PoolId, Registration, RegistrationId, UserId,
};
