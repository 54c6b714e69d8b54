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

mod apply;
mod bump;
mod command;
mod eligibility;
mod error;
mod state;

#[cfg(test)]
mod tests;

// Re-export public types and functions
pub use apply::apply;
pub use bump::{BumpReport, RebalanceMove};
pub use command::Command;
pub use eligibility::{
    EngineContext, eligible_pools, group_matched_pools, may_join, most_exclusive,
    partition_full_open,
};
pub use error::CoreError;
pub use state::{EventState, TransitionResult, WaitingList, check_pool_counters};
