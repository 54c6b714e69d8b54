// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Penalty accounting and the registration-delay clock.
//!
//! Penalties carry an integer weight and expire after a configured number
//! of countdown days. Days falling inside calendar-aware freeze periods
//! (wall-clock date ranges in a declared timezone, recurring yearly) do not
//! count toward the expiry.
//!
//! ## Invariants
//!
//! - A user's active weight is the sum of their non-expired penalty weights
//! - The registration delay is a step function of active weight
//! - Weight at or above [`BLOCKING_PENALTY_WEIGHT`] blocks pool admission
//!   entirely (waiting list only), regardless of pool activation time
//! - Expiry is evaluated against wall-clock dates in the declared timezone,
//!   so a freeze period behaves identically for every registrant

use crate::error::DomainError;
use crate::types::UserId;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Active weight at or above which pool admission is blocked outright.
pub const BLOCKING_PENALTY_WEIGHT: u32 = 3;

/// A yearly-recurring wall-clock date range during which penalty countdowns
/// pause. The range is inclusive on both ends and may wrap the year end
/// (e.g. December 21 through January 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePeriod {
    start_month: u32,
    start_day: u32,
    end_month: u32,
    end_day: u32,
}

impl FreezePeriod {
    /// Creates a freeze period from inclusive month/day bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is not a plausible calendar date.
    pub fn new(
        start_month: u32,
        start_day: u32,
        end_month: u32,
        end_day: u32,
    ) -> Result<Self, DomainError> {
        for (month, day) in [(start_month, start_day), (end_month, end_day)] {
            if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
                return Err(DomainError::InvalidFreezePeriod {
                    reason: format!("invalid calendar bound {month:02}-{day:02}"),
                });
            }
        }
        Ok(Self {
            start_month,
            start_day,
            end_month,
            end_day,
        })
    }

    /// Whether the given date falls inside this freeze period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        let start = (self.start_month, self.start_day);
        let end = (self.end_month, self.end_day);
        if start <= end {
            md >= start && md <= end
        } else {
            // Wraps the year end.
            md >= start || md <= end
        }
    }
}

/// Configuration for penalty expiry and the registration-delay clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyConfig {
    countdown_days: u32,
    timezone: String,
    freeze_periods: Vec<FreezePeriod>,
}

impl PenaltyConfig {
    /// Creates a penalty configuration.
    ///
    /// # Arguments
    ///
    /// * `countdown_days` - Non-frozen days until a penalty expires
    /// * `timezone` - IANA timezone name the freeze calendar is declared in
    /// * `freeze_periods` - Yearly-recurring countdown pauses
    ///
    /// # Errors
    ///
    /// Returns an error if the countdown is zero or the timezone is not a
    /// valid IANA name.
    pub fn new(
        countdown_days: u32,
        timezone: String,
        freeze_periods: Vec<FreezePeriod>,
    ) -> Result<Self, DomainError> {
        if countdown_days == 0 {
            return Err(DomainError::InvalidPenaltyCountdown {
                days: countdown_days,
            });
        }
        if timezone.parse::<Tz>().is_err() {
            return Err(DomainError::InvalidTimezone(timezone));
        }
        Ok(Self {
            countdown_days,
            timezone,
            freeze_periods,
        })
    }

    /// Returns the countdown length in non-frozen days.
    #[must_use]
    pub const fn countdown_days(&self) -> u32 {
        self.countdown_days
    }

    /// Returns the declared timezone name.
    #[must_use]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    fn tz(&self) -> Result<Tz, DomainError> {
        self.timezone
            .parse()
            .map_err(|_| DomainError::InvalidTimezone(self.timezone.clone()))
    }

    /// Whether the given wall-clock date falls inside any freeze period.
    #[must_use]
    pub fn is_frozen(&self, date: NaiveDate) -> bool {
        self.freeze_periods.iter().any(|period| period.contains(date))
    }
}

impl Default for PenaltyConfig {
    /// Twenty non-frozen countdown days, UTC calendar, with a winter freeze
    /// (December 21 through January 2) and a summer freeze (June 1 through
    /// August 15).
    #[allow(clippy::unwrap_used)]
    fn default() -> Self {
        Self {
            countdown_days: 20,
            timezone: String::from("UTC"),
            freeze_periods: vec![
                FreezePeriod::new(12, 21, 1, 2).unwrap(),
                FreezePeriod::new(6, 1, 8, 15).unwrap(),
            ],
        }
    }
}

/// A penalty issued against a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    /// The penalized user.
    pub user_id: UserId,
    /// The penalty weight.
    pub weight: u32,
    /// When the penalty was issued.
    pub created_at: DateTime<Utc>,
}

impl Penalty {
    /// Creates a new penalty.
    #[must_use]
    pub const fn new(user_id: UserId, weight: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            weight,
            created_at,
        }
    }

    /// Whether the penalty still counts at `now`.
    ///
    /// Walks wall-clock dates from issuance to `now` in the declared
    /// timezone, counting only days outside freeze periods; the penalty is
    /// active until the configured countdown has been consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured timezone cannot be resolved or
    /// date arithmetic overflows.
    pub fn is_active(&self, now: DateTime<Utc>, config: &PenaltyConfig) -> Result<bool, DomainError> {
        if now <= self.created_at {
            return Ok(true);
        }
        let tz: Tz = config.tz()?;
        let issued = self.created_at.with_timezone(&tz).date_naive();
        let today = now.with_timezone(&tz).date_naive();

        let mut date = issued;
        let mut counted: u32 = 0;
        while date < today {
            if !config.is_frozen(date) {
                counted += 1;
                if counted >= config.countdown_days() {
                    return Ok(false);
                }
            }
            date = date
                .succ_opt()
                .ok_or_else(|| DomainError::DateArithmeticOverflow {
                    operation: String::from("advancing penalty countdown date"),
                })?;
        }
        Ok(true)
    }
}

/// In-memory index of penalties by user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PenaltyLedger {
    penalties: HashMap<UserId, Vec<Penalty>>,
}

impl PenaltyLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            penalties: HashMap::new(),
        }
    }

    /// Records a penalty.
    pub fn record(&mut self, penalty: Penalty) {
        self.penalties
            .entry(penalty.user_id)
            .or_default()
            .push(penalty);
    }

    /// Sum of the user's non-expired penalty weights at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if penalty expiry cannot be evaluated.
    pub fn active_weight(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        config: &PenaltyConfig,
    ) -> Result<u32, DomainError> {
        let Some(penalties) = self.penalties.get(&user_id) else {
            return Ok(0);
        };
        let mut weight: u32 = 0;
        for penalty in penalties {
            if penalty.is_active(now, config)? {
                weight += penalty.weight;
            }
        }
        Ok(weight)
    }
}

/// The delay added to a pool's activation time for a given active weight.
///
/// `None` means registration into a pool is blocked entirely; the user may
/// only join the waiting list.
#[must_use]
pub fn registration_delay(active_weight: u32) -> Option<Duration> {
    if active_weight >= BLOCKING_PENALTY_WEIGHT {
        return None;
    }
    match active_weight {
        0 => Some(Duration::zero()),
        1 => Some(Duration::hours(3)),
        _ => Some(Duration::hours(12)),
    }
}
