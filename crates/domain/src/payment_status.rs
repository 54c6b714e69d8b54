// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Payment status tracking for priced events.
//!
//! The payment sub-state of a registration is driven by an external gateway:
//! intent creation moves it to pending, and gateway callbacks resolve it to
//! a terminal outcome. A failed payment may be retried with a new pending
//! phase; success and cancellation are final.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment sub-state of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment has been initiated.
    #[default]
    None,
    /// A payment intent exists and awaits the gateway's outcome.
    Pending,
    /// The gateway confirmed the payment.
    Success,
    /// The gateway reported the payment failed.
    Failure,
    /// The intent was canceled before completion.
    Canceled,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceled => "canceled",
        }
    }

    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "canceled" => Ok(Self::Canceled),
            _ => Err(DomainError::InvalidPaymentStatus {
                status: s.to_string(),
            }),
        }
    }

    /// Whether this status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Canceled)
    }

    /// Validates a transition from this status to another.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not permitted.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), DomainError> {
        let valid = match self {
            Self::None => matches!(new_status, Self::Pending),
            Self::Pending => matches!(new_status, Self::Success | Self::Failure | Self::Canceled),
            // A failed payment may be retried with a fresh intent.
            Self::Failure => matches!(new_status, Self::Pending),
            Self::Success | Self::Canceled => false,
        };

        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidPaymentTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
            })
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        let statuses = vec![
            PaymentStatus::None,
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failure,
            PaymentStatus::Canceled,
        ];

        for status in statuses {
            let s = status.as_str();
            match PaymentStatus::parse_str(s) {
                Ok(parsed) => assert_eq!(status, parsed),
                Err(e) => panic!("Failed to parse status string: {s}: {e}"),
            }
        }
    }

    #[test]
    fn test_pending_resolves_to_terminal_outcomes() {
        let pending = PaymentStatus::Pending;
        assert!(pending.validate_transition(PaymentStatus::Success).is_ok());
        assert!(pending.validate_transition(PaymentStatus::Failure).is_ok());
        assert!(pending.validate_transition(PaymentStatus::Canceled).is_ok());
        assert!(pending.validate_transition(PaymentStatus::None).is_err());
    }

    #[test]
    fn test_failure_is_retryable() {
        assert!(
            PaymentStatus::Failure
                .validate_transition(PaymentStatus::Pending)
                .is_ok()
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [PaymentStatus::Success, PaymentStatus::Canceled] {
            assert!(terminal.is_terminal());
            assert!(terminal.validate_transition(PaymentStatus::Pending).is_err());
            assert!(terminal.validate_transition(PaymentStatus::Failure).is_err());
        }
    }

    #[test]
    fn test_none_only_moves_to_pending() {
        let none = PaymentStatus::None;
        assert!(none.validate_transition(PaymentStatus::Pending).is_ok());
        assert!(none.validate_transition(PaymentStatus::Success).is_err());
    }
}
