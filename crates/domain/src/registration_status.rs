// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Registration status tracking and transition logic.
//!
//! A registration moves through pending/success/failure states for both the
//! register and unregister directions. Failure states are recoverable: a
//! failed registration may be retried, and an unregistered user may register
//! again on the same row.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The direction of an in-flight registration mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A register (or re-register) request.
    Register,
    /// An unregister request.
    Unregister,
}

impl Operation {
    /// The pending status a row enters while this operation is in flight.
    #[must_use]
    pub const fn pending_status(self) -> RegistrationStatus {
        match self {
            Self::Register => RegistrationStatus::PendingRegister,
            Self::Unregister => RegistrationStatus::PendingUnregister,
        }
    }

    /// The failure status a row is forced to when this operation exhausts
    /// its retries.
    #[must_use]
    pub const fn failure_status(self) -> RegistrationStatus {
        match self {
            Self::Register => RegistrationStatus::FailureRegister,
            Self::Unregister => RegistrationStatus::FailureUnregister,
        }
    }
}

/// Lifecycle status of a registration row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// A register request has been accepted but not yet placed.
    PendingRegister,
    /// The user is admitted or on the waiting list.
    SuccessRegister,
    /// The register request failed after exhausting retries.
    FailureRegister,
    /// An unregister request has been accepted but not yet applied.
    PendingUnregister,
    /// The user has been unregistered.
    SuccessUnregister,
    /// The unregister request failed after exhausting retries.
    FailureUnregister,
}

impl RegistrationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingRegister => "pending_register",
            Self::SuccessRegister => "success_register",
            Self::FailureRegister => "failure_register",
            Self::PendingUnregister => "pending_unregister",
            Self::SuccessUnregister => "success_unregister",
            Self::FailureUnregister => "failure_unregister",
        }
    }

    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending_register" => Ok(Self::PendingRegister),
            "success_register" => Ok(Self::SuccessRegister),
            "failure_register" => Ok(Self::FailureRegister),
            "pending_unregister" => Ok(Self::PendingUnregister),
            "success_unregister" => Ok(Self::SuccessUnregister),
            "failure_unregister" => Ok(Self::FailureUnregister),
            _ => Err(DomainError::InvalidRegistrationStatus {
                status: s.to_string(),
            }),
        }
    }

    /// Whether a register/unregister mutation is currently in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::PendingRegister | Self::PendingUnregister)
    }

    /// Validates a transition from this status to another.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not permitted by the status
    /// lifecycle rules.
    pub fn validate_transition(&self, new_status: Self) -> Result<(), DomainError> {
        let valid = match self {
            Self::PendingRegister => {
                matches!(new_status, Self::SuccessRegister | Self::FailureRegister)
            }
            Self::SuccessRegister => {
                matches!(new_status, Self::PendingUnregister | Self::SuccessUnregister)
            }
            // A failed registration may be retried, either through a fresh
            // pending phase or directly.
            Self::FailureRegister => {
                matches!(new_status, Self::PendingRegister | Self::SuccessRegister)
            }
            Self::PendingUnregister => {
                matches!(new_status, Self::SuccessUnregister | Self::FailureUnregister)
            }
            // An unregistered user may register again on the same row.
            Self::SuccessUnregister => {
                matches!(new_status, Self::PendingRegister | Self::SuccessRegister)
            }
            Self::FailureUnregister => {
                matches!(new_status, Self::PendingUnregister | Self::SuccessUnregister)
            }
        };

        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: new_status.as_str().to_string(),
            })
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
