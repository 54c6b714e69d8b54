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
mod gateway;
mod tracker;
mod webhook;

pub use error::PaymentError;
pub use gateway::{
    CreateIntentRequest, GatewayIntentStatus, Intent, IntentMetadata, PaymentGateway, StubGateway,
};
pub use tracker::{DEFAULT_CURRENCY, ensure_intent, idempotency_key, intent_request, reconcile_status};
pub use webhook::{WebhookEvent, WebhookOutcome, match_webhook};
