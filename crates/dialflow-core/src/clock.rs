// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time source used by the ticker, dispatcher, and runners.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Supplies "now" and waits for a duration.
///
/// Runners never read the system clock directly so tests can drive them with
/// a manual clock.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: std::time::Duration);
}

/// Wall clock backed by `chrono::Utc` and `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}
