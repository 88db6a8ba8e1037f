// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Dialflow integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a telephony provider.
//!
//! # Components
//!
//! - [`MockTelephony`] - Telephony adapter with scripted results and request capture
//! - [`ManualClock`] - Clock whose sleeps advance time instantly
//! - [`TestHarness`] - Temp SQLite storage wired to the scheduler components

pub mod clock;
pub mod harness;
pub mod mock_telephony;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_telephony::MockTelephony;
