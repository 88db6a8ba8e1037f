// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Dialflow outbound call scheduler.
//!
//! This crate provides the domain types, error type, clock abstraction, and
//! adapter traits used throughout the Dialflow workspace. Storage and
//! telephony backends implement the traits defined here.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::DialflowError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{CallRequest, PluginAdapter, StorageAdapter, TelephonyAdapter};
