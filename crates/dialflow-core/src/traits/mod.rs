// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the scheduler talks to.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod storage;
pub mod telephony;

pub use adapter::PluginAdapter;
pub use storage::StorageAdapter;
pub use telephony::{CallRequest, TelephonyAdapter};
