// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Dialflow call scheduler.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries for agents,
//! customers, campaigns, call sessions, and scheduled callbacks.
//!
//! All writes go through the one background thread owned by [`Database`].
//! Conditional writes (the open-session guard, campaign status changes,
//! outcome application) are single statements or transactions on that
//! thread, so there is no read-then-write window between concurrent callers.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
