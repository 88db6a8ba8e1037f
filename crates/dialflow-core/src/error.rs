// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Dialflow call scheduler.

use thiserror::Error;

/// The primary error type used across all Dialflow adapter traits and core operations.
#[derive(Debug, Error)]
pub enum DialflowError {
    /// Service configuration errors (invalid TOML values, missing adapter settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Campaign definition rejected at creation or edit time (rate, window, filter).
    #[error("invalid campaign: {0}")]
    InvalidCampaign(String),

    /// A campaign control action is not legal from the current status.
    #[error("cannot {action} a campaign that is {from}")]
    InvalidTransition { from: String, action: String },

    /// Caller-supplied input failed validation (satisfaction score, phone number).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Telephony provider rejected or failed to originate a call.
    #[error("telephony error: {message}")]
    Telephony {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DialflowError {
    /// Shorthand for a [`DialflowError::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`DialflowError::Telephony`] without an underlying source.
    pub fn telephony(message: impl Into<String>) -> Self {
        Self::Telephony {
            message: message.into(),
            source: None,
        }
    }
}
