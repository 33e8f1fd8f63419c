//! Unified error type for the recurring operations core.

use chrono::NaiveDate;
use sea_orm::DbErr;
use thiserror::Error;

/// Every failure the store, the generator and the checker can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file or environment could not be used
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Raw database error that has no more specific meaning
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// The store could not be reached at all
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Underlying connection failure
        message: String,
    },

    /// An instance for this template and date already exists
    #[error("Instance for template {template_id} on {date} already exists")]
    DuplicateInstance {
        /// Owning template
        template_id: i64,
        /// Due date that is already covered
        date: NaiveDate,
    },

    /// The store refused to create a single instance
    #[error("Instance for template {template_id} on {date} rejected: {message}")]
    InstanceRejected {
        /// Owning template
        template_id: i64,
        /// Due date of the rejected instance
        date: NaiveDate,
        /// Store message
        message: String,
    },

    /// The store refused to update a single instance
    #[error("Update of instance {id} rejected: {message}")]
    UpdateRejected {
        /// Instance id
        id: i64,
        /// Store message
        message: String,
    },

    /// No live instance with this id in the current company
    #[error("Instance {id} not found")]
    InstanceNotFound {
        /// Requested id
        id: i64,
    },

    /// Row cannot be used as a recurring template
    #[error("Operation {id} is not a valid template: {reason}")]
    InvalidTemplate {
        /// Operation id (0 for a template not yet stored)
        id: i64,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown cadence string
    #[error("Invalid cadence: {value}")]
    InvalidCadence {
        /// Offending value
        value: String,
    },

    /// Amount is zero or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Offending amount
        amount: f64,
    },

    /// Window end precedes its start
    #[error("Invalid date window: {from} is after {until}")]
    InvalidWindow {
        /// Window start
        from: NaiveDate,
        /// Window end
        until: NaiveDate,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure concerns a single record, so a run may skip it and keep going.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateInstance { .. }
                | Self::InstanceRejected { .. }
                | Self::UpdateRejected { .. }
                | Self::InstanceNotFound { .. }
        )
    }

    /// Stable snake_case kind used in structured reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Database(_) => "database",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::DuplicateInstance { .. } => "duplicate_instance_date",
            Self::InstanceRejected { .. } => "instance_rejected",
            Self::UpdateRejected { .. } => "update_rejected",
            Self::InstanceNotFound { .. } => "instance_not_found",
            Self::InvalidTemplate { .. } => "invalid_template",
            Self::InvalidCadence { .. } => "invalid_cadence",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidWindow { .. } => "invalid_window",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
