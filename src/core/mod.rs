//! Core business logic - framework-agnostic generation and reconciliation of
//! recurring operations. Everything here talks to storage through
//! [`crate::store::OperationStore`].

/// Cadence arithmetic and date windows
pub mod cadence;
/// Instance generation from templates
pub mod generator;
/// Promotion of repeating operations that predate templates
pub mod migrate;
/// First-occurrence confirmation policy
pub mod policy;
/// Drift detection and first-occurrence repair
pub mod reconcile;
/// Text and JSON rendering of reports
pub mod summary;
/// Recurring template creation
pub mod template;
