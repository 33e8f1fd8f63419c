//! Operation entity - Every ledger operation, recurring template and generated instance.
//!
//! A template has `is_template = true` and a `repeat` cadence other than `"none"`.
//! An instance points at its template through `recurrence_parent_id` and always
//! carries `repeat = "none"`. Rows are scoped to a tenant by `company_id`, and a
//! non-null `deleted_at` marks a soft-deleted row.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operations")]
pub struct Model {
    /// Unique identifier for the operation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning company (tenant)
    pub company_id: String,
    /// `"income"`, `"expense"` or `"transfer"`
    pub operation_type: String,
    /// Anchor date for templates, due date for instances
    pub operation_date: Date,
    /// Operation amount
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Account the money moves through
    pub account_id: Option<String>,
    /// Debited account of a transfer
    pub source_account_id: Option<String>,
    /// Credited account of a transfer
    pub target_account_id: Option<String>,
    /// Cash-flow article
    pub article_id: Option<String>,
    /// Counterparty reference
    pub counterparty_id: Option<String>,
    /// Deal the operation is booked against
    pub deal_id: Option<String>,
    /// Department the operation is booked against
    pub department_id: Option<String>,
    /// Free-form description, copied verbatim to instances
    pub description: Option<String>,
    /// Cadence: `"none"`, `"daily"`, `"weekly"`, `"monthly"`, `"quarterly"`, `"semiannual"`, `"annual"`
    pub repeat: String,
    /// Template this instance was generated from
    pub recurrence_parent_id: Option<i64>,
    /// Last date a template may generate instances for
    pub recurrence_end_date: Option<Date>,
    /// Whether a user reviewed and accepted the operation
    pub is_confirmed: bool,
    /// Whether this row is a recurring template rather than a ledger entry
    pub is_template: bool,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// Soft delete marker
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between operations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each generated instance belongs to one template
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::RecurrenceParentId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    RecurrenceParent,
}

impl ActiveModelBehavior for ActiveModel {}
