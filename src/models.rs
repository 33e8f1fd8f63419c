//! Domain views of operation rows.
//!
//! The store hands out these types instead of raw entity models so the generator
//! and the checker never have to re-validate template invariants.

use crate::{
    core::cadence::Cadence,
    entities::operation,
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Ledger references an instance inherits from its template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerRefs {
    /// Account the money moves through
    pub account_id: Option<String>,
    /// Debited account of a transfer
    pub source_account_id: Option<String>,
    /// Credited account of a transfer
    pub target_account_id: Option<String>,
    /// Cash-flow article
    pub article_id: Option<String>,
    /// Counterparty
    pub counterparty_id: Option<String>,
    /// Deal
    pub deal_id: Option<String>,
    /// Department
    pub department_id: Option<String>,
}

impl LedgerRefs {
    fn from_model(model: &mut operation::Model) -> Self {
        Self {
            account_id: model.account_id.take(),
            source_account_id: model.source_account_id.take(),
            target_account_id: model.target_account_id.take(),
            article_id: model.article_id.take(),
            counterparty_id: model.counterparty_id.take(),
            deal_id: model.deal_id.take(),
            department_id: model.department_id.take(),
        }
    }
}

/// A recurring operation template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationTemplate {
    /// Row id
    pub id: i64,
    /// Owning company
    pub company_id: String,
    /// `"income"`, `"expense"` or `"transfer"`
    pub operation_type: String,
    /// First due date; the instance on this date is the "first occurrence"
    pub anchor_date: NaiveDate,
    /// Amount copied to every instance
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Accounts, article and other references copied to every instance
    #[serde(flatten)]
    pub refs: LedgerRefs,
    /// Free-form description
    pub description: Option<String>,
    /// Never [`Cadence::None`]
    pub cadence: Cadence,
    /// Last date instances are generated for
    pub end_date: Option<NaiveDate>,
}

impl OperationTemplate {
    /// Description for reports, falling back to a placeholder.
    #[must_use]
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or("(без описания)")
    }
}

impl TryFrom<operation::Model> for OperationTemplate {
    type Error = Error;

    fn try_from(mut model: operation::Model) -> Result<Self> {
        let id = model.id;
        let invalid = |reason: &str| Error::InvalidTemplate {
            id,
            reason: reason.to_string(),
        };

        if !model.is_template {
            return Err(invalid("not flagged as a template"));
        }
        if model.recurrence_parent_id.is_some() {
            return Err(invalid("a template cannot have a recurrence parent"));
        }
        let cadence: Cadence = model.repeat.parse()?;
        if !cadence.is_recurring() {
            return Err(invalid("cadence is none"));
        }

        let refs = LedgerRefs::from_model(&mut model);
        Ok(Self {
            id,
            company_id: model.company_id,
            operation_type: model.operation_type,
            anchor_date: model.operation_date,
            amount: model.amount,
            currency: model.currency,
            refs,
            description: model.description,
            cadence,
            end_date: model.recurrence_end_date,
        })
    }
}

/// A dated occurrence generated from a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationInstance {
    /// Row id
    pub id: i64,
    /// Template the instance was generated from
    pub template_id: i64,
    /// Due date
    pub operation_date: NaiveDate,
    /// Whether a user accepted the operation
    pub is_confirmed: bool,
    /// Amount
    pub amount: f64,
    /// References copied from the template
    #[serde(flatten)]
    pub refs: LedgerRefs,
    /// Description copied from the template
    pub description: Option<String>,
    /// Creation time, used to order duplicates
    pub created_at: DateTime<Utc>,
}

impl TryFrom<operation::Model> for OperationInstance {
    type Error = Error;

    fn try_from(mut model: operation::Model) -> Result<Self> {
        let template_id = model.recurrence_parent_id.ok_or_else(|| Error::InvalidTemplate {
            id: model.id,
            reason: "instance has no recurrence parent".to_string(),
        })?;

        let refs = LedgerRefs::from_model(&mut model);
        Ok(Self {
            id: model.id,
            template_id,
            operation_date: model.operation_date,
            is_confirmed: model.is_confirmed,
            amount: model.amount,
            refs,
            description: model.description,
            created_at: model.created_at,
        })
    }
}

/// An operation that repeats but was never turned into a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyRecurring {
    /// Row id
    pub id: i64,
    /// Date of the operation, the anchor once promoted
    pub operation_date: NaiveDate,
    /// Raw `repeat` value, possibly not a known cadence
    pub repeat: String,
    /// Amount
    pub amount: f64,
    /// Description
    pub description: Option<String>,
}

impl From<operation::Model> for LegacyRecurring {
    fn from(model: operation::Model) -> Self {
        Self {
            id: model.id,
            operation_date: model.operation_date,
            repeat: model.repeat,
            amount: model.amount,
            description: model.description,
        }
    }
}

/// Fields of an instance about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    /// Owning template
    pub template_id: i64,
    /// Copied from the template
    pub operation_type: String,
    /// Due date
    pub operation_date: NaiveDate,
    /// Copied from the template
    pub amount: f64,
    /// Copied from the template
    pub currency: String,
    /// Copied from the template
    pub refs: LedgerRefs,
    /// Copied from the template
    pub description: Option<String>,
    /// Confirmation state at creation
    pub is_confirmed: bool,
}

impl NewInstance {
    /// Copies the template's ledger fields onto a new occurrence dated `date`.
    #[must_use]
    pub fn from_template(template: &OperationTemplate, date: NaiveDate, confirmed: bool) -> Self {
        Self {
            template_id: template.id,
            operation_type: template.operation_type.clone(),
            operation_date: date,
            amount: template.amount,
            currency: template.currency.clone(),
            refs: template.refs.clone(),
            description: template.description.clone(),
            is_confirmed: confirmed,
        }
    }
}

/// Fields of a template about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    /// `"income"`, `"expense"` or `"transfer"`
    pub operation_type: String,
    /// First due date
    pub anchor_date: NaiveDate,
    /// Non-zero amount
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Accounts, article and other references
    pub refs: LedgerRefs,
    /// Free-form description
    pub description: Option<String>,
    /// Must repeat
    pub cadence: Cadence,
    /// Optional last due date, not before the anchor
    pub end_date: Option<NaiveDate>,
}

/// Partial update of an instance; `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceUpdate {
    /// New confirmation state
    pub is_confirmed: Option<bool>,
}

impl InstanceUpdate {
    /// Update that only marks the instance confirmed.
    #[must_use]
    pub const fn confirm() -> Self {
        Self {
            is_confirmed: Some(true),
        }
    }
}
