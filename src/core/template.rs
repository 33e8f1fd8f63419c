//! Template creation - Validates a recurring operation and stores it with its first
//! occurrence in one atomic store call.

use super::policy::ConfirmationPolicy;
use crate::{
    errors::{Error, Result},
    models::{NewTemplate, OperationTemplate},
    store::OperationStore,
};
use tracing::{info, instrument};

/// Creates a recurring template and its first instance on the anchor date.
///
/// The first instance is confirmed when `policy` applies to the template's cadence.
/// When the first instance cannot be stored, the template is not stored either.
///
/// # Errors
/// - [`Error::InvalidTemplate`] when the cadence is `none` or the end date precedes
///   the anchor date
/// - [`Error::InvalidAmount`] when the amount is zero or not finite
#[instrument(skip(store, template, policy), fields(company_id = store.company_id()))]
pub async fn create_recurring_operation<S: OperationStore>(
    store: &S,
    template: NewTemplate,
    policy: &ConfirmationPolicy,
) -> Result<OperationTemplate> {
    validate(&template)?;

    let confirmed = policy.applies_to(template.cadence);
    let (created, first) = store
        .create_template_with_first_instance(template, confirmed)
        .await?;

    info!(
        template_id = created.id,
        instance_id = first.id,
        cadence = %created.cadence,
        "Created recurring template"
    );
    Ok(created)
}

fn validate(template: &NewTemplate) -> Result<()> {
    if !template.cadence.is_recurring() {
        return Err(Error::InvalidTemplate {
            id: 0,
            reason: "cadence must not be none".to_string(),
        });
    }

    if template.amount == 0.0 || !template.amount.is_finite() {
        return Err(Error::InvalidAmount {
            amount: template.amount,
        });
    }

    if template
        .end_date
        .is_some_and(|end| end < template.anchor_date)
    {
        return Err(Error::InvalidTemplate {
            id: 0,
            reason: "end date precedes the anchor date".to_string(),
        });
    }

    Ok(())
}
