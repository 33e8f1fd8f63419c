//! Instance generation - Turns templates into dated instances.
//!
//! For every due date of a template inside the requested window, exactly one instance
//! must exist. Missing ones are created with the template's ledger fields copied over;
//! dates already covered are left alone, which makes a re-run over the same window a
//! no-op. The instance on the anchor date is confirmed when the confirmation policy
//! applies to the template's cadence.
//!
//! A failure that concerns a single date (duplicate from a concurrent run, a rejected
//! insert) is recorded and the run moves on. Anything else, notably an unreachable
//! store, aborts the run.

use super::{cadence::DateWindow, policy::ConfirmationPolicy};
use crate::{
    errors::{Error, Result},
    models::{InstanceUpdate, NewInstance, OperationInstance, OperationTemplate},
    store::OperationStore,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// A due date that could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateFailure {
    /// Due date that was skipped
    pub date: NaiveDate,
    /// Structured kind, e.g. `duplicate_instance_date`
    pub kind: &'static str,
    /// Store message
    pub message: String,
}

impl DateFailure {
    fn new(date: NaiveDate, err: &Error) -> Self {
        Self {
            date,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of generating one template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    /// Template the instances belong to
    pub template_id: i64,
    /// Template description, for presentation
    pub description: String,
    /// Instances created by this run
    pub created: Vec<OperationInstance>,
    /// Due dates that already had an instance
    pub already_present: Vec<NaiveDate>,
    /// Ids of pre-existing first-occurrence instances this run confirmed
    pub confirmed_existing: Vec<i64>,
    /// Dates skipped because of a per-date failure
    pub failures: Vec<DateFailure>,
}

impl GenerationReport {
    fn new(template: &OperationTemplate) -> Self {
        Self {
            template_id: template.id,
            description: template.label().to_string(),
            created: Vec::new(),
            already_present: Vec::new(),
            confirmed_existing: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Outcome of generating every template of a company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRun {
    /// Company the run was scoped to
    pub company_id: String,
    /// Requested window
    pub window: DateWindow,
    /// One report per template, in store order
    pub templates: Vec<GenerationReport>,
}

impl GenerationRun {
    /// Number of instances created across all templates.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.templates.iter().map(|t| t.created.len()).sum()
    }

    /// Number of due dates that were already covered.
    #[must_use]
    pub fn already_present_count(&self) -> usize {
        self.templates.iter().map(|t| t.already_present.len()).sum()
    }

    /// Number of skipped dates across all templates.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.templates.iter().map(|t| t.failures.len()).sum()
    }
}

/// Creates the missing instances of `template` inside `window`.
///
/// # Errors
/// Returns the first non-recoverable store error; per-date failures are reported in
/// [`GenerationReport::failures`] instead.
#[instrument(skip(store, template, policy), fields(template_id = template.id))]
pub async fn generate_for_template<S: OperationStore>(
    store: &S,
    template: &OperationTemplate,
    window: DateWindow,
    policy: &ConfirmationPolicy,
) -> Result<GenerationReport> {
    let existing = store.find_instances_by_parent(template.id).await?;
    let mut existing_by_date: HashMap<NaiveDate, &OperationInstance> = HashMap::new();
    for instance in &existing {
        existing_by_date.entry(instance.operation_date).or_insert(instance);
    }

    let confirm_first = policy.applies_to(template.cadence);
    let mut report = GenerationReport::new(template);

    for date in template
        .cadence
        .due_dates(template.anchor_date, window, template.end_date)
    {
        let is_first = date == template.anchor_date;

        if let Some(instance) = existing_by_date.get(&date) {
            debug!(%date, instance_id = instance.id, "Instance already exists");
            report.already_present.push(date);

            if is_first && confirm_first && !instance.is_confirmed {
                match store
                    .update_instance(instance.id, InstanceUpdate::confirm())
                    .await
                {
                    Ok(_) => {
                        info!(instance_id = instance.id, "Confirmed existing first occurrence");
                        report.confirmed_existing.push(instance.id);
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(%date, error = %e, "Could not confirm first occurrence");
                        report.failures.push(DateFailure::new(date, &e));
                    }
                    Err(e) => return Err(e),
                }
            }
            continue;
        }

        let new_instance = NewInstance::from_template(template, date, is_first && confirm_first);
        match store.create_instance(new_instance).await {
            Ok(created) => {
                info!(
                    %date,
                    instance_id = created.id,
                    amount = template.amount,
                    confirmed = created.is_confirmed,
                    "Created recurring operation"
                );
                report.created.push(created);
            }
            Err(e) if e.is_recoverable() => {
                warn!(%date, kind = e.kind(), error = %e, "Skipping due date");
                report.failures.push(DateFailure::new(date, &e));
            }
            Err(e) => {
                error!(%date, error = %e, "Aborting generation");
                return Err(e);
            }
        }
    }

    Ok(report)
}

/// Runs [`generate_for_template`] for every template of the store's company.
pub async fn generate_all<S: OperationStore>(
    store: &S,
    window: DateWindow,
    policy: &ConfirmationPolicy,
) -> Result<GenerationRun> {
    let templates = store.find_templates_with_cadence().await?;
    info!(
        company_id = store.company_id(),
        templates = templates.len(),
        until = %window.until,
        "Starting recurring operations generation"
    );

    let mut run = GenerationRun {
        company_id: store.company_id().to_string(),
        window,
        templates: Vec::with_capacity(templates.len()),
    };

    for template in &templates {
        let report = generate_for_template(store, template, window, policy).await?;
        run.templates.push(report);
    }

    info!(
        company_id = store.company_id(),
        created = run.created_count(),
        skipped = run.already_present_count(),
        failed = run.failure_count(),
        "Recurring operations generation completed"
    );
    Ok(run)
}
