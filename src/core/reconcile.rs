//! Reconciliation - Detects drift between templates and their instances and repairs
//! unconfirmed first occurrences.
//!
//! [`check`] and [`find_duplicates`] only read. Besides per-template drift, [`check`]
//! lists repeating operations that were never turned into templates. [`repair`] is the sole mutating entry
//! point and only ever flips `is_confirmed` on an existing first occurrence; creating a
//! missing one is left to the generator.

use super::{cadence::Cadence, policy::ConfirmationPolicy};
use crate::{
    errors::{Error, Result},
    models::{InstanceUpdate, OperationInstance, OperationTemplate},
    store::OperationStore,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// A problem found on one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Generation never ran for this template
    TemplateWithoutInstances,
    /// The anchor-date instance exists but is not confirmed
    FirstInstanceUnconfirmed {
        /// Instance to confirm
        instance_id: i64,
    },
    /// Instances exist, but none on the anchor date
    TemplateMissingFirstInstance,
    /// More than one instance on the same due date
    DuplicateInstanceDate {
        /// Shared due date
        date: NaiveDate,
        /// Ids of the clashing instances, oldest first
        instance_ids: Vec<i64>,
    },
    /// A repeating operation that is not a template, so nothing is generated from it
    LegacyRecurringOperation {
        /// Row to promote
        operation_id: i64,
        /// Date of the operation
        operation_date: NaiveDate,
        /// Raw `repeat` value
        repeat: String,
    },
}

impl Finding {
    /// Stable snake_case kind, matching the serialized tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TemplateWithoutInstances => "template_without_instances",
            Self::FirstInstanceUnconfirmed { .. } => "first_instance_unconfirmed",
            Self::TemplateMissingFirstInstance => "template_missing_first_instance",
            Self::DuplicateInstanceDate { .. } => "duplicate_instance_date",
            Self::LegacyRecurringOperation { .. } => "legacy_recurring_operation",
        }
    }

    /// Whether [`repair`] resolves this finding.
    #[must_use]
    pub const fn is_fixable(&self) -> bool {
        matches!(self, Self::FirstInstanceUnconfirmed { .. })
    }
}

/// Check result for one template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateCheck {
    /// Template id
    pub template_id: i64,
    /// Description or placeholder
    pub description: String,
    /// Template cadence
    pub cadence: Cadence,
    /// Date of the first occurrence
    pub anchor_date: NaiveDate,
    /// Live instances owned by the template
    pub instance_count: usize,
    /// Of those, confirmed ones
    pub confirmed_count: usize,
    /// Problems found, empty when consistent
    pub findings: Vec<Finding>,
}

/// Result of [`check`] for one company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    /// Company the check was scoped to
    pub company_id: String,
    /// One entry per template
    pub templates: Vec<TemplateCheck>,
    /// [`Finding::LegacyRecurringOperation`] per operation awaiting promotion
    pub legacy: Vec<Finding>,
}

impl ReconciliationReport {
    /// All findings across templates and legacy operations.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.templates
            .iter()
            .flat_map(|t| t.findings.iter())
            .chain(self.legacy.iter())
    }

    /// Findings that need a human.
    #[must_use]
    pub fn problem_count(&self) -> usize {
        self.findings().filter(|f| !f.is_fixable()).count()
    }

    /// Findings [`repair`] would resolve.
    #[must_use]
    pub fn fixable_count(&self) -> usize {
        self.findings().filter(|f| f.is_fixable()).count()
    }
}

/// Dates held by more than one instance, in date order.
fn duplicate_dates(instances: &[OperationInstance]) -> Vec<(NaiveDate, Vec<i64>)> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&OperationInstance>> = BTreeMap::new();
    for instance in instances {
        by_date.entry(instance.operation_date).or_default().push(instance);
    }

    by_date
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(date, mut group)| {
            group.sort_by_key(|i| (i.created_at, i.id));
            (date, group.iter().map(|i| i.id).collect())
        })
        .collect()
}

fn check_template(
    template: &OperationTemplate,
    instances: &[OperationInstance],
    policy: &ConfirmationPolicy,
) -> TemplateCheck {
    let mut findings = Vec::new();

    if instances.is_empty() {
        findings.push(Finding::TemplateWithoutInstances);
    } else {
        match instances
            .iter()
            .find(|i| i.operation_date == template.anchor_date)
        {
            Some(first) if !first.is_confirmed && policy.applies_to(template.cadence) => {
                findings.push(Finding::FirstInstanceUnconfirmed {
                    instance_id: first.id,
                });
            }
            Some(_) => {}
            None => findings.push(Finding::TemplateMissingFirstInstance),
        }

        findings.extend(
            duplicate_dates(instances)
                .into_iter()
                .map(|(date, instance_ids)| Finding::DuplicateInstanceDate { date, instance_ids }),
        );
    }

    TemplateCheck {
        template_id: template.id,
        description: template.label().to_string(),
        cadence: template.cadence,
        anchor_date: template.anchor_date,
        instance_count: instances.len(),
        confirmed_count: instances.iter().filter(|i| i.is_confirmed).count(),
        findings,
    }
}

/// Scans every template of the store's company and reports drift. Never mutates.
#[instrument(skip(store, policy), fields(company_id = store.company_id()))]
pub async fn check<S: OperationStore>(
    store: &S,
    policy: &ConfirmationPolicy,
) -> Result<ReconciliationReport> {
    let templates = store.find_templates_with_cadence().await?;
    let mut checks = Vec::with_capacity(templates.len());

    for template in &templates {
        let instances = store.find_instances_by_parent(template.id).await?;
        checks.push(check_template(template, &instances, policy));
    }

    let legacy = store
        .find_legacy_recurring()
        .await?
        .into_iter()
        .map(|operation| Finding::LegacyRecurringOperation {
            operation_id: operation.id,
            operation_date: operation.operation_date,
            repeat: operation.repeat,
        })
        .collect();

    let report = ReconciliationReport {
        company_id: store.company_id().to_string(),
        templates: checks,
        legacy,
    };
    info!(
        templates = report.templates.len(),
        problems = report.problem_count(),
        fixable = report.fixable_count(),
        "Reconciliation check completed"
    );
    Ok(report)
}

/// One date shared by several instances of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Owning template
    pub template_id: i64,
    /// Template description or placeholder
    pub description: String,
    /// Shared due date
    pub date: NaiveDate,
    /// Clashing instances, oldest first
    pub instance_ids: Vec<i64>,
}

/// Result of [`find_duplicates`] for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    /// Company the scan was scoped to
    pub company_id: String,
    /// Templates looked at
    pub templates_scanned: usize,
    /// One group per duplicated date
    pub groups: Vec<DuplicateGroup>,
}

/// Lists every (template, date) pair owning more than one instance.
pub async fn find_duplicates<S: OperationStore>(store: &S) -> Result<DuplicateReport> {
    let templates = store.find_templates_with_cadence().await?;
    let mut groups = Vec::new();

    for template in &templates {
        let instances = store.find_instances_by_parent(template.id).await?;
        groups.extend(
            duplicate_dates(&instances)
                .into_iter()
                .map(|(date, instance_ids)| DuplicateGroup {
                    template_id: template.id,
                    description: template.label().to_string(),
                    date,
                    instance_ids,
                }),
        );
    }

    Ok(DuplicateReport {
        company_id: store.company_id().to_string(),
        templates_scanned: templates.len(),
        groups,
    })
}

/// An instance the repair confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedInstance {
    /// Owning template
    pub template_id: i64,
    /// Confirmed instance
    pub instance_id: i64,
    /// Its date, the template's anchor
    pub date: NaiveDate,
}

/// A template whose first occurrence could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTemplate {
    /// Template id
    pub template_id: i64,
    /// Description or placeholder
    pub description: String,
    /// Date the first occurrence should have
    pub anchor_date: NaiveDate,
    /// Always `template_missing_first_instance`
    pub kind: &'static str,
}

/// A repair step that failed on a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairFailure {
    /// Template being repaired
    pub template_id: i64,
    /// Instance involved, when the lookup got that far
    pub instance_id: Option<i64>,
    /// Error kind, see [`Error::kind`]
    pub kind: &'static str,
    /// Error message
    pub message: String,
}

/// Result of [`repair`] for one company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Company the repair was scoped to
    pub company_id: String,
    /// Templates looked at
    pub templates_scanned: usize,
    /// Instances confirmed by this run
    pub fixed: Vec<FixedInstance>,
    /// First occurrences that needed nothing
    pub already_confirmed: usize,
    /// Templates whose cadence the policy exempts
    pub skipped_by_policy: usize,
    /// Templates without a first occurrence
    pub unresolved: Vec<UnresolvedTemplate>,
    /// Per-record failures
    pub failures: Vec<RepairFailure>,
}

impl RepairReport {
    /// Number of instances confirmed by this run.
    #[must_use]
    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }
}

/// Confirms the unconfirmed first occurrence of every template.
///
/// Templates without a first occurrence are reported in
/// [`RepairReport::unresolved`] and left untouched. A failure on a single record is
/// recorded and the pass continues; an unreachable store aborts it.
#[instrument(skip(store, policy), fields(company_id = store.company_id()))]
pub async fn repair<S: OperationStore>(
    store: &S,
    policy: &ConfirmationPolicy,
) -> Result<RepairReport> {
    let templates = store.find_templates_with_cadence().await?;
    let mut report = RepairReport {
        company_id: store.company_id().to_string(),
        templates_scanned: templates.len(),
        ..RepairReport::default()
    };

    for template in &templates {
        if !policy.applies_to(template.cadence) {
            report.skipped_by_policy += 1;
            continue;
        }

        let first = match store
            .find_instance_by_parent_and_date(template.id, template.anchor_date)
            .await
        {
            Ok(first) => first,
            Err(e) if e.is_recoverable() => {
                report.failures.push(failure(template.id, None, &e));
                continue;
            }
            Err(e) => return Err(e),
        };

        let Some(first) = first else {
            warn!(
                template_id = template.id,
                anchor_date = %template.anchor_date,
                "First occurrence not found"
            );
            report.unresolved.push(UnresolvedTemplate {
                template_id: template.id,
                description: template.label().to_string(),
                anchor_date: template.anchor_date,
                kind: "template_missing_first_instance",
            });
            continue;
        };

        if first.is_confirmed {
            report.already_confirmed += 1;
            continue;
        }

        info!(
            template_id = template.id,
            instance_id = first.id,
            date = %first.operation_date,
            "Confirming first occurrence"
        );
        match store
            .update_instance(first.id, InstanceUpdate::confirm())
            .await
        {
            Ok(updated) => report.fixed.push(FixedInstance {
                template_id: template.id,
                instance_id: updated.id,
                date: updated.operation_date,
            }),
            Err(e) if e.is_recoverable() => {
                warn!(instance_id = first.id, error = %e, "Confirmation failed");
                report.failures.push(failure(template.id, Some(first.id), &e));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        fixed = report.fixed_count(),
        unresolved = report.unresolved.len(),
        failed = report.failures.len(),
        "Repair completed"
    );
    Ok(report)
}

fn failure(template_id: i64, instance_id: Option<i64>, err: &Error) -> RepairFailure {
    RepairFailure {
        template_id,
        instance_id,
        kind: err.kind(),
        message: err.to_string(),
    }
}
