//! Legacy migration - Promotes repeating operations that predate templates.
//!
//! Before templates existed a repeating operation was stored as a plain ledger row
//! with `repeat != "none"`. Such rows are invisible to the generator until they are
//! flagged as templates. Promotion keeps the row's date as the anchor; the first
//! instance is created by the next `generate` run.

use super::cadence::Cadence;
use crate::{errors::Result, store::OperationStore};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// A legacy operation that is now a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotedTemplate {
    /// Id of the row, unchanged by promotion
    pub template_id: i64,
    /// Parsed cadence
    pub cadence: Cadence,
    /// Date of the legacy operation
    pub anchor_date: NaiveDate,
    /// Amount
    pub amount: f64,
    /// Description or placeholder
    pub description: String,
}

/// A legacy operation left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLegacy {
    /// Row id
    pub operation_id: i64,
    /// Raw `repeat` value
    pub repeat: String,
    /// Why it was not promoted
    pub reason: String,
}

/// Result of [`migrate_legacy`] for one company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Company the run was scoped to
    pub company_id: String,
    /// Legacy operations found
    pub found: usize,
    /// Operations flagged as templates
    pub promoted: Vec<PromotedTemplate>,
    /// Operations with a `repeat` value that is not a known cadence
    pub skipped: Vec<SkippedLegacy>,
}

/// Flags every legacy repeating operation of the store's company as a template.
///
/// Rows whose `repeat` value does not parse are reported and left as they are.
/// Running it again finds nothing left to promote.
#[instrument(skip(store), fields(company_id = store.company_id()))]
pub async fn migrate_legacy<S: OperationStore>(store: &S) -> Result<MigrationReport> {
    let legacy = store.find_legacy_recurring().await?;
    let mut eligible = Vec::with_capacity(legacy.len());
    let mut skipped = Vec::new();

    for operation in &legacy {
        let reason = match operation.repeat.parse::<Cadence>() {
            Ok(cadence) if cadence.is_recurring() => {
                eligible.push(operation.id);
                continue;
            }
            Ok(_) => "cadence is none".to_string(),
            Err(e) => e.to_string(),
        };
        warn!(operation_id = operation.id, repeat = %operation.repeat, "Not promoting legacy operation");
        skipped.push(SkippedLegacy {
            operation_id: operation.id,
            repeat: operation.repeat.clone(),
            reason,
        });
    }

    let promoted: Vec<PromotedTemplate> = store
        .promote_to_templates(&eligible)
        .await?
        .into_iter()
        .map(|template| PromotedTemplate {
            template_id: template.id,
            cadence: template.cadence,
            anchor_date: template.anchor_date,
            amount: template.amount,
            description: template.label().to_string(),
        })
        .collect();

    info!(
        found = legacy.len(),
        promoted = promoted.len(),
        skipped = skipped.len(),
        "Legacy migration completed"
    );
    Ok(MigrationReport {
        company_id: store.company_id().to_string(),
        found: legacy.len(),
        promoted,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            cadence::DateWindow, generator::generate_all, policy::ConfirmationPolicy,
            reconcile::{Finding, check},
        },
        store::SeaOrmStore,
        test_utils::{MemoryStore, date, insert_legacy_row, setup_test_db},
    };

    #[tokio::test]
    async fn test_promotes_known_cadences_and_skips_the_rest() -> Result<()> {
        let store = MemoryStore::new("acme");
        let rent = store.add_legacy("monthly", date(2023, 5, 10));
        let odd = store.add_legacy("fortnightly", date(2023, 6, 1));

        let report = migrate_legacy(&store).await?;
        assert_eq!(report.found, 2);
        assert_eq!(report.promoted.len(), 1);
        assert_eq!(report.promoted[0].template_id, rent.id);
        assert_eq!(report.promoted[0].cadence, Cadence::Monthly);
        assert_eq!(report.promoted[0].anchor_date, date(2023, 5, 10));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].operation_id, odd.id);

        let again = migrate_legacy(&store).await?;
        assert_eq!(again.found, 1);
        assert!(again.promoted.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_migration_is_scoped_to_company() -> Result<()> {
        let db = setup_test_db().await?;
        insert_legacy_row(&db, "acme", "weekly", date(2024, 1, 1)).await?;
        let foreign = insert_legacy_row(&db, "globex", "weekly", date(2024, 1, 1)).await?;

        let report = migrate_legacy(&SeaOrmStore::new(db.clone(), "acme")).await?;
        assert_eq!(report.promoted.len(), 1);

        let globex = SeaOrmStore::new(db, "globex");
        let remaining = globex.find_legacy_recurring().await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, foreign.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_promoted_template_is_generated_and_checked() -> Result<()> {
        let db = setup_test_db().await?;
        insert_legacy_row(&db, "acme", "monthly", date(2024, 1, 15)).await?;
        let store = SeaOrmStore::new(db, "acme");
        let policy = ConfirmationPolicy::default();

        let before = check(&store, &policy).await?;
        assert!(before.templates.is_empty());
        assert!(matches!(
            before.legacy.as_slice(),
            [Finding::LegacyRecurringOperation { .. }]
        ));

        migrate_legacy(&store).await?;
        let window = DateWindow::through(date(2024, 3, 15));
        let run = generate_all(&store, window, &policy).await?;
        assert_eq!(run.created_count(), 3);

        let after = check(&store, &policy).await?;
        assert!(after.legacy.is_empty());
        assert!(after.findings().next().is_none());
        Ok(())
    }
}
