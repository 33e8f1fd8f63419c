//! Shared test utilities.
//!
//! Provides an in-memory `SQLite` database with the schema applied, row builders with
//! sensible defaults, and [`MemoryStore`], an in-memory [`OperationStore`] with
//! failure injection for the error paths `SQLite` cannot easily produce.
#![allow(clippy::unwrap_used)]

use crate::{
    core::cadence::Cadence,
    entities::operation,
    errors::{Error, Result},
    models::{
        InstanceUpdate, LedgerRefs, LegacyRecurring, NewInstance, NewTemplate, OperationInstance,
        OperationTemplate,
    },
    store::{OperationStore, SeaOrmStore},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A template row with sensible defaults.
///
/// # Defaults
/// * anchor date: 2024-01-15
/// * amount: 15352.0 RUB, expense
/// * description: "Аренда офиса"
pub fn template_model(id: i64, company_id: &str, repeat: &str) -> operation::Model {
    operation::Model {
        id,
        company_id: company_id.to_string(),
        operation_type: "expense".to_string(),
        operation_date: date(2024, 1, 15),
        amount: 15352.0,
        currency: "RUB".to_string(),
        account_id: Some("acc-main".to_string()),
        source_account_id: None,
        target_account_id: None,
        article_id: Some("art-rent".to_string()),
        counterparty_id: None,
        deal_id: None,
        department_id: None,
        description: Some("Аренда офиса".to_string()),
        repeat: repeat.to_string(),
        recurrence_parent_id: None,
        recurrence_end_date: None,
        is_confirmed: false,
        is_template: true,
        created_at: Utc::now(),
        deleted_at: None,
    }
}

fn instance_model(
    company_id: &str,
    template_id: i64,
    operation_date: NaiveDate,
    is_confirmed: bool,
) -> operation::Model {
    operation::Model {
        operation_date,
        repeat: Cadence::None.as_str().to_string(),
        recurrence_parent_id: Some(template_id),
        is_confirmed,
        is_template: false,
        ..template_model(0, company_id, "none")
    }
}

fn active_row(model: operation::Model) -> operation::ActiveModel {
    operation::ActiveModel {
        company_id: Set(model.company_id),
        operation_type: Set(model.operation_type),
        operation_date: Set(model.operation_date),
        amount: Set(model.amount),
        currency: Set(model.currency),
        account_id: Set(model.account_id),
        source_account_id: Set(model.source_account_id),
        target_account_id: Set(model.target_account_id),
        article_id: Set(model.article_id),
        counterparty_id: Set(model.counterparty_id),
        deal_id: Set(model.deal_id),
        department_id: Set(model.department_id),
        description: Set(model.description),
        repeat: Set(model.repeat),
        recurrence_parent_id: Set(model.recurrence_parent_id),
        recurrence_end_date: Set(model.recurrence_end_date),
        is_confirmed: Set(model.is_confirmed),
        is_template: Set(model.is_template),
        created_at: Set(model.created_at),
        deleted_at: Set(model.deleted_at),
        ..Default::default()
    }
}

/// Inserts a template row directly, bypassing validation (any `repeat` string).
pub async fn insert_template_row(
    db: &DatabaseConnection,
    company_id: &str,
    repeat: &str,
    anchor: NaiveDate,
) -> Result<operation::Model> {
    let model = operation::Model {
        operation_date: anchor,
        ..template_model(0, company_id, repeat)
    };
    Ok(active_row(model).insert(db).await?)
}

/// Inserts a repeating operation that was never flagged as a template.
pub async fn insert_legacy_row(
    db: &DatabaseConnection,
    company_id: &str,
    repeat: &str,
    operation_date: NaiveDate,
) -> Result<operation::Model> {
    Ok(active_row(legacy_model(company_id, repeat, operation_date))
        .insert(db)
        .await?)
}

fn legacy_model(company_id: &str, repeat: &str, operation_date: NaiveDate) -> operation::Model {
    operation::Model {
        operation_date,
        is_template: false,
        is_confirmed: true,
        ..template_model(0, company_id, repeat)
    }
}

/// Inserts an instance row of `template` directly.
pub async fn insert_instance_row(
    db: &DatabaseConnection,
    template: &operation::Model,
    operation_date: NaiveDate,
    is_confirmed: bool,
) -> Result<operation::Model> {
    let model = operation::Model {
        operation_type: template.operation_type.clone(),
        amount: template.amount,
        currency: template.currency.clone(),
        description: template.description.clone(),
        ..instance_model(&template.company_id, template.id, operation_date, is_confirmed)
    };
    Ok(active_row(model).insert(db).await?)
}

/// A valid template definition with the same defaults as [`template_model`].
pub fn new_template(cadence: Cadence, anchor: NaiveDate) -> NewTemplate {
    NewTemplate {
        operation_type: "expense".to_string(),
        anchor_date: anchor,
        amount: 15352.0,
        currency: "RUB".to_string(),
        refs: LedgerRefs {
            account_id: Some("acc-main".to_string()),
            article_id: Some("art-rent".to_string()),
            ..LedgerRefs::default()
        },
        description: Some("Аренда офиса".to_string()),
        cadence,
        end_date: None,
    }
}

/// Sets up a database and a store for `company_id` holding one template without
/// any instances.
pub async fn setup_with_template(
    company_id: &str,
    cadence: Cadence,
    anchor: NaiveDate,
) -> Result<(DatabaseConnection, SeaOrmStore, OperationTemplate)> {
    let db = setup_test_db().await?;
    let row = insert_template_row(&db, company_id, cadence.as_str(), anchor).await?;
    let template = OperationTemplate::try_from(row)?;
    Ok((db.clone(), SeaOrmStore::new(db, company_id), template))
}

/// Failure injected into [`MemoryStore`] writes.
#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    /// Behaves like a concurrent run won the race
    Duplicate,
    /// Behaves like a rejected write
    Rejected,
    /// Behaves like the row was deleted concurrently
    Missing,
    /// Behaves like the connection dropped
    Unavailable,
}

fn unavailable() -> Error {
    Error::StoreUnavailable {
        message: "connection refused".to_string(),
    }
}

impl FailureMode {
    fn create_error(self, template_id: i64, date: NaiveDate) -> Error {
        match self {
            Self::Duplicate => Error::DuplicateInstance { template_id, date },
            Self::Rejected | Self::Missing => Error::InstanceRejected {
                template_id,
                date,
                message: "injected failure".to_string(),
            },
            Self::Unavailable => unavailable(),
        }
    }

    fn update_error(self, id: i64) -> Error {
        match self {
            Self::Missing => Error::InstanceNotFound { id },
            Self::Duplicate | Self::Rejected => Error::UpdateRejected {
                id,
                message: "injected failure".to_string(),
            },
            Self::Unavailable => unavailable(),
        }
    }
}

/// In-memory [`OperationStore`] for one company.
pub struct MemoryStore {
    company_id: String,
    rows: Mutex<Vec<operation::Model>>,
    create_failures: Mutex<HashMap<NaiveDate, FailureMode>>,
    update_failures: Mutex<HashMap<i64, FailureMode>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Empty store for `company_id`.
    pub fn new(company_id: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            rows: Mutex::new(Vec::new()),
            create_failures: Mutex::new(HashMap::new()),
            update_failures: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    fn push(&self, mut model: operation::Model) -> operation::Model {
        let mut rows = self.rows.lock().unwrap();
        model.id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        rows.push(model.clone());
        model
    }

    /// Adds a template of this company anchored at `anchor`.
    pub fn add_template(&self, cadence: Cadence, anchor: NaiveDate) -> OperationTemplate {
        let mut model = template_model(0, &self.company_id, cadence.as_str());
        model.operation_date = anchor;
        OperationTemplate::try_from(self.push(model)).unwrap()
    }

    /// Adds an instance without any uniqueness check, like legacy data would.
    pub fn add_instance(
        &self,
        template_id: i64,
        operation_date: NaiveDate,
        is_confirmed: bool,
    ) -> OperationInstance {
        let model = instance_model(&self.company_id, template_id, operation_date, is_confirmed);
        OperationInstance::try_from(self.push(model)).unwrap()
    }

    /// Makes creation on `date` fail with `mode`.
    pub fn fail_create_on(&self, date: NaiveDate, mode: FailureMode) {
        self.create_failures.lock().unwrap().insert(date, mode);
    }

    /// Adds a repeating operation that was never flagged as a template.
    pub fn add_legacy(&self, repeat: &str, operation_date: NaiveDate) -> LegacyRecurring {
        LegacyRecurring::from(self.push(legacy_model(&self.company_id, repeat, operation_date)))
    }

    /// Makes updates of instance `id` fail with `mode`.
    pub fn fail_update_of(&self, id: i64, mode: FailureMode) {
        self.update_failures.lock().unwrap().insert(id, mode);
    }

    /// Simulates losing the connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every row, including other state the store hides.
    pub fn rows(&self) -> Vec<operation::Model> {
        self.rows.lock().unwrap().clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn live(&self) -> Vec<operation::Model> {
        self.rows()
            .into_iter()
            .filter(|r| r.company_id == self.company_id && r.deleted_at.is_none())
            .collect()
    }

    fn live_instances_of(&self, template_id: i64) -> Vec<operation::Model> {
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| !r.is_template && r.recurrence_parent_id == Some(template_id))
            .collect();
        rows.sort_by_key(|r| (r.operation_date, r.id));
        rows
    }
}

impl OperationStore for MemoryStore {
    fn company_id(&self) -> &str {
        &self.company_id
    }

    async fn find_templates_with_cadence(&self) -> Result<Vec<OperationTemplate>> {
        self.ensure_available()?;
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(|r| r.is_template && r.repeat != Cadence::None.as_str())
            .collect();
        rows.sort_by_key(|r| (r.operation_date, r.id));
        Ok(rows
            .into_iter()
            .filter_map(|r| OperationTemplate::try_from(r).ok())
            .collect())
    }

    async fn find_instances_by_parent(&self, template_id: i64) -> Result<Vec<OperationInstance>> {
        self.ensure_available()?;
        self.live_instances_of(template_id)
            .into_iter()
            .map(OperationInstance::try_from)
            .collect()
    }

    async fn find_instance_by_parent_and_date(
        &self,
        template_id: i64,
        date: NaiveDate,
    ) -> Result<Option<OperationInstance>> {
        self.ensure_available()?;
        self.live_instances_of(template_id)
            .into_iter()
            .find(|r| r.operation_date == date)
            .map(OperationInstance::try_from)
            .transpose()
    }

    async fn update_instance(&self, id: i64, update: InstanceUpdate) -> Result<OperationInstance> {
        self.ensure_available()?;
        if let Some(mode) = self.update_failures.lock().unwrap().get(&id).copied() {
            return Err(mode.update_error(id));
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| {
                r.id == id
                    && r.company_id == self.company_id
                    && r.deleted_at.is_none()
                    && r.recurrence_parent_id.is_some()
            })
            .ok_or(Error::InstanceNotFound { id })?;
        if let Some(is_confirmed) = update.is_confirmed {
            row.is_confirmed = is_confirmed;
        }
        OperationInstance::try_from(row.clone())
    }

    async fn create_instance(&self, instance: NewInstance) -> Result<OperationInstance> {
        self.ensure_available()?;
        let template_id = instance.template_id;
        let date = instance.operation_date;

        if let Some(mode) = self.create_failures.lock().unwrap().get(&date).copied() {
            return Err(mode.create_error(template_id, date));
        }

        let rows = self.rows();
        let parent_exists = rows.iter().any(|r| {
            r.id == template_id
                && r.is_template
                && r.company_id == self.company_id
                && r.deleted_at.is_none()
        });
        if !parent_exists {
            return Err(Error::InstanceRejected {
                template_id,
                date,
                message: "template not found in company".to_string(),
            });
        }
        if rows
            .iter()
            .any(|r| r.recurrence_parent_id == Some(template_id) && r.operation_date == date)
        {
            return Err(Error::DuplicateInstance { template_id, date });
        }

        let model = operation::Model {
            operation_type: instance.operation_type,
            amount: instance.amount,
            currency: instance.currency,
            description: instance.description,
            ..with_refs(
                instance.refs,
                instance_model(&self.company_id, template_id, date, instance.is_confirmed),
            )
        };
        OperationInstance::try_from(self.push(model))
    }

    async fn create_template_with_first_instance(
        &self,
        template: NewTemplate,
        confirm_first: bool,
    ) -> Result<(OperationTemplate, OperationInstance)> {
        self.ensure_available()?;
        let anchor = template.anchor_date;

        // Nothing is stored unless the first instance can be stored as well
        if let Some(mode) = self.create_failures.lock().unwrap().get(&anchor).copied() {
            return Err(mode.create_error(0, anchor));
        }

        let mut rows = self.rows.lock().unwrap();
        let template_id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let template_row = operation::Model {
            id: template_id,
            operation_type: template.operation_type,
            operation_date: anchor,
            amount: template.amount,
            currency: template.currency,
            description: template.description,
            recurrence_end_date: template.end_date,
            ..with_refs(
                template.refs,
                template_model(0, &self.company_id, template.cadence.as_str()),
            )
        };
        let created = OperationTemplate::try_from(template_row.clone())?;

        let first = NewInstance::from_template(&created, anchor, confirm_first);
        let instance_row = operation::Model {
            id: template_id + 1,
            operation_type: first.operation_type,
            amount: first.amount,
            currency: first.currency,
            description: first.description,
            ..with_refs(
                first.refs,
                instance_model(&self.company_id, template_id, anchor, first.is_confirmed),
            )
        };
        rows.push(template_row);
        rows.push(instance_row.clone());
        drop(rows);

        Ok((created, OperationInstance::try_from(instance_row)?))
    }

    async fn find_legacy_recurring(&self) -> Result<Vec<LegacyRecurring>> {
        self.ensure_available()?;
        let mut rows: Vec<_> = self
            .live()
            .into_iter()
            .filter(is_legacy)
            .collect();
        rows.sort_by_key(|r| (r.operation_date, r.id));
        Ok(rows.into_iter().map(LegacyRecurring::from).collect())
    }

    async fn promote_to_templates(&self, ids: &[i64]) -> Result<Vec<OperationTemplate>> {
        self.ensure_available()?;
        let mut rows = self.rows.lock().unwrap();
        let mut promoted = Vec::new();
        for row in rows.iter_mut().filter(|r| {
            ids.contains(&r.id)
                && r.company_id == self.company_id
                && r.deleted_at.is_none()
                && is_legacy(r)
        }) {
            row.is_template = true;
            promoted.push(row.clone());
        }
        drop(rows);

        promoted.sort_by_key(|r| (r.operation_date, r.id));
        promoted.into_iter().map(OperationTemplate::try_from).collect()
    }
}

fn is_legacy(row: &operation::Model) -> bool {
    !row.is_template && row.recurrence_parent_id.is_none() && row.repeat != Cadence::None.as_str()
}

fn with_refs(refs: LedgerRefs, model: operation::Model) -> operation::Model {
    operation::Model {
        account_id: refs.account_id,
        source_account_id: refs.source_account_id,
        target_account_id: refs.target_account_id,
        article_id: refs.article_id,
        counterparty_id: refs.counterparty_id,
        deal_id: refs.deal_id,
        department_id: refs.department_id,
        ..model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{policy::ConfirmationPolicy, template::create_recurring_operation};

    #[tokio::test]
    async fn test_memory_store_behaves_like_sea_orm_store() -> Result<()> {
        let memory = MemoryStore::new("acme");
        let db = setup_test_db().await?;
        let sea = SeaOrmStore::new(db, "acme");
        let policy = ConfirmationPolicy::default();

        let from_memory = create_recurring_operation(
            &memory,
            new_template(Cadence::Monthly, date(2024, 1, 15)),
            &policy,
        )
        .await?;
        let from_sea = create_recurring_operation(
            &sea,
            new_template(Cadence::Monthly, date(2024, 1, 15)),
            &policy,
        )
        .await?;
        assert_eq!(from_memory.anchor_date, from_sea.anchor_date);
        assert_eq!(from_memory.cadence, from_sea.cadence);

        let memory_instances = memory.find_instances_by_parent(from_memory.id).await?;
        let sea_instances = sea.find_instances_by_parent(from_sea.id).await?;
        assert_eq!(memory_instances.len(), sea_instances.len());
        assert_eq!(memory_instances[0].is_confirmed, sea_instances[0].is_confirmed);

        let duplicate = NewInstance::from_template(&from_memory, date(2024, 1, 15), false);
        assert!(matches!(
            memory.create_instance(duplicate).await,
            Err(Error::DuplicateInstance { .. })
        ));
        Ok(())
    }
}
