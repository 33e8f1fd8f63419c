//! SeaORM-backed [`OperationStore`] over the `operations` table.

use super::OperationStore;
use crate::{
    core::cadence::Cadence,
    entities::{Operation, operation},
    errors::{Error, Result},
    models::{
        InstanceUpdate, LedgerRefs, LegacyRecurring, NewInstance, NewTemplate, OperationInstance,
        OperationTemplate,
    },
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    DbErr, QueryOrder, QuerySelect, Select, Set, SqlErr, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::{debug, info, warn};

/// Store bound to one company on a shared database connection.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
    company_id: String,
}

impl SeaOrmStore {
    /// Creates a store that only ever sees rows of `company_id`.
    pub fn new(db: DatabaseConnection, company_id: impl Into<String>) -> Self {
        Self {
            db,
            company_id: company_id.into(),
        }
    }

    /// Live rows of this company.
    fn scoped(&self) -> Select<Operation> {
        Operation::find()
            .filter(operation::Column::CompanyId.eq(self.company_id.as_str()))
            .filter(operation::Column::DeletedAt.is_null())
    }

    /// Repeating rows that were never flagged as templates.
    fn legacy(&self) -> Select<Operation> {
        self.scoped()
            .filter(operation::Column::IsTemplate.eq(false))
            .filter(operation::Column::RecurrenceParentId.is_null())
            .filter(operation::Column::Repeat.ne(Cadence::None.as_str()))
    }

    fn instance_row(&self, instance: NewInstance) -> operation::ActiveModel {
        operation::ActiveModel {
            company_id: Set(self.company_id.clone()),
            operation_type: Set(instance.operation_type),
            operation_date: Set(instance.operation_date),
            amount: Set(instance.amount),
            currency: Set(instance.currency),
            description: Set(instance.description),
            repeat: Set(Cadence::None.as_str().to_string()),
            recurrence_parent_id: Set(Some(instance.template_id)),
            recurrence_end_date: Set(None),
            is_confirmed: Set(instance.is_confirmed),
            is_template: Set(false),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
            ..with_refs(instance.refs)
        }
    }

    fn template_row(&self, template: NewTemplate) -> operation::ActiveModel {
        operation::ActiveModel {
            company_id: Set(self.company_id.clone()),
            operation_type: Set(template.operation_type),
            operation_date: Set(template.anchor_date),
            amount: Set(template.amount),
            currency: Set(template.currency),
            description: Set(template.description),
            repeat: Set(template.cadence.as_str().to_string()),
            recurrence_parent_id: Set(None),
            recurrence_end_date: Set(template.end_date),
            is_confirmed: Set(false),
            is_template: Set(true),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
            ..with_refs(template.refs)
        }
    }
}

fn with_refs(refs: LedgerRefs) -> operation::ActiveModel {
    operation::ActiveModel {
        account_id: Set(refs.account_id),
        source_account_id: Set(refs.source_account_id),
        target_account_id: Set(refs.target_account_id),
        article_id: Set(refs.article_id),
        counterparty_id: Set(refs.counterparty_id),
        deal_id: Set(refs.deal_id),
        department_id: Set(refs.department_id),
        ..Default::default()
    }
}

/// Connection failures make the whole store unusable; everything else stays a
/// plain database error.
fn store_error(err: DbErr) -> Error {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Error::StoreUnavailable {
            message: err.to_string(),
        },
        other => Error::Database(other),
    }
}

fn classify_insert_error(err: DbErr, template_id: i64, date: NaiveDate) -> Error {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        return Error::DuplicateInstance { template_id, date };
    }
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => store_error(err),
        other => Error::InstanceRejected {
            template_id,
            date,
            message: other.to_string(),
        },
    }
}

/// A row that vanished after the lookup is reported as missing; any other failure
/// short of a lost connection concerns this instance only.
fn classify_update_error(err: DbErr, id: i64) -> Error {
    match err {
        DbErr::RecordNotUpdated => Error::InstanceNotFound { id },
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => store_error(err),
        other => Error::UpdateRejected {
            id,
            message: other.to_string(),
        },
    }
}

impl OperationStore for SeaOrmStore {
    fn company_id(&self) -> &str {
        &self.company_id
    }

    async fn find_templates_with_cadence(&self) -> Result<Vec<OperationTemplate>> {
        let rows = self
            .scoped()
            .filter(operation::Column::IsTemplate.eq(true))
            .filter(operation::Column::Repeat.ne(Cadence::None.as_str()))
            .order_by_asc(operation::Column::OperationDate)
            .order_by_asc(operation::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                OperationTemplate::try_from(row)
                    .inspect_err(|e| warn!(operation_id = id, error = %e, "Skipping malformed template"))
                    .ok()
            })
            .collect())
    }

    async fn find_instances_by_parent(&self, template_id: i64) -> Result<Vec<OperationInstance>> {
        self.scoped()
            .filter(operation::Column::RecurrenceParentId.eq(template_id))
            .filter(operation::Column::IsTemplate.eq(false))
            .order_by_asc(operation::Column::OperationDate)
            .order_by_asc(operation::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(OperationInstance::try_from)
            .collect()
    }

    async fn find_instance_by_parent_and_date(
        &self,
        template_id: i64,
        date: NaiveDate,
    ) -> Result<Option<OperationInstance>> {
        self.scoped()
            .filter(operation::Column::RecurrenceParentId.eq(template_id))
            .filter(operation::Column::OperationDate.eq(date))
            .filter(operation::Column::IsTemplate.eq(false))
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(OperationInstance::try_from)
            .transpose()
    }

    async fn update_instance(&self, id: i64, update: InstanceUpdate) -> Result<OperationInstance> {
        let row = self
            .scoped()
            .filter(operation::Column::Id.eq(id))
            .filter(operation::Column::RecurrenceParentId.is_not_null())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(Error::InstanceNotFound { id })?;

        let Some(is_confirmed) = update.is_confirmed else {
            return OperationInstance::try_from(row);
        };

        let mut active_model: operation::ActiveModel = row.into();
        active_model.is_confirmed = Set(is_confirmed);
        let updated = active_model
            .update(&self.db)
            .await
            .map_err(|e| classify_update_error(e, id))?;
        debug!(instance_id = id, is_confirmed, "Updated instance");

        OperationInstance::try_from(updated)
    }

    async fn create_instance(&self, instance: NewInstance) -> Result<OperationInstance> {
        let template_id = instance.template_id;
        let date = instance.operation_date;

        // Parent check and insert share one transaction so a template from another
        // company can never receive children through this store
        let txn = self.db.begin().await.map_err(store_error)?;

        let parent = Operation::find_by_id(template_id)
            .filter(operation::Column::CompanyId.eq(self.company_id.as_str()))
            .filter(operation::Column::IsTemplate.eq(true))
            .filter(operation::Column::DeletedAt.is_null())
            .one(&txn)
            .await
            .map_err(store_error)?;
        if parent.is_none() {
            return Err(Error::InstanceRejected {
                template_id,
                date,
                message: "template not found in company".to_string(),
            });
        }

        let created = self
            .instance_row(instance)
            .insert(&txn)
            .await
            .map_err(|e| classify_insert_error(e, template_id, date))?;
        txn.commit().await.map_err(store_error)?;

        OperationInstance::try_from(created)
    }

    async fn create_template_with_first_instance(
        &self,
        template: NewTemplate,
        confirm_first: bool,
    ) -> Result<(OperationTemplate, OperationInstance)> {
        let txn = self.db.begin().await.map_err(store_error)?;

        let created = self
            .template_row(template)
            .insert(&txn)
            .await
            .map_err(store_error)?;
        let template = OperationTemplate::try_from(created)?;

        let first = NewInstance::from_template(&template, template.anchor_date, confirm_first);
        let first = self
            .instance_row(first)
            .insert(&txn)
            .await
            .map_err(|e| classify_insert_error(e, template.id, template.anchor_date))?;
        let first = OperationInstance::try_from(first)?;

        txn.commit().await.map_err(store_error)?;
        Ok((template, first))
    }

    async fn find_legacy_recurring(&self) -> Result<Vec<LegacyRecurring>> {
        Ok(self
            .legacy()
            .order_by_asc(operation::Column::OperationDate)
            .order_by_asc(operation::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(LegacyRecurring::from)
            .collect())
    }

    async fn promote_to_templates(&self, ids: &[i64]) -> Result<Vec<OperationTemplate>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin().await.map_err(store_error)?;

        let eligible: Vec<i64> = self
            .legacy()
            .filter(operation::Column::Id.is_in(ids.iter().copied()))
            .select_only()
            .column(operation::Column::Id)
            .into_tuple()
            .all(&txn)
            .await
            .map_err(store_error)?;

        let result = Operation::update_many()
            .col_expr(operation::Column::IsTemplate, Expr::value(true))
            .filter(operation::Column::Id.is_in(eligible.iter().copied()))
            .exec(&txn)
            .await
            .map_err(store_error)?;

        let templates = Operation::find()
            .filter(operation::Column::Id.is_in(eligible))
            .order_by_asc(operation::Column::OperationDate)
            .order_by_asc(operation::Column::Id)
            .all(&txn)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(OperationTemplate::try_from)
            .collect::<Result<Vec<_>>>()?;

        txn.commit().await.map_err(store_error)?;
        info!(
            company_id = %self.company_id,
            promoted = result.rows_affected,
            "Promoted legacy operations to templates"
        );
        Ok(templates)
    }
}

/// Distinct companies owning at least one live template or legacy repeating
/// operation, alphabetically.
pub async fn list_companies(db: &DatabaseConnection) -> Result<Vec<String>> {
    Operation::find()
        .select_only()
        .column(operation::Column::CompanyId)
        .distinct()
        .filter(operation::Column::RecurrenceParentId.is_null())
        .filter(operation::Column::Repeat.ne(Cadence::None.as_str()))
        .filter(operation::Column::DeletedAt.is_null())
        .order_by_asc(operation::Column::CompanyId)
        .into_tuple::<String>()
        .all(db)
        .await
        .map_err(store_error)
}
