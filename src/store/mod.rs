//! Persistence boundary for templates and their instances.
//!
//! Every store value is bound to one company; implementations must filter every
//! query by that company and hide soft-deleted rows.

pub mod sea;

pub use sea::{SeaOrmStore, list_companies};

use crate::{
    errors::Result,
    models::{
        InstanceUpdate, LegacyRecurring, NewInstance, NewTemplate, OperationInstance,
        OperationTemplate,
    },
};
use chrono::NaiveDate;

/// Tenant-scoped access to recurring operations.
#[allow(async_fn_in_trait)]
pub trait OperationStore {
    /// Company every query of this store is restricted to.
    fn company_id(&self) -> &str;

    /// All live templates whose cadence is not `none`, ordered by anchor date.
    async fn find_templates_with_cadence(&self) -> Result<Vec<OperationTemplate>>;

    /// All live instances owned by `template_id`, ordered by date.
    async fn find_instances_by_parent(&self, template_id: i64) -> Result<Vec<OperationInstance>>;

    /// The instance of `template_id` due on `date`, if any.
    async fn find_instance_by_parent_and_date(
        &self,
        template_id: i64,
        date: NaiveDate,
    ) -> Result<Option<OperationInstance>>;

    /// Applies `update` to instance `id`.
    ///
    /// Fails with [`crate::errors::Error::InstanceNotFound`] when the instance does not
    /// exist in this company.
    async fn update_instance(&self, id: i64, update: InstanceUpdate) -> Result<OperationInstance>;

    /// Persists a new instance.
    ///
    /// A date already covered for the template fails with
    /// [`crate::errors::Error::DuplicateInstance`].
    async fn create_instance(&self, instance: NewInstance) -> Result<OperationInstance>;

    /// Persists a new template together with its first instance on the anchor date.
    ///
    /// Both rows are written or neither is.
    async fn create_template_with_first_instance(
        &self,
        template: NewTemplate,
        confirm_first: bool,
    ) -> Result<(OperationTemplate, OperationInstance)>;

    /// Live operations that repeat but are neither templates nor instances, ordered
    /// by date.
    async fn find_legacy_recurring(&self) -> Result<Vec<LegacyRecurring>>;

    /// Flags the listed legacy operations as templates in one step.
    ///
    /// Ids that are not legacy operations of this company are ignored.
    async fn promote_to_templates(&self, ids: &[i64]) -> Result<Vec<OperationTemplate>>;
}
