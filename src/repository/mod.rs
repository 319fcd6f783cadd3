//! Generic repository: queries, the save pipeline and batch mode.
//!
//! Add and update both run
//! `BeforeValidate -> validate -> BeforeSave -> persist -> AfterSave`.
//! Validation failures and hook vetoes are returned in
//! [`AddOrUpdateResult`]; only storage faults, missing rows and
//! configuration problems surface as `Err`.

pub mod changes;
pub mod operation;

pub use changes::{PropertyChange, compute_changes};
pub use operation::{AddOrUpdateResult, MutationStatus, OperationContext};

use crate::context::DataContext;
use crate::core::{CmsError, EntityId, Result, new_entity_id};
use crate::entities::Entity;
use crate::hooks::{HookPhase, RepositoryHooksManager};
use crate::properties::PropertiesProvider;
use crate::query::Query;
use crate::storage::{Change, StoredRow};
use crate::type_registry::TypeRegistry;
use crate::validation::{EntityValidator, ValidationResult, Validator};
use chrono::Utc;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Shared collaborators handed to every repository of one engine.
#[derive(Clone)]
pub struct RepositoryContext {
    pub data: Arc<DataContext>,
    pub types: Arc<TypeRegistry>,
    pub properties: Arc<PropertiesProvider>,
    pub hooks: Arc<RepositoryHooksManager>,
    pub enable_validation: bool,
}

pub struct Repository<T: Entity> {
    context: RepositoryContext,
    discriminator: Option<&'static str>,
    validators: Vec<Arc<dyn Validator<T>>>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            discriminator: self.discriminator,
            validators: self.validators.clone(),
        }
    }
}

impl<T: Entity> Repository<T> {
    /// Fails with a configuration error when `T` belongs to a polymorphic
    /// family but was never registered with the type registry.
    pub fn new(context: RepositoryContext) -> Result<Self> {
        let discriminator = if T::family().is_polymorphic() {
            let desc = context.types.lookup(TypeId::of::<T>()).ok_or_else(|| {
                CmsError::Configuration(format!("type '{}' is not registered", T::type_name()))
            })?;
            Some(desc.discriminator)
        } else {
            None
        };

        let mut validators: Vec<Arc<dyn Validator<T>>> = vec![Arc::new(EntityValidator)];
        if context.enable_validation {
            validators.extend(T::validators(&context.data));
        }

        Ok(Self {
            context,
            discriminator,
            validators,
        })
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator<T>>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn discriminator(&self) -> Option<&'static str> {
        self.discriminator
    }

    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub fn data_context(&self) -> &Arc<DataContext> {
        &self.context.data
    }

    pub fn properties(&self) -> &Arc<PropertiesProvider> {
        &self.context.properties
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Page of items plus the total count of the unpaginated filter.
    /// Count and fetch are separate queries.
    pub async fn get_all(&self, query: Option<&Query<T>>) -> Result<(Vec<T>, usize)> {
        let total = self.count(query).await?;
        let items = self.fetch(query).await?;
        Ok((items, total))
    }

    pub async fn count(&self, query: Option<&Query<T>>) -> Result<usize> {
        Ok(self.select(query).await?.len())
    }

    pub async fn get_by_id(&self, id: EntityId, query: Option<&Query<T>>) -> Result<Option<T>> {
        let mut items = self.fetch_ids(&[id], query).await?;
        Ok(items.pop())
    }

    /// First item of the ordered filter.
    pub async fn get(&self, query: &Query<T>) -> Result<Option<T>> {
        let mut items = self.select(Some(query)).await?;
        query.sort(&mut items);
        let mut first: Vec<T> = items.into_iter().take(1).collect();
        self.context.properties.load(&mut first).await?;
        Ok(first.pop())
    }

    /// All requested ids that exist and pass the filter, in storage order.
    pub async fn get_by_ids(&self, ids: &[EntityId], query: Option<&Query<T>>) -> Result<Vec<T>> {
        self.fetch_ids(ids, query).await
    }

    /// Zero-value entity with fully defaulted properties.
    pub async fn new_entity(&self) -> Result<T> {
        let mut items = vec![T::default()];
        self.context.properties.load(&mut items).await?;
        Ok(items.pop().unwrap_or_default())
    }

    async fn fetch(&self, query: Option<&Query<T>>) -> Result<Vec<T>> {
        let mut items = self.select(query).await?;
        if let Some(query) = query {
            query.sort(&mut items);
            items = query.paginate(items);
        }
        self.context.properties.load(&mut items).await?;
        Ok(items)
    }

    async fn fetch_ids(&self, ids: &[EntityId], query: Option<&Query<T>>) -> Result<Vec<T>> {
        let rows = self.context.data.fetch(T::TABLE, ids).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows.iter().filter(|row| self.owns(row)) {
            let item = self.decode(row)?;
            if query.is_none_or(|query| query.matches(&item)) {
                items.push(item);
            }
        }
        self.context.properties.load(&mut items).await?;
        Ok(items)
    }

    /// Filtered, unordered, unpaginated items without properties.
    async fn select(&self, query: Option<&Query<T>>) -> Result<Vec<T>> {
        let ids = query.and_then(|query| query.ids());
        let rows = self
            .context
            .data
            .select(T::TABLE, |row| {
                self.owns(row) && ids.is_none_or(|ids| ids.contains(&row.id))
            })
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let item = self.decode(row)?;
            if query.is_none_or(|query| query.matches(&item)) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn owns(&self, row: &StoredRow) -> bool {
        match self.discriminator {
            Some(discriminator) => row.discriminator.as_deref() == Some(discriminator),
            None => true,
        }
    }

    fn decode(&self, row: &StoredRow) -> Result<T> {
        serde_json::from_value(row.data.clone()).map_err(|err| {
            CmsError::Serialization(format!("{} '{}': {}", T::type_name(), row.id, err))
        })
    }

    fn encode(&self, item: &T) -> Result<StoredRow> {
        Ok(StoredRow::new(
            item.id(),
            self.discriminator.map(str::to_string),
            serde_json::to_value(item)?,
        ))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn add(
        &self,
        mut item: T,
        context: Option<&OperationContext>,
    ) -> Result<AddOrUpdateResult<T>> {
        let now = Utc::now();
        let meta = item.meta_mut();
        if meta.id.is_nil() {
            meta.id = new_entity_id();
        }
        meta.date_added = now;
        meta.date_updated = now;

        let span = info_span!("repository.add", entity_type = %item.entity_type(), entity_id = %item.id());
        self.save(item, None, true, context).instrument(span).await
    }

    /// Diffs against the stored snapshot and runs the pipeline. Fails with
    /// `NotFound` when the row does not exist.
    pub async fn update(
        &self,
        mut item: T,
        context: Option<&OperationContext>,
    ) -> Result<AddOrUpdateResult<T>> {
        let id = item.id();
        let snapshot = self
            .snapshot(id)
            .await?
            .ok_or_else(|| CmsError::not_found(T::type_name(), id))?;

        item.meta_mut().date_added = snapshot.meta().date_added;
        let changes = compute_changes(&snapshot, &item);
        item.meta_mut().date_updated = Utc::now();

        let span = info_span!("repository.update", entity_type = %item.entity_type(), entity_id = %id);
        self.save(item, Some(changes), false, context)
            .instrument(span)
            .await
    }

    /// Loads and deletes the item; `NotFound` when it does not exist.
    pub async fn delete(&self, id: EntityId, context: Option<&OperationContext>) -> Result<T> {
        let item = self
            .snapshot(id)
            .await?
            .ok_or_else(|| CmsError::not_found(T::type_name(), id))?;
        self.delete_item(&item, context).await?;
        Ok(item)
    }

    /// Removes an instance the caller already holds.
    pub async fn delete_item(&self, item: &T, context: Option<&OperationContext>) -> Result<()> {
        self.context
            .data
            .stage(Change::Delete {
                table: T::TABLE.to_string(),
                id: item.id(),
            })
            .await;
        self.context.data.save_changes().await?;
        event!(Level::DEBUG, entity_type = %item.entity_type(), entity_id = %item.id(), "entity deleted");

        self.context.hooks.after_delete(item, context).await;
        Ok(())
    }

    pub fn begin_batch(&self) {
        self.context.data.begin_batch();
    }

    /// Commits everything buffered since [`begin_batch`](Self::begin_batch)
    /// as one storage commit.
    pub async fn finish_batch(&self) -> Result<bool> {
        self.context.data.finish_batch().await
    }

    pub fn is_batch_mode(&self) -> bool {
        self.context.data.is_batch_mode()
    }

    /// Untracked copy of the stored row, without properties.
    async fn snapshot(&self, id: EntityId) -> Result<Option<T>> {
        let rows = self.context.data.fetch(T::TABLE, &[id]).await?;
        rows.iter()
            .find(|row| self.owns(row))
            .map(|row| self.decode(row))
            .transpose()
    }

    async fn save(
        &self,
        mut item: T,
        changes: Option<Vec<PropertyChange>>,
        is_new: bool,
        context: Option<&OperationContext>,
    ) -> Result<AddOrUpdateResult<T>> {
        let hooks = &self.context.hooks;
        let mut validation = ValidationResult::new();

        let flow = hooks
            .before_validate(&mut item, &mut validation, changes.as_deref(), context)
            .await?;
        if flow.is_abort() {
            return Ok(vetoed(item, validation, changes, HookPhase::BeforeValidate));
        }

        for validator in &self.validators {
            let failures = validator.validate(&item, changes.as_deref()).await?;
            validation.extend(failures);
        }
        if !validation.is_valid() {
            event!(
                Level::DEBUG,
                failures = validation.failures().len(),
                "validation failed, nothing persisted"
            );
            return Ok(AddOrUpdateResult {
                item,
                validation,
                changes: changes.unwrap_or_default(),
                status: MutationStatus::Invalid,
            });
        }

        let flow = hooks
            .before_save(&mut item, &validation, changes.as_deref(), context)
            .await?;
        if flow.is_abort() {
            return Ok(vetoed(item, validation, changes, HookPhase::BeforeSave));
        }

        self.persist(&mut item, is_new).await?;

        hooks.after_save(&item, changes.as_deref(), context).await;
        Ok(AddOrUpdateResult {
            item,
            validation,
            changes: changes.unwrap_or_default(),
            status: MutationStatus::Saved,
        })
    }

    /// Stages the row together with the entity's loaded properties and
    /// commits them (a no-op while a batch is open).
    async fn persist(&self, item: &mut T, is_new: bool) -> Result<()> {
        let row = self.encode(item)?;
        let table = T::TABLE.to_string();
        let change = if is_new {
            Change::Insert { table, row }
        } else {
            Change::Update { table, row }
        };

        let properties = self.context.properties.entity_property_changes(item)?;
        let staged = properties.len();
        let data = &self.context.data;
        data.stage_many(std::iter::once(change).chain(properties)).await;
        let committed = data.save_changes().await?;
        event!(Level::DEBUG, properties = staged, committed, "entity persisted");
        Ok(())
    }
}

fn vetoed<T>(
    item: T,
    validation: ValidationResult,
    changes: Option<Vec<PropertyChange>>,
    phase: HookPhase,
) -> AddOrUpdateResult<T> {
    event!(Level::DEBUG, phase = %phase, "mutation vetoed by hook");
    AddOrUpdateResult {
        item,
        validation,
        changes: changes.unwrap_or_default(),
        status: MutationStatus::Vetoed(phase),
    }
}
