use super::{
    PropertiesEntry, PropertiesQuantity, PropertiesRecord, PropertiesRegistry, PropertiesSchema,
    PropertiesSet, PropertiesValue,
};
use crate::context::DataContext;
use crate::core::{CmsError, EntityId, Result, SiteId};
use crate::entities::{Entity, Site};
use crate::storage::{Change, StoredRow};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{Level, event};
use uuid::Uuid;

pub const PROPERTIES_TABLE: &str = "properties";

type ScopeKey<'a> = (&'a str, EntityId, Option<SiteId>);

/// Reads and writes properties records and materializes them onto entities.
///
/// Writes go through the shared [`DataContext`], so they are buffered by the
/// same batch mode as repository writes.
pub struct PropertiesProvider {
    context: Arc<DataContext>,
    registry: Arc<PropertiesRegistry>,
}

impl PropertiesProvider {
    pub fn new(context: Arc<DataContext>, registry: Arc<PropertiesRegistry>) -> Self {
        Self { context, registry }
    }

    pub fn registry(&self) -> &Arc<PropertiesRegistry> {
        &self.registry
    }

    /// Attaches one entry per applicable set to every entity.
    ///
    /// Entities are grouped by concrete type; each group costs one records
    /// query, and the site list is read once when any per-site set applies.
    pub async fn load<T: Entity>(&self, entities: &mut [T]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, entity) in entities.iter().enumerate() {
            groups.entry(entity.entity_type()).or_default().push(idx);
        }

        let family = T::family();
        let plans: Vec<(String, Vec<usize>, Vec<&PropertiesSchema>)> = groups
            .into_iter()
            .map(|(entity_type, indexes)| {
                let schemas = self.registry.applicable(&entity_type, family);
                (entity_type, indexes, schemas)
            })
            .collect();

        let needs_sites = plans.iter().any(|(_, _, schemas)| {
            schemas
                .iter()
                .any(|schema| schema.quantity() == PropertiesQuantity::OnePerSite)
        });
        let sites = if needs_sites {
            self.site_ids().await?
        } else {
            Vec::new()
        };

        for (entity_type, indexes, schemas) in plans {
            let ids: HashSet<EntityId> = indexes
                .iter()
                .map(|&idx| entities[idx].id())
                .filter(|id| !id.is_nil())
                .collect();

            let records = if schemas.is_empty() || ids.is_empty() {
                Vec::new()
            } else {
                self.records_for(&entity_type, &ids).await?
            };

            let mut by_scope: HashMap<ScopeKey<'_>, &PropertiesRecord> = HashMap::new();
            for record in &records {
                if let Some(entity_id) = record.entity_id {
                    by_scope.insert((record.key.as_str(), entity_id, record.site_id), record);
                }
            }

            for &idx in &indexes {
                let id = entities[idx].id();
                let mut entries = Vec::with_capacity(schemas.len());
                for schema in &schemas {
                    let mut entry = PropertiesEntry::new(schema);
                    match schema.quantity() {
                        PropertiesQuantity::OnePerEntity => {
                            let record = by_scope.get(&(schema.key(), id, None)).copied();
                            entry.values.push(materialize(schema, record, None)?);
                        }
                        PropertiesQuantity::OnePerSite => {
                            for site in &sites {
                                let record =
                                    by_scope.get(&(schema.key(), id, Some(*site))).copied();
                                entry.values.push(materialize(schema, record, Some(*site))?);
                            }
                        }
                    }
                    entries.push(entry);
                }
                entities[idx].meta_mut().properties = entries;
            }

            event!(
                Level::DEBUG,
                entity_type = %entity_type,
                entities = indexes.len(),
                records = records.len(),
                "properties loaded"
            );
        }

        Ok(())
    }

    /// Materialized value when present, else a single-record lookup that is
    /// attached to the entity (default instance on miss).
    pub async fn get<P: PropertiesSet, T: Entity>(
        &self,
        entity: &mut T,
        site_id: Option<SiteId>,
    ) -> Result<P> {
        let schema = self.registry.schema_for::<P>()?;
        check_scope(schema, site_id)?;

        let loaded = entity
            .properties()
            .iter()
            .find(|entry| entry.key == P::KEY)
            .and_then(|entry| entry.value::<P>(site_id));
        if let Some(value) = loaded {
            return Ok(value.clone());
        }

        let entity_type = entity.entity_type();
        let record_id =
            PropertiesRecord::record_id(P::KEY, Some(entity_type.as_str()), Some(entity.id()), site_id);
        let record = self.fetch_record(record_id).await?;
        let value = materialize(schema, record.as_ref(), site_id)?;
        let typed = value.get::<P>().cloned().unwrap_or_default();
        attach(entity, schema, value);
        Ok(typed)
    }

    /// Upserts the record for `(P, entity, site)` and commits it (unless a
    /// batch is open).
    pub async fn set<P: PropertiesSet, T: Entity>(
        &self,
        entity: &mut T,
        site_id: Option<SiteId>,
        value: P,
    ) -> Result<()> {
        let schema = self.registry.schema_for::<P>()?;
        check_scope(schema, site_id)?;
        if entity.id().is_nil() {
            return Err(CmsError::InvalidPropertiesScope(format!(
                "cannot store '{}' for {} without an identifier",
                P::KEY,
                entity.entity_type()
            )));
        }

        let record = self
            .upsert(PropertiesRecord::new(
                P::KEY,
                Some(entity.entity_type()),
                Some(entity.id()),
                site_id,
                serde_json::to_value(&value)?,
            ))
            .await?;

        attach(
            entity,
            schema,
            PropertiesValue {
                site_id,
                value: Box::new(value),
                persisted: true,
                date_updated: Some(record.date_updated),
            },
        );
        Ok(())
    }

    pub async fn get_global<P: PropertiesSet>(&self) -> Result<P> {
        let schema = self.registry.schema_for::<P>()?;
        check_scope(schema, None)?;

        let record_id = PropertiesRecord::record_id(P::KEY, None, None, None);
        match self.fetch_record(record_id).await? {
            Some(record) => Ok(serde_json::from_value(record.data)?),
            None => Ok(P::default()),
        }
    }

    pub async fn set_global<P: PropertiesSet>(&self, value: P) -> Result<()> {
        let schema = self.registry.schema_for::<P>()?;
        check_scope(schema, None)?;

        self.upsert(PropertiesRecord::new(
            P::KEY,
            None,
            None,
            None,
            serde_json::to_value(&value)?,
        ))
        .await?;
        Ok(())
    }

    /// Builds an upsert for every loaded value of `entity` that is backed by
    /// a record or differs from its default. Values are marked persisted only
    /// once every change has been built; nothing is staged here.
    pub(crate) fn entity_property_changes<T: Entity>(&self, entity: &mut T) -> Result<Vec<Change>> {
        let entity_type = entity.entity_type();
        let entity_id = entity.id();
        let mut changes = Vec::new();
        let mut written = Vec::new();

        for (e, entry) in entity.meta().properties.iter().enumerate() {
            let schema = self.registry.resolve(&entry.key)?;
            let default = schema.instantiate_default().to_json()?;
            for (v, value) in entry.values.iter().enumerate() {
                let data = value.value.to_json()?;
                if !value.persisted && data == default {
                    continue;
                }
                let record = PropertiesRecord::new(
                    entry.key.clone(),
                    Some(entity_type.clone()),
                    Some(entity_id),
                    value.site_id,
                    data,
                );
                written.push((e, v, record.date_updated));
                changes.push(Change::Upsert {
                    table: PROPERTIES_TABLE.to_string(),
                    row: record.to_row()?,
                });
            }
        }

        let properties = &mut entity.meta_mut().properties;
        for (e, v, date_updated) in written {
            let value = &mut properties[e].values[v];
            value.persisted = true;
            value.date_updated = Some(date_updated);
        }
        Ok(changes)
    }

    async fn upsert(&self, mut record: PropertiesRecord) -> Result<PropertiesRecord> {
        let exists = !self
            .context
            .fetch(PROPERTIES_TABLE, &[record.id])
            .await?
            .is_empty();

        record.date_updated = Utc::now();
        let row = record.to_row()?;
        let change = if exists {
            Change::Update {
                table: PROPERTIES_TABLE.to_string(),
                row,
            }
        } else {
            Change::Insert {
                table: PROPERTIES_TABLE.to_string(),
                row,
            }
        };

        self.context.stage(change).await;
        self.context.save_changes().await?;
        event!(
            Level::DEBUG,
            key = %record.key,
            created = !exists,
            "properties record saved"
        );
        Ok(record)
    }

    async fn fetch_record(&self, id: Uuid) -> Result<Option<PropertiesRecord>> {
        let rows = self.context.fetch(PROPERTIES_TABLE, &[id]).await?;
        rows.first().map(PropertiesRecord::from_row).transpose()
    }

    async fn records_for(
        &self,
        entity_type: &str,
        ids: &HashSet<EntityId>,
    ) -> Result<Vec<PropertiesRecord>> {
        let rows = self
            .context
            .select(PROPERTIES_TABLE, |row| {
                row.text("entity_type") == Some(entity_type)
                    && row
                        .text("entity_id")
                        .and_then(|id| Uuid::parse_str(id).ok())
                        .is_some_and(|id| ids.contains(&id))
            })
            .await?;
        rows.iter().map(PropertiesRecord::from_row).collect()
    }

    async fn site_ids(&self) -> Result<Vec<SiteId>> {
        let rows: Vec<StoredRow> = self.context.select(Site::TABLE, |_| true).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

fn check_scope(schema: &PropertiesSchema, site_id: Option<SiteId>) -> Result<()> {
    match (schema.quantity(), site_id) {
        (PropertiesQuantity::OnePerEntity, Some(site)) => Err(CmsError::InvalidPropertiesScope(
            format!("'{}' is one per entity, got site {}", schema.key(), site),
        )),
        (PropertiesQuantity::OnePerSite, None) => Err(CmsError::InvalidPropertiesScope(format!(
            "'{}' is one per site and needs a site id",
            schema.key()
        ))),
        _ => Ok(()),
    }
}

fn materialize(
    schema: &PropertiesSchema,
    record: Option<&PropertiesRecord>,
    site_id: Option<SiteId>,
) -> Result<PropertiesValue> {
    Ok(match record {
        Some(record) => PropertiesValue {
            site_id,
            value: schema.decode(record.data.clone())?,
            persisted: true,
            date_updated: Some(record.date_updated),
        },
        None => PropertiesValue {
            site_id,
            value: schema.instantiate_default(),
            persisted: false,
            date_updated: None,
        },
    })
}

fn attach<T: Entity>(entity: &mut T, schema: &PropertiesSchema, value: PropertiesValue) {
    let properties = &mut entity.meta_mut().properties;
    match properties.iter_mut().find(|entry| entry.key == schema.key()) {
        Some(entry) => entry.put(value),
        None => {
            let mut entry = PropertiesEntry::new(schema);
            entry.put(value);
            properties.push(entry);
        }
    }
}
