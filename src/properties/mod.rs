//! Properties overlay.
//!
//! A properties set is a typed bundle of settings attached to an entity (or
//! globally) without touching the entity's own schema. Sets are registered in
//! a [`PropertiesRegistry`] once at startup; the [`PropertiesProvider`] is the
//! only component reading and writing the `properties` table.

pub mod provider;
pub mod schema;
pub mod seo;

pub use provider::{PROPERTIES_TABLE, PropertiesProvider};
pub use schema::{
    PropertiesRegistry, PropertiesRegistryBuilder, PropertiesSchema, RegistrationTarget,
};
pub use seo::SeoPropertiesSet;

use crate::core::{CmsError, EntityId, Result, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::any::Any;
use std::fmt::Debug;
use uuid::Uuid;

/// How many values of a set an entity holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertiesQuantity {
    /// Single value, no site dimension
    OnePerEntity,
    /// One value for every known site
    OnePerSite,
}

pub trait PropertiesSet:
    Debug + Clone + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Stable key stored in every record of this set.
    const KEY: &'static str;
    const TITLE: &'static str;
    const QUANTITY: PropertiesQuantity = PropertiesQuantity::OnePerEntity;
}

/// Type-erased properties value held by a loaded entity.
pub trait PropertiesValueObject: Debug + Send + Sync {
    fn to_json(&self) -> Result<serde_json::Value>;
    fn clone_boxed(&self) -> Box<dyn PropertiesValueObject>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<P: PropertiesSet> PropertiesValueObject for P {
    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn clone_boxed(&self) -> Box<dyn PropertiesValueObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn PropertiesValueObject> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// One materialized value of an entry; `site_id` is `None` for
/// [`PropertiesQuantity::OnePerEntity`] sets.
#[derive(Debug, Clone)]
pub struct PropertiesValue {
    pub site_id: Option<SiteId>,
    pub value: Box<dyn PropertiesValueObject>,
    /// Whether a stored record backs this value (as opposed to a default).
    pub persisted: bool,
    pub date_updated: Option<DateTime<Utc>>,
}

impl PropertiesValue {
    pub fn get<P: PropertiesSet>(&self) -> Option<&P> {
        self.value.as_any().downcast_ref::<P>()
    }

    pub fn get_mut<P: PropertiesSet>(&mut self) -> Option<&mut P> {
        self.value.as_any_mut().downcast_mut::<P>()
    }
}

/// All values of one properties set attached to a loaded entity.
#[derive(Debug, Clone)]
pub struct PropertiesEntry {
    pub key: String,
    pub title: String,
    pub quantity: PropertiesQuantity,
    pub values: Vec<PropertiesValue>,
}

impl PropertiesEntry {
    pub fn new(schema: &PropertiesSchema) -> Self {
        Self {
            key: schema.key().to_string(),
            title: schema.title().to_string(),
            quantity: schema.quantity(),
            values: Vec::new(),
        }
    }

    pub fn value<P: PropertiesSet>(&self, site_id: Option<SiteId>) -> Option<&P> {
        self.values
            .iter()
            .find(|value| value.site_id == site_id)
            .and_then(|value| value.get::<P>())
    }

    pub fn value_mut<P: PropertiesSet>(&mut self, site_id: Option<SiteId>) -> Option<&mut P> {
        self.values
            .iter_mut()
            .find(|value| value.site_id == site_id)
            .and_then(|value| value.get_mut::<P>())
    }

    /// Replaces the value for `site_id`, appending it when absent.
    pub(crate) fn put(&mut self, value: PropertiesValue) {
        match self.values.iter_mut().find(|v| v.site_id == value.site_id) {
            Some(existing) => *existing = value,
            None => self.values.push(value),
        }
    }
}

/// Persisted row of the `properties` table. Unique on
/// `(key, entity_type, entity_id, site_id)`; the row id is derived from that
/// tuple so the same scope always maps to the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesRecord {
    pub id: Uuid,
    pub key: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<EntityId>,
    pub site_id: Option<SiteId>,
    pub data: serde_json::Value,
    pub date_updated: DateTime<Utc>,
}

impl PropertiesRecord {
    pub fn record_id(
        key: &str,
        entity_type: Option<&str>,
        entity_id: Option<EntityId>,
        site_id: Option<SiteId>,
    ) -> Uuid {
        let scope = format!(
            "{}|{}|{}|{}",
            key,
            entity_type.unwrap_or(""),
            entity_id.map(|id| id.to_string()).unwrap_or_default(),
            site_id.map(|id| id.to_string()).unwrap_or_default(),
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, scope.as_bytes())
    }

    pub fn new(
        key: impl Into<String>,
        entity_type: Option<String>,
        entity_id: Option<EntityId>,
        site_id: Option<SiteId>,
        data: serde_json::Value,
    ) -> Self {
        let key = key.into();
        let id = Self::record_id(&key, entity_type.as_deref(), entity_id, site_id);
        Self {
            id,
            key,
            entity_type,
            entity_id,
            site_id,
            data,
            date_updated: Utc::now(),
        }
    }

    pub fn from_row(row: &crate::storage::StoredRow) -> Result<Self> {
        serde_json::from_value(row.data.clone()).map_err(|err| {
            CmsError::Serialization(format!("properties record '{}': {}", row.id, err))
        })
    }

    pub fn to_row(&self) -> Result<crate::storage::StoredRow> {
        Ok(crate::storage::StoredRow::new(
            self.id,
            None,
            serde_json::to_value(self)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Banner {
        text: String,
    }

    impl PropertiesSet for Banner {
        const KEY: &'static str = "banner";
        const TITLE: &'static str = "Banner";
    }

    #[test]
    fn test_record_id_is_stable_per_scope() {
        let entity = Uuid::new_v4();
        let site = Uuid::new_v4();
        let a = PropertiesRecord::record_id("seo", Some("page"), Some(entity), Some(site));
        let b = PropertiesRecord::record_id("seo", Some("page"), Some(entity), Some(site));
        let other = PropertiesRecord::record_id("seo", Some("page"), Some(entity), None);
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn test_entry_typed_access() {
        let mut entry = PropertiesEntry {
            key: Banner::KEY.into(),
            title: Banner::TITLE.into(),
            quantity: PropertiesQuantity::OnePerEntity,
            values: Vec::new(),
        };
        entry.put(PropertiesValue {
            site_id: None,
            value: Box::new(Banner { text: "hi".into() }),
            persisted: false,
            date_updated: None,
        });

        assert_eq!(entry.value::<Banner>(None).unwrap().text, "hi");
        entry.value_mut::<Banner>(None).unwrap().text = "bye".into();
        assert_eq!(entry.value::<Banner>(None).unwrap().text, "bye");
        assert!(entry.value::<Banner>(Some(Uuid::new_v4())).is_none());

        let copy = entry.clone();
        assert_eq!(copy.values.len(), 1);
    }

    #[test]
    fn test_record_row_round_trip() {
        let record = PropertiesRecord::new(
            "banner",
            Some("page".into()),
            Some(Uuid::new_v4()),
            None,
            serde_json::json!({ "text": "x" }),
        );
        let row = record.to_row().unwrap();
        assert_eq!(row.id, record.id);
        assert_eq!(PropertiesRecord::from_row(&row).unwrap(), record);
    }
}
