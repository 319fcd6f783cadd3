//! Entity model.
//!
//! Every persisted object implements [`Entity`]: it names its physical table,
//! exposes its [`EntityMeta`] (identifier, timestamps, loaded properties) and
//! describes its fields explicitly so change-sets, ordering and baseline
//! validation never need runtime introspection.
//!
//! Sections and content items are polymorphic families stored one table per
//! family. The concrete variant is selected by the payload type `D` of
//! [`Section<D>`] / [`ContentItem<D>`], whose [`TypedData::DISCRIMINATOR`] is
//! registered with the [`TypeRegistry`](crate::type_registry::TypeRegistry).

use crate::context::DataContext;
use crate::core::{EntityField, EntityId, SiteId};
use crate::properties::PropertiesEntry;
use crate::validation::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::sync::Arc;

pub mod content;
pub mod page;
pub mod section;
pub mod site;
pub mod tag;

pub use content::{Author, ContentBlock, ContentItem, Post, PostData};
pub use page::Page;
pub use section::Section;
pub use site::Site;
pub use tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityFamily {
    /// One concrete type per table
    Standalone,
    /// Section variants sharing the sections table
    Section,
    /// Content variants sharing the content table
    Content,
}

impl EntityFamily {
    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, EntityFamily::Standalone)
    }
}

impl std::fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityFamily::Standalone => write!(f, "standalone"),
            EntityFamily::Section => write!(f, "section"),
            EntityFamily::Content => write!(f, "content"),
        }
    }
}

/// Columns shared by every entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: EntityId,
    pub date_added: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    /// Filled only by [`PropertiesProvider::load`](crate::properties::PropertiesProvider::load).
    #[serde(skip)]
    pub properties: Vec<PropertiesEntry>,
}

impl EntityMeta {
    pub(crate) fn fields(&self) -> Vec<EntityField> {
        vec![
            EntityField::scalar("id", self.id).required(),
            EntityField::scalar("date_added", self.date_added),
            EntityField::scalar("date_updated", self.date_updated),
        ]
    }
}

pub trait Entity:
    Debug + Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Physical table holding this entity (shared by a whole family).
    const TABLE: &'static str;

    fn family() -> EntityFamily {
        EntityFamily::Standalone
    }

    /// Concrete type name; properties records are keyed by it.
    fn type_name() -> String;

    /// Runtime type name of this instance, used to group mixed batches.
    fn entity_type(&self) -> String {
        Self::type_name()
    }

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn id(&self) -> EntityId {
        self.meta().id
    }

    /// Scalar and relation-like fields in a stable order.
    fn fields(&self) -> Vec<EntityField>;

    /// Type-specific validators appended after the baseline entity validator.
    fn validators(_context: &Arc<DataContext>) -> Vec<Arc<dyn Validator<Self>>> {
        Vec::new()
    }

    fn field(&self, name: &str) -> Option<EntityField> {
        self.fields().into_iter().find(|field| field.name == name)
    }

    fn properties(&self) -> &[PropertiesEntry] {
        &self.meta().properties
    }
}

/// Entity affiliated with one or more sites.
pub trait SiteEntity: Entity {
    fn site_ids(&self) -> &[SiteId];
}

/// Entity filed under sections and tags.
pub trait SectionEntity: SiteEntity {
    fn section_ids(&self) -> &[EntityId];
    fn tag_ids(&self) -> &[EntityId];
}

pub trait Publishable: Entity {
    fn is_published(&self) -> bool;
    fn date_published(&self) -> Option<DateTime<Utc>>;
}

/// Entity addressed by a url slug.
pub trait Routable: Entity {
    fn url(&self) -> &str;
}

/// Payload companion type of a polymorphic variant.
pub trait TypedData:
    Debug + Clone + Default + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Stored tag selecting this variant inside its family table.
    const DISCRIMINATOR: &'static str;
    const TITLE: &'static str;
}

/// Entity whose concrete variant is selected by a discriminator.
pub trait PolymorphicEntity: Entity {
    type Data: TypedData;
}

pub(crate) fn payload_json<D: Serialize>(data: &D) -> serde_json::Value {
    serde_json::to_value(data).unwrap_or(serde_json::Value::Null)
}
