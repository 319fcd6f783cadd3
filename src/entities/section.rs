use super::{
    Entity, EntityFamily, EntityMeta, PolymorphicEntity, Publishable, Routable, SiteEntity,
    TypedData, payload_json,
};
use crate::context::DataContext;
use crate::core::{EntityField, EntityId, SiteId};
use crate::validation::{UrlUniquenessValidator, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Section variant carrying payload `D`. All variants share one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound = "D: TypedData")]
pub struct Section<D: TypedData> {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub title: String,
    pub url: String,
    pub parent_id: Option<EntityId>,
    pub site_ids: Vec<SiteId>,
    pub is_published: bool,
    pub date_published: Option<DateTime<Utc>>,
    pub data: D,
}

impl<D: TypedData> Section<D> {
    pub fn new(title: impl Into<String>, url: impl Into<String>, site_ids: Vec<SiteId>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            site_ids,
            ..Default::default()
        }
    }
}

impl<D: TypedData> Entity for Section<D> {
    const TABLE: &'static str = "sections";

    fn family() -> EntityFamily {
        EntityFamily::Section
    }

    fn type_name() -> String {
        format!("section.{}", D::DISCRIMINATOR)
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> Vec<EntityField> {
        let mut fields = self.meta.fields();
        fields.extend([
            EntityField::scalar("title", &self.title).required(),
            EntityField::scalar("url", &self.url).required(),
            EntityField::scalar("parent_id", self.parent_id),
            EntityField::scalar("site_ids", self.site_ids.as_slice()).required(),
            EntityField::scalar("is_published", self.is_published),
            EntityField::scalar("date_published", self.date_published),
            EntityField::scalar("data", payload_json(&self.data)),
        ]);
        fields
    }

    fn validators(context: &Arc<DataContext>) -> Vec<Arc<dyn Validator<Self>>> {
        vec![Arc::new(UrlUniquenessValidator::new(context.clone()))]
    }
}

impl<D: TypedData> PolymorphicEntity for Section<D> {
    type Data = D;
}

impl<D: TypedData> SiteEntity for Section<D> {
    fn site_ids(&self) -> &[SiteId] {
        &self.site_ids
    }
}

impl<D: TypedData> Publishable for Section<D> {
    fn is_published(&self) -> bool {
        self.is_published
    }

    fn date_published(&self) -> Option<DateTime<Utc>> {
        self.date_published
    }
}

impl<D: TypedData> Routable for Section<D> {
    fn url(&self) -> &str {
        &self.url
    }
}
