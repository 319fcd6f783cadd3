use super::{ContentBlock, Entity, EntityMeta, Publishable, Routable, SiteEntity, payload_json};
use crate::context::DataContext;
use crate::core::{EntityField, SiteId};
use crate::validation::{UrlUniquenessValidator, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub title: String,
    pub url: String,
    pub site_ids: Vec<SiteId>,
    pub is_published: bool,
    pub date_published: Option<DateTime<Utc>>,
    pub blocks: Vec<ContentBlock>,
}

impl Entity for Page {
    const TABLE: &'static str = "pages";

    fn type_name() -> String {
        "page".to_string()
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
            EntityField::scalar("site_ids", self.site_ids.as_slice()).required(),
            EntityField::scalar("is_published", self.is_published),
            EntityField::scalar("date_published", self.date_published),
            EntityField::relation("blocks", payload_json(&self.blocks)),
        ]);
        fields
    }

    fn validators(context: &Arc<DataContext>) -> Vec<Arc<dyn Validator<Self>>> {
        vec![Arc::new(UrlUniquenessValidator::new(context.clone()))]
    }
}

impl SiteEntity for Page {
    fn site_ids(&self) -> &[SiteId] {
        &self.site_ids
    }
}

impl Publishable for Page {
    fn is_published(&self) -> bool {
        self.is_published
    }

    fn date_published(&self) -> Option<DateTime<Utc>> {
        self.date_published
    }
}

impl Routable for Page {
    fn url(&self) -> &str {
        &self.url
    }
}
