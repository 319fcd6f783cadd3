use super::{Entity, EntityMeta, Routable};
use crate::core::EntityField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub title: String,
    pub url: String,
}

impl Site {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Entity for Site {
    const TABLE: &'static str = "sites";

    fn type_name() -> String {
        "site".to_string()
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> Vec<EntityField> {
        let mut fields = self.meta.fields();
        fields.push(EntityField::scalar("title", &self.title).required());
        fields.push(EntityField::scalar("url", &self.url).required());
        fields
    }
}

impl Routable for Site {
    fn url(&self) -> &str {
        &self.url
    }
}
