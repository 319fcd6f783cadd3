use super::{Entity, EntityMeta};
use crate::core::EntityField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tag {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub title: String,
}

impl Tag {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "tags";

    fn type_name() -> String {
        "tag".to_string()
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
        fields
    }
}
