use super::{
    Entity, EntityFamily, EntityMeta, PolymorphicEntity, Publishable, Routable, SectionEntity,
    SiteEntity, TypedData, payload_json,
};
use crate::context::DataContext;
use crate::core::{EntityField, EntityId, SiteId};
use crate::validation::{UrlUniquenessValidator, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Ordered body block of a content item or page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: Uuid,
    pub block_type: String,
    pub position: i32,
    pub data: serde_json::Value,
}

impl ContentBlock {
    pub fn new(block_type: impl Into<String>, position: i32, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_type: block_type.into(),
            position,
            data,
        }
    }
}

/// Author reference attached to a content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// Content variant carrying payload `D`. All variants share one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound = "D: TypedData")]
pub struct ContentItem<D: TypedData> {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub title: String,
    pub url: String,
    pub author_id: Option<String>,
    pub author: Option<Author>,
    pub site_ids: Vec<SiteId>,
    pub section_ids: Vec<EntityId>,
    pub tag_ids: Vec<EntityId>,
    pub is_published: bool,
    pub date_published: Option<DateTime<Utc>>,
    pub blocks: Vec<ContentBlock>,
    pub data: D,
}

impl<D: TypedData> ContentItem<D> {
    pub fn new(title: impl Into<String>, url: impl Into<String>, site_ids: Vec<SiteId>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            site_ids,
            ..Default::default()
        }
    }

    pub fn publish(&mut self) {
        self.is_published = true;
        self.date_published = Some(Utc::now());
    }

    pub fn unpublish(&mut self) {
        self.is_published = false;
        self.date_published = None;
    }
}

impl<D: TypedData> Entity for ContentItem<D> {
    const TABLE: &'static str = "content_items";

    fn family() -> EntityFamily {
        EntityFamily::Content
    }

    fn type_name() -> String {
        format!("content.{}", D::DISCRIMINATOR)
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
            EntityField::scalar("author_id", self.author_id.clone()),
            EntityField::scalar("site_ids", self.site_ids.as_slice()).required(),
            EntityField::scalar("section_ids", self.section_ids.as_slice()),
            EntityField::scalar("tag_ids", self.tag_ids.as_slice()),
            EntityField::scalar("is_published", self.is_published),
            EntityField::scalar("date_published", self.date_published),
            EntityField::scalar("data", payload_json(&self.data)),
            EntityField::relation("author", payload_json(&self.author)),
            EntityField::relation("blocks", payload_json(&self.blocks)),
        ]);
        fields
    }

    fn validators(context: &Arc<DataContext>) -> Vec<Arc<dyn Validator<Self>>> {
        vec![Arc::new(UrlUniquenessValidator::new(context.clone()))]
    }
}

impl<D: TypedData> PolymorphicEntity for ContentItem<D> {
    type Data = D;
}

impl<D: TypedData> SiteEntity for ContentItem<D> {
    fn site_ids(&self) -> &[SiteId] {
        &self.site_ids
    }
}

impl<D: TypedData> SectionEntity for ContentItem<D> {
    fn section_ids(&self) -> &[EntityId] {
        &self.section_ids
    }

    fn tag_ids(&self) -> &[EntityId] {
        &self.tag_ids
    }
}

impl<D: TypedData> Publishable for ContentItem<D> {
    fn is_published(&self) -> bool {
        self.is_published
    }

    fn date_published(&self) -> Option<DateTime<Utc>> {
        self.date_published
    }
}

impl<D: TypedData> Routable for ContentItem<D> {
    fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {}

impl TypedData for PostData {
    const DISCRIMINATOR: &'static str = "post";
    const TITLE: &'static str = "Post";
}

pub type Post = ContentItem<PostData>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldValue;

    #[test]
    fn test_post_type_name_and_family() {
        assert_eq!(Post::type_name(), "content.post");
        assert_eq!(Post::family(), EntityFamily::Content);
        assert_eq!(Post::TABLE, "content_items");
    }

    #[test]
    fn test_fields_include_relations() {
        let mut post = Post::new("Hello", "hello", vec![Uuid::new_v4()]);
        post.blocks.push(ContentBlock::new("text", 0, serde_json::json!({ "text": "hi" })));

        let blocks = post.field("blocks").unwrap();
        assert_eq!(blocks.kind, crate::core::FieldKind::Relation);
        assert!(matches!(blocks.value, FieldValue::Json(_)));
        assert!(post.field("title").unwrap().required);
        assert!(post.field("missing").is_none());
    }

    #[test]
    fn test_properties_are_not_serialized() {
        let post = Post::new("Hello", "hello", vec![]);
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("properties").is_none());
        assert!(json.get("id").is_some());
        let back: Post = serde_json::from_value(json).unwrap();
        assert_eq!(back.title, "Hello");
    }

    #[test]
    fn test_publish_toggles_date() {
        let mut post = Post::default();
        post.publish();
        assert!(post.is_published);
        assert!(post.date_published.is_some());
        post.unpublish();
        assert!(post.date_published.is_none());
    }
}
