use super::FieldValue;
use uuid::Uuid;

/// Identifier of any persisted entity. Generated client-side when absent.
pub type EntityId = Uuid;

/// Sites are entities too, so a site reference is an entity identifier.
pub type SiteId = Uuid;

pub fn new_entity_id() -> EntityId {
    Uuid::new_v4()
}

/// Whether a field is a plain column or a relation-like value attached to the
/// row (blocks, author reference). Both take part in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Relation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityField {
    pub name: &'static str,
    pub value: FieldValue,
    pub kind: FieldKind,
    pub required: bool,
}

impl EntityField {
    pub fn scalar(name: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            value: value.into(),
            kind: FieldKind::Scalar,
            required: false,
        }
    }

    pub fn relation(name: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            value: value.into(),
            kind: FieldKind::Relation,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
