pub mod error;
pub mod types;
pub mod value;

pub use error::{CmsError, Result};
pub use types::{EntityField, EntityId, FieldKind, SiteId, new_entity_id};
pub use value::FieldValue;
