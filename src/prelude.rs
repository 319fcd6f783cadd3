//! Common imports for application code.
//!
//! `use contentdb::prelude::*;` brings in the engine, the entity traits and
//! the repository surface.

pub use crate::config::{CmsConfig, StorageConfig};
pub use crate::core::{CmsError, EntityId, Result, SiteId};
pub use crate::engine::{Cms, CmsBuilder};
pub use crate::entities::{
    ContentBlock, ContentItem, Entity, EntityFamily, Page, Post, PostData, Publishable, Routable,
    Section, SectionEntity, Site, SiteEntity, Tag, TypedData,
};
pub use crate::hooks::{HookFlow, HookSubject, HookTarget, RepositoryHook};
pub use crate::properties::{PropertiesQuantity, PropertiesSet, SeoPropertiesSet};
pub use crate::query::Query;
pub use crate::repository::{
    AddOrUpdateResult, MutationStatus, OperationContext, PropertyChange, Repository,
};
pub use crate::search::{SearchDocument, SearchIndexer};
pub use crate::validation::{ValidationFailure, ValidationResult, Validator};
