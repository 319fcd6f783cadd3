// ============================================================================
// ContentDB Library
// ============================================================================
//
// Content-management data layer: generic repositories with a validation and
// hook pipeline, a discriminator registry for single-table polymorphic
// families, and a schema-typed properties overlay.
//
// ============================================================================

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod entities;
pub mod hooks;
pub mod prelude;
pub mod properties;
pub mod query;
pub mod repository;
pub mod search;
pub mod storage;
pub mod type_registry;
pub mod validation;

// Re-export main types for convenience
pub use config::{CmsConfig, StorageConfig};
pub use core::{CmsError, EntityId, FieldValue, Result, SiteId};
pub use engine::{Cms, CmsBuilder};
pub use query::Query;
pub use repository::{AddOrUpdateResult, MutationStatus, OperationContext, Repository};

/// Engine over a fresh in-memory store with the given variants registered
/// through `configure`.
///
/// # Examples
///
/// ```
/// use contentdb::entities::{Post, PostData};
///
/// # tokio_test::block_on(async {
/// let cms = contentdb::in_memory("blog", |builder| builder.content::<PostData>()).unwrap();
/// let posts = cms.repository::<Post>().unwrap();
/// let site = uuid::Uuid::new_v4();
/// let saved = posts.add(Post::new("Hello", "hello", vec![site]), None).await.unwrap();
/// assert!(saved.is_saved());
/// # });
/// ```
pub fn in_memory<F>(name: &str, configure: F) -> Result<Cms>
where
    F: FnOnce(CmsBuilder) -> CmsBuilder,
{
    let config = CmsConfig::new(StorageConfig::in_memory(name));
    configure(CmsBuilder::new(config)).build()
}
