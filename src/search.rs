//! Search synchronization through repository hooks.
//!
//! The indexing backend is an external collaborator behind [`SearchIndexer`].
//! [`SearchRepositoryHook`] keeps it in sync after saves and deletes; its
//! failures are best effort like any other after-phase hook.

use crate::core::{CmsError, EntityId, Result, SiteId};
use crate::hooks::{HookSubject, HookTarget, RepositoryHook};
use crate::repository::{OperationContext, PropertyChange};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub entity_type: String,
    pub id: EntityId,
    pub title: String,
    pub url: String,
    pub site_ids: Vec<SiteId>,
    pub body: serde_json::Value,
}

impl SearchDocument {
    pub fn from_subject(subject: &dyn HookSubject) -> Result<Self> {
        let body = subject.to_json()?;
        let text = |name: &str| {
            body.get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let site_ids = body
            .get("site_ids")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .filter_map(|s| Uuid::parse_str(s).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            entity_type: subject.subject_type(),
            id: subject.subject_id(),
            title: text("title"),
            url: text("url"),
            site_ids,
            body,
        })
    }
}

#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn add_or_update(&self, document: SearchDocument) -> Result<()>;
    async fn delete(&self, entity_type: &str, id: EntityId) -> Result<()>;
}

/// Re-indexes published items after save and drops unpublished or deleted
/// ones. Updates with an empty change-set are skipped.
pub struct SearchRepositoryHook {
    indexer: Arc<dyn SearchIndexer>,
    target: HookTarget,
}

impl SearchRepositoryHook {
    pub fn new(indexer: Arc<dyn SearchIndexer>, target: HookTarget) -> Self {
        Self { indexer, target }
    }
}

fn is_published(subject: &dyn HookSubject) -> Result<bool> {
    let json = subject.to_json()?;
    // entities without a publication flag are always visible
    Ok(json
        .get("is_published")
        .and_then(|v| v.as_bool())
        .unwrap_or(true))
}

#[async_trait]
impl RepositoryHook for SearchRepositoryHook {
    fn name(&self) -> &str {
        "search"
    }

    fn target(&self) -> HookTarget {
        self.target.clone()
    }

    async fn after_save(
        &self,
        item: &dyn HookSubject,
        changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        if changes.is_some_and(|changes| changes.is_empty()) {
            log::debug!(
                "search: {} '{}' unchanged, index untouched",
                item.subject_type(),
                item.subject_id()
            );
            return Ok(());
        }

        if is_published(item)? {
            self.indexer
                .add_or_update(SearchDocument::from_subject(item)?)
                .await
        } else {
            self.indexer
                .delete(&item.subject_type(), item.subject_id())
                .await
        }
    }

    async fn after_delete(
        &self,
        item: &dyn HookSubject,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        self.indexer
            .delete(&item.subject_type(), item.subject_id())
            .await
    }
}

/// Process-local index, used by the demo binary and tests.
#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<BTreeMap<(String, EntityId), SearchDocument>>,
    offline: std::sync::atomic::AtomicBool,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail, to exercise best-effort handling.
    pub fn set_offline(&self, offline: bool) {
        self.offline
            .store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn get(&self, entity_type: &str, id: EntityId) -> Option<SearchDocument> {
        let documents = self.documents.read().await;
        documents.get(&(entity_type.to_string(), id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CmsError::Hook("search index is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndexer for InMemorySearchIndex {
    async fn add_or_update(&self, document: SearchDocument) -> Result<()> {
        self.check_online()?;
        let mut documents = self.documents.write().await;
        documents.insert((document.entity_type.clone(), document.id), document);
        Ok(())
    }

    async fn delete(&self, entity_type: &str, id: EntityId) -> Result<()> {
        self.check_online()?;
        let mut documents = self.documents.write().await;
        documents.remove(&(entity_type.to_string(), id));
        Ok(())
    }
}
