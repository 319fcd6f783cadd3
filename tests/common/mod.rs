#![allow(dead_code)]

use async_trait::async_trait;
use contentdb::entities::{ContentItem, PostData, Section, TypedData};
use contentdb::hooks::{HookFlow, HookPhase, HookSubject, HookTarget, RepositoryHook};
use contentdb::properties::{PropertiesQuantity, PropertiesSet};
use contentdb::repository::{OperationContext, PropertyChange};
use contentdb::search::InMemorySearchIndex;
use contentdb::storage::InMemoryStorage;
use contentdb::validation::ValidationResult;
use contentdb::{Cms, CmsBuilder, CmsConfig, CmsError, Result, StorageConfig};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicData {
    pub summary: String,
}

impl TypedData for TopicData {
    const DISCRIMINATOR: &'static str = "topic";
    const TITLE: &'static str = "Topic";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleData {
    pub reading_minutes: i64,
}

impl TypedData for ArticleData {
    const DISCRIMINATOR: &'static str = "article";
    const TITLE: &'static str = "Article";
}

pub type Topic = Section<TopicData>;
pub type Article = ContentItem<ArticleData>;

/// One value per entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerProperties {
    pub text: String,
    pub visible: bool,
}

impl PropertiesSet for BannerProperties {
    const KEY: &'static str = "banner";
    const TITLE: &'static str = "Banner";
}

/// One value per site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeProperties {
    pub color: String,
}

impl PropertiesSet for ThemeProperties {
    const KEY: &'static str = "theme";
    const TITLE: &'static str = "Theme";
    const QUANTITY: PropertiesQuantity = PropertiesQuantity::OnePerSite;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceProperties {
    pub enabled: bool,
    pub message: String,
}

impl PropertiesSet for MaintenanceProperties {
    const KEY: &'static str = "maintenance";
    const TITLE: &'static str = "Maintenance";
}

pub struct Fixture {
    pub cms: Cms,
    pub storage: Arc<InMemoryStorage>,
    pub index: Arc<InMemorySearchIndex>,
}

/// Engine over a fresh in-memory store with the test variants registered.
pub fn engine<F>(configure: F) -> Fixture
where
    F: FnOnce(CmsBuilder) -> CmsBuilder,
{
    engine_with(CmsConfig::new(StorageConfig::in_memory("tests")), configure)
}

pub fn engine_with<F>(config: CmsConfig, configure: F) -> Fixture
where
    F: FnOnce(CmsBuilder) -> CmsBuilder,
{
    let storage = Arc::new(InMemoryStorage::new("tests"));
    let index = Arc::new(InMemorySearchIndex::new());
    let builder = CmsBuilder::new(config)
        .section::<TopicData>()
        .content::<PostData>()
        .content::<ArticleData>()
        .storage(storage.clone())
        .search_indexer(index.clone());
    let cms = configure(builder).build().unwrap();
    Fixture {
        cms,
        storage,
        index,
    }
}

/// Records every phase it sees as `"<phase>:<entity type>"`.
pub struct RecordingHook {
    target: HookTarget,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingHook {
    pub fn new(target: HookTarget) -> Arc<Self> {
        Arc::new(Self {
            target,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, phase: HookPhase, item: &dyn HookSubject) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", phase, item.subject_type()));
    }
}

#[async_trait]
impl RepositoryHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    fn target(&self) -> HookTarget {
        self.target.clone()
    }

    async fn before_validate(
        &self,
        item: &mut dyn HookSubject,
        _validation: &mut ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        self.record(HookPhase::BeforeValidate, item);
        Ok(HookFlow::Continue)
    }

    async fn before_save(
        &self,
        item: &mut dyn HookSubject,
        _validation: &ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        self.record(HookPhase::BeforeSave, item);
        Ok(HookFlow::Continue)
    }

    async fn after_save(
        &self,
        item: &dyn HookSubject,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        self.record(HookPhase::AfterSave, item);
        Ok(())
    }

    async fn after_delete(
        &self,
        item: &dyn HookSubject,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        self.record(HookPhase::AfterDelete, item);
        Ok(())
    }
}

/// Aborts the pipeline in one phase.
pub struct VetoHook {
    pub phase: HookPhase,
}

#[async_trait]
impl RepositoryHook for VetoHook {
    fn name(&self) -> &str {
        "veto"
    }

    async fn before_validate(
        &self,
        _item: &mut dyn HookSubject,
        _validation: &mut ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        Ok(match self.phase {
            HookPhase::BeforeValidate => HookFlow::Abort,
            _ => HookFlow::Continue,
        })
    }

    async fn before_save(
        &self,
        _item: &mut dyn HookSubject,
        _validation: &ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        Ok(match self.phase {
            HookPhase::BeforeSave => HookFlow::Abort,
            _ => HookFlow::Continue,
        })
    }
}

/// Fails in both after phases.
pub struct FailingHook;

#[async_trait]
impl RepositoryHook for FailingHook {
    fn name(&self) -> &str {
        "failing"
    }

    async fn after_save(
        &self,
        _item: &dyn HookSubject,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        Err(CmsError::Hook("notification service unavailable".into()))
    }

    async fn after_delete(
        &self,
        _item: &dyn HookSubject,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        Err(CmsError::Hook("notification service unavailable".into()))
    }
}
