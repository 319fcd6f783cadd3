//! Startup wiring.
//!
//! Every registration (variants, properties sets, hooks, validators) is made
//! on [`CmsBuilder`] before [`build`](CmsBuilder::build); the resulting
//! [`Cms`] holds frozen registries shared by all repositories.

use crate::config::{CmsConfig, StorageConfig};
use crate::context::DataContext;
use crate::core::{CmsError, Result};
use crate::entities::{Entity, EntityFamily, Page, Site, TypedData};
use crate::hooks::{HookTarget, RepositoryHook, RepositoryHooksManager};
use crate::properties::{
    PropertiesProvider, PropertiesRegistry, PropertiesRegistryBuilder, PropertiesSet,
    SeoPropertiesSet,
};
use crate::repository::{Repository, RepositoryContext};
use crate::search::{SearchIndexer, SearchRepositoryHook};
use crate::storage::{InMemoryStorage, Storage, StorageStats};
use crate::type_registry::{TypeRegistry, TypeRegistryBuilder};
use crate::validation::Validator;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type ValidatorMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

pub struct CmsBuilder {
    config: CmsConfig,
    types: TypeRegistryBuilder,
    properties: PropertiesRegistryBuilder,
    hooks: Vec<Arc<dyn RepositoryHook>>,
    validators: ValidatorMap,
    storage: Option<Arc<dyn Storage>>,
    search_indexer: Option<Arc<dyn SearchIndexer>>,
}

impl CmsBuilder {
    pub fn new(config: CmsConfig) -> Self {
        Self {
            config,
            types: TypeRegistry::builder(),
            properties: PropertiesRegistry::builder(),
            hooks: Vec::new(),
            validators: HashMap::new(),
            storage: None,
            search_indexer: None,
        }
    }

    pub fn section<D: TypedData>(mut self) -> Self {
        self.types = self.types.register_section::<D>();
        self
    }

    pub fn content<D: TypedData>(mut self) -> Self {
        self.types = self.types.register_content::<D>();
        self
    }

    pub fn properties_for<P: PropertiesSet, E: Entity>(mut self) -> Self {
        self.properties = self.properties.register_for::<P, E>();
        self
    }

    pub fn properties_for_type<P: PropertiesSet>(mut self, entity_type: impl Into<String>) -> Self {
        self.properties = self.properties.register_for_type::<P>(entity_type);
        self
    }

    pub fn section_properties<P: PropertiesSet>(mut self) -> Self {
        self.properties = self.properties.register_for_all_sections::<P>();
        self
    }

    pub fn content_properties<P: PropertiesSet>(mut self) -> Self {
        self.properties = self.properties.register_for_all_content::<P>();
        self
    }

    pub fn global_properties<P: PropertiesSet>(mut self) -> Self {
        self.properties = self.properties.register_global::<P>();
        self
    }

    pub fn hook(mut self, hook: Arc<dyn RepositoryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Extra validator appended to every repository of `T`.
    pub fn validator<T: Entity>(mut self, validator: Arc<dyn Validator<T>>) -> Self {
        let slot = self
            .validators
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Vec::<Arc<dyn Validator<T>>>::new()) as Box<dyn Any + Send + Sync>
            });
        if let Some(list) = slot.downcast_mut::<Vec<Arc<dyn Validator<T>>>>() {
            list.push(validator);
        }
        self
    }

    /// Uses an already opened storage engine instead of the configured one.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn search_indexer(mut self, indexer: Arc<dyn SearchIndexer>) -> Self {
        self.search_indexer = Some(indexer);
        self
    }

    pub fn build(self) -> Result<Cms> {
        self.config.validate()?;

        let types = self.types.build()?;

        let mut properties = self.properties;
        if self.config.enable_seo {
            properties = properties
                .register_for_all_sections::<SeoPropertiesSet>()
                .register_for_all_content::<SeoPropertiesSet>()
                .register_for::<SeoPropertiesSet, Site>()
                .register_for::<SeoPropertiesSet, Page>();
        }
        let properties = properties.build()?;

        let mut hooks = RepositoryHooksManager::new(self.hooks);
        if self.config.enable_search_sync {
            if let Some(indexer) = self.search_indexer {
                for target in [
                    HookTarget::Family(EntityFamily::Section),
                    HookTarget::Family(EntityFamily::Content),
                    HookTarget::entity::<Page>(),
                ] {
                    hooks.register(Arc::new(SearchRepositoryHook::new(indexer.clone(), target)));
                }
            }
        }

        let storage = match self.storage {
            Some(storage) => storage,
            None => open_storage(&self.config.storage)?,
        };

        let data = Arc::new(DataContext::new(storage.clone()));
        let properties = Arc::new(PropertiesProvider::new(data.clone(), Arc::new(properties)));

        log::info!(
            "engine ready: storage={}, {} types, {} properties sets, {} hooks",
            self.config.storage.driver(),
            types.len(),
            properties.registry().len(),
            hooks.len()
        );

        let enable_validation = self.config.enable_validation;
        Ok(Cms {
            config: self.config,
            storage,
            repositories: RepositoryContext {
                data,
                types: Arc::new(types),
                properties,
                hooks: Arc::new(hooks),
                enable_validation,
            },
            validators: Arc::new(self.validators),
        })
    }
}

fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config {
        StorageConfig::InMemory { database_name } => {
            Ok(Arc::new(InMemoryStorage::new(database_name.clone())))
        }
        StorageConfig::Postgres { .. } => Err(CmsError::Configuration(format!(
            "storage driver not linked: {}",
            config.driver()
        ))),
    }
}

/// Built engine: shared storage, unit of work and frozen registries.
#[derive(Clone)]
pub struct Cms {
    config: CmsConfig,
    storage: Arc<dyn Storage>,
    repositories: RepositoryContext,
    validators: Arc<ValidatorMap>,
}

impl Cms {
    pub fn builder(config: CmsConfig) -> CmsBuilder {
        CmsBuilder::new(config)
    }

    /// Repository for `T`; configuration error for an unregistered variant.
    pub fn repository<T: Entity>(&self) -> Result<Repository<T>> {
        let mut repository = Repository::<T>::new(self.repositories.clone())?;
        let extra = self
            .validators
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<Vec<Arc<dyn Validator<T>>>>());
        if let Some(extra) = extra {
            for validator in extra {
                repository = repository.with_validator(validator.clone());
            }
        }
        Ok(repository)
    }

    pub fn properties(&self) -> &Arc<PropertiesProvider> {
        &self.repositories.properties
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.repositories.types
    }

    pub fn hooks(&self) -> &Arc<RepositoryHooksManager> {
        &self.repositories.hooks
    }

    pub fn data_context(&self) -> &Arc<DataContext> {
        &self.repositories.data
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &CmsConfig {
        &self.config
    }

    pub fn stats(&self) -> StorageStats {
        self.storage.stats()
    }
}
