//! Discriminator registry for single-table polymorphic families.
//!
//! Built once at startup from an explicit list of variants and read-only
//! afterwards. Every row of a family table carries the discriminator of its
//! concrete variant; repositories use the registry to scope reads and stamp
//! writes.

use crate::core::{CmsError, Result};
use crate::entities::{ContentItem, EntityFamily, PolymorphicEntity, Section, TypedData};
use std::any::{TypeId, type_name};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_id: TypeId,
    pub entity_type: String,
    pub family: EntityFamily,
    pub table: &'static str,
    pub discriminator: &'static str,
    pub title: &'static str,
    /// Rust type name of the payload companion type.
    pub data_type: &'static str,
}

impl TypeDescriptor {
    fn of<T: PolymorphicEntity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            entity_type: T::type_name(),
            family: T::family(),
            table: T::TABLE,
            discriminator: <T::Data as TypedData>::DISCRIMINATOR,
            title: <T::Data as TypedData>::TITLE,
            data_type: type_name::<T::Data>(),
        }
    }
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    types: Vec<TypeDescriptor>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: registering a type twice keeps one entry.
    pub fn register<T: PolymorphicEntity>(mut self) -> Self {
        let type_id = TypeId::of::<T>();
        if !self.types.iter().any(|desc| desc.type_id == type_id) {
            self.types.push(TypeDescriptor::of::<T>());
        }
        self
    }

    pub fn register_section<D: TypedData>(self) -> Self {
        self.register::<Section<D>>()
    }

    pub fn register_content<D: TypedData>(self) -> Self {
        self.register::<ContentItem<D>>()
    }

    /// Validates that no two variants share a discriminator within one table
    /// and freezes the registry.
    pub fn build(mut self) -> Result<TypeRegistry> {
        self.types.sort_by(|a, b| {
            (a.family, a.table, a.discriminator).cmp(&(b.family, b.table, b.discriminator))
        });

        for pair in self.types.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.table == b.table && a.discriminator == b.discriminator {
                return Err(CmsError::Configuration(format!(
                    "discriminator '{}' in table '{}' claimed by both {} and {}",
                    a.discriminator, a.table, a.data_type, b.data_type
                )));
            }
        }

        let mut by_id = HashMap::with_capacity(self.types.len());
        for (idx, desc) in self.types.iter().enumerate() {
            if desc.discriminator.trim().is_empty() {
                return Err(CmsError::Configuration(format!(
                    "type {} has an empty discriminator",
                    desc.data_type
                )));
            }
            log::info!(
                "registered {} type '{}' ({}) with discriminator '{}'",
                desc.family,
                desc.entity_type,
                desc.title,
                desc.discriminator
            );
            by_id.insert(desc.type_id, idx);
        }

        Ok(TypeRegistry {
            types: self.types,
            by_id,
        })
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_id: HashMap<TypeId, usize>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    pub fn resolve<T: 'static>(&self) -> Result<&TypeDescriptor> {
        self.lookup(TypeId::of::<T>()).ok_or_else(|| {
            CmsError::Configuration(format!("type {} is not registered", type_name::<T>()))
        })
    }

    pub fn discriminator<T: 'static>(&self) -> Result<&'static str> {
        Ok(self.resolve::<T>()?.discriminator)
    }

    pub fn lookup(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.by_id.get(&type_id).map(|&idx| &self.types[idx])
    }

    pub fn by_discriminator(&self, table: &str, discriminator: &str) -> Option<&TypeDescriptor> {
        self.types
            .iter()
            .find(|desc| desc.table == table && desc.discriminator == discriminator)
    }

    pub fn list_section_types(&self) -> Vec<&TypeDescriptor> {
        self.list(EntityFamily::Section)
    }

    pub fn list_content_types(&self) -> Vec<&TypeDescriptor> {
        self.list(EntityFamily::Content)
    }

    fn list(&self, family: EntityFamily) -> Vec<&TypeDescriptor> {
        self.types.iter().filter(|desc| desc.family == family).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
