use super::{PropertiesQuantity, PropertiesSet, PropertiesValueObject};
use crate::core::{CmsError, Result};
use crate::entities::{Entity, EntityFamily};
use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Where a properties set applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegistrationTarget {
    /// One concrete entity type, by type name
    Entity(String),
    /// Every section variant
    AllSections,
    /// Every content variant
    AllContent,
}

impl RegistrationTarget {
    pub fn applies_to(&self, entity_type: &str, family: EntityFamily) -> bool {
        match self {
            RegistrationTarget::Entity(name) => name == entity_type,
            RegistrationTarget::AllSections => family == EntityFamily::Section,
            RegistrationTarget::AllContent => family == EntityFamily::Content,
        }
    }
}

impl fmt::Display for RegistrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationTarget::Entity(name) => write!(f, "{}", name),
            RegistrationTarget::AllSections => write!(f, "all sections"),
            RegistrationTarget::AllContent => write!(f, "all content"),
        }
    }
}

type DefaultFn = fn() -> Box<dyn PropertiesValueObject>;
type DecodeFn = fn(serde_json::Value) -> Result<Box<dyn PropertiesValueObject>>;

fn default_value<P: PropertiesSet>() -> Box<dyn PropertiesValueObject> {
    Box::new(P::default())
}

fn decode_value<P: PropertiesSet>(data: serde_json::Value) -> Result<Box<dyn PropertiesValueObject>> {
    let value: P = serde_json::from_value(data)?;
    Ok(Box::new(value))
}

/// Static descriptor of one registered properties set.
pub struct PropertiesSchema {
    key: &'static str,
    title: &'static str,
    quantity: PropertiesQuantity,
    type_id: TypeId,
    type_name: &'static str,
    targets: BTreeSet<RegistrationTarget>,
    default_fn: DefaultFn,
    decode_fn: DecodeFn,
}

impl PropertiesSchema {
    fn of<P: PropertiesSet>() -> Self {
        Self {
            key: P::KEY,
            title: P::TITLE,
            quantity: P::QUANTITY,
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
            targets: BTreeSet::new(),
            default_fn: default_value::<P>,
            decode_fn: decode_value::<P>,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn quantity(&self) -> PropertiesQuantity {
        self.quantity
    }

    pub fn targets(&self) -> impl Iterator<Item = &RegistrationTarget> {
        self.targets.iter()
    }

    pub fn is_registered_for(&self, entity_type: &str, family: EntityFamily) -> bool {
        self.targets
            .iter()
            .any(|target| target.applies_to(entity_type, family))
    }

    pub fn instantiate_default(&self) -> Box<dyn PropertiesValueObject> {
        (self.default_fn)()
    }

    pub fn decode(&self, data: serde_json::Value) -> Result<Box<dyn PropertiesValueObject>> {
        (self.decode_fn)(data)
    }
}

impl fmt::Debug for PropertiesSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesSchema")
            .field("key", &self.key)
            .field("quantity", &self.quantity)
            .field("type", &self.type_name)
            .field("targets", &self.targets)
            .finish()
    }
}

/// Collects registrations before the registry is frozen.
///
/// Registering the same set for the same target twice is a no-op; registering
/// it for another target widens its applicability. Two different types
/// claiming the same key are reported by [`build`](Self::build).
#[derive(Default)]
pub struct PropertiesRegistryBuilder {
    schemas: BTreeMap<&'static str, PropertiesSchema>,
    conflicts: Vec<String>,
}

impl PropertiesRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_for<P: PropertiesSet, E: Entity>(self) -> Self {
        self.register::<P>(RegistrationTarget::Entity(E::type_name()))
    }

    pub fn register_for_type<P: PropertiesSet>(self, entity_type: impl Into<String>) -> Self {
        self.register::<P>(RegistrationTarget::Entity(entity_type.into()))
    }

    pub fn register_for_all_sections<P: PropertiesSet>(self) -> Self {
        self.register::<P>(RegistrationTarget::AllSections)
    }

    pub fn register_for_all_content<P: PropertiesSet>(self) -> Self {
        self.register::<P>(RegistrationTarget::AllContent)
    }

    /// Registers a set used only through global (entity-less) get/set.
    pub fn register_global<P: PropertiesSet>(mut self) -> Self {
        self.schema_entry::<P>();
        self
    }

    pub fn register<P: PropertiesSet>(mut self, target: RegistrationTarget) -> Self {
        if let Some(schema) = self.schema_entry::<P>() {
            schema.targets.insert(target);
        }
        self
    }

    fn schema_entry<P: PropertiesSet>(&mut self) -> Option<&mut PropertiesSchema> {
        let schema = self
            .schemas
            .entry(P::KEY)
            .or_insert_with(PropertiesSchema::of::<P>);

        if schema.type_id != TypeId::of::<P>() {
            self.conflicts.push(format!(
                "properties key '{}' claimed by both {} and {}",
                P::KEY,
                schema.type_name,
                type_name::<P>()
            ));
            return None;
        }
        Some(schema)
    }

    pub fn build(self) -> Result<PropertiesRegistry> {
        if !self.conflicts.is_empty() {
            return Err(CmsError::Configuration(self.conflicts.join("; ")));
        }

        for schema in self.schemas.values() {
            let targets: Vec<String> = schema.targets.iter().map(|t| t.to_string()).collect();
            log::debug!(
                "properties set '{}' ({:?}) registered for {}",
                schema.key,
                schema.quantity,
                targets.join(", ")
            );
        }

        Ok(PropertiesRegistry {
            schemas: self.schemas,
        })
    }
}

/// Frozen catalog of properties sets. Read-only after startup.
#[derive(Debug, Default)]
pub struct PropertiesRegistry {
    schemas: BTreeMap<&'static str, PropertiesSchema>,
}

impl PropertiesRegistry {
    pub fn builder() -> PropertiesRegistryBuilder {
        PropertiesRegistryBuilder::new()
    }

    pub fn resolve(&self, key: &str) -> Result<&PropertiesSchema> {
        self.schemas
            .get(key)
            .ok_or_else(|| CmsError::NotRegistered(format!("properties set '{}'", key)))
    }

    pub fn schema_for<P: PropertiesSet>(&self) -> Result<&PropertiesSchema> {
        match self.schemas.get(P::KEY) {
            Some(schema) if schema.type_id == TypeId::of::<P>() => Ok(schema),
            _ => Err(CmsError::NotRegistered(format!(
                "properties set '{}' ({})",
                P::KEY,
                type_name::<P>()
            ))),
        }
    }

    pub fn instantiate_default(&self, key: &str) -> Result<Box<dyn PropertiesValueObject>> {
        Ok(self.resolve(key)?.instantiate_default())
    }

    /// Schemas applicable to an entity type, in key order.
    pub fn applicable(&self, entity_type: &str, family: EntityFamily) -> Vec<&PropertiesSchema> {
        self.schemas
            .values()
            .filter(|schema| schema.is_registered_for(entity_type, family))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
