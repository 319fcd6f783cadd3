//! Lifecycle hooks around repository mutations.
//!
//! Every add/update runs `BeforeValidate -> validate -> BeforeSave -> persist
//! -> AfterSave`; deletes run `AfterDelete` once the row is gone. The two
//! `Before*` phases can veto the mutation by returning [`HookFlow::Abort`].
//! The `After*` phases are best effort: their errors are logged and dropped.

pub mod manager;

pub use manager::RepositoryHooksManager;

use crate::core::{EntityField, EntityId, Result};
use crate::entities::{Entity, EntityFamily};
use crate::repository::{OperationContext, PropertyChange};
use crate::validation::ValidationResult;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Abort,
}

impl HookFlow {
    pub fn is_abort(&self) -> bool {
        matches!(self, HookFlow::Abort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeValidate,
    BeforeSave,
    AfterSave,
    AfterDelete,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::BeforeValidate => write!(f, "before_validate"),
            HookPhase::BeforeSave => write!(f, "before_save"),
            HookPhase::AfterSave => write!(f, "after_save"),
            HookPhase::AfterDelete => write!(f, "after_delete"),
        }
    }
}

/// Entities a hook is interested in. A family target covers every variant of
/// that family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTarget {
    Entity(String),
    Family(EntityFamily),
    Any,
}

impl HookTarget {
    pub fn entity<E: Entity>() -> Self {
        HookTarget::Entity(E::type_name())
    }

    pub fn matches(&self, entity_type: &str, family: EntityFamily) -> bool {
        match self {
            HookTarget::Entity(name) => name == entity_type,
            HookTarget::Family(target) => *target == family,
            HookTarget::Any => true,
        }
    }
}

/// Object-safe view of an entity handed to hooks.
pub trait HookSubject: Send + Sync {
    fn subject_id(&self) -> EntityId;
    fn subject_type(&self) -> String;
    fn subject_family(&self) -> EntityFamily;
    fn subject_fields(&self) -> Vec<EntityField>;
    fn to_json(&self) -> Result<serde_json::Value>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> HookSubject for T {
    fn subject_id(&self) -> EntityId {
        self.id()
    }

    fn subject_type(&self) -> String {
        self.entity_type()
    }

    fn subject_family(&self) -> EntityFamily {
        T::family()
    }

    fn subject_fields(&self) -> Vec<EntityField> {
        self.fields()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
pub trait RepositoryHook: Send + Sync {
    fn name(&self) -> &str;

    fn target(&self) -> HookTarget {
        HookTarget::Any
    }

    /// May append failures to `validation` before validators run.
    async fn before_validate(
        &self,
        _item: &mut dyn HookSubject,
        _validation: &mut ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        Ok(HookFlow::Continue)
    }

    async fn before_save(
        &self,
        _item: &mut dyn HookSubject,
        _validation: &ValidationResult,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        Ok(HookFlow::Continue)
    }

    async fn after_save(
        &self,
        _item: &dyn HookSubject,
        _changes: Option<&[PropertyChange]>,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _item: &dyn HookSubject,
        _context: Option<&OperationContext>,
    ) -> Result<()> {
        Ok(())
    }
}
