use super::PropertyChange;
use crate::hooks::HookPhase;
use crate::validation::ValidationResult;
use std::collections::BTreeMap;

/// Caller metadata passed to every hook of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationContext {
    pub user_id: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl OperationContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Persisted (or buffered by an open batch)
    Saved,
    /// Validation failed; nothing was written
    Invalid,
    /// A hook aborted the pipeline in the given phase
    Vetoed(HookPhase),
}

/// Outcome of `add`/`update`. Validation failures are reported here, never as
/// an `Err`.
#[derive(Debug, Clone)]
pub struct AddOrUpdateResult<T> {
    pub item: T,
    pub validation: ValidationResult,
    pub changes: Vec<PropertyChange>,
    pub status: MutationStatus,
}

impl<T> AddOrUpdateResult<T> {
    pub fn is_saved(&self) -> bool {
        self.status == MutationStatus::Saved
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }
}
