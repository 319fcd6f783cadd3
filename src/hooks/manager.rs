use super::{HookFlow, HookPhase, RepositoryHook};
use crate::core::Result;
use crate::entities::Entity;
use crate::repository::{OperationContext, PropertyChange};
use crate::validation::ValidationResult;
use log::{debug, warn};
use std::sync::Arc;

/// Ordered dispatcher over every registered hook.
///
/// Hooks run in registration order and only for entities matching their
/// [`target`](RepositoryHook::target). The first `Abort` in a `Before*` phase
/// stops that phase.
#[derive(Default, Clone)]
pub struct RepositoryHooksManager {
    hooks: Vec<Arc<dyn RepositoryHook>>,
}

impl RepositoryHooksManager {
    pub fn new(hooks: Vec<Arc<dyn RepositoryHook>>) -> Self {
        Self { hooks }
    }

    pub fn register(&mut self, hook: Arc<dyn RepositoryHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    fn hooks_for<T: Entity>(&self, item: &T) -> impl Iterator<Item = &Arc<dyn RepositoryHook>> {
        let entity_type = item.entity_type();
        let family = T::family();
        self.hooks
            .iter()
            .filter(move |hook| hook.target().matches(&entity_type, family))
    }

    pub async fn before_validate<T: Entity>(
        &self,
        item: &mut T,
        validation: &mut ValidationResult,
        changes: Option<&[PropertyChange]>,
        context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        let hooks: Vec<_> = self.hooks_for(item).cloned().collect();
        for hook in hooks {
            let flow = hook.before_validate(item, validation, changes, context).await?;
            if flow.is_abort() {
                debug!(
                    "hook '{}' aborted {} of {} '{}'",
                    hook.name(),
                    HookPhase::BeforeValidate,
                    item.entity_type(),
                    item.id()
                );
                return Ok(HookFlow::Abort);
            }
        }
        Ok(HookFlow::Continue)
    }

    pub async fn before_save<T: Entity>(
        &self,
        item: &mut T,
        validation: &ValidationResult,
        changes: Option<&[PropertyChange]>,
        context: Option<&OperationContext>,
    ) -> Result<HookFlow> {
        let hooks: Vec<_> = self.hooks_for(item).cloned().collect();
        for hook in hooks {
            let flow = hook.before_save(item, validation, changes, context).await?;
            if flow.is_abort() {
                debug!(
                    "hook '{}' aborted {} of {} '{}'",
                    hook.name(),
                    HookPhase::BeforeSave,
                    item.entity_type(),
                    item.id()
                );
                return Ok(HookFlow::Abort);
            }
        }
        Ok(HookFlow::Continue)
    }

    /// Runs every matching hook; failures are logged and swallowed.
    pub async fn after_save<T: Entity>(
        &self,
        item: &T,
        changes: Option<&[PropertyChange]>,
        context: Option<&OperationContext>,
    ) -> usize {
        let mut failures = 0;
        for hook in self.hooks_for(item) {
            if let Err(err) = hook.after_save(item, changes, context).await {
                failures += 1;
                warn!(
                    "hook '{}' failed in {} for {} '{}': {}",
                    hook.name(),
                    HookPhase::AfterSave,
                    item.entity_type(),
                    item.id(),
                    err
                );
            }
        }
        failures
    }

    /// Runs every matching hook; failures are logged and swallowed.
    pub async fn after_delete<T: Entity>(
        &self,
        item: &T,
        context: Option<&OperationContext>,
    ) -> usize {
        let mut failures = 0;
        for hook in self.hooks_for(item) {
            if let Err(err) = hook.after_delete(item, context).await {
                failures += 1;
                warn!(
                    "hook '{}' failed in {} for {} '{}': {}",
                    hook.name(),
                    HookPhase::AfterDelete,
                    item.entity_type(),
                    item.id(),
                    err
                );
            }
        }
        failures
    }
}
