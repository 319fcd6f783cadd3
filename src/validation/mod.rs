//! Field-level validation.
//!
//! Validators never raise on bad input: they return [`ValidationFailure`]s
//! that the repository accumulates into a [`ValidationResult`]. An `Err` from
//! a validator means the check itself could not run (storage fault).

use crate::context::DataContext;
use crate::core::Result;
use crate::entities::{Entity, Routable, SiteEntity};
use crate::repository::PropertyChange;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered failures of one add/update. Valid when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.failures.push(ValidationFailure::new(field, message));
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = ValidationFailure>) {
        self.failures.extend(failures);
    }

    pub fn has_failure_for(&self, field: &str) -> bool {
        self.failures.iter().any(|failure| failure.field == field)
    }
}

#[async_trait]
pub trait Validator<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(
        &self,
        item: &T,
        changes: Option<&[PropertyChange]>,
    ) -> Result<Vec<ValidationFailure>>;
}

/// Baseline checks shared by every entity: non-nil id, required fields set.
pub struct EntityValidator;

#[async_trait]
impl<T: Entity> Validator<T> for EntityValidator {
    fn name(&self) -> &str {
        "entity"
    }

    async fn validate(
        &self,
        item: &T,
        _changes: Option<&[PropertyChange]>,
    ) -> Result<Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        if item.id().is_nil() {
            failures.push(ValidationFailure::new("id", "identifier must be assigned"));
        }
        for field in item.fields() {
            if field.required && field.name != "id" && field.value.is_empty() {
                failures.push(ValidationFailure::new(
                    field.name,
                    format!("'{}' is required", field.name),
                ));
            }
        }
        Ok(failures)
    }
}

/// Rejects a url already used by another row of the same table that shares
/// at least one site with the item.
pub struct UrlUniquenessValidator {
    context: Arc<DataContext>,
}

impl UrlUniquenessValidator {
    pub fn new(context: Arc<DataContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl<T: Routable + SiteEntity> Validator<T> for UrlUniquenessValidator {
    fn name(&self) -> &str {
        "url_uniqueness"
    }

    async fn validate(
        &self,
        item: &T,
        _changes: Option<&[PropertyChange]>,
    ) -> Result<Vec<ValidationFailure>> {
        let url = item.url().trim();
        if url.is_empty() {
            return Ok(Vec::new());
        }

        let id = item.id();
        let sites: HashSet<_> = item.site_ids().iter().copied().collect();
        let clashes = self
            .context
            .select(T::TABLE, |row| {
                row.id != id
                    && row.text("url") == Some(url)
                    && row.uuid_list("site_ids").iter().any(|site| sites.contains(site))
            })
            .await?;

        if clashes.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![ValidationFailure::new(
                "url",
                format!("url '{}' is already used on this site", url),
            )])
        }
    }
}
