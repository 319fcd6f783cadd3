use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: String, id: Uuid },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Type {0} is not registered")]
    NotRegistered(String),

    #[error("Invalid properties scope: {0}")]
    InvalidPropertiesScope(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl CmsError {
    pub fn not_found(entity_type: impl Into<String>, id: Uuid) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Registration and startup problems: a deployment bug, not a user error.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::NotRegistered(_) | Self::InvalidPropertiesScope(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CmsError>;

impl From<serde_json::Error> for CmsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CmsError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
