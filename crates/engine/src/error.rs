use metafield_core::CoreError;
use metafield_storage::StorageError;
use thiserror::Error;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("entity must exist: course {0}")]
    EntityNotFound(String),

    #[error("no instance id set")]
    MissingInstance,

    #[error("login required")]
    NotLoggedIn,

    #[error("permission denied: {capability} in {context}")]
    PermissionDenied {
        capability: &'static str,
        context: String,
    },
}
