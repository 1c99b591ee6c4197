//! Error taxonomy shared by every overlay operation.
//!
//! Failures are caught at the operation boundary (button handler, hook
//! intent, CLI step), logged, and turned into a toast. Nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// Unreadable or corrupt asset. Prior state is left untouched.
    #[error("failed to load '{path}': {reason}")]
    Load { path: PathBuf, reason: String },

    /// Vector document could not be parsed or serialized.
    #[error("vector document error: {0}")]
    Document(String),

    /// An image with this identity is already loaded.
    #[error("an image named '{0}' is already loaded")]
    DuplicateName(String),

    /// The operation referenced an unknown image identity.
    #[error("no image named '{0}'")]
    NotFound(String),

    /// Malformed or missing coordinate binding file.
    #[error("coordinate file error: {0}")]
    CoordinateFile(String),

    /// Writing an exported image failed.
    #[error("export to '{path}' failed: {reason}")]
    Export { path: PathBuf, reason: String },

    /// An input hook could not be installed.
    #[error("input hook error: {0}")]
    Hook(String),
}

impl OverlayError {
    pub fn load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        OverlayError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        OverlayError::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short title used for toast notifications.
    pub fn title(&self) -> &'static str {
        match self {
            OverlayError::Load { .. } => "Load Failed",
            OverlayError::Document(_) => "Export Failed",
            OverlayError::DuplicateName(_) => "Name In Use",
            OverlayError::NotFound(_) => "Unknown Image",
            OverlayError::CoordinateFile(_) => "Coordinates",
            OverlayError::Export { .. } => "Export Failed",
            OverlayError::Hook(_) => "Hotkey Error",
        }
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
