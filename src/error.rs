use std::{path::PathBuf, sync::mpsc::SendError};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Selector of annotation {id} matches no known profile: {reason}")]
    UnrecognizedSelector { id: String, reason: String },
    #[error("Source document is not well-formed XML: {0}")]
    MalformedSourceDocument(String),
    #[error("User {0} has no resolvable display name")]
    UnresolvableCreator(String),
    #[error("Error during exporting annotations to {path} with {exporter:?}: {reason:?}")]
    Export {
        reason: String,
        exporter: String,
        path: PathBuf,
    },
    #[error("Error during importing annotations from {path} with {importer:?}: {reason:?}")]
    Import {
        reason: String,
        importer: String,
        path: PathBuf,
    },
    #[error("Cannot open workflow file {file}: {reason}")]
    OpenWorkflowFile {
        file: PathBuf,
        reason: std::io::Error,
    },
    #[error("Failed to send status message: {0}")]
    SendingStatusMessageFailed(String),
    #[error("Failed to join the background thread")]
    JoinHandle,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl<T> From<SendError<T>> for ExportError {
    fn from(e: SendError<T>) -> Self {
        Self::SendingStatusMessageFailed(e.to_string())
    }
}
