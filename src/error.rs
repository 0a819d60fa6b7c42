use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the catalog pipeline.
///
/// Everything except `ImagePathUnrecognized` is fatal and aborts the run
/// before any catalog output is written. `ImagePathUnrecognized` is reported
/// per image; the run continues without that download.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("config file '{}' not found", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid JSON in config file: {0}")]
    ConfigInvalid(String),

    #[error("missing required config fields: {}", .0.join(", "))]
    ConfigIncomplete(Vec<String>),

    #[error("remote request failed with HTTP {status}: {body}")]
    RemoteRequestFailed { status: u16, body: String },

    #[error("unrecognized image path: {0}")]
    ImagePathUnrecognized(String),

    #[error("no image column found in table '{0}'")]
    NoImageColumnFound(String),
}
