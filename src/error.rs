//! Error types shared by the compositor, the renderer and the service client.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced anywhere in the invoice pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvoiceError {
    /// The invoice record is missing a field or carries a malformed value.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The markup could not be laid out or turned into PDF bytes.
    #[error("render failed: {0}")]
    Render(String),

    /// A file-based entry point was pointed at a path that does not exist.
    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The remote service rejected the bearer token.
    #[error("authorization rejected: {0}")]
    Auth(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote service answered with a non-success status.
    #[error("service returned HTTP {status}: {detail}")]
    Service { status: u16, detail: String },

    #[cfg(feature = "client")]
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl InvoiceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

impl From<taffy::TaffyError> for InvoiceError {
    fn from(e: taffy::TaffyError) -> Self {
        Self::Render(format!("layout: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, InvoiceError>;

/// A single validation failure with the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the invalid field (e.g. `items[1].price_aed`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
    /// Zero-based line item index when the failure is inside `items`.
    pub item: Option<usize>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            item: None,
        }
    }

    /// A failure on field `field` of line item `index`.
    pub fn item(index: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            field: format!("items[{index}].{field}"),
            message: message.into(),
            item: Some(index),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_error_names_index_and_field() {
        let e = ValidationError::item(2, "quantity", "missing required field");
        assert_eq!(e.item, Some(2));
        assert_eq!(e.to_string(), "items[2].quantity: missing required field");
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            InvoiceError::io("invoice.html", io),
            InvoiceError::NotFound(_)
        ));
    }

    #[test]
    fn other_io_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = InvoiceError::io("out.pdf", io);
        assert!(matches!(err, InvoiceError::Io { .. }));
        assert!(err.to_string().contains("out.pdf"));
    }
}
