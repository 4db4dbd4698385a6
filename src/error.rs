//! Error types for story archives
//!
//! Two subsystems can fail:
//! - Parsing (snapshot bytes, manifests read back from disk)
//! - Archiving (bad page URLs, duplicate stories or snapshots)
//!
//! Filesystem failures surface as [`Error::Io`] with the offending path folded into the message;
//! JSON encoding failures as [`Error::Serialize`].
//! All errors use the `thiserror` crate.

use thiserror::Error;

/// Result type alias for story archive operations
///
/// # Examples
///
/// ```
/// use story_archive::Result;
///
/// fn derive() -> Result<String> {
///     Ok("file/Test Story".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
  /// Snapshot or manifest bytes could not be interpreted
  #[error("Parse error: {0}")]
  Parse(#[from] ParseError),

  /// Invalid archive inputs
  #[error("Archive error: {0}")]
  Archive(#[from] ArchiveError),

  /// Directory creation or file write/read failure
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// A snapshot or manifest could not be encoded as JSON
  #[error("Serialize error: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Errors raised while interpreting serialized input
///
/// # Examples
///
/// ```
/// use story_archive::error::ParseError;
///
/// let error = ParseError::InvalidSnapshot {
///     name: "home".to_string(),
///     message: "expected value at line 1 column 1".to_string(),
/// };
/// assert!(error.to_string().contains("home"));
/// ```
#[derive(Error, Debug, Clone)]
pub enum ParseError {
  /// Snapshot bytes are not a serialized DOM snapshot tree
  #[error("Invalid snapshot '{name}': {message}")]
  InvalidSnapshot { name: String, message: String },

  /// A manifest on disk is not a story manifest
  #[error("Invalid manifest: {message}")]
  InvalidManifest { message: String },
}

/// Errors caused by invalid inputs to the archive writer or snapshot store
#[derive(Error, Debug, Clone)]
pub enum ArchiveError {
  /// The page URL used as the base for reference resolution is not absolute
  #[error("Invalid page URL '{url}': {reason}")]
  InvalidPageUrl { url: String, reason: String },

  /// Two snapshots of one test produced the same story name
  #[error("Duplicate story name '{name}'")]
  DuplicateStory { name: String },

  /// A snapshot with this name was already recorded for the test
  #[error("Snapshot '{name}' already recorded for test '{test_id}'")]
  DuplicateSnapshot { test_id: String, name: String },
}

impl Error {
  /// Wraps an I/O error with the path it happened on.
  pub(crate) fn io_at(path: &std::path::Path, action: &str, err: std::io::Error) -> Self {
    Error::Io(std::io::Error::new(
      err.kind(),
      format!("Failed to {action} {path:?}: {err}"),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn test_parse_error_invalid_snapshot() {
    let error = ParseError::InvalidSnapshot {
      name: "Snapshot #1".to_string(),
      message: "EOF while parsing".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("Snapshot #1"));
    assert!(display.contains("EOF while parsing"));
  }

  #[test]
  fn test_archive_error_duplicate_snapshot() {
    let error = ArchiveError::DuplicateSnapshot {
      test_id: "a".to_string(),
      name: "home".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("'home'"));
    assert!(display.contains("'a'"));
  }

  #[test]
  fn test_error_from_parse_error() {
    let error: Error = ParseError::InvalidManifest {
      message: "missing field `title`".to_string(),
    }
    .into();
    let display = format!("{}", error);
    assert!(display.contains("Parse error"));
    assert!(display.contains("missing field `title`"));
  }

  #[test]
  fn test_io_at_keeps_kind_and_path() {
    let error = Error::io_at(
      Path::new("/tmp/out/archive"),
      "create directory",
      std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    match error {
      Error::Io(inner) => {
        assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        assert!(inner.to_string().contains("/tmp/out/archive"));
        assert!(inner.to_string().contains("create directory"));
      }
      other => panic!("expected I/O error, got {other:?}"),
    }
  }

  #[test]
  fn test_error_from_serde_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_err.into();
    assert!(matches!(error, Error::Serialize(_)));
    assert!(error.to_string().starts_with("Serialize error"));
    let _: &dyn std::error::Error = &error;
  }
}
