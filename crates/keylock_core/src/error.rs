//! Core error types for keylock.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid encoding
    InvalidEncoding {
        /// What failed to encode or decode
        reason: String,
    },

    /// Validation error
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Duplicate node identifier
    DuplicateNode {
        /// The repeated identifier
        id: String,
    },

    /// Not found
    NotFound {
        /// Kind of thing looked up
        kind: String,
        /// Identifier that was missing
        id: String,
    },

    /// I/O failure while reading configuration
    Io {
        /// Path being read
        path: String,
        /// Underlying error message
        message: String,
    },
}

impl CoreError {
    /// Shorthand for a validation failure
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::DuplicateNode { id } => write!(f, "Duplicate node id: {}", id),
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::Io { path, message } => write!(f, "Failed to read {}: {}", path, message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::NotFound {
            kind: "Node".to_string(),
            id: "n4".to_string(),
        };
        assert_eq!(format!("{}", err), "Node not found: n4");

        let err = CoreError::validation("nodes_ids", "must not be empty");
        assert_eq!(
            format!("{}", err),
            "Validation failed for nodes_ids: must not be empty"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = CoreError::from(json_err);
        assert!(matches!(err, CoreError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::DuplicateNode { id: "a".to_string() };
        let err2 = CoreError::DuplicateNode { id: "a".to_string() };
        assert_eq!(err1, err2);
        assert_ne!(err1, CoreError::DuplicateNode { id: "b".to_string() });
    }
}
