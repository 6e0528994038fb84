use thiserror::Error;

/// Result type for exrmeta operations
pub type Result<T> = std::result::Result<T, ImfError>;

/// Errors that can occur when working with header attributes
#[derive(Error, Debug)]
pub enum ImfError {
    #[error("Attribute not found: {name}")]
    NotFound { name: String },

    #[error("Type mismatch for attribute {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Cannot decode {type_name} attribute: {reason}")]
    Decode { type_name: String, reason: String },

    #[error("Type name {type_name} is already registered to a different value type")]
    RegistryConflict { type_name: String },

    #[error("Invalid attribute name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid header format: {0}")]
    InvalidFormat(String),

    #[error("Attribute {name} declares {size} bytes, limit is {limit}")]
    AttributeTooLarge { name: String, size: i64, limit: usize },

    #[error("JSON conversion error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImfError {
    pub(crate) fn decode(type_name: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }

    /// Returns true if the error concerns a single attribute and leaves the
    /// header or stream usable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::TypeMismatch { .. }
                | Self::Decode { .. }
                | Self::InvalidName { .. }
                | Self::Json(_)
        )
    }

    /// Returns true if the error means the byte stream can no longer be
    /// trusted past this point
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_) | Self::AttributeTooLarge { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ImfError::not_found("owner").is_recoverable());
        assert!(ImfError::decode("m44f", "short").is_recoverable());
        assert!(!ImfError::RegistryConflict {
            type_name: "float".into()
        }
        .is_recoverable());

        let framing = ImfError::InvalidFormat("missing terminator".into());
        assert!(framing.is_framing_error());
        assert!(!framing.is_recoverable());
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = ImfError::TypeMismatch {
            name: "aperture".into(),
            expected: "int".into(),
            found: "float".into(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch for attribute aperture: expected int, found float"
        );
    }
}
