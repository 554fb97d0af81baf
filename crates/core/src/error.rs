//! Error types for the canonical data model

use thiserror::Error;

/// Result type for data model operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while validating or decoding canonical types
#[derive(Debug, Error)]
pub enum CoreError {
    /// The payload is missing or does not match the item's state
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Unknown event operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Unknown payload kind tag
    #[error("Unknown payload kind: {0}")]
    UnknownPayloadKind(String),

    /// Item identifier could not be parsed
    #[error("Invalid item id: {0}")]
    InvalidItemId(#[from] uuid::Error),

    /// Structurally broken item (e.g. a tombstone carrying user data)
    #[error("Malformed item: {0}")]
    MalformedItem(String),

    /// Version map or payload (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns true if the error is a validation failure of user input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::InvalidOperation(_)
                | Self::UnknownPayloadKind(_)
                | Self::MalformedItem(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_payload_display() {
        let err = CoreError::InvalidPayload("live item without payload".to_string());
        assert!(err.to_string().contains("Invalid payload"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_unknown_kind_display() {
        let err = CoreError::UnknownPayloadKind("photo".to_string());
        assert!(err.to_string().contains("photo"));
    }

    #[test]
    fn test_serialization_is_not_validation() {
        let err: CoreError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert!(!err.is_validation());
    }
}
