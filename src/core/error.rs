use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsysError {
    #[error("Nothing to select: {0}")]
    Selection(String),

    #[error("Document not found in '{collection}': {id}")]
    NotFound { collection: String, id: Value },

    #[error("Invalid value for field '{field}': {value}")]
    Validation { field: String, value: Value },

    #[error("Field '{field}' expects {expected}, got {value}")]
    Type {
        field: String,
        expected: String,
        value: Value,
    },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{field}' is already taken by another document: {value}")]
    Duplicate { field: String, value: Value },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl ConsysError {
    pub fn validation(field: impl Into<String>, value: Value) -> Self {
        Self::Validation {
            field: field.into(),
            value,
        }
    }

    pub fn not_found(collection: impl Into<String>, id: Value) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id,
        }
    }

    /// True for the errors a caller caused by passing wrong input
    /// (as opposed to lifecycle or store failures).
    pub fn is_wrong_input(&self) -> bool {
        matches!(
            self,
            Self::Selection(_)
                | Self::Validation { .. }
                | Self::Type { .. }
                | Self::UnknownField(_)
                | Self::Duplicate { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConsysError>;

impl From<serde_json::Error> for ConsysError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<regex::Error> for ConsysError {
    fn from(err: regex::Error) -> Self {
        Self::Store(format!("invalid pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_message_names_field_and_value() {
        let err = ConsysError::validation("login", json!("ad"));
        assert_eq!(err.to_string(), "Invalid value for field 'login': \"ad\"");
        assert!(err.is_wrong_input());
    }

    #[test]
    fn state_errors_are_not_wrong_input() {
        let err = ConsysError::State("instance was removed".to_string());
        assert!(!err.is_wrong_input());
    }
}
