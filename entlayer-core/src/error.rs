//! Error types and result types for model mapping and datastore operations.
//!
//! Every fallible operation in this crate, from compiling a model's mapping
//! state to committing entities through a backend, reports a [`DatastoreError`].
//! Use [`DatastoreResult<T>`] as the return type for fallible operations.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::value::ValueKind;

/// Represents all possible errors that can occur when mapping models or
/// talking to a datastore backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatastoreError {
    /// A property descriptor rejected a field value during encode or decode.
    #[error("Invalid value for field '{field}' of model kind '{kind}'")]
    Validation {
        /// The model kind being encoded or decoded.
        kind: String,
        /// The offending field name.
        field: String,
    },
    /// A value could not be assigned to a field because its type does not match.
    #[error("Field '{field}' of model kind '{kind}' cannot hold a {found} value")]
    TypeMismatch {
        /// The model kind being decoded.
        kind: String,
        /// The field that rejected the value.
        field: String,
        /// The kind of the rejected value.
        found: ValueKind,
    },
    /// Two fields of one model kind map to the same wire property name.
    #[error("Property name '{property}' is used by more than one field of model kind '{kind}'")]
    DuplicateProperty {
        /// The model kind being compiled.
        kind: String,
        /// The contested wire property name.
        property: String,
    },
    /// An entity key names a different kind than the model it is decoded into.
    #[error("Expected key of kind '{expected}', found '{found}'")]
    KindMismatch {
        /// The kind of the target model.
        expected: String,
        /// The kind named by the key.
        found: String,
    },
    /// No model is registered for the given kind.
    #[error("Unknown model kind: {0}")]
    UnknownKind(String),
    /// A query named a field the model does not declare.
    #[error("Unknown field '{field}' on model kind '{kind}'")]
    UnknownField {
        /// The model kind being queried.
        kind: String,
        /// The unknown field name.
        field: String,
    },
    /// An operation required a complete key but was given one without an id.
    #[error("Incomplete key: {0}")]
    IncompleteKey(String),
    /// An insert targeted a key that already holds an entity.
    #[error("Entity already exists: {0}")]
    EntityAlreadyExists(String),
    /// An update targeted a key that holds no entity.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    /// Serialization/deserialization error when converting to or from the wire format.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying datastore backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DatastoreError {
    pub(crate) fn validation(kind: &str, field: &str) -> Self {
        DatastoreError::Validation {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }

    /// Returns `true` if this error was raised by a property descriptor rejecting a value.
    pub fn is_validation(&self) -> bool {
        matches!(self, DatastoreError::Validation { .. } | DatastoreError::TypeMismatch { .. })
    }
}

/// A specialized `Result` type for mapping and datastore operations.
pub type DatastoreResult<T> = Result<T, DatastoreError>;

impl From<SerdeJsonError> for DatastoreError {
    fn from(err: SerdeJsonError) -> Self {
        DatastoreError::Serialization(err.to_string())
    }
}
