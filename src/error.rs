//! Error types for the YAML interchange engine

use std::path::PathBuf;

use thiserror::Error;

/// Result type for interchange operations
pub type Result<T> = std::result::Result<T, InterchangeError>;

/// Interchange errors. Every variant is fatal for the load or save that raised it.
#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Unknown class: {class} ({file})")]
    UnknownClass { class: String, file: PathBuf },

    #[error("Cannot find field: {class}/{field}")]
    UnknownField { class: String, field: String },

    #[error("Class already defined: {0}")]
    DuplicateClass(String),

    #[error("Duplicate collection detected: {0}")]
    DuplicateCollectionPath(String),

    #[error(
        "In collection {collection}, the capacity of array field [{field}] ({capacity}) \
         is less than the number of elements in the array ({len})"
    )]
    ArrayOverCapacity {
        collection: String,
        field: String,
        capacity: u16,
        len: usize,
    },

    #[error(
        "In collection {collection}, the size ({len}) or capacity ({capacity}) of array field \
         [{field}] is greater than the allowed size ({max_count})"
    )]
    ArrayExceedsFieldLimit {
        collection: String,
        field: String,
        max_count: u16,
        capacity: u16,
        len: usize,
    },

    #[error("Collection {collection} already has field {field}")]
    FieldAlreadyPresent { collection: String, field: String },

    #[error("Cannot add field {field} to {collection}: it is a base field")]
    BaseField { collection: String, field: String },

    #[error("Collection {collection} belongs to class {class}, which is not in the schema")]
    UndefinedClass { collection: String, class: String },

    #[error("Null value is not permitted for {collection}[{field}]")]
    NullNotPermitted { collection: String, field: String },

    #[error("Cannot set unknown property of '{type_name}': '{property}' ({collection}[{field}])")]
    UnknownProperty {
        collection: String,
        field: String,
        type_name: String,
        property: String,
    },

    #[error("'{value}' is not a member of enum '{type_name}' ({collection}[{field}])")]
    UnknownEnumVariant {
        collection: String,
        field: String,
        type_name: String,
        value: String,
    },

    #[error("Cannot parse '{text}' as {expected} ({collection}[{field}])")]
    InvalidScalar {
        collection: String,
        field: String,
        text: String,
        expected: String,
    },

    #[error("Expected {expected} for {collection}[{field}]")]
    UnexpectedShape {
        collection: String,
        field: String,
        expected: &'static str,
    },

    #[error("Could not locate blob data file for {collection}[{field}]: {path}")]
    MissingBlobFile {
        collection: String,
        field: String,
        path: PathBuf,
    },

    #[error("Cannot continue loading - unresolved vault dependencies: {}", .vaults.join(", "))]
    UnresolvedVaultDependencies { vaults: Vec<String> },

    #[error("Collection parent chain loops back on itself: {0}")]
    CyclicCollectionParent(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid hierarchy change: {0}")]
    InvalidHierarchy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl InterchangeError {
    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }
}
