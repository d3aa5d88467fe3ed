//! Vault YAML interchange
//!
//! Converts a vault-partitioned attribute database to and from a tree of
//! human-editable YAML files.
//!
//! ## Features
//!
//! - **Schema-driven codec**: every value is decoded against its field's declared type
//! - **Cross-vault hierarchy**: parent links between vaults are resolved in dependency order
//! - **Out-of-line blobs**: binary payloads are stored as sibling files
//! - **Fingerprints**: SHA256 digests of file groups for incremental builds
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├── info.yml                         # classes, types, files, primary vault
//! ├── _blobs/<Class>_<field>.bin       # static-value payloads
//! └── <group>/
//!     └── <file>/
//!         └── <vault>/
//!             ├── <ClassName>.yml      # collections of one class
//!             └── _blobs/
//!                 └── <class>_<collection>_<field>.bin
//! ```

pub mod blob;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod database;
pub mod error;
pub mod hash;
pub mod manifest;
pub mod resolver;
pub mod schema;
pub mod storage;
pub mod types;
pub mod value;
pub mod verbatim;

pub use checksum::{fingerprint, Checksum};
pub use codec::{CodecContext, ValueCodec};
pub use config::{InterchangeConfig, OutputFormat};
pub use database::{Collection, CollectionId, CollectionStore, Database, Vault};
pub use error::{InterchangeError, Result};
pub use manifest::{LoadedFile, Manifest};
pub use schema::{Class, DatabaseKind, Field, FieldKey, SchemaRegistry};
pub use storage::YamlStorage;
pub use types::{TypeRegistry, ValueKind};
pub use value::{ArrayValue, Number, StructValue, Value};
