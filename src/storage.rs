//! YAML storage format
//!
//! [`YamlStorage`] is the entry point of the crate: it loads an interchange
//! tree into a [`Database`], saves a database back out, and fingerprints
//! file groups.
//!
//! A load is staged in full before anything is committed. The manifest is
//! read, every selected vault is decoded into a [`PendingSet`], and the
//! resolver plans the hierarchy. Only when all of that succeeded are the
//! schema, vaults and collections moved into the destination database, so a
//! failed load leaves it untouched.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::checksum;
use crate::codec::{CodecContext, ValueCodec};
use crate::database::{Collection, CollectionStore, Database, Vault};
use crate::error::{InterchangeError, Result};
use crate::manifest::{
    read_collections, write_collections, LoadedFile, Manifest, ManifestClass, ManifestField,
    SerializedCollection, MANIFEST_FILE,
};
use crate::resolver::{PendingCollection, PendingSet};
use crate::schema::{Class, DatabaseKind, Field, SchemaRegistry};
use crate::types::TypeRegistry;

const COLLECTION_EXTENSION: &str = "yml";

/// The YAML interchange format
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlStorage;

impl YamlStorage {
    pub fn new() -> Self {
        Self
    }

    pub fn format_id(&self) -> &'static str {
        "yml"
    }

    pub fn format_name(&self) -> &'static str {
        "YAML"
    }

    /// Whether `source_dir` looks like an interchange root
    pub fn can_load_from(&self, source_dir: &Path) -> bool {
        source_dir.join(MANIFEST_FILE).is_file()
    }

    pub fn load_manifest(&self, source_dir: &Path) -> Result<Manifest> {
        Manifest::load(source_dir)
    }

    /// Load the files selected by `file_filter` (all files when `None`) into `database`
    pub fn load(
        &self,
        source_dir: &Path,
        database: &mut Database,
        file_filter: Option<&[String]>,
    ) -> Result<Vec<LoadedFile>> {
        let manifest = Manifest::load(source_dir)?;
        let schema = build_schema(&manifest, database.kind, &database.types, source_dir)?;
        for class in schema.classes() {
            if database.schema.find_class(&class.name).is_some() {
                return Err(InterchangeError::DuplicateClass(class.name.clone()));
            }
        }

        let codec = ValueCodec::new(&database.types);
        let mut pending = PendingSet::new();
        let mut seen_vaults = HashSet::new();
        let mut loaded_files = Vec::new();

        for file in manifest.selected_files(file_filter) {
            let base_dir = file.directory(source_dir);
            for vault_name in &file.vaults {
                if database.find_vault(vault_name).is_some() || !seen_vaults.insert(vault_name) {
                    return Err(InterchangeError::Manifest(format!(
                        "vault '{}' is declared more than once",
                        vault_name
                    )));
                }
                let vault = if *vault_name == manifest.primary_vault_name {
                    Vault::primary(vault_name.as_str())
                } else {
                    Vault::new(vault_name.as_str())
                };
                let index = pending.add_vault(vault);

                let vault_dir = base_dir.join(vault_name.trim());
                if !vault_dir.is_dir() {
                    warn!(
                        vault = %vault_name,
                        path = %vault_dir.display(),
                        "vault has no folder, treating it as empty"
                    );
                    continue;
                }

                let count = read_vault(
                    &codec,
                    &schema,
                    &vault_dir,
                    vault_name,
                    index,
                    &mut pending,
                    &database.collections,
                )?;
                debug!(vault = %vault_name, collections = count, "decoded vault");
            }
            loaded_files.push(file.clone());
        }

        let staged_vaults: Vec<Vault> = pending.vaults().iter().map(|v| v.vault.clone()).collect();
        let plan = pending.resolve(&database.collections)?;

        database.schema.merge(schema)?;
        for vault in staged_vaults {
            database.add_vault(vault)?;
        }
        let attached = plan.apply(&mut database.collections)?;

        info!(
            source = %source_dir.display(),
            files = loaded_files.len(),
            collections = attached,
            "loaded database"
        );
        Ok(loaded_files)
    }

    /// Write `database` under `destination_dir`, limited to the vaults of `files`
    pub fn save(
        &self,
        database: &Database,
        destination_dir: &Path,
        files: &[LoadedFile],
    ) -> Result<()> {
        let primaries: Vec<&Vault> = files
            .iter()
            .flat_map(|f| f.vaults.iter())
            .filter_map(|name| database.find_vault(name))
            .filter(|v| v.is_primary)
            .collect();
        let primary = primaries.first().ok_or_else(|| {
            InterchangeError::Manifest("none of the saved vaults is the primary vault".to_string())
        })?;
        if primaries.len() > 1 {
            warn!(
                primary = %primary.name,
                count = primaries.len(),
                "more than one primary vault, using the first"
            );
        }

        fs::create_dir_all(destination_dir)?;
        let codec = ValueCodec::new(&database.types);

        let manifest = Manifest {
            primary_vault_name: primary.name.clone(),
            classes: database
                .schema
                .classes()
                .iter()
                .map(|class| manifest_class(&codec, class, destination_dir))
                .collect::<Result<_>>()?,
            types: database.schema.types().to_vec(),
            files: files.to_vec(),
        };
        manifest.save(destination_dir)?;

        let mut written = 0;
        for file in files {
            let base_dir = file.directory(destination_dir);
            for vault_name in &file.vaults {
                let vault_dir = base_dir.join(vault_name.trim());
                fs::create_dir_all(&vault_dir)?;
                let count = write_vault(&codec, database, &vault_dir, vault_name)?;
                debug!(vault = %vault_name, collections = count, "wrote vault");
                written += count;
            }
        }

        info!(
            destination = %destination_dir.display(),
            files = files.len(),
            collections = written,
            "saved database"
        );
        Ok(())
    }

    /// Fingerprint of one file group's directory under `source_dir`
    pub fn fingerprint(&self, source_dir: &Path, file: &LoadedFile) -> Result<String> {
        checksum::fingerprint(&file.directory(source_dir))
    }
}

/// Classes and fields from the manifest, keyed for `kind`
fn build_schema(
    manifest: &Manifest,
    kind: DatabaseKind,
    types: &TypeRegistry,
    source_dir: &Path,
) -> Result<SchemaRegistry> {
    let codec = ValueCodec::new(types);
    let mut schema = SchemaRegistry::new();

    for declared in &manifest.classes {
        let mut class = Class::new(declared.name.as_str());
        for declared_field in &declared.fields {
            let mut field = Field::new(
                kind,
                declared_field.name.as_str(),
                declared_field.type_name.as_str(),
            );
            field.flags = declared_field.flags;
            field.alignment = declared_field.alignment;
            field.size = declared_field.size;
            field.max_count = declared_field.max_count;
            field.offset = declared_field.offset;

            if let Some(node) = declared_field.static_value.as_ref().filter(|n| !n.is_null()) {
                let ctx = CodecContext::new(source_dir, &declared.name, field.name.as_str());
                field.static_value = Some(codec.decode(&field, node, &ctx)?);
            }
            class.add_field(field)?;
        }
        schema.add_class(class)?;
    }

    for info in &manifest.types {
        schema.add_type(info.clone());
    }
    Ok(schema)
}

/// Decode every `<ClassName>.yml` in one vault directory into `pending`
fn read_vault(
    codec: &ValueCodec<'_>,
    schema: &SchemaRegistry,
    vault_dir: &Path,
    vault_name: &str,
    vault_index: usize,
    pending: &mut PendingSet,
    existing: &CollectionStore,
) -> Result<usize> {
    let mut count = 0;
    for entry in WalkDir::new(vault_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().map_or(true, |ext| ext != COLLECTION_EXTENSION)
        {
            continue;
        }

        let class_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let class = schema
            .find_class(&class_name)
            .ok_or_else(|| InterchangeError::UnknownClass {
                class: class_name.clone(),
                file: path.to_path_buf(),
            })?;

        for mut record in read_collections(path)? {
            record.normalize_nulls();
            let collection = decode_collection(codec, class, vault_dir, vault_name, &record)?;
            let parent_name = record.parent().map(str::to_string);
            pending.add_collection(
                vault_index,
                PendingCollection::new(collection, parent_name),
                existing,
            )?;
            count += 1;
        }
    }
    Ok(count)
}

fn decode_collection(
    codec: &ValueCodec<'_>,
    class: &Class,
    vault_dir: &Path,
    vault_name: &str,
    record: &SerializedCollection,
) -> Result<Collection> {
    let mut collection = Collection::new(class.name.as_str(), record.name.as_str(), vault_name);
    let short_path = collection.short_path();

    for (key, node) in &record.data {
        let field_name = key.as_str().ok_or_else(|| InterchangeError::UnknownField {
            class: class.name.clone(),
            field: format!("{:?}", key),
        })?;
        let field = class
            .field(field_name)
            .ok_or_else(|| InterchangeError::UnknownField {
                class: class.name.clone(),
                field: field_name.to_string(),
            })?;
        let ctx = CodecContext::new(vault_dir, &short_path, field_name);
        let value = codec.decode(field, node, &ctx)?;
        collection.data.insert(field.key, value);
    }
    Ok(collection)
}

fn manifest_class(codec: &ValueCodec<'_>, class: &Class, root: &Path) -> Result<ManifestClass> {
    let fields = class
        .fields()
        .iter()
        .map(|field| -> Result<ManifestField> {
            let static_value = match &field.static_value {
                Some(value) => {
                    let ctx = CodecContext::new(root, &class.name, field.name.as_str());
                    Some(codec.encode(value, &ctx)?)
                }
                None => None,
            };
            Ok(ManifestField {
                name: field.name.clone(),
                type_name: field.type_name.clone(),
                alignment: field.alignment,
                flags: field.flags,
                max_count: field.max_count,
                size: field.size,
                offset: field.offset,
                static_value,
            })
        })
        .collect::<Result<_>>()?;
    Ok(ManifestClass {
        name: class.name.clone(),
        fields,
    })
}

/// Write one `<ClassName>.yml` per class that has collections in the vault
fn write_vault(
    codec: &ValueCodec<'_>,
    database: &Database,
    vault_dir: &Path,
    vault_name: &str,
) -> Result<usize> {
    let mut by_class: BTreeMap<&str, Vec<SerializedCollection>> = BTreeMap::new();

    for (id, collection) in database.collections.in_vault(vault_name) {
        let class = database
            .schema
            .find_class(&collection.class)
            .ok_or_else(|| InterchangeError::UndefinedClass {
                collection: collection.short_path(),
                class: collection.class.clone(),
            })?;
        let short_path = collection.short_path();

        let mut data = Mapping::new();
        for field in class.fields() {
            if let Some(value) = collection.data.get(&field.key) {
                let ctx = CodecContext::new(vault_dir, &short_path, field.name.as_str());
                data.insert(YamlValue::from(field.name.as_str()), codec.encode(value, &ctx)?);
            }
        }

        let parent_name = database
            .collections
            .parent(id)
            .and_then(|parent| database.collections.find(parent))
            .map(|parent| parent.name.clone());
        by_class
            .entry(collection.class.as_str())
            .or_default()
            .push(SerializedCollection {
                name: collection.name.clone(),
                parent_name,
                data,
            });
    }

    let mut count = 0;
    for (class_name, records) in by_class {
        let path = vault_dir.join(format!("{}.{}", class_name, COLLECTION_EXTENSION));
        write_collections(&path, &records)?;
        count += records.len();
    }
    Ok(count)
}
