//! Serialized forms of the interchange tree
//!
//! `info.yml` holds the [`Manifest`]; every `<ClassName>.yml` under a vault
//! directory holds a list of [`SerializedCollection`]s.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{InterchangeError, Result};
use crate::schema::{FieldFlags, TypeInfo};
use crate::verbatim;

/// File name of the manifest at the interchange root
pub const MANIFEST_FILE: &str = "info.yml";

/// Top-level manifest: schema, file/vault table and primary vault
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    #[serde(default)]
    pub primary_vault_name: String,
    #[serde(default)]
    pub classes: Vec<ManifestClass>,
    #[serde(default)]
    pub types: Vec<TypeInfo>,
    #[serde(default)]
    pub files: Vec<LoadedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestClass {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<ManifestField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestField {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub alignment: u8,
    #[serde(default)]
    pub flags: FieldFlags,
    #[serde(default)]
    pub max_count: u16,
    #[serde(default)]
    pub size: u16,
    #[serde(default)]
    pub offset: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<YamlValue>,
}

/// A file group entry: the vaults that are loaded and saved together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadedFile {
    pub name: String,
    pub group: String,
    #[serde(default)]
    pub vaults: Vec<String>,
}

impl LoadedFile {
    pub fn new(name: impl Into<String>, group: impl Into<String>, vaults: Vec<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            vaults,
        }
    }

    /// `<root>/<group>/<file>`
    pub fn directory(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.group).join(&self.name)
    }
}

/// One collection record inside a `<ClassName>.yml` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SerializedCollection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub data: Mapping,
}

impl SerializedCollection {
    /// Parent name, with blank names treated as absent
    pub fn parent(&self) -> Option<&str> {
        self.parent_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Replace null data entries with the empty-string sentinel the codec expects
    pub fn normalize_nulls(&mut self) {
        for (_, value) in self.data.iter_mut() {
            if value.is_null() {
                *value = YamlValue::String(String::new());
            }
        }
    }
}

impl Manifest {
    /// Read and validate `<root>/info.yml`
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            InterchangeError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let malformed = |e: serde_yaml::Error| {
            InterchangeError::Manifest(format!("malformed {}: {}", path.display(), e))
        };
        let mut manifest: Manifest = serde_yaml::from_str(&content).map_err(malformed)?;
        manifest.validate()?;
        let raw = verbatim::from_str(&content).map_err(malformed)?;
        manifest.keep_static_text(&raw);
        Ok(manifest)
    }

    /// Swap every static value for its scalar-preserving reading from `raw`
    fn keep_static_text(&mut self, raw: &YamlValue) {
        let classes = raw.get("Classes").and_then(YamlValue::as_sequence);
        for (class, raw_class) in self.classes.iter_mut().zip(classes.into_iter().flatten()) {
            let fields = raw_class.get("Fields").and_then(YamlValue::as_sequence);
            for (field, raw_field) in class.fields.iter_mut().zip(fields.into_iter().flatten()) {
                if field.static_value.is_some() {
                    field.static_value = raw_field.get("StaticValue").cloned();
                }
            }
        }
    }

    /// Write `<root>/info.yml`
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(MANIFEST_FILE);
        let content =
            serde_yaml::to_string(self).map_err(|e| InterchangeError::yaml(&path, e))?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_vault_name.trim().is_empty() {
            return Err(InterchangeError::Manifest(
                "No primary vault name has been specified.".to_string(),
            ));
        }
        if !self
            .files
            .iter()
            .any(|f| f.vaults.iter().any(|v| v == &self.primary_vault_name))
        {
            return Err(InterchangeError::Manifest(format!(
                "primary vault '{}' is not declared by any file",
                self.primary_vault_name
            )));
        }
        Ok(())
    }

    /// File entries selected by an optional file-name filter
    pub fn selected_files<'a>(
        &'a self,
        filter: Option<&'a [String]>,
    ) -> impl Iterator<Item = &'a LoadedFile> + 'a {
        self.files
            .iter()
            .filter(move |f| filter.map_or(true, |names| names.iter().any(|n| n == &f.name)))
    }
}

/// Read a `<ClassName>.yml` collection list. An empty file holds no collections.
///
/// Scalars keep their source text, so `Name: 007` stays `"007"` and data
/// values reach the codec exactly as written.
pub fn read_collections(path: &Path) -> Result<Vec<SerializedCollection>> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document = verbatim::from_str(&content).map_err(|e| InterchangeError::yaml(path, e))?;
    let collections: Option<Vec<SerializedCollection>> =
        serde_yaml::from_value(document).map_err(|e| InterchangeError::yaml(path, e))?;
    Ok(collections.unwrap_or_default())
}

/// Write a `<ClassName>.yml` collection list
pub fn write_collections(path: &Path, collections: &[SerializedCollection]) -> Result<()> {
    let content =
        serde_yaml::to_string(collections).map_err(|e| InterchangeError::yaml(path, e))?;
    fs::write(path, content)?;
    Ok(())
}
