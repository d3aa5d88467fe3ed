//! Class and field definitions

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InterchangeError, Result};
use crate::hash;
use crate::value::Value;

/// Target word size of a database; selects the field key hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// 32-bit addressing, 32-bit field keys
    X86,
    /// 64-bit addressing, 64-bit field keys
    #[default]
    X64,
}

impl DatabaseKind {
    /// Compute the stable key of a field name
    pub fn field_key(&self, name: &str) -> FieldKey {
        match self {
            DatabaseKind::X86 => FieldKey(u64::from(hash::vlt32(name))),
            DatabaseKind::X64 => FieldKey(hash::vlt64(name)),
        }
    }
}

/// Hashed field name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey(pub u64);

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Field definition flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldFlags(pub u8);

impl FieldFlags {
    pub const ARRAY: u8 = 0x01;
    pub const IN_LAYOUT: u8 = 0x02;

    pub fn is_array(&self) -> bool {
        self.0 & Self::ARRAY != 0
    }

    pub fn is_in_layout(&self) -> bool {
        self.0 & Self::IN_LAYOUT != 0
    }
}

/// A typed, named slot declared on a class
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: FieldKey,
    pub name: String,
    pub type_name: String,
    pub flags: FieldFlags,
    pub alignment: u8,
    pub size: u16,
    /// Maximum element count for array fields; 0 means unbounded
    pub max_count: u16,
    pub offset: u16,
    pub static_value: Option<Value>,
}

impl Field {
    pub fn new(kind: DatabaseKind, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: kind.field_key(&name),
            name,
            type_name: type_name.into(),
            flags: FieldFlags::default(),
            alignment: 0,
            size: 0,
            max_count: 0,
            offset: 0,
            static_value: None,
        }
    }

    /// Builder helper for array fields
    pub fn array(mut self, max_count: u16) -> Self {
        self.flags.0 |= FieldFlags::ARRAY;
        self.max_count = max_count;
        self
    }

    pub fn is_array(&self) -> bool {
        self.flags.is_array()
    }
}

/// A class: a name plus its ordered field table
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    fields: Vec<Field>,
    by_key: HashMap<FieldKey, usize>,
    by_name: HashMap<String, usize>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_key: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Append a field. Field names (and therefore keys) must be unique.
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.by_key.contains_key(&field.key) {
            return Err(InterchangeError::Manifest(format!(
                "duplicate field {}/{} (key {})",
                self.name, field.name, field.key
            )));
        }
        let index = self.fields.len();
        self.by_key.insert(field.key, index);
        self.by_name.insert(field.name.clone(), index);
        self.fields.push(field);
        Ok(())
    }

    pub fn with_field(mut self, field: Field) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_by_key(&self, key: FieldKey) -> Option<&Field> {
        self.by_key.get(&key).map(|&i| &self.fields[i])
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Entry of the primitive type size table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeInfo {
    pub name: String,
    pub size: u32,
}

/// Loaded classes plus the type size table
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    classes: Vec<Class>,
    by_name: HashMap<String, usize>,
    types: Vec<TypeInfo>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: Class) -> Result<()> {
        if self.by_name.contains_key(&class.name) {
            return Err(InterchangeError::DuplicateClass(class.name));
        }
        self.by_name.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    pub fn add_type(&mut self, info: TypeInfo) {
        self.types.push(info);
    }

    pub fn find_class(&self, name: &str) -> Option<&Class> {
        self.by_name.get(name).map(|&i| &self.classes[i])
    }

    pub fn field(&self, class: &str, name: &str) -> Option<&Field> {
        self.find_class(class)?.field(name)
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    /// Move every class and type of `other` into this registry
    pub fn merge(&mut self, other: SchemaRegistry) -> Result<()> {
        for class in &other.classes {
            if self.by_name.contains_key(&class.name) {
                return Err(InterchangeError::DuplicateClass(class.name.clone()));
            }
        }
        for class in other.classes {
            self.add_class(class)?;
        }
        self.types.extend(other.types);
        Ok(())
    }
}
