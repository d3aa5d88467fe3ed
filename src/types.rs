//! Type registry
//!
//! Maps the type names declared on fields to the value kinds the codec
//! understands. Struct-like types carry a statically declared property
//! table, so decoding dispatches against that table and never inspects
//! value instances.

use std::collections::HashMap;
use std::fmt;

use crate::value::{ArrayValue, Number, StructValue, Value};

/// Primitive numeric subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumberKind {
    /// Canonical type name for this primitive
    pub fn type_name(&self) -> &'static str {
        match self {
            NumberKind::Bool => "EA::Reflection::Bool",
            NumberKind::I8 => "EA::Reflection::Int8",
            NumberKind::I16 => "EA::Reflection::Int16",
            NumberKind::I32 => "EA::Reflection::Int32",
            NumberKind::I64 => "EA::Reflection::Int64",
            NumberKind::U8 => "EA::Reflection::UInt8",
            NumberKind::U16 => "EA::Reflection::UInt16",
            NumberKind::U32 => "EA::Reflection::UInt32",
            NumberKind::U64 => "EA::Reflection::UInt64",
            NumberKind::F32 => "EA::Reflection::Float",
            NumberKind::F64 => "EA::Reflection::Double",
        }
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            NumberKind::U8 | NumberKind::U16 | NumberKind::U32 | NumberKind::U64
        )
    }

    /// Zero value of this subtype
    pub fn zero(&self) -> Number {
        match self {
            NumberKind::Bool => Number::Bool(false),
            NumberKind::I8 => Number::I8(0),
            NumberKind::I16 => Number::I16(0),
            NumberKind::I32 => Number::I32(0),
            NumberKind::I64 => Number::I64(0),
            NumberKind::U8 => Number::U8(0),
            NumberKind::U16 => Number::U16(0),
            NumberKind::U32 => Number::U32(0),
            NumberKind::U64 => Number::U64(0),
            NumberKind::F32 => Number::F32(0.0),
            NumberKind::F64 => Number::F64(0.0),
        }
    }

    const ALL: [NumberKind; 11] = [
        NumberKind::Bool,
        NumberKind::I8,
        NumberKind::I16,
        NumberKind::I32,
        NumberKind::I64,
        NumberKind::U8,
        NumberKind::U16,
        NumberKind::U32,
        NumberKind::U64,
        NumberKind::F32,
        NumberKind::F64,
    ];
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.type_name();
        write!(f, "{}", name.rsplit("::").next().unwrap_or(name))
    }
}

/// What a declared type name stands for at runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Text,
    Number(NumberKind),
    Blob,
    Enum(&'static EnumDef),
    Struct(&'static StructDef),
    /// Plain list; only valid as a struct property kind
    List(&'static ValueKind),
}

impl ValueKind {
    /// Type name recorded as the item type of arrays built from this kind
    pub fn type_name(&self) -> String {
        match self {
            ValueKind::Text => TEXT_TYPE.to_string(),
            ValueKind::Number(kind) => kind.type_name().to_string(),
            ValueKind::Blob => BLOB_TYPE.to_string(),
            ValueKind::Enum(def) => def.name.to_string(),
            ValueKind::Struct(def) => def.name.to_string(),
            ValueKind::List(item) => format!("{}[]", item.type_name()),
        }
    }

    /// Default instance, used for struct properties and freshly added fields
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Text => Value::Text(String::new()),
            ValueKind::Number(kind) => Value::Number(kind.zero()),
            ValueKind::Blob => Value::Blob(Vec::new()),
            ValueKind::Enum(def) => {
                Value::Text(def.variants.first().copied().unwrap_or_default().to_string())
            }
            ValueKind::Struct(def) => Value::Struct(def.default_value()),
            ValueKind::List(item) => Value::Array(ArrayValue::new(0, item.type_name())),
        }
    }
}

/// A named enumeration; values are stored by variant name
#[derive(Debug, PartialEq)]
pub struct EnumDef {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumDef {
    pub fn contains(&self, variant: &str) -> bool {
        self.variants.contains(&variant)
    }
}

/// One declared property of a struct-like type
#[derive(Debug, PartialEq)]
pub struct PropertyDef {
    pub name: &'static str,
    pub kind: ValueKind,
    /// Read-only properties are never written out and may not be set from text
    pub settable: bool,
}

impl PropertyDef {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            settable: true,
        }
    }

    pub const fn read_only(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            settable: false,
        }
    }
}

/// A struct-like type with a fixed property table
#[derive(Debug, PartialEq)]
pub struct StructDef {
    pub name: &'static str,
    pub properties: &'static [PropertyDef],
}

impl StructDef {
    pub fn property(&self, name: &str) -> Option<&'static PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn default_value(&'static self) -> StructValue {
        StructValue {
            def: self,
            values: self
                .properties
                .iter()
                .map(|p| (p.name, p.kind.default_value()))
                .collect(),
        }
    }
}

pub const TEXT_TYPE: &str = "EA::Reflection::Text";
pub const STRING_KEY_TYPE: &str = "Attrib::StringKey";
pub const BLOB_TYPE: &str = "Attrib::Blob";

const F32: ValueKind = ValueKind::Number(NumberKind::F32);
const U32: ValueKind = ValueKind::Number(NumberKind::U32);

pub static VECTOR2: StructDef = StructDef {
    name: "Attrib::Types::Vector2",
    properties: &[PropertyDef::new("X", F32), PropertyDef::new("Y", F32)],
};

pub static VECTOR3: StructDef = StructDef {
    name: "Attrib::Types::Vector3",
    properties: &[
        PropertyDef::new("X", F32),
        PropertyDef::new("Y", F32),
        PropertyDef::new("Z", F32),
    ],
};

pub static VECTOR4: StructDef = StructDef {
    name: "Attrib::Types::Vector4",
    properties: &[
        PropertyDef::new("X", F32),
        PropertyDef::new("Y", F32),
        PropertyDef::new("Z", F32),
        PropertyDef::new("W", F32),
    ],
};

pub static REF_SPEC: StructDef = StructDef {
    name: "Attrib::RefSpec",
    properties: &[
        PropertyDef::new("ClassKey", U32),
        PropertyDef::new("CollectionKey", U32),
        PropertyDef::read_only("CollectionPtr", U32),
    ],
};

pub static INTERPOLATION: EnumDef = EnumDef {
    name: "Attrib::Types::Interpolation",
    variants: &["Linear", "Step", "Smooth"],
};

pub static CURVE: StructDef = StructDef {
    name: "Attrib::Types::Curve",
    properties: &[
        PropertyDef::new("Interpolation", ValueKind::Enum(&INTERPOLATION)),
        PropertyDef::new("Keys", ValueKind::List(&F32)),
        PropertyDef::new("Tags", ValueKind::List(&U32)),
        PropertyDef::new("Origin", ValueKind::Struct(&VECTOR2)),
    ],
};

/// Type name -> value kind table
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    kinds: HashMap<String, ValueKind>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// Registry with no types at all
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registry preloaded with the reflection primitives and attrib types
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for kind in NumberKind::ALL {
            registry.register(kind.type_name(), ValueKind::Number(kind));
        }
        registry.register(TEXT_TYPE, ValueKind::Text);
        registry.register(STRING_KEY_TYPE, ValueKind::Text);
        registry.register(BLOB_TYPE, ValueKind::Blob);
        registry.register_enum(&INTERPOLATION);
        for def in [&VECTOR2, &VECTOR3, &VECTOR4, &REF_SPEC, &CURVE] {
            registry.register_struct(def);
        }
        registry
    }

    pub fn register(&mut self, type_name: impl Into<String>, kind: ValueKind) {
        self.kinds.insert(type_name.into(), kind);
    }

    pub fn register_struct(&mut self, def: &'static StructDef) {
        self.register(def.name, ValueKind::Struct(def));
    }

    pub fn register_enum(&mut self, def: &'static EnumDef) {
        self.register(def.name, ValueKind::Enum(def));
    }

    pub fn get(&self, type_name: &str) -> Option<ValueKind> {
        self.kinds.get(type_name).copied()
    }

    /// Resolve a declared type name; unknown types are carried as opaque blobs
    pub fn resolve(&self, type_name: &str) -> ValueKind {
        self.get(type_name).unwrap_or(ValueKind::Blob)
    }
}
