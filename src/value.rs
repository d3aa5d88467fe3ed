//! In-memory value model

use crate::types::{NumberKind, StructDef};

/// A numeric value tagged with its declared subtype
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Number {
    /// Parse `text` as `kind`. Unsigned kinds also accept `0x` hex literals.
    pub fn parse(kind: NumberKind, text: &str) -> Option<Number> {
        let text = text.trim();
        if kind.is_unsigned() {
            if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                let raw = u64::from_str_radix(hex, 16).ok()?;
                return Self::from_unsigned(kind, raw);
            }
        }

        match kind {
            NumberKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Number::Bool(true)),
                "false" | "0" => Some(Number::Bool(false)),
                _ => None,
            },
            NumberKind::I8 => text.parse().ok().map(Number::I8),
            NumberKind::I16 => text.parse().ok().map(Number::I16),
            NumberKind::I32 => text.parse().ok().map(Number::I32),
            NumberKind::I64 => text.parse().ok().map(Number::I64),
            NumberKind::U8 | NumberKind::U16 | NumberKind::U32 | NumberKind::U64 => {
                Self::from_unsigned(kind, text.parse().ok()?)
            }
            NumberKind::F32 => non_finite(text)
                .map(|f| f as f32)
                .or_else(|| text.parse().ok())
                .map(Number::F32),
            NumberKind::F64 => non_finite(text)
                .or_else(|| text.parse().ok())
                .map(Number::F64),
        }
    }

    fn from_unsigned(kind: NumberKind, raw: u64) -> Option<Number> {
        match kind {
            NumberKind::U8 => u8::try_from(raw).ok().map(Number::U8),
            NumberKind::U16 => u16::try_from(raw).ok().map(Number::U16),
            NumberKind::U32 => u32::try_from(raw).ok().map(Number::U32),
            NumberKind::U64 => Some(Number::U64(raw)),
            _ => None,
        }
    }
}

/// YAML spellings of the non-finite floats
fn non_finite(text: &str) -> Option<f64> {
    match text {
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        ".inf" | "+.inf" | ".Inf" | "+.Inf" | ".INF" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Bounded array value
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub capacity: u16,
    pub item_type: String,
    pub items: Vec<Value>,
}

impl ArrayValue {
    pub fn new(capacity: u16, item_type: impl Into<String>) -> Self {
        Self {
            capacity,
            item_type: item_type.into(),
            items: Vec::new(),
        }
    }
}

/// Struct value; always holds every property its definition declares, in order
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub def: &'static StructDef,
    pub values: Vec<(&'static str, Value)>,
}

impl StructValue {
    pub fn type_name(&self) -> &'static str {
        self.def.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Reset read-only properties (recursively) to their defaults
    pub fn clear_read_only(&mut self) {
        let def = self.def;
        for (name, slot) in self.values.iter_mut() {
            match def.property(*name) {
                Some(property) if !property.settable => *slot = property.kind.default_value(),
                _ => slot.clear_read_only(),
            }
        }
    }

    /// Replace a declared property. Returns `false` if the property is not declared.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// A typed field value. Exactly one variant is active; there is no null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(Number),
    Blob(Vec<u8>),
    Array(ArrayValue),
    Struct(StructValue),
}

impl Value {
    /// Reset read-only struct properties anywhere inside this value.
    /// They are runtime state and have no interchange form.
    pub fn clear_read_only(&mut self) {
        match self {
            Value::Struct(value) => value.clear_read_only(),
            Value::Array(array) => array.items.iter_mut().for_each(Value::clear_read_only),
            Value::Text(_) | Value::Number(_) | Value::Blob(_) => {}
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}
