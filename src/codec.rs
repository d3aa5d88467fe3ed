//! Value codec
//!
//! Converts between YAML nodes and typed [`Value`]s. Both directions are
//! driven by the field's declared type: the node's shape is only checked
//! against what the type expects, never used to guess the type.

use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};

use crate::blob;
use crate::error::{InterchangeError, Result};
use crate::schema::Field;
use crate::types::{StructDef, TypeRegistry, ValueKind};
use crate::value::{ArrayValue, Number, StructValue, Value};

const CAPACITY_KEY: &str = "Capacity";
const DATA_KEY: &str = "Data";

/// Where a value lives: blob directory plus the names used in diagnostics
#[derive(Debug, Clone)]
pub struct CodecContext<'a> {
    /// Directory blob paths are relative to
    pub directory: &'a Path,
    /// Collection short path (or class name for static values)
    pub collection: &'a str,
    /// Field name; nested items extend it so blob file names stay distinct
    pub field: String,
}

impl<'a> CodecContext<'a> {
    pub fn new(directory: &'a Path, collection: &'a str, field: impl Into<String>) -> Self {
        Self {
            directory,
            collection,
            field: field.into(),
        }
    }

    fn nested(&self, suffix: impl std::fmt::Display) -> Self {
        Self {
            directory: self.directory,
            collection: self.collection,
            field: format!("{}_{}", self.field, suffix),
        }
    }

    fn null(&self) -> InterchangeError {
        InterchangeError::NullNotPermitted {
            collection: self.collection.to_string(),
            field: self.field.clone(),
        }
    }

    fn shape(&self, expected: &'static str) -> InterchangeError {
        InterchangeError::UnexpectedShape {
            collection: self.collection.to_string(),
            field: self.field.clone(),
            expected,
        }
    }

    fn invalid(&self, text: &str, expected: impl ToString) -> InterchangeError {
        InterchangeError::InvalidScalar {
            collection: self.collection.to_string(),
            field: self.field.clone(),
            text: text.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Schema-driven YAML <-> [`Value`] converter
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec<'a> {
    types: &'a TypeRegistry,
}

impl<'a> ValueCodec<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        Self { types }
    }

    /// Kind of a single element of `field` (the field's own kind if it is not an array)
    pub fn item_kind(&self, field: &Field) -> ValueKind {
        self.types.resolve(&field.type_name)
    }

    /// Default value for a field, as created for a freshly added field
    pub fn default_value(&self, field: &Field, capacity: u16) -> Value {
        let kind = self.item_kind(field);
        if field.is_array() {
            let mut array = ArrayValue::new(capacity, field.type_name.clone());
            array.items = (0..capacity).map(|_| kind.default_value()).collect();
            Value::Array(array)
        } else {
            kind.default_value()
        }
    }

    /// Decode a field value from its YAML node
    pub fn decode(&self, field: &Field, node: &YamlValue, ctx: &CodecContext<'_>) -> Result<Value> {
        if node.is_null() {
            return Err(ctx.null());
        }
        let kind = self.item_kind(field);
        if field.is_array() {
            let mapping = node.as_mapping().ok_or_else(|| ctx.shape("{Capacity, Data} mapping"))?;
            return self.decode_array(field, kind, mapping, ctx).map(Value::Array);
        }
        decode_kind(kind, node, ctx)
    }

    fn decode_array(
        &self,
        field: &Field,
        kind: ValueKind,
        mapping: &Mapping,
        ctx: &CodecContext<'_>,
    ) -> Result<ArrayValue> {
        let capacity_node = mapping
            .get(CAPACITY_KEY)
            .ok_or_else(|| ctx.shape("{Capacity, Data} mapping"))?;
        let capacity_text = scalar_text(capacity_node, ctx)?;
        let capacity: u16 = capacity_text
            .trim()
            .parse()
            .map_err(|_| ctx.invalid(&capacity_text, "array capacity (u16)"))?;

        let items = match mapping.get(DATA_KEY) {
            Some(YamlValue::Sequence(items)) => items.as_slice(),
            Some(YamlValue::Null) => return Err(ctx.null()),
            Some(_) | None => return Err(ctx.shape("Data sequence")),
        };

        check_array_bounds(field, ctx.collection, capacity, items.len())?;

        let mut array = ArrayValue::new(capacity, field.type_name.clone());
        array.items = items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_kind(kind, item, &ctx.nested(i)))
            .collect::<Result<_>>()?;
        Ok(array)
    }

    /// Encode a field value to its YAML node
    pub fn encode(&self, value: &Value, ctx: &CodecContext<'_>) -> Result<YamlValue> {
        encode_value(value, ctx)
    }
}

/// Enforce `len <= capacity`, and `capacity, len <= max_count` when the field sets a limit
pub fn check_array_bounds(
    field: &Field,
    collection: &str,
    capacity: u16,
    len: usize,
) -> Result<()> {
    if usize::from(capacity) < len {
        return Err(InterchangeError::ArrayOverCapacity {
            collection: collection.to_string(),
            field: field.name.clone(),
            capacity,
            len,
        });
    }
    if field.max_count > 0 && (capacity > field.max_count || len > usize::from(field.max_count)) {
        return Err(InterchangeError::ArrayExceedsFieldLimit {
            collection: collection.to_string(),
            field: field.name.clone(),
            max_count: field.max_count,
            capacity,
            len,
        });
    }
    Ok(())
}

/// Text of a scalar node. Trees read through [`crate::verbatim`] hand every
/// scalar over as a string; resolved numbers and booleans are re-rendered.
fn scalar_text(node: &YamlValue, ctx: &CodecContext<'_>) -> Result<String> {
    match node {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Err(ctx.null()),
        YamlValue::Tagged(tagged) => scalar_text(&tagged.value, ctx),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => Err(ctx.shape("scalar")),
    }
}

fn decode_kind(kind: ValueKind, node: &YamlValue, ctx: &CodecContext<'_>) -> Result<Value> {
    if node.is_null() {
        return Err(ctx.null());
    }
    match kind {
        ValueKind::Text => scalar_text(node, ctx).map(Value::Text),
        ValueKind::Number(number_kind) => {
            let text = scalar_text(node, ctx)?;
            Number::parse(number_kind, &text)
                .map(Value::Number)
                .ok_or_else(|| ctx.invalid(&text, number_kind))
        }
        ValueKind::Blob => {
            let path = scalar_text(node, ctx)?;
            blob::materialize(ctx.directory, &path, ctx.collection, &ctx.field).map(Value::Blob)
        }
        ValueKind::Enum(def) => {
            let text = scalar_text(node, ctx)?;
            if def.contains(&text) {
                Ok(Value::Text(text))
            } else {
                Err(InterchangeError::UnknownEnumVariant {
                    collection: ctx.collection.to_string(),
                    field: ctx.field.clone(),
                    type_name: def.name.to_string(),
                    value: text,
                })
            }
        }
        ValueKind::Struct(def) => {
            let mapping = node.as_mapping().ok_or_else(|| ctx.shape("property mapping"))?;
            decode_struct(def, mapping, ctx).map(Value::Struct)
        }
        ValueKind::List(item) => {
            let items = node.as_sequence().ok_or_else(|| ctx.shape("sequence"))?;
            let capacity = u16::try_from(items.len())
                .map_err(|_| ctx.invalid(&items.len().to_string(), "list length (u16)"))?;
            let mut array = ArrayValue::new(capacity, item.type_name());
            array.items = items
                .iter()
                .enumerate()
                .map(|(i, node)| decode_kind(*item, node, &ctx.nested(i)))
                .collect::<Result<_>>()?;
            Ok(Value::Array(array))
        }
    }
}

fn decode_struct(
    def: &'static StructDef,
    mapping: &Mapping,
    ctx: &CodecContext<'_>,
) -> Result<StructValue> {
    let mut value = def.default_value();
    for (key, node) in mapping {
        let name = key.as_str().ok_or_else(|| ctx.shape("string property names"))?;
        let property = def
            .property(name)
            .filter(|p| p.settable)
            .ok_or_else(|| InterchangeError::UnknownProperty {
                collection: ctx.collection.to_string(),
                field: ctx.field.clone(),
                type_name: def.name.to_string(),
                property: name.to_string(),
            })?;
        let decoded = decode_kind(property.kind, node, &ctx.nested(name))?;
        value.set(property.name, decoded);
    }
    Ok(value)
}

fn encode_number(number: Number) -> YamlValue {
    match number {
        Number::Bool(b) => YamlValue::Bool(b),
        Number::I8(n) => YamlValue::from(n),
        Number::I16(n) => YamlValue::from(n),
        Number::I32(n) => YamlValue::from(n),
        Number::I64(n) => YamlValue::from(n),
        Number::U8(n) => YamlValue::from(n),
        Number::U16(n) => YamlValue::from(n),
        Number::U32(n) => YamlValue::from(n),
        Number::U64(n) => YamlValue::from(n),
        // Go through the shortest f32 spelling so 0.1f32 is written as 0.1
        Number::F32(f) => YamlValue::from(f.to_string().parse::<f64>().unwrap_or(f64::from(f))),
        Number::F64(f) => YamlValue::from(f),
    }
}

fn encode_value(value: &Value, ctx: &CodecContext<'_>) -> Result<YamlValue> {
    Ok(match value {
        Value::Text(s) => YamlValue::String(s.clone()),
        Value::Number(n) => encode_number(*n),
        Value::Blob(bytes) => {
            YamlValue::String(blob::externalize(ctx.directory, ctx.collection, &ctx.field, bytes)?)
        }
        Value::Array(array) => {
            let items = array
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_value(item, &ctx.nested(i)))
                .collect::<Result<Vec<_>>>()?;
            let mut mapping = Mapping::new();
            mapping.insert(CAPACITY_KEY.into(), YamlValue::from(array.capacity));
            mapping.insert(DATA_KEY.into(), YamlValue::Sequence(items));
            YamlValue::Mapping(mapping)
        }
        Value::Struct(value) => YamlValue::Mapping(encode_struct(value, ctx)?),
    })
}

fn encode_struct(value: &StructValue, ctx: &CodecContext<'_>) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for property in value.def.properties.iter().filter(|p| p.settable) {
        let Some(item) = value.get(property.name) else {
            continue;
        };
        let nested = ctx.nested(property.name);
        let node = match (property.kind, item) {
            // List properties are plain sequences, not {Capacity, Data} wrappers
            (ValueKind::List(_), Value::Array(array)) => YamlValue::Sequence(
                array
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| encode_value(v, &nested.nested(i)))
                    .collect::<Result<_>>()?,
            ),
            _ => encode_value(item, &nested)?,
        };
        mapping.insert(property.name.into(), node);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DatabaseKind;
    use crate::types::{CURVE, REF_SPEC, VECTOR2, VECTOR3};

    fn yaml(s: &str) -> YamlValue {
        serde_yaml::from_str(s).unwrap()
    }

    fn field(name: &str, type_name: &str) -> Field {
        Field::new(DatabaseKind::X64, name, type_name)
    }

    fn roundtrip(codec: &ValueCodec<'_>, f: &Field, node: &str) -> (Value, YamlValue) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CodecContext::new(dir.path(), "car/default", &f.name);
        let value = codec.decode(f, &yaml(node), &ctx).unwrap();
        let encoded = codec.encode(&value, &ctx).unwrap();
        assert_eq!(codec.decode(f, &encoded, &ctx).unwrap(), value);
        (value, encoded)
    }

    #[test]
    fn test_scalars_follow_declared_type() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);

        let (value, node) = roundtrip(&codec, &field("Name", "EA::Reflection::Text"), "123");
        assert_eq!(value, Value::Text("123".into()));
        assert_eq!(node, yaml("'123'"));

        let (value, node) = roundtrip(&codec, &field("Key", "EA::Reflection::UInt32"), "'0x10'");
        assert_eq!(value, Value::Number(Number::U32(16)));
        assert_eq!(node, yaml("16"));

        let (value, node) = roundtrip(&codec, &field("Grip", "EA::Reflection::Float"), "0.1");
        assert_eq!(value, Value::Number(Number::F32(0.1)));
        assert_eq!(node, yaml("0.1"));

        let (value, _) = roundtrip(&codec, &field("On", "EA::Reflection::Bool"), "true");
        assert_eq!(value, Value::Number(Number::Bool(true)));
    }

    #[test]
    fn test_text_keeps_source_spelling() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let f = field("Name", "EA::Reflection::Text");
        let ctx = CodecContext::new(dir.path(), "car/default", "Name");

        for text in ["007", "1.10", "0x1F", "1e3", "+5", "true"] {
            let node = crate::verbatim::from_str(text).unwrap();
            let value = codec.decode(&f, &node, &ctx).unwrap();
            assert_eq!(value, Value::Text(text.to_string()));

            let written = serde_yaml::to_string(&codec.encode(&value, &ctx).unwrap()).unwrap();
            let reread = crate::verbatim::from_str(&written).unwrap();
            assert_eq!(codec.decode(&f, &reread, &ctx).unwrap(), value);
        }
    }

    #[test]
    fn test_invalid_scalar() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let f = field("Gear", "EA::Reflection::Int8");
        let ctx = CodecContext::new(dir.path(), "car/a", "Gear");
        let err = codec.decode(&f, &yaml("300"), &ctx).unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidScalar { .. }));
        let err = codec.decode(&f, &yaml("[1]"), &ctx).unwrap_err();
        assert!(matches!(err, InterchangeError::UnexpectedShape { .. }));
    }

    #[test]
    fn test_null_rejected() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let ctx = CodecContext::new(dir.path(), "car/a", "Name");
        let err = codec
            .decode(&field("Name", "EA::Reflection::Text"), &YamlValue::Null, &ctx)
            .unwrap_err();
        assert!(matches!(err, InterchangeError::NullNotPermitted { .. }));
    }

    #[test]
    fn test_array_limits() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let f = field("Gears", "EA::Reflection::Float").array(4);
        let ctx = CodecContext::new(dir.path(), "car/a", "Gears");

        let err = codec
            .decode(&f, &yaml("{Capacity: 5, Data: [1, 2]}"), &ctx)
            .unwrap_err();
        assert!(matches!(err, InterchangeError::ArrayExceedsFieldLimit { capacity: 5, .. }));

        let err = codec
            .decode(&f, &yaml("{Capacity: 3, Data: [1, 2, 3, 4]}"), &ctx)
            .unwrap_err();
        assert!(matches!(err, InterchangeError::ArrayOverCapacity { capacity: 3, len: 4, .. }));

        let value = codec
            .decode(&f, &yaml("{Capacity: 4, Data: [1.5, 2]}"), &ctx)
            .unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.capacity, 4);
        assert_eq!(array.item_type, "EA::Reflection::Float");
        assert_eq!(array.items[1], Value::Number(Number::F32(2.0)));
    }

    #[test]
    fn test_array_of_structs_roundtrip() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let f = field("Points", VECTOR3.name).array(0);
        let (value, node) = roundtrip(
            &codec,
            &f,
            "{Capacity: 2, Data: [{X: 1, Y: 2, Z: 3}, {Z: 4}]}",
        );
        let array = value.as_array().unwrap();
        let second = array.items[1].as_struct().unwrap();
        assert_eq!(second.get("X"), Some(&Value::Number(Number::F32(0.0))));
        assert_eq!(second.get("Z"), Some(&Value::Number(Number::F32(4.0))));
        assert_eq!(
            node,
            yaml("{Capacity: 2, Data: [{X: 1.0, Y: 2.0, Z: 3.0}, {X: 0.0, Y: 0.0, Z: 4.0}]}")
        );
    }

    #[test]
    fn test_nested_struct_with_lists_roundtrip() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let node = "{Interpolation: Smooth, Keys: [0.0, 0.5, 1.0], Tags: ['0xFF', 2], \
                    Origin: {X: 1.0, Y: -1.0}}";
        let (value, encoded) = roundtrip(&codec, &field("Torque", CURVE.name), node);
        let curve = value.as_struct().unwrap();
        assert_eq!(curve.get("Interpolation"), Some(&Value::Text("Smooth".into())));
        let tags = curve.get("Tags").unwrap().as_array().unwrap();
        assert_eq!(tags.items[0], Value::Number(Number::U32(255)));
        assert_eq!(tags.capacity, 2);
        let origin = curve.get("Origin").unwrap().as_struct().unwrap();
        assert_eq!(origin.def, &VECTOR2);
        assert_eq!(
            encoded,
            yaml("{Interpolation: Smooth, Keys: [0.0, 0.5, 1.0], Tags: [255, 2], \
                  Origin: {X: 1.0, Y: -1.0}}")
        );
    }

    #[test]
    fn test_struct_property_errors() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let ctx = CodecContext::new(dir.path(), "car/a", "Ref");
        let f = field("Ref", REF_SPEC.name);

        let err = codec.decode(&f, &yaml("{Nope: 1}"), &ctx).unwrap_err();
        assert!(matches!(
            err,
            InterchangeError::UnknownProperty { ref property, .. } if property == "Nope"
        ));

        let err = codec.decode(&f, &yaml("{CollectionPtr: 1}"), &ctx).unwrap_err();
        assert!(matches!(err, InterchangeError::UnknownProperty { .. }));

        let err = codec
            .decode(&field("C", CURVE.name), &yaml("{Interpolation: Cubic}"), &ctx)
            .unwrap_err();
        assert!(matches!(err, InterchangeError::UnknownEnumVariant { .. }));
    }

    #[test]
    fn test_read_only_property_not_written() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let (_, encoded) = roundtrip(
            &codec,
            &field("Ref", REF_SPEC.name),
            "{ClassKey: '0xA', CollectionKey: 7}",
        );
        assert_eq!(encoded, yaml("{ClassKey: 10, CollectionKey: 7}"));
    }

    #[test]
    fn test_blob_roundtrip() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let dir = tempfile::tempdir().unwrap();
        let f = field("Icon", "Attrib::Blob");
        let ctx = CodecContext::new(dir.path(), "car/fast", "Icon");

        let encoded = codec.encode(&Value::Blob(vec![9, 8, 7]), &ctx).unwrap();
        assert_eq!(encoded, yaml("_blobs/car_fast_Icon.bin"));
        assert_eq!(codec.decode(&f, &encoded, &ctx).unwrap(), Value::Blob(vec![9, 8, 7]));

        let empty = codec.encode(&Value::Blob(Vec::new()), &ctx).unwrap();
        assert_eq!(empty, YamlValue::String(String::new()));
        assert_eq!(codec.decode(&f, &empty, &ctx).unwrap(), Value::Blob(Vec::new()));

        let err = codec.decode(&f, &yaml("_blobs/gone.bin"), &ctx).unwrap_err();
        assert!(matches!(err, InterchangeError::MissingBlobFile { .. }));
    }

    #[test]
    fn test_default_value() {
        let types = TypeRegistry::with_builtins();
        let codec = ValueCodec::new(&types);
        let f = field("Gears", "EA::Reflection::UInt8").array(6);
        let value = codec.default_value(&f, 3);
        let array = value.as_array().unwrap();
        assert_eq!(array.capacity, 3);
        assert_eq!(array.items, vec![Value::Number(Number::U8(0)); 3]);
    }
}
