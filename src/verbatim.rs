//! Scalar-preserving YAML reading
//!
//! `serde_yaml::Value` resolves plain scalars while parsing, so `0x1F` turns
//! into the number 31 and `1.10` into 1.1 before any schema is consulted.
//! Collection data is typed by the schema, not by YAML, so it is read here
//! instead: the document is parsed once to learn its shape, then again with
//! that shape as a seed, asking for every scalar as a string. Each scalar
//! comes back as `Value::String` holding its source text; nulls stay `Null`.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Parse `text`, keeping the source text of every non-null scalar
pub fn from_str(text: &str) -> serde_yaml::Result<Value> {
    let shape: Value = serde_yaml::from_str(text)?;
    if shape.is_null() {
        return Ok(Value::Null);
    }
    Shaped(&shape).deserialize(serde_yaml::Deserializer::from_str(text))
}

/// Deserializes one node, using an already parsed copy to pick its shape
struct Shaped<'s>(&'s Value);

impl<'de, 's> DeserializeSeed<'de> for Shaped<'s> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.0 {
            Value::Null => IgnoredAny::deserialize(deserializer).map(|_| Value::Null),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                String::deserialize(deserializer).map(Value::String)
            }
            Value::Sequence(items) => deserializer.deserialize_seq(SequenceShape(items)),
            Value::Mapping(entries) => deserializer.deserialize_map(MappingShape(entries)),
            Value::Tagged(_) => Value::deserialize(deserializer),
        }
    }
}

struct SequenceShape<'s>(&'s [Value]);

impl<'de, 's> Visitor<'de> for SequenceShape<'s> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence of {} items", self.0.len())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(self.0.len());
        for shape in self.0 {
            match seq.next_element_seed(Shaped(shape))? {
                Some(item) => items.push(item),
                None => return Err(de::Error::invalid_length(items.len(), &self)),
            }
        }
        Ok(Value::Sequence(items))
    }
}

struct MappingShape<'s>(&'s Mapping);

impl<'de, 's> Visitor<'de> for MappingShape<'s> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a mapping of {} entries", self.0.len())
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Mapping::with_capacity(self.0.len());
        for (key_shape, value_shape) in self.0 {
            let Some(key) = map.next_key_seed(Shaped(key_shape))? else {
                return Err(de::Error::invalid_length(entries.len(), &self));
            };
            let value = map.next_value_seed(Shaped(value_shape))?;
            entries.insert(key, value);
        }
        Ok(Value::Mapping(entries))
    }
}
