//! The envelope: a root value plus an object store, and its JSON form.
//!
//! ```text
//! { "d": <scalar>, "s": [] }
//! { "o": "<prefix><slot>", "s": [ <record>, ... ] }
//! ```
//!
//! Each record in the store is one of
//!
//! ```text
//! { "n": "<type name>", "p": { "<field>": <value>, ... } }
//! { "a": [ <value>, ... ] }
//! { "a": { "<key>": <value>, ... } }
//! ```
//!
//! and every value inside a record is either a JSON scalar or a reference token. Reference
//! tokens are the prefix followed by the slot number in ASCII digits and nothing else.
//!
//! An older form with no store, `{"a": [...]}` or `{"a": {...}}` at the top level, is still
//! accepted; see [`Payload::Legacy`].

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as Json;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::integer::Integer;
use crate::value::Value;

/// A scalar, as carried inline on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(Integer),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn into_value(self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::Int(v) => Value::Int(v),
            Scalar::Float(v) => Value::Float(v),
            Scalar::Str(v) => Value::Str(v),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(v) => serializer.serialize_bool(*v),
            Scalar::Int(v) => v.serialize(serializer),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Str(v) => serializer.serialize_str(v),
        }
    }
}

/// How any value appears inside the envelope: inline, or as a reference to a store slot.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodedValue {
    Scalar(Scalar),
    Reference(usize),
}

/// One entry of the object store.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectRecord {
    Object {
        type_name: String,
        fields: IndexMap<String, EncodedValue>,
    },
    Seq(Vec<EncodedValue>),
    Map(IndexMap<String, EncodedValue>),
}

impl ObjectRecord {
    /// Every slot this record refers to, in order.
    pub fn references(&self) -> impl Iterator<Item = usize> + '_ {
        let values: Box<dyn Iterator<Item = &EncodedValue>> = match self {
            ObjectRecord::Object { fields, .. } => Box::new(fields.values()),
            ObjectRecord::Seq(items) => Box::new(items.iter()),
            ObjectRecord::Map(entries) => Box::new(entries.values()),
        };
        values.filter_map(|v| match v {
            EncodedValue::Reference(slot) => Some(*slot),
            EncodedValue::Scalar(_) => None,
        })
    }
}

/// Ordered records; a record's position is its slot number.
pub type ObjectStore = Vec<ObjectRecord>;

/// The complete encoded form of one root value.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub root: EncodedValue,
    pub store: ObjectStore,
}

impl Envelope {
    /// Render as JSON text, writing references with the given prefix.
    pub fn to_text(&self, prefix: &str) -> Result<String> {
        Ok(serde_json::to_string(&Wire::new(prefix, self))?)
    }

    /// Parse JSON text that must hold a current-form envelope.
    pub fn parse(text: &str, config: &Config) -> Result<Envelope> {
        match Payload::parse(text, config)? {
            Payload::Envelope(e) => Ok(e),
            Payload::Legacy(_) => Err(Error::format("expected an envelope with a store")),
        }
    }
}

/// Serializes a wire item with the reference prefix in scope.
struct Wire<'a, T: ?Sized> {
    prefix: &'a str,
    inner: &'a T,
}

impl<'a, T: ?Sized> Wire<'a, T> {
    fn new(prefix: &'a str, inner: &'a T) -> Self {
        Self { prefix, inner }
    }

    fn wrap<U: ?Sized>(&self, inner: &'a U) -> Wire<'a, U> {
        Wire::new(self.prefix, inner)
    }
}

impl Serialize for Wire<'_, Envelope> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match &self.inner.root {
            EncodedValue::Scalar(v) => map.serialize_entry("d", v)?,
            root => map.serialize_entry("o", &self.wrap(root))?,
        }
        map.serialize_entry("s", &self.wrap(self.inner.store.as_slice()))?;
        map.end()
    }
}

impl Serialize for Wire<'_, EncodedValue> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.inner {
            EncodedValue::Scalar(v) => v.serialize(serializer),
            EncodedValue::Reference(slot) => {
                serializer.collect_str(&format_args!("{}{}", self.prefix, slot))
            }
        }
    }
}

impl Serialize for Wire<'_, [EncodedValue]> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.inner.len()))?;
        for v in self.inner {
            seq.serialize_element(&self.wrap(v))?;
        }
        seq.end()
    }
}

impl Serialize for Wire<'_, IndexMap<String, EncodedValue>> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (k, v) in self.inner {
            map.serialize_entry(k, &self.wrap(v))?;
        }
        map.end()
    }
}

impl Serialize for Wire<'_, [ObjectRecord]> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.inner.len()))?;
        for record in self.inner {
            seq.serialize_element(&self.wrap(record))?;
        }
        seq.end()
    }
}

impl Serialize for Wire<'_, ObjectRecord> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.inner {
            ObjectRecord::Object { type_name, fields } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("n", type_name)?;
                map.serialize_entry("p", &self.wrap(fields))?;
                map.end()
            }
            ObjectRecord::Seq(items) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("a", &self.wrap(items.as_slice()))?;
                map.end()
            }
            ObjectRecord::Map(entries) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("a", &self.wrap(entries))?;
                map.end()
            }
        }
    }
}

/// Parsed top-level text.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Envelope(Envelope),
    /// Store-less form: the contents of the top-level `a` key, an array or object of plain
    /// nested JSON.
    Legacy(Json),
}

impl Payload {
    pub fn parse(text: &str, config: &Config) -> Result<Payload> {
        let json: Json = serde_json::from_str(text)?;
        Self::from_json(json, config)
    }

    pub fn from_json(json: Json, config: &Config) -> Result<Payload> {
        let mut top = match json {
            Json::Object(map) => map,
            _ => return Err(Error::format("top level must be a JSON object")),
        };

        let Some(store) = top.remove("s") else {
            let legacy = top
                .remove("a")
                .ok_or_else(|| Error::format("missing object store `s`"))?;
            if let Some(key) = top.keys().next() {
                return Err(Error::format(format!("unexpected top-level key `{}`", key)));
            }
            return match legacy {
                Json::Array(_) | Json::Object(_) => Ok(Payload::Legacy(legacy)),
                _ => Err(Error::format("legacy `a` must be an array or object")),
            };
        };

        let reader = WireReader {
            prefix: &config.reference_prefix,
        };
        let root = match (top.remove("o"), top.remove("d")) {
            (Some(Json::String(token)), None) => match reader.token(&token)? {
                Some(slot) => EncodedValue::Reference(slot),
                None => return Err(Error::format("root `o` must be a reference")),
            },
            (Some(_), None) => return Err(Error::format("root `o` must be a reference")),
            (None, Some(data)) => EncodedValue::Scalar(reader.literal(data)?),
            (Some(_), Some(_)) => return Err(Error::format("envelope has both `o` and `d`")),
            (None, None) => return Err(Error::format("envelope has neither `o` nor `d`")),
        };
        if let Some(key) = top.keys().next() {
            return Err(Error::format(format!("unexpected top-level key `{}`", key)));
        }

        let records = match store {
            Json::Array(records) => records,
            _ => return Err(Error::format("object store `s` must be an array")),
        };
        if matches!(root, EncodedValue::Scalar(_)) && !records.is_empty() {
            return Err(Error::format("scalar root `d` takes an empty object store"));
        }
        if records.len() > config.max_slots {
            return Err(Error::format(format!(
                "object store holds {} records, limit is {}",
                records.len(),
                config.max_slots
            )));
        }
        let store = records
            .into_iter()
            .enumerate()
            .map(|(slot, record)| reader.record(slot, record))
            .collect::<Result<ObjectStore>>()?;

        Ok(Payload::Envelope(Envelope { root, store }))
    }
}

struct WireReader<'a> {
    prefix: &'a str,
}

impl WireReader<'_> {
    /// `Some(slot)` for a reference token, `None` for a plain string.
    fn token(&self, s: &str) -> Result<Option<usize>> {
        let Some(digits) = s.strip_prefix(self.prefix) else {
            return Ok(None);
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::format(format!("malformed reference `{}`", s)));
        }
        digits
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::format(format!("reference `{}` is out of range", s)))
    }

    /// A scalar taken as-is, with no reference decoding.
    fn literal(&self, json: Json) -> Result<Scalar> {
        Ok(match json {
            Json::Null => Scalar::Null,
            Json::Bool(v) => Scalar::Bool(v),
            Json::Number(n) => match Integer::from_json(&n) {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(
                    n.as_f64()
                        .ok_or_else(|| Error::format(format!("unreadable number {}", n)))?,
                ),
            },
            Json::String(s) => Scalar::Str(s),
            Json::Array(_) => return Err(Error::format("nested array must be a store record")),
            Json::Object(_) => return Err(Error::format("nested object must be a store record")),
        })
    }

    fn value(&self, json: Json) -> Result<EncodedValue> {
        if let Json::String(s) = &json {
            if let Some(slot) = self.token(s)? {
                return Ok(EncodedValue::Reference(slot));
            }
        }
        self.literal(json).map(EncodedValue::Scalar)
    }

    fn entries(&self, map: serde_json::Map<String, Json>) -> Result<IndexMap<String, EncodedValue>> {
        map.into_iter()
            .map(|(k, v)| self.value(v).map(|v| (k, v)))
            .collect()
    }

    fn record(&self, slot: usize, json: Json) -> Result<ObjectRecord> {
        let mut map = match json {
            Json::Object(map) => map,
            _ => return Err(Error::format(format!("record {} is not an object", slot))),
        };
        let record = if let Some(name) = map.remove("n") {
            let type_name = match name {
                Json::String(s) => s,
                _ => {
                    return Err(Error::format(format!(
                        "record {} type name must be a string",
                        slot
                    )))
                }
            };
            let fields = match map.remove("p") {
                Some(Json::Object(p)) => self.entries(p)?,
                Some(_) => {
                    return Err(Error::format(format!(
                        "record {} fields `p` must be an object",
                        slot
                    )))
                }
                None => return Err(Error::format(format!("record {} is missing `p`", slot))),
            };
            ObjectRecord::Object { type_name, fields }
        } else {
            match map.remove("a") {
                Some(Json::Array(items)) => ObjectRecord::Seq(
                    items
                        .into_iter()
                        .map(|v| self.value(v))
                        .collect::<Result<_>>()?,
                ),
                Some(Json::Object(entries)) => ObjectRecord::Map(self.entries(entries)?),
                Some(_) => {
                    return Err(Error::format(format!(
                        "record {} `a` must be an array or object",
                        slot
                    )))
                }
                None => {
                    return Err(Error::format(format!(
                        "record {} has neither `n` nor `a`",
                        slot
                    )))
                }
            }
        };
        if let Some(key) = map.keys().next() {
            return Err(Error::format(format!(
                "record {} has unexpected key `{}`",
                slot, key
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    fn envelope(text: &str) -> Result<Envelope> {
        Envelope::parse(text, &config())
    }

    #[test]
    fn writes_the_documented_shape() {
        let env = Envelope {
            root: EncodedValue::Reference(0),
            store: vec![ObjectRecord::Seq(vec![
                EncodedValue::Scalar(Scalar::Int(1.into())),
                EncodedValue::Scalar(Scalar::Str("e".into())),
            ])],
        };
        assert_eq!(
            env.to_text("@zenaton#").unwrap(),
            r#"{"o":"@zenaton#0","s":[{"a":[1,"e"]}]}"#
        );

        let scalar = Envelope {
            root: EncodedValue::Scalar(Scalar::Float(2.5)),
            store: Vec::new(),
        };
        assert_eq!(scalar.to_text("@zenaton#").unwrap(), r#"{"d":2.5,"s":[]}"#);
    }

    #[test]
    fn object_records_keep_field_order() {
        let mut fields = IndexMap::new();
        fields.insert("z".to_owned(), EncodedValue::Reference(0));
        fields.insert("a".to_owned(), EncodedValue::Scalar(Scalar::Null));
        let env = Envelope {
            root: EncodedValue::Reference(0),
            store: vec![ObjectRecord::Object {
                type_name: "Node".into(),
                fields,
            }],
        };
        let text = env.to_text("$").unwrap();
        assert_eq!(text, r#"{"o":"$0","s":[{"n":"Node","p":{"z":"$0","a":null}}]}"#);
        let back = Envelope::parse(&text, &Config::new().with_reference_prefix("$")).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn references_must_be_digits() {
        let err = envelope(r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#x"]}]}"#).unwrap_err();
        assert_eq!(err, Error::Format("malformed reference `@zenaton#x`".into()));
        assert!(envelope(r#"{"o":"@zenaton#","s":[]}"#).is_err());
        assert!(envelope(r#"{"o":"@zenaton#99999999999999999999999","s":[]}"#).is_err());
    }

    #[test]
    fn scalar_root_is_literal() {
        let env = envelope(r#"{"d":"@zenaton#0","s":[]}"#).unwrap();
        assert_eq!(env.root, EncodedValue::Scalar(Scalar::Str("@zenaton#0".into())));
    }

    #[test]
    fn scalar_root_needs_an_empty_store() {
        let err = envelope(r#"{"d":1,"s":[{"a":[]}]}"#).unwrap_err();
        assert_eq!(err, Error::Format("scalar root `d` takes an empty object store".into()));
    }

    #[test]
    fn structural_errors() {
        for text in [
            "[1,2]",
            r#"{"s":[]}"#,
            r#"{"o":"@zenaton#0","d":1,"s":[]}"#,
            r#"{"o":5,"s":[]}"#,
            r#"{"o":"@zenaton#0","s":{}}"#,
            r#"{"o":"@zenaton#0","s":[{"a":[[1]]}]}"#,
            r#"{"o":"@zenaton#0","s":[{"n":"T"}]}"#,
            r#"{"o":"@zenaton#0","s":[{"n":"T","p":{},"x":1}]}"#,
            r#"{"o":"@zenaton#0","s":[7]}"#,
            r#"{"o":"@zenaton#0","s":[],"extra":true}"#,
            r#"{"d":1,"s":[{"a":[]}]}"#,
            r#"{"o":"@zenaton#0","#,
        ] {
            let err = envelope(text).unwrap_err();
            assert!(err.is_format(), "{} gave {:?}", text, err);
        }
    }

    #[test]
    fn slot_limit() {
        let config = Config::new().with_max_slots(1);
        let err = Payload::parse(r#"{"o":"@zenaton#0","s":[{"a":[]},{"a":[]}]}"#, &config)
            .unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn legacy_payloads() {
        let p = Payload::parse(r#"{"a":[1,[2]]}"#, &config()).unwrap();
        assert!(matches!(p, Payload::Legacy(Json::Array(_))));
        let p = Payload::parse(r#"{"a":{"k":"v"}}"#, &config()).unwrap();
        assert!(matches!(p, Payload::Legacy(Json::Object(_))));
        assert!(Payload::parse(r#"{"a":3}"#, &config()).is_err());
        assert!(Envelope::parse(r#"{"a":[]}"#, &config()).is_err());
    }

    #[test]
    fn record_references() {
        let r = ObjectRecord::Seq(vec![
            EncodedValue::Reference(3),
            EncodedValue::Scalar(Scalar::Null),
            EncodedValue::Reference(1),
        ]);
        assert_eq!(r.references().collect::<Vec<_>>(), vec![3, 1]);
    }
}
