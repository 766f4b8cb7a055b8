//! Decoding an [`Envelope`] back into a value graph.
//!
//! Decoding runs in two passes over the store. The first allocates a blank shell for every
//! record: an empty sequence or mapping, or a blank instance from the registry. The second
//! fills the shells in slot order, resolving each reference to the shell already sitting in
//! that slot. Since every shell exists before any is filled, references may point forward,
//! backward, or at the record itself.
//!
//! Before either pass, every reference is checked against the store and the walk from the root
//! is held to `max_depth`, counted the way the encoder counts it. If a pass fails, every shell
//! built so far is emptied before the error is returned, so cycles among them don't keep the
//! partial graph alive, and singletons go back to the fields they held before the call.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::integer::Integer;
use crate::registry::Registry;
use crate::store::{EncodedValue, Envelope, ObjectRecord, Payload};
use crate::value::{Entries, Fields, Instance, Map, Object, Seq, Value};

pub struct Decoder<'a> {
    registry: &'a Registry,
    config: &'a Config,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        Self { registry, config }
    }

    /// Parse JSON text and decode it, accepting both the envelope form and the legacy form.
    pub fn decode_str(&self, text: &str) -> Result<Value> {
        match Payload::parse(text, self.config)? {
            Payload::Envelope(envelope) => self.decode(&envelope),
            Payload::Legacy(json) => self.decode_legacy(&json),
        }
    }

    pub fn decode(&self, envelope: &Envelope) -> Result<Value> {
        let mut arena = Arena::with_capacity(envelope.store.len());
        let result = reachable(envelope, self.config.max_depth).and_then(|reached| {
            arena.allocate(self.registry, &envelope.store)?;
            arena.populate(self.registry, &envelope.store)?;
            let root = arena.resolve(&envelope.root)?;
            Ok((root, reached))
        });
        match result {
            Ok((root, reached)) => {
                arena.release_unreachable(&reached);
                debug!(slots = arena.len(), reached = reached.len(), "decoded value graph");
                Ok(root)
            }
            Err(e) => {
                warn!(error = %e, shells = arena.len(), "decode failed, dismantling partial graph");
                arena.roll_back();
                Err(e)
            }
        }
    }

    /// Decode the store-less form: nested arrays and objects with scalar leaves. Strings are
    /// always literal here; this form has no references.
    pub fn decode_legacy(&self, json: &Json) -> Result<Value> {
        let mut depth_tracking = DepthTracker::new(self.config.max_depth);
        legacy_value(json, &mut depth_tracking)
    }
}

fn legacy_value(json: &Json, depth_tracking: &mut DepthTracker) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(v) => Value::Bool(*v),
        Json::Number(n) => match Integer::from_json(n) {
            Some(i) => Value::Int(i),
            None => Value::Float(
                n.as_f64()
                    .ok_or_else(|| Error::format(format!("unreadable number {}", n)))?,
            ),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => {
            depth_tracking.enter(Error::Format)?;
            let items = items
                .iter()
                .map(|v| legacy_value(v, depth_tracking))
                .collect::<Result<Vec<_>>>()?;
            depth_tracking.leave();
            Value::Seq(Seq::from_vec(items))
        }
        Json::Object(entries) => {
            depth_tracking.enter(Error::Format)?;
            let entries = entries
                .iter()
                .map(|(k, v)| legacy_value(v, depth_tracking).map(|v| (k.clone(), v)))
                .collect::<Result<Entries>>()?;
            depth_tracking.leave();
            Value::Map(Map::from_entries(entries))
        }
    })
}

fn record_at(store: &[ObjectRecord], slot: usize) -> Result<&ObjectRecord> {
    store
        .get(slot)
        .ok_or_else(|| Error::format(format!("dangling reference to slot {}", slot)))
}

/// Check that every reference lands in the store, then walk the graph depth-first from the root
/// and return the slots it reaches. Depth counts first visits only, as the encoder does, so any
/// graph the encoder accepts under a limit decodes under the same limit.
fn reachable(envelope: &Envelope, max_depth: usize) -> Result<HashSet<usize>> {
    let store = &envelope.store;
    for record in store {
        for slot in record.references() {
            record_at(store, slot)?;
        }
    }

    let mut reached = HashSet::new();
    let &EncodedValue::Reference(root) = &envelope.root else {
        return Ok(reached);
    };
    let mut depth_tracking = DepthTracker::new(max_depth);
    depth_tracking.enter(Error::Format)?;
    reached.insert(root);
    let mut pending = vec![record_at(store, root)?.references()];
    while let Some(refs) = pending.last_mut() {
        match refs.next() {
            Some(slot) => {
                if reached.insert(slot) {
                    depth_tracking.enter(Error::Format)?;
                    pending.push(record_at(store, slot)?.references());
                }
            }
            None => {
                pending.pop();
                depth_tracking.leave();
            }
        }
    }
    Ok(reached)
}

/// A blank aggregate awaiting its contents. A singleton keeps a copy of the instance as it
/// stood before this decode.
enum Shell {
    Seq(Seq),
    Map(Map),
    Object { handle: Object, saved: Option<Instance> },
}

impl Shell {
    fn value(&self) -> Value {
        match self {
            Shell::Seq(s) => Value::Seq(s.clone()),
            Shell::Map(m) => Value::Map(m.clone()),
            Shell::Object { handle, .. } => Value::Object(handle.clone()),
        }
    }

    /// Empty a shell nothing else holds. Singletons outlive the call and are left as decoded.
    fn release(&self) {
        match self {
            Shell::Seq(s) => s.borrow_mut().clear(),
            Shell::Map(m) => m.borrow_mut().clear(),
            Shell::Object { saved: Some(_), .. } => (),
            Shell::Object { handle, saved: None } => handle.borrow_mut().dismantle(),
        }
    }

    /// Undo this shell after a failed decode.
    fn roll_back(&self) {
        match self {
            Shell::Object { handle, saved: Some(before) } => *handle.borrow_mut() = before.clone(),
            _ => self.release(),
        }
    }
}

/// Slot-indexed shells for one decode call.
struct Arena {
    shells: Vec<Shell>,
}

impl Arena {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            shells: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.shells.len()
    }

    fn allocate(&mut self, registry: &Registry, store: &[ObjectRecord]) -> Result<()> {
        for (slot, record) in store.iter().enumerate() {
            let shell = match record {
                ObjectRecord::Seq(items) => Shell::Seq(Seq::from_vec(Vec::with_capacity(items.len()))),
                ObjectRecord::Map(_) => Shell::Map(Map::new()),
                ObjectRecord::Object { type_name, .. } => {
                    let singleton = registry.resolve(type_name)?.is_singleton();
                    let handle = registry.allocate(type_name)?;
                    let saved = singleton.then(|| handle.borrow().clone());
                    Shell::Object { handle, saved }
                }
            };
            trace!(slot, "allocated shell");
            self.shells.push(shell);
        }
        Ok(())
    }

    fn populate(&self, registry: &Registry, store: &[ObjectRecord]) -> Result<()> {
        for (record, shell) in store.iter().zip(self.shells.iter()) {
            match (record, shell) {
                (ObjectRecord::Seq(items), Shell::Seq(seq)) => {
                    let items = items
                        .iter()
                        .map(|v| self.resolve(v))
                        .collect::<Result<Vec<_>>>()?;
                    seq.borrow_mut().extend(items);
                }
                (ObjectRecord::Map(entries), Shell::Map(map)) => {
                    let entries = self.resolve_entries(entries)?;
                    map.borrow_mut().extend(entries);
                }
                (ObjectRecord::Object { fields, .. }, Shell::Object { handle, .. }) => {
                    let fields = self.resolve_entries(fields)?;
                    registry.inject(&mut handle.borrow_mut(), fields)?;
                }
                _ => return Err(Error::format("record doesn't match its shell")),
            }
        }
        Ok(())
    }

    fn resolve_entries(&self, entries: &IndexMap<String, EncodedValue>) -> Result<Fields> {
        entries
            .iter()
            .map(|(k, v)| self.resolve(v).map(|v| (k.clone(), v)))
            .collect()
    }

    fn resolve(&self, value: &EncodedValue) -> Result<Value> {
        match value {
            EncodedValue::Scalar(s) => Ok(s.clone().into_value()),
            EncodedValue::Reference(slot) => self
                .shells
                .get(*slot)
                .map(Shell::value)
                .ok_or_else(|| Error::format(format!("dangling reference to slot {}", slot))),
        }
    }

    /// Empty every shell the root can't reach. Nothing outside this call holds them, and
    /// emptying breaks any cycle among them.
    fn release_unreachable(&self, reached: &HashSet<usize>) {
        for (slot, shell) in self.shells.iter().enumerate() {
            if !reached.contains(&slot) {
                shell.release();
            }
        }
    }

    fn roll_back(&self) {
        for shell in &self.shells {
            shell.roll_back();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Scalar;
    use tracing_test::traced_test;

    fn decode(text: &str) -> Result<Value> {
        let registry = Registry::builder()
            .register_object("Node")
            .build();
        let config = Config::default();
        Decoder::new(&registry, &config).decode_str(text)
    }

    #[test]
    fn forward_and_backward_references() {
        let v = decode(r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#1","@zenaton#0"]},{"a":{"k":1}}]}"#)
            .unwrap();
        assert!(v.at(1).same(&v));
        assert_eq!(v.at(0).field("k"), Value::from(1));
    }

    #[test]
    fn object_fields_are_injected() {
        let v = decode(r#"{"o":"@zenaton#0","s":[{"n":"Node","p":{"next":"@zenaton#0","x":2.5}}]}"#)
            .unwrap();
        assert_eq!(v.type_name().as_deref(), Some("Node"));
        assert!(v.field("next").same(&v));
        assert_eq!(v.field("x"), Value::from(2.5));
    }

    #[test]
    fn scalar_root() {
        assert_eq!(decode(r#"{"d":null,"s":[]}"#).unwrap(), Value::Null);
        assert_eq!(decode(r#"{"d":"hi","s":[]}"#).unwrap(), Value::from("hi"));
    }

    #[test]
    fn dangling_and_unknown() {
        let err = decode(r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#4"]}]}"#).unwrap_err();
        assert_eq!(err, Error::Format("dangling reference to slot 4".into()));
        let err = decode(r#"{"o":"@zenaton#1","s":[]}"#).unwrap_err();
        assert!(err.is_format());
        let err = decode(r#"{"o":"@zenaton#0","s":[{"n":"Ghost","p":{}}]}"#).unwrap_err();
        assert_eq!(err, Error::TypeResolution("Ghost".into()));
    }

    #[test]
    #[traced_test]
    fn failure_is_logged() {
        assert!(decode(r#"{"o":"@zenaton#0","s":[{"a":[]},{"n":"Ghost","p":{}}]}"#).is_err());
        assert!(logs_contain("decode failed"));
        assert!(logs_contain("Unknown type name: Ghost"));
    }

    #[test]
    fn failed_decode_frees_cycles() {
        let registry = Registry::builder().register_object("Node").build();
        let config = Config::default();
        let envelope = Envelope {
            root: EncodedValue::Reference(0),
            store: vec![
                ObjectRecord::Seq(vec![EncodedValue::Reference(0)]),
                ObjectRecord::Seq(vec![EncodedValue::Reference(9)]),
            ],
        };
        let mut arena = Arena::with_capacity(2);
        arena.allocate(&registry, &envelope.store).unwrap();
        let first = match &arena.shells[0] {
            Shell::Seq(s) => s.clone(),
            _ => unreachable!(),
        };
        assert!(arena.populate(&registry, &envelope.store).is_err());
        arena.roll_back();
        assert!(first.is_empty());
        drop(arena);
        // The self-reference is gone, so this handle is the only one left.
        assert_eq!(first.handle_count(), 1);
        assert!(Decoder::new(&registry, &config).decode(&envelope).is_err());
    }

    fn chain(len: usize) -> String {
        let records: Vec<String> = (0..len)
            .map(|i| {
                if i + 1 < len {
                    format!(r#"{{"a":["@zenaton#{}"]}}"#, i + 1)
                } else {
                    r#"{"a":[]}"#.to_string()
                }
            })
            .collect();
        format!(r#"{{"o":"@zenaton#0","s":[{}]}}"#, records.join(","))
    }

    #[test]
    fn reference_chains_are_depth_limited() {
        let registry = Registry::with_builtins();
        let config = Config::new().with_max_depth(4);
        let decoder = Decoder::new(&registry, &config);
        let v = decoder.decode_str(&chain(4)).unwrap();
        assert!(v.at(0).at(0).at(0).is_seq());
        let err = decoder.decode_str(&chain(5)).unwrap_err();
        assert_eq!(err, Error::Format("Depth limit of 4 exceeded".into()));

        // Far past the stack, yet rejected before anything nests.
        assert!(decode(&chain(200_000)).unwrap_err().is_format());
    }

    #[test]
    fn shared_references_count_once() {
        // Slot 2 sits under slot 1 only if slot 1 reaches it first.
        let registry = Registry::with_builtins();
        let config = Config::new().with_max_depth(2);
        let decoder = Decoder::new(&registry, &config);
        let text = r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#1","@zenaton#2"]},{"a":["@zenaton#2"]},{"a":[]}]}"#;
        assert!(decoder.decode_str(text).unwrap_err().is_format());
        let text = r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#2","@zenaton#1","@zenaton#0"]},{"a":["@zenaton#2"]},{"a":[]}]}"#;
        let v = decoder.decode_str(text).unwrap();
        assert!(v.at(1).at(0).same(&v.at(0)));
    }

    #[test]
    fn dangling_references_fail_before_injection() {
        let registry = Registry::builder().register_singleton("Settings").build();
        let settings = registry.singleton("Settings").unwrap();
        settings.set("level", 3);
        let config = Config::default();
        let text = concat!(
            r#"{"o":"@zenaton#2","s":["#,
            r#"{"n":"Settings","p":{"level":9,"peer":"@zenaton#2"}},"#,
            r#"{"a":["@zenaton#99"]},"#,
            r#"{"a":["@zenaton#0","@zenaton#1"]}]}"#
        );
        let err = Decoder::new(&registry, &config).decode_str(text).unwrap_err();
        assert_eq!(err, Error::Format("dangling reference to slot 99".into()));
        assert_eq!(settings.get("level"), Some(Value::from(3)));
        assert_eq!(settings.get("peer"), None);
    }

    #[test]
    fn failed_decode_restores_singletons() {
        let registry = crate::registry::RegistryBuilder::with_builtins()
            .register_singleton("Settings")
            .build();
        let settings = registry.singleton("Settings").unwrap();
        settings.set("level", 3);
        let config = Config::default();
        // The singleton fills first; the timestamp after it is missing fields.
        let text = concat!(
            r#"{"o":"@zenaton#2","s":["#,
            r#"{"n":"Settings","p":{"level":9,"peer":"@zenaton#2"}},"#,
            r#"{"n":"Time","p":{"y":2020}},"#,
            r#"{"a":["@zenaton#0","@zenaton#1"]}]}"#
        );
        let err = Decoder::new(&registry, &config).decode_str(text).unwrap_err();
        assert!(err.is_format());
        assert_eq!(settings.get("level"), Some(Value::from(3)));
        assert_eq!(settings.get("peer"), None);
    }

    #[test]
    fn legacy_form() {
        let v = decode(r#"{"a":[1,"@zenaton#0",[true,null],{"k":-2}]}"#).unwrap();
        assert_eq!(v.at(1), Value::from("@zenaton#0"));
        assert_eq!(v.at(2).at(0), Value::from(true));
        assert_eq!(v.at(3).field("k"), Value::from(-2));

        let registry = Registry::with_builtins();
        let config = Config::new().with_max_depth(2);
        let decoder = Decoder::new(&registry, &config);
        assert!(decoder.decode_str(r#"{"a":[[1]]}"#).is_ok());
        assert!(decoder.decode_str(r#"{"a":[[[1]]]}"#).unwrap_err().is_format());
    }

    #[test]
    fn scalars_resolve_to_themselves() {
        let arena = Arena::with_capacity(0);
        let v = arena
            .resolve(&EncodedValue::Scalar(Scalar::Str("s".into())))
            .unwrap();
        assert_eq!(v, Value::from("s"));
    }
}
