//! Encoding a value graph into an [`Envelope`].
//!
//! Every aggregate reachable from the root gets exactly one store slot, assigned in pre-order.
//! A slot is reserved and remembered under the aggregate's identity before its contents are
//! encoded, so meeting the same aggregate again (through sharing or a cycle) yields a reference
//! to the slot instead of another walk.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::classify::{classify, Kind};
use crate::config::Config;
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::store::{EncodedValue, Envelope, ObjectRecord, Scalar};
use crate::value::Value;

pub struct Encoder<'a> {
    registry: &'a Registry,
    config: &'a Config,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config) -> Self {
        Self { registry, config }
    }

    pub fn encode(&self, value: &Value) -> Result<Envelope> {
        let mut state = EncodeState::new(self.registry, self.config);
        let root = state.encode_value(value)?;
        let store = state.finish()?;
        debug!(slots = store.len(), "encoded value graph");
        Ok(Envelope { root, store })
    }
}

struct EncodeState<'a> {
    registry: &'a Registry,
    config: &'a Config,
    slots: Vec<Option<ObjectRecord>>,
    memo: HashMap<usize, usize>,
    // Holds every memoized aggregate for the whole call, so no address in `memo` can be freed
    // and handed to a different aggregate. Extraction may build short-lived aggregates.
    keep_alive: Vec<Value>,
    depth_tracking: DepthTracker,
}

impl<'a> EncodeState<'a> {
    fn new(registry: &'a Registry, config: &'a Config) -> Self {
        Self {
            registry,
            config,
            slots: Vec::new(),
            memo: HashMap::new(),
            keep_alive: Vec::new(),
            depth_tracking: DepthTracker::new(config.max_depth),
        }
    }

    fn encode_value(&mut self, value: &Value) -> Result<EncodedValue> {
        match classify(value)? {
            Kind::Basic => self.scalar(value).map(EncodedValue::Scalar),
            _ => self.aggregate(value),
        }
    }

    fn scalar(&self, value: &Value) -> Result<Scalar> {
        Ok(match value {
            Value::Null => Scalar::Null,
            Value::Bool(v) => Scalar::Bool(*v),
            Value::Int(v) => Scalar::Int(*v),
            Value::Float(v) if v.is_finite() => Scalar::Float(*v),
            Value::Float(v) => {
                return Err(Error::serialization(format!(
                    "non-finite float {} has no textual form",
                    v
                )))
            }
            Value::Str(s) if s.starts_with(&self.config.reference_prefix) => {
                return Err(Error::serialization(format!(
                    "string `{}` collides with the reference prefix",
                    s
                )))
            }
            Value::Str(s) => Scalar::Str(s.clone()),
            _ => return Err(Error::serialization("expected a scalar")),
        })
    }

    fn aggregate(&mut self, value: &Value) -> Result<EncodedValue> {
        let addr = value
            .identity()
            .ok_or_else(|| Error::serialization("expected an aggregate"))?;
        if let Some(&slot) = self.memo.get(&addr) {
            return Ok(EncodedValue::Reference(slot));
        }
        if self.slots.len() >= self.config.max_slots {
            return Err(Error::serialization(format!(
                "graph needs more than {} slots",
                self.config.max_slots
            )));
        }

        let slot = self.slots.len();
        self.slots.push(None);
        self.memo.insert(addr, slot);
        self.keep_alive.push(value.clone());
        trace!(slot, "reserved slot");

        self.depth_tracking.enter(Error::Serialization)?;
        let record = match value {
            Value::Seq(seq) => {
                let items = seq.borrow();
                let mut encoded = Vec::with_capacity(items.len());
                for item in items.iter() {
                    encoded.push(self.encode_value(item)?);
                }
                ObjectRecord::Seq(encoded)
            }
            Value::Map(map) => {
                let entries = map.borrow();
                ObjectRecord::Map(self.encode_entries(entries.iter())?)
            }
            Value::Object(obj) => {
                let (type_name, fields) = {
                    let instance = obj.borrow();
                    let fields = self.registry.extract(&instance)?;
                    (instance.type_name().to_owned(), fields)
                };
                ObjectRecord::Object {
                    type_name,
                    fields: self.encode_entries(fields.iter())?,
                }
            }
            _ => return Err(Error::serialization("expected an aggregate")),
        };
        self.depth_tracking.leave();

        self.slots[slot] = Some(record);
        Ok(EncodedValue::Reference(slot))
    }

    fn encode_entries<'v, I>(&mut self, entries: I) -> Result<IndexMap<String, EncodedValue>>
    where
        I: Iterator<Item = (&'v String, &'v Value)>,
    {
        let mut encoded = IndexMap::with_capacity(entries.size_hint().0);
        for (key, value) in entries {
            encoded.insert(key.clone(), self.encode_value(value)?);
        }
        Ok(encoded)
    }

    fn finish(self) -> Result<Vec<ObjectRecord>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(slot, record)| {
                record.ok_or_else(|| Error::serialization(format!("slot {} was never filled", slot)))
            })
            .collect()
    }
}
