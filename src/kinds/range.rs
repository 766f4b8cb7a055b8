use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::Result;
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Value};

/// An interval between two values. The endpoints are ordinary values and may be aggregates,
/// including the range's own object.
#[derive(Clone, Debug, Default)]
pub struct RangeValue {
    start: Value,
    end: Value,
    exclusive: bool,
}

impl RangeValue {
    pub fn new<S: Into<Value>, E: Into<Value>>(start: S, end: E, exclusive: bool) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            exclusive,
        }
    }

    pub fn start(&self) -> &Value {
        &self.start
    }

    pub fn end(&self) -> &Value {
        &self.end
    }

    /// Whether the end value lies outside the range.
    pub fn exclusive(&self) -> bool {
        self.exclusive
    }

    pub(crate) fn dismantle(&mut self) {
        self.start = Value::Null;
        self.end = Value::Null;
    }
}

impl From<RangeValue> for Value {
    fn from(v: RangeValue) -> Self {
        Value::Object(Object::new(Instance::new(
            RangeStrategy::TYPE_NAME,
            Body::Range(v),
        )))
    }
}

pub(crate) fn extract(r: &RangeValue) -> Fields {
    let mut fields = Fields::with_capacity(3);
    fields.insert("b".into(), r.start.clone());
    fields.insert("e".into(), r.end.clone());
    fields.insert("x".into(), r.exclusive.into());
    fields
}

pub struct RangeStrategy {
    name: String,
}

impl RangeStrategy {
    pub const TYPE_NAME: &'static str = "Range";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for RangeStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for RangeStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Range(RangeValue::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Range(r) => Ok(extract(r)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let range = RangeValue {
            start: r.take("b")?,
            end: r.take("e")?,
            exclusive: r.bool("x")?,
        };
        r.finish()?;
        match instance.body_mut() {
            Body::Range(slot) => {
                *slot = range;
                Ok(())
            }
            _ => Err(shell_mismatch(&self.name)),
        }
    }
}
