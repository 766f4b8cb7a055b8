use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::{Error, Result};
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Seq, Value};

/// A fixed-field record: an ordered list of member values under a record type name.
///
/// The values live in a shared sequence, so a decoded record holds on to its sequence shell and
/// sees the members once the decoder has filled it in.
#[derive(Clone, Default)]
pub struct Record {
    values: Seq,
}

impl Record {
    pub fn new<I: IntoIterator<Item = V>, V: Into<Value>>(values: I) -> Self {
        Self {
            values: Seq::from_vec(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn values(&self) -> &Seq {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // Drops the handle without touching the sequence, which may be shared.
    pub(crate) fn dismantle(&mut self) {
        self.values = Seq::new();
    }

    /// Wrap this record in an object of the given record type.
    pub fn into_value<S: Into<String>>(self, type_name: S) -> Value {
        Value::Object(Object::new(Instance::new(type_name, Body::Record(self))))
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        v.into_value(RecordStrategy::TYPE_NAME)
    }
}

pub(crate) fn extract(r: &Record) -> Fields {
    let mut fields = Fields::with_capacity(1);
    fields.insert("v".into(), Value::Seq(r.values.clone()));
    fields
}

/// Strategy for one record type. A record type registered with member names only accepts
/// value lists of that length; the default `Struct` type accepts any length.
pub struct RecordStrategy {
    name: String,
    members: Vec<String>,
}

impl RecordStrategy {
    pub const TYPE_NAME: &'static str = "Struct";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_members<S, I, M>(name: S, members: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    fn check_len(&self, len: usize) -> bool {
        self.members.is_empty() || self.members.len() == len
    }
}

impl Default for RecordStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for RecordStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Record(Record::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Record(r) if self.check_len(r.len()) => Ok(extract(r)),
            Body::Record(r) => Err(Error::serialization(format!(
                "{} has {} members but the record holds {} values",
                self.name,
                self.members.len(),
                r.len()
            ))),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    // The value sequence may not be populated yet, so its length can't be checked here.
    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let values = r.seq("v")?;
        r.finish()?;
        match instance.body_mut() {
            Body::Record(slot) => {
                slot.values = values;
                Ok(())
            }
            _ => Err(shell_mismatch(&self.name)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn member_count_is_enforced_on_extract() {
        let strategy = RecordStrategy::with_members("Point", ["x", "y"]);
        let ok = Instance::new("Point", Body::Record(Record::new([1, 2])));
        assert!(strategy.extract(&ok).is_ok());
        let short = Instance::new("Point", Body::Record(Record::new([1])));
        assert!(strategy.extract(&short).unwrap_err().is_serialization());
    }

    #[test]
    fn inject_adopts_the_sequence_handle() {
        let strategy = RecordStrategy::default();
        let mut blank = strategy.allocate().unwrap();
        let shell = Seq::new();
        let mut fields = Fields::new();
        fields.insert("v".into(), Value::Seq(shell.clone()));
        strategy.inject(&mut blank, fields).unwrap();
        shell.push("late");
        match blank.body() {
            Body::Record(r) => assert_eq!(r.get(0), Some(Value::from("late"))),
            _ => panic!("Shell wasn't a record"),
        }
    }
}
