use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::Result;
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Seq, Value};

/// A captured error: a message and a trace of frames, newest first.
#[derive(Clone, Default)]
pub struct ErrorValue {
    message: String,
    trace: Seq,
}

impl ErrorValue {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            trace: Seq::new(),
        }
    }

    pub fn with_trace<S, I, F>(message: S, trace: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            message: message.into(),
            trace: Seq::from_vec(trace.into_iter().map(|f| Value::Str(f.into())).collect()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &Seq {
        &self.trace
    }

    pub(crate) fn dismantle(&mut self) {
        self.trace = Seq::new();
    }

    /// Wrap this error in an object of the given error type.
    pub fn into_value<S: Into<String>>(self, type_name: S) -> Value {
        Value::Object(Object::new(Instance::new(type_name, Body::Error(self))))
    }
}

impl From<ErrorValue> for Value {
    fn from(v: ErrorValue) -> Self {
        v.into_value(ErrorStrategy::TYPE_NAME)
    }
}

pub(crate) fn extract(e: &ErrorValue) -> Fields {
    let mut fields = Fields::with_capacity(2);
    fields.insert("m".into(), e.message.as_str().into());
    fields.insert("b".into(), Value::Seq(e.trace.clone()));
    fields
}

pub struct ErrorStrategy {
    name: String,
}

impl ErrorStrategy {
    pub const TYPE_NAME: &'static str = "Exception";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ErrorStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for ErrorStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Error(ErrorValue::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Error(e) => Ok(extract(e)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let message = r.string("m")?;
        let trace = r.seq("b")?;
        r.finish()?;
        match instance.body_mut() {
            Body::Error(slot) => {
                slot.message = message;
                slot.trace = trace;
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
    fn extract_then_inject() {
        let strategy = ErrorStrategy::named("TaskFailed");
        let source = ErrorValue::with_trace("boom", ["a.rs:1", "b.rs:2"]);
        let trace = source.trace().clone();
        let fields = strategy
            .extract(&Instance::new("TaskFailed", Body::Error(source)))
            .unwrap();
        assert_eq!(fields.get("m"), Some(&Value::from("boom")));

        let mut blank = strategy.allocate().unwrap();
        assert_eq!(blank.type_name(), "TaskFailed");
        strategy.inject(&mut blank, fields).unwrap();
        match blank.body() {
            Body::Error(e) => {
                assert_eq!(e.message(), "boom");
                assert!(e.trace().ptr_eq(&trace));
                assert_eq!(e.trace().get(1), Some(Value::from("b.rs:2")));
            }
            _ => panic!("Shell wasn't an error"),
        }
    }

    #[test]
    fn trace_must_be_a_sequence() {
        let strategy = ErrorStrategy::default();
        let mut blank = strategy.allocate().unwrap();
        let mut fields = Fields::new();
        fields.insert("m".into(), Value::from("boom"));
        fields.insert("b".into(), Value::from("a.rs:1"));
        let err = strategy.inject(&mut blank, fields).unwrap_err();
        assert_eq!(err, crate::Error::Format("Exception field `b` must be a sequence".into()));

        let mut fields = Fields::new();
        fields.insert("b".into(), Value::seq(Vec::<Value>::new()));
        assert!(strategy.inject(&mut blank, fields).unwrap_err().is_format());
    }

    #[test]
    fn dismantle_leaves_shared_trace_alone() {
        let trace = Seq::from_vec(vec![Value::from("a.rs:1")]);
        let mut e = ErrorValue::new("boom");
        e.trace = trace.clone();
        e.dismantle();
        assert!(e.trace().is_empty());
        assert_eq!(trace.len(), 1);
    }
}
