use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::Result;
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Value};

/// A named enumerator token.
///
/// Tokens decode as fresh objects: two tokens with the same name in different envelopes are
/// value-equal but not the same handle. Within one graph, sharing a single token handle is
/// preserved like any other aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Token {
    name: String,
}

impl Token {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<Token> for Value {
    fn from(v: Token) -> Self {
        Value::Object(Object::new(Instance::new(
            TokenStrategy::TYPE_NAME,
            Body::Token(v),
        )))
    }
}

pub(crate) fn extract(t: &Token) -> Fields {
    let mut fields = Fields::with_capacity(1);
    fields.insert("s".into(), t.name.as_str().into());
    fields
}

pub struct TokenStrategy {
    name: String,
}

impl TokenStrategy {
    pub const TYPE_NAME: &'static str = "Symbol";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TokenStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for TokenStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Token(Token::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Token(t) => Ok(extract(t)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let name = r.string("s")?;
        r.finish()?;
        match instance.body_mut() {
            Body::Token(slot) => {
                slot.name = name;
                Ok(())
            }
            _ => Err(shell_mismatch(&self.name)),
        }
    }
}
