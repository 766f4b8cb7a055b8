//! The special value kinds.
//!
//! Each kind is a plain Rust type stored in an [`Instance`] body, plus a [`TypeStrategy`] that
//! maps it onto a fixed set of named fields. None of them go through generic attribute copying.
//!
//! | Kind        | Default type name | Fields                                         |
//! | --          | --                | --                                             |
//! | Timestamp   | `Time`            | `y m d H M S` wall clock, `ns`, `of`, `sg`     |
//! | Ratio       | `Rational`        | `n` numerator, `d` denominator                 |
//! | Pattern     | `Regexp`          | `s` source, `o` option bits                    |
//! | RangeValue  | `Range`           | `b` start, `e` end, `x` end excluded           |
//! | Token       | `Symbol`          | `s` name                                       |
//! | Record      | `Struct`          | `v` sequence of ordered values                 |
//! | ErrorValue  | `Exception`       | `m` message, `b` trace sequence                |

use std::convert::TryFrom;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Seq, Value};

mod error_value;
mod object;
mod pattern;
mod range;
mod ratio;
mod record;
mod time;
mod token;

pub use self::error_value::{ErrorStrategy, ErrorValue};
pub use self::object::ObjectStrategy;
pub use self::pattern::{Pattern, PatternOptions, PatternStrategy};
pub use self::range::{RangeStrategy, RangeValue};
pub use self::ratio::{Ratio, RatioStrategy};
pub use self::record::{Record, RecordStrategy};
pub use self::time::{
    Civil, TimeStrategy, Timestamp, ENGLAND, ITALY, PROLEPTIC_GREGORIAN, PROLEPTIC_JULIAN,
};
pub use self::token::{Token, TokenStrategy};

/// Strategies for every special kind under its default type name.
pub(crate) fn builtin_strategies() -> Vec<Arc<dyn TypeStrategy>> {
    vec![
        Arc::new(TimeStrategy::default()),
        Arc::new(RatioStrategy::default()),
        Arc::new(PatternStrategy::default()),
        Arc::new(RangeStrategy::default()),
        Arc::new(TokenStrategy::default()),
        Arc::new(RecordStrategy::default()),
        Arc::new(ErrorStrategy::default()),
    ]
}

/// Field extraction by body alone, for instances whose type name has no registered strategy.
pub(crate) fn extract_builtin(instance: &Instance) -> Fields {
    match instance.body() {
        Body::Fields(f) => f.clone(),
        Body::Time(t) => time::extract(t),
        Body::Ratio(r) => ratio::extract(r),
        Body::Pattern(p) => pattern::extract(p),
        Body::Range(r) => range::extract(r),
        Body::Token(t) => token::extract(t),
        Body::Record(r) => record::extract(r),
        Body::Error(e) => error_value::extract(e),
    }
}

pub(crate) fn body_mismatch(name: &str, instance: &Instance) -> Error {
    Error::serialization(format!(
        "{} strategy cannot extract an instance of {}",
        name,
        instance.type_name()
    ))
}

pub(crate) fn shell_mismatch(name: &str) -> Error {
    Error::format(format!("{} shell has the wrong body", name))
}

/// Pulls the fixed field set of a special kind out of a decoded field map. Every field must be
/// taken exactly once; leftovers are rejected by [`finish`](Self::finish).
pub(crate) struct FieldReader<'a> {
    type_name: &'a str,
    fields: Fields,
}

impl<'a> FieldReader<'a> {
    pub fn new(type_name: &'a str, fields: Fields) -> Self {
        Self { type_name, fields }
    }

    fn wrong_type(&self, key: &str, expected: &str) -> Error {
        Error::format(format!(
            "{} field `{}` must be {}",
            self.type_name, key, expected
        ))
    }

    pub fn take(&mut self, key: &str) -> Result<Value> {
        self.fields.shift_remove(key).ok_or_else(|| {
            Error::format(format!("{} is missing field `{}`", self.type_name, key))
        })
    }

    pub fn int(&mut self, key: &str) -> Result<i64> {
        self.take(key)?
            .as_i64()
            .ok_or_else(|| self.wrong_type(key, "an integer"))
    }

    /// An integer field that must also fit a narrower type.
    pub fn narrow<T: TryFrom<i64>>(&mut self, key: &str) -> Result<T> {
        let v = self.int(key)?;
        T::try_from(v).map_err(|_| self.wrong_type(key, "in range"))
    }

    pub fn string(&mut self, key: &str) -> Result<String> {
        match self.take(key)? {
            Value::Str(s) => Ok(s),
            _ => Err(self.wrong_type(key, "a string")),
        }
    }

    pub fn bool(&mut self, key: &str) -> Result<bool> {
        self.take(key)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(key, "a boolean"))
    }

    pub fn seq(&mut self, key: &str) -> Result<Seq> {
        match self.take(key)? {
            Value::Seq(s) => Ok(s),
            _ => Err(self.wrong_type(key, "a sequence")),
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.fields.keys().next() {
            None => Ok(()),
            Some(key) => Err(Error::format(format!(
                "{} has unknown field `{}`",
                self.type_name, key
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reader_takes_each_field_once() {
        let mut fields = Fields::new();
        fields.insert("n".into(), Value::from(3));
        fields.insert("s".into(), Value::from("x"));
        let mut r = FieldReader::new("Thing", fields);
        assert_eq!(r.int("n").unwrap(), 3);
        assert!(r.int("n").unwrap_err().is_format());
        assert!(r.int("s").unwrap_err().is_format());
        r.finish().unwrap();
    }

    #[test]
    fn reader_rejects_leftovers_and_overflow() {
        let mut fields = Fields::new();
        fields.insert("m".into(), Value::from(300));
        fields.insert("extra".into(), Value::Null);
        let mut r = FieldReader::new("Thing", fields);
        assert!(r.narrow::<u8>("m").unwrap_err().is_format());
        let err = r.finish().unwrap_err();
        assert_eq!(err.to_string(), "Malformed envelope: Thing has unknown field `extra`");
    }

    #[test]
    fn every_builtin_has_a_distinct_name() {
        let mut names: Vec<String> = builtin_strategies()
            .iter()
            .map(|s| s.type_name().to_owned())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(
            names,
            vec!["Exception", "Range", "Rational", "Regexp", "Struct", "Symbol", "Time"]
        );
    }
}
