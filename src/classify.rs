use std::fmt;

use crate::error::{Error, Result};
use crate::kinds::{
    ErrorStrategy, PatternStrategy, RangeStrategy, RatioStrategy, RecordStrategy, TimeStrategy,
    TokenStrategy,
};
use crate::value::{Body, Value};

/// The special value kinds, each with a fixed field set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialTag {
    Time,
    Ratio,
    Pattern,
    Range,
    Token,
    Record,
    Error,
}

impl SpecialTag {
    pub const ALL: [SpecialTag; 7] = [
        SpecialTag::Time,
        SpecialTag::Ratio,
        SpecialTag::Pattern,
        SpecialTag::Range,
        SpecialTag::Token,
        SpecialTag::Record,
        SpecialTag::Error,
    ];

    /// Type name the kind is registered under by default.
    pub fn default_type_name(self) -> &'static str {
        match self {
            SpecialTag::Time => TimeStrategy::TYPE_NAME,
            SpecialTag::Ratio => RatioStrategy::TYPE_NAME,
            SpecialTag::Pattern => PatternStrategy::TYPE_NAME,
            SpecialTag::Range => RangeStrategy::TYPE_NAME,
            SpecialTag::Token => TokenStrategy::TYPE_NAME,
            SpecialTag::Record => RecordStrategy::TYPE_NAME,
            SpecialTag::Error => ErrorStrategy::TYPE_NAME,
        }
    }

    pub(crate) fn of(body: &Body) -> Option<SpecialTag> {
        Some(match body {
            Body::Fields(_) => return None,
            Body::Time(_) => SpecialTag::Time,
            Body::Ratio(_) => SpecialTag::Ratio,
            Body::Pattern(_) => SpecialTag::Pattern,
            Body::Range(_) => SpecialTag::Range,
            Body::Token(_) => SpecialTag::Token,
            Body::Record(_) => SpecialTag::Record,
            Body::Error(_) => SpecialTag::Error,
        })
    }
}

impl fmt::Display for SpecialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_type_name())
    }
}

/// How a value is carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Null, boolean, number, or string: inlined, never stored.
    Basic,
    Sequence,
    Mapping,
    Special(SpecialTag),
    Generic,
}

impl Kind {
    /// Whether values of this kind take a store slot.
    pub fn is_stored(self) -> bool {
        !matches!(self, Kind::Basic)
    }
}

/// Classify a value. Callables have no wire form and fail with a serialization error.
pub fn classify(value: &Value) -> Result<Kind> {
    Ok(match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
            Kind::Basic
        }
        Value::Seq(_) => Kind::Sequence,
        Value::Map(_) => Kind::Mapping,
        Value::Object(o) => match SpecialTag::of(o.borrow().body()) {
            Some(tag) => Kind::Special(tag),
            None => Kind::Generic,
        },
        Value::Callable(_) => {
            return Err(Error::serialization("callables cannot be serialized"))
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinds::{Ratio, Timestamp, Token};

    #[test]
    fn scalars_are_basic() {
        for v in [
            Value::Null,
            Value::from(true),
            Value::from(-4),
            Value::from(1.5),
            Value::from("x"),
        ] {
            assert_eq!(classify(&v).unwrap(), Kind::Basic);
        }
    }

    #[test]
    fn aggregates() {
        assert_eq!(classify(&Value::seq(vec![1])).unwrap(), Kind::Sequence);
        assert_eq!(classify(&Value::map(vec![("a", 1)])).unwrap(), Kind::Mapping);
        let obj = Value::object("Point", vec![("x", 1)]);
        assert_eq!(classify(&obj).unwrap(), Kind::Generic);
        assert!(Kind::Generic.is_stored());
        assert!(!Kind::Basic.is_stored());
    }

    #[test]
    fn special_kinds() {
        let t: Value = Timestamp::from_sec(0).into();
        assert_eq!(classify(&t).unwrap(), Kind::Special(SpecialTag::Time));
        let r: Value = Ratio::from_integer(3).into();
        assert_eq!(classify(&r).unwrap(), Kind::Special(SpecialTag::Ratio));
        let s: Value = Token::new("ok").into();
        assert_eq!(classify(&s).unwrap(), Kind::Special(SpecialTag::Token));
    }

    #[test]
    fn callables_are_rejected() {
        let f = Value::callable(|_| Value::Null);
        assert!(classify(&f).unwrap_err().is_serialization());
    }

    #[test]
    fn tag_names() {
        let names: Vec<&str> = SpecialTag::ALL
            .iter()
            .map(|t| t.default_type_name())
            .collect();
        assert_eq!(
            names,
            vec!["Time", "Rational", "Regexp", "Range", "Symbol", "Struct", "Exception"]
        );
    }
}
