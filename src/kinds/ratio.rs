use std::fmt;

use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::{Error, Result};
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Value};

/// An exact fraction, always kept in lowest terms with a positive denominator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ratio {
    numer: i64,
    denom: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

impl Ratio {
    /// Returns `None` for a zero denominator, or when the reduced fraction doesn't fit in `i64`.
    pub fn new(numer: i64, denom: i64) -> Option<Ratio> {
        if denom == 0 {
            return None;
        }
        let (mut n, mut d) = (numer as i128, denom as i128);
        if d < 0 {
            n = -n;
            d = -d;
        }
        let g = gcd(n, d);
        Some(Ratio {
            numer: i64::try_from(n / g).ok()?,
            denom: i64::try_from(d / g).ok()?,
        })
    }

    pub fn from_integer(n: i64) -> Ratio {
        Ratio { numer: n, denom: 1 }
    }

    pub fn numer(&self) -> i64 {
        self.numer
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

/// Zero over one. Blank shells start here so nothing ever divides by zero before injection.
impl Default for Ratio {
    fn default() -> Self {
        Ratio::from_integer(0)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

impl From<Ratio> for Value {
    fn from(v: Ratio) -> Self {
        Value::Object(Object::new(Instance::new(
            RatioStrategy::TYPE_NAME,
            Body::Ratio(v),
        )))
    }
}

pub(crate) fn extract(r: &Ratio) -> Fields {
    let mut fields = Fields::with_capacity(2);
    fields.insert("n".into(), r.numer.into());
    fields.insert("d".into(), r.denom.into());
    fields
}

pub struct RatioStrategy {
    name: String,
}

impl RatioStrategy {
    pub const TYPE_NAME: &'static str = "Rational";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for RatioStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for RatioStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Ratio(Ratio::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Ratio(r) => Ok(extract(r)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let numer = r.int("n")?;
        let denom = r.int("d")?;
        r.finish()?;
        let ratio = Ratio::new(numer, denom).ok_or_else(|| {
            Error::format(format!("{} has an invalid denominator", self.name))
        })?;
        match instance.body_mut() {
            Body::Ratio(slot) => {
                *slot = ratio;
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
    fn normalizes() {
        let r = Ratio::new(6, -4).unwrap();
        assert_eq!((r.numer(), r.denom()), (-3, 2));
        assert_eq!(Ratio::new(0, 7).unwrap(), Ratio::default());
        assert_eq!(r.to_string(), "-3/2");
        assert!(Ratio::new(1, 0).is_none());
        // -i64::MIN doesn't fit back into i64
        assert!(Ratio::new(1, i64::MIN).is_none());
        assert_eq!(Ratio::new(i64::MIN, i64::MIN), Some(Ratio::from_integer(1)));
    }

    #[test]
    fn zero_denominator_is_a_format_error() {
        let strategy = RatioStrategy::default();
        let mut blank = strategy.allocate().unwrap();
        let mut fields = Fields::new();
        fields.insert("n".into(), Value::from(1));
        fields.insert("d".into(), Value::from(0));
        assert!(strategy.inject(&mut blank, fields).unwrap_err().is_format());
    }

    #[test]
    fn blank_shell_is_safe() {
        let blank = RatioStrategy::default().allocate().unwrap();
        match blank.body() {
            Body::Ratio(r) => assert_eq!(r.to_f64(), 0.0),
            _ => panic!("Shell wasn't a ratio"),
        }
    }
}
