use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

use serde::ser::{Serialize, Serializer};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Repr {
    /// Zero and up.
    NonNeg(u64),
    /// Strictly below zero.
    Neg(i64),
}

/// An integer scalar, covering the full range of both `i64` and `u64`.
///
/// JSON numbers without a fractional part or exponent decode into this type, so `u64::MAX` and
/// `i64::MIN` both survive a round trip unchanged.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Integer(Repr);

impl Integer {
    pub fn is_i64(&self) -> bool {
        self.as_i64().is_some()
    }

    pub fn is_u64(&self) -> bool {
        matches!(self.0, Repr::NonNeg(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            Repr::NonNeg(v) => i64::try_from(v).ok(),
            Repr::Neg(v) => Some(v),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.0 {
            Repr::NonNeg(v) => Some(v),
            Repr::Neg(_) => None,
        }
    }

    /// Nearest `f64`; large magnitudes lose precision.
    pub fn as_f64(&self) -> f64 {
        match self.0 {
            Repr::NonNeg(v) => v as f64,
            Repr::Neg(v) => v as f64,
        }
    }

    pub(crate) fn from_json(n: &serde_json::Number) -> Option<Integer> {
        match n.as_u64() {
            Some(v) => Some(v.into()),
            None => n.as_i64().map(Integer::from),
        }
    }
}

impl Default for Integer {
    fn default() -> Self {
        Integer(Repr::NonNeg(0))
    }
}

impl Ord for Integer {
    fn cmp(&self, other: &Integer) -> Ordering {
        match (self.0, other.0) {
            (Repr::Neg(a), Repr::Neg(b)) => a.cmp(&b),
            (Repr::NonNeg(a), Repr::NonNeg(b)) => a.cmp(&b),
            (Repr::Neg(_), Repr::NonNeg(_)) => Ordering::Less,
            (Repr::NonNeg(_), Repr::Neg(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Integer {
    fn partial_cmp(&self, other: &Integer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::NonNeg(v) => write!(f, "{}", v),
            Repr::Neg(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Debug for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Integer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Repr::NonNeg(v) => serializer.serialize_u64(v),
            Repr::Neg(v) => serializer.serialize_i64(v),
        }
    }
}

/// `From` each primitive into `Integer`, and a checked `TryFrom` back that hands the original
/// integer back on overflow.
macro_rules! conversions {
    (unsigned: $($u:ty),*; signed: $($s:ty),*) => {
        $(
            impl From<$u> for Integer {
                fn from(v: $u) -> Self {
                    Integer(Repr::NonNeg(v as u64))
                }
            }
        )*
        $(
            impl From<$s> for Integer {
                fn from(v: $s) -> Self {
                    Integer(if v < 0 { Repr::Neg(v as i64) } else { Repr::NonNeg(v as u64) })
                }
            }
        )*
        $(
            impl TryFrom<Integer> for $u {
                type Error = Integer;
                fn try_from(v: Integer) -> Result<Self, Integer> {
                    v.as_u64().and_then(|n| <$u>::try_from(n).ok()).ok_or(v)
                }
            }
        )*
        $(
            impl TryFrom<Integer> for $s {
                type Error = Integer;
                fn try_from(v: Integer) -> Result<Self, Integer> {
                    v.as_i64().and_then(|n| <$s>::try_from(n).ok()).ok_or(v)
                }
            }
        )*
    };
}

conversions!(unsigned: u8, u16, u32, u64, usize; signed: i8, i16, i32, i64, isize);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordering_spans_both_halves() {
        let mut ints = vec![
            Integer::from(u64::MAX),
            Integer::from(0u8),
            Integer::from(i64::MIN),
            Integer::from(-1i32),
            Integer::from(1u64 << 63),
        ];
        ints.sort();
        assert_eq!(
            ints,
            vec![
                Integer::from(i64::MIN),
                Integer::from(-1),
                Integer::from(0),
                Integer::from(1u64 << 63),
                Integer::from(u64::MAX),
            ]
        );
    }

    #[test]
    fn narrowing() {
        let x = Integer::from(1u64 << 63);
        assert!(!x.is_i64());
        assert!(x.is_u64());
        assert_eq!(x.as_i64(), None);
        assert_eq!(u8::try_from(Integer::from(300)), Err(Integer::from(300)));
        assert_eq!(i8::try_from(Integer::from(-12)), Ok(-12i8));
        assert_eq!(Integer::from(-5).as_u64(), None);
    }

    #[test]
    fn json_numbers() {
        let big: serde_json::Number = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(Integer::from_json(&big), Some(Integer::from(u64::MAX)));
        let neg: serde_json::Number = serde_json::from_str("-9223372036854775808").unwrap();
        assert_eq!(Integer::from_json(&neg), Some(Integer::from(i64::MIN)));
        let float: serde_json::Number = serde_json::from_str("1.5").unwrap();
        assert_eq!(Integer::from_json(&float), None);
        assert_eq!(serde_json::to_string(&Integer::from(-7)).unwrap(), "-7");
    }
}
