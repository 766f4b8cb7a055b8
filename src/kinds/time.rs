use std::fmt;
use std::time;

use super::{body_mismatch, FieldReader};
use crate::error::{Error, Result};
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Value};

const MAX_NANOSEC: u32 = 999_999_999;
const MAX_OFFSET: u32 = 86_399;
const SECS_PER_DAY: i128 = 86_400;
const UNIX_EPOCH_JDN: i128 = 2_440_588;

/// Julian day number of the Gregorian reform in Italy, 1582-10-15.
pub const ITALY: i64 = 2_299_161;
/// Julian day number of the Gregorian reform in England, 1752-09-14.
pub const ENGLAND: i64 = 2_361_222;
/// Reform day that makes every date Gregorian.
pub const PROLEPTIC_GREGORIAN: i64 = i64::MIN;
/// Reform day that makes every date Julian.
pub const PROLEPTIC_JULIAN: i64 = i64::MAX;

/// A point in time with a fixed UTC offset and a calendar reform day.
///
/// The instant itself is kept as seconds + nanoseconds since the Unix epoch. The offset and the
/// reform day only affect how the instant maps onto a civil date: days before the reform use the
/// Julian calendar, days on or after it use the Gregorian calendar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
    offset: i32,
    reform: i64,
}

/// Wall-clock fields of a [`Timestamp`] in its own offset and calendar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Civil {
    pub year: i64,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Civil {
    pub fn date(year: i64, month: u8, day: u8) -> Civil {
        Civil {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    pub fn and_time(self, hour: u8, minute: u8, second: u8) -> Civil {
        Civil {
            hour,
            minute,
            second,
            ..self
        }
    }
}

impl Timestamp {
    /// Create a UTC timestamp from a raw seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp {
                sec,
                nano,
                offset: 0,
                reform: ITALY,
            })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp {
            sec,
            nano: 0,
            offset: 0,
            reform: ITALY,
        }
    }

    /// Create a timestamp from wall-clock fields read in the given offset and calendar reform.
    /// Fails on out-of-range fields and on dates that don't exist in that calendar, including
    /// the days skipped by the reform itself.
    pub fn from_civil(civil: Civil, nano: u32, offset: i32, reform: i64) -> Option<Timestamp> {
        if !(1..=12).contains(&civil.month)
            || !(1..=31).contains(&civil.day)
            || civil.hour > 23
            || civil.minute > 59
            || civil.second > 59
            || nano > MAX_NANOSEC
            || offset.unsigned_abs() > MAX_OFFSET
        {
            return None;
        }
        let (y, m, d) = (civil.year as i128, civil.month as i128, civil.day as i128);
        let mut jdn = gregorian_jdn(y, m, d);
        if jdn < reform as i128 {
            jdn = julian_jdn(y, m, d);
        }
        if civil_date(jdn, reform) != (y, civil.month, civil.day) {
            return None;
        }
        let local = (jdn - UNIX_EPOCH_JDN) * SECS_PER_DAY
            + civil.hour as i128 * 3600
            + civil.minute as i128 * 60
            + civil.second as i128;
        let sec = i64::try_from(local - offset as i128).ok()?;
        Some(Timestamp {
            sec,
            nano,
            offset,
            reform,
        })
    }

    /// Same instant, read in a different UTC offset (in seconds).
    pub fn with_offset(self, offset: i32) -> Option<Timestamp> {
        if offset.unsigned_abs() > MAX_OFFSET {
            None
        } else {
            Some(Timestamp { offset, ..self })
        }
    }

    /// Same instant, read with a different calendar reform day.
    pub fn with_reform(self, reform: i64) -> Timestamp {
        Timestamp { reform, ..self }
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn reform(&self) -> i64 {
        self.reform
    }

    /// Wall-clock fields in this timestamp's offset and calendar.
    pub fn civil(&self) -> Civil {
        let local = self.sec as i128 + self.offset as i128;
        let days = local.div_euclid(SECS_PER_DAY);
        let secs = local.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_date(days + UNIX_EPOCH_JDN, self.reform);
        Civil {
            // An i64 second count spans far fewer than i64::MAX years.
            year: year as i64,
            month,
            day,
            hour: (secs / 3600) as u8,
            minute: (secs % 3600 / 60) as u8,
            second: (secs % 60) as u8,
        }
    }

    /// Create a Timestamp based on the current system time. Can fail if the system clock is
    /// before the Unix Epoch.
    pub fn now() -> Option<Timestamp> {
        match time::SystemTime::now().duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(t) => Timestamp::from_utc(t.as_secs() as i64, t.subsec_nanos()),
            Err(_) => None,
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::from_sec(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = self.civil();
        let sign = if self.offset < 0 { '-' } else { '+' };
        let off = self.offset.unsigned_abs();
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}{}{:02}:{:02}",
            c.year,
            c.month,
            c.day,
            c.hour,
            c.minute,
            c.second,
            self.nano,
            sign,
            off / 3600,
            off % 3600 / 60
        )
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Object(Object::new(Instance::new(
            TimeStrategy::TYPE_NAME,
            Body::Time(v),
        )))
    }
}

fn gregorian_jdn(y: i128, m: i128, d: i128) -> i128 {
    let a = (14 - m) / 12;
    let y = y + 4800 - a;
    let m = m + 12 * a - 3;
    d + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400)
        - 32045
}

fn julian_jdn(y: i128, m: i128, d: i128) -> i128 {
    let a = (14 - m) / 12;
    let y = y + 4800 - a;
    let m = m + 12 * a - 3;
    d + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - 32083
}

fn civil_date(jdn: i128, reform: i64) -> (i128, u8, u8) {
    let mut f = jdn + 1401;
    if jdn >= reform as i128 {
        f += ((4 * jdn + 274_277).div_euclid(146_097) * 3).div_euclid(4) - 38;
    }
    let e = 4 * f + 3;
    let g = e.rem_euclid(1461).div_euclid(4);
    let h = 5 * g + 2;
    let day = h.rem_euclid(153).div_euclid(5) + 1;
    let month = (h.div_euclid(153) + 2).rem_euclid(12) + 1;
    let year = e.div_euclid(1461) - 4716 + (14 - month).div_euclid(12);
    (year, month as u8, day as u8)
}

/// Temporal values: `y m d H M S` wall-clock fields, `ns` nanoseconds, `of` UTC offset in
/// seconds, `sg` calendar reform day.
pub struct TimeStrategy {
    name: String,
}

impl TimeStrategy {
    pub const TYPE_NAME: &'static str = "Time";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TimeStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

pub(crate) fn extract(t: &Timestamp) -> Fields {
    let c = t.civil();
    let mut fields = Fields::with_capacity(9);
    fields.insert("y".into(), c.year.into());
    fields.insert("m".into(), c.month.into());
    fields.insert("d".into(), c.day.into());
    fields.insert("H".into(), c.hour.into());
    fields.insert("M".into(), c.minute.into());
    fields.insert("S".into(), c.second.into());
    fields.insert("ns".into(), t.nano.into());
    fields.insert("of".into(), t.offset.into());
    fields.insert("sg".into(), t.reform.into());
    fields
}

impl TypeStrategy for TimeStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::new(self.name.as_str(), Body::Time(Timestamp::default())))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Time(t) => Ok(extract(t)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let civil = Civil {
            year: r.int("y")?,
            month: r.narrow("m")?,
            day: r.narrow("d")?,
            hour: r.narrow("H")?,
            minute: r.narrow("M")?,
            second: r.narrow("S")?,
        };
        let nano = r.narrow("ns")?;
        let offset = r.narrow("of")?;
        let reform = r.int("sg")?;
        r.finish()?;
        let t = Timestamp::from_civil(civil, nano, offset, reform).ok_or_else(|| {
            Error::format(format!("{} fields don't name a valid time", self.name))
        })?;
        match instance.body_mut() {
            Body::Time(slot) => {
                *slot = t;
                Ok(())
            }
            _ => Err(Error::format(format!("{} shell is not a time", self.name))),
        }
    }
}
