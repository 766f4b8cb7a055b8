use std::fmt;
use std::ops::BitOr;

use regex::{Regex, RegexBuilder};

use super::{body_mismatch, shell_mismatch, FieldReader};
use crate::error::{Error, Result};
use crate::registry::TypeStrategy;
use crate::value::{Body, Fields, Instance, Object, Value};

/// Option bits of a [`Pattern`]. The bit values are part of the wire format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PatternOptions(u32);

impl PatternOptions {
    pub const IGNORE_CASE: PatternOptions = PatternOptions(1);
    /// Whitespace and `#` comments in the source are ignored.
    pub const EXTENDED: PatternOptions = PatternOptions(2);
    /// `.` also matches a newline.
    pub const MULTILINE: PatternOptions = PatternOptions(4);

    const ALL: u32 = 7;

    pub fn empty() -> Self {
        PatternOptions(0)
    }

    /// Returns `None` if any unknown bit is set.
    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            None
        } else {
            Some(PatternOptions(bits))
        }
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: PatternOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PatternOptions {
    type Output = PatternOptions;
    fn bitor(self, rhs: PatternOptions) -> PatternOptions {
        PatternOptions(self.0 | rhs.0)
    }
}

/// A compiled textual pattern. Two patterns are equal when their source and options are.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
    options: PatternOptions,
}

impl Pattern {
    pub fn new(source: &str, options: PatternOptions) -> Result<Pattern, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(options.contains(PatternOptions::IGNORE_CASE))
            .ignore_whitespace(options.contains(PatternOptions::EXTENDED))
            .dot_matches_new_line(options.contains(PatternOptions::MULTILINE))
            .build()?;
        Ok(Pattern { regex, options })
    }

    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.source() == other.source() && self.options == other.options
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}/{}", self.source(), self.options.bits())
    }
}

impl From<Pattern> for Value {
    fn from(v: Pattern) -> Self {
        Value::Object(Object::new(Instance::new(
            PatternStrategy::TYPE_NAME,
            Body::Pattern(v),
        )))
    }
}

pub(crate) fn extract(p: &Pattern) -> Fields {
    let mut fields = Fields::with_capacity(2);
    fields.insert("s".into(), p.source().into());
    fields.insert("o".into(), p.options.bits().into());
    fields
}

pub struct PatternStrategy {
    name: String,
}

impl PatternStrategy {
    pub const TYPE_NAME: &'static str = "Regexp";

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Default for PatternStrategy {
    fn default() -> Self {
        Self::named(Self::TYPE_NAME)
    }
}

impl TypeStrategy for PatternStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn allocate(&self) -> Result<Instance> {
        let blank = Pattern::new("", PatternOptions::empty()).map_err(Error::format)?;
        Ok(Instance::new(self.name.as_str(), Body::Pattern(blank)))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        match instance.body() {
            Body::Pattern(p) => Ok(extract(p)),
            _ => Err(body_mismatch(&self.name, instance)),
        }
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let mut r = FieldReader::new(&self.name, fields);
        let source = r.string("s")?;
        let bits = r.narrow::<u32>("o")?;
        r.finish()?;
        let options = PatternOptions::from_bits(bits).ok_or_else(|| {
            Error::format(format!("{} has unknown option bits {:#x}", self.name, bits))
        })?;
        let pattern = Pattern::new(&source, options)
            .map_err(|e| Error::format(format!("{} doesn't compile: {}", self.name, e)))?;
        match instance.body_mut() {
            Body::Pattern(slot) => {
                *slot = pattern;
                Ok(())
            }
            _ => Err(shell_mismatch(&self.name)),
        }
    }
}
