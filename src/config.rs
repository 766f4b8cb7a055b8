use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{DEFAULT_REFERENCE_PREFIX, MAX_DEPTH, MAX_SLOTS};

/// Limits and wire settings shared by the encoder and decoder.
///
/// Deserializable, so it can sit inside a larger application config; missing keys take their
/// defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Marks a string on the wire as a reference to a store slot.
    pub reference_prefix: String,
    /// Deepest allowed nesting of aggregates.
    pub max_depth: usize,
    /// Largest allowed object store.
    pub max_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_owned(),
            max_depth: MAX_DEPTH,
            max_slots: MAX_SLOTS,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.reference_prefix = prefix.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_slots(mut self, max_slots: usize) -> Self {
        self.max_slots = max_slots;
        self
    }

    /// Check that the settings can produce envelopes that read back. The prefix must be
    /// non-empty and must not end in a digit, or the slot number would run into it.
    pub fn validate(&self) -> Result<()> {
        if self.reference_prefix.is_empty() {
            return Err(Error::format("reference prefix is empty"));
        }
        if self.reference_prefix.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::format(format!(
                "reference prefix `{}` ends in a digit",
                self.reference_prefix
            )));
        }
        if self.max_depth == 0 {
            return Err(Error::format("max_depth must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.reference_prefix, "@zenaton#");
        assert_eq!(c.max_depth, 128);
        assert_eq!(c.max_slots, 1 << 20);
        c.validate().unwrap();
    }

    #[test]
    fn rejects_ambiguous_prefixes() {
        assert!(Config::new().with_reference_prefix("").validate().is_err());
        assert!(Config::new().with_reference_prefix("ref7").validate().is_err());
        assert!(Config::new().with_reference_prefix("$ref:").validate().is_ok());
        assert!(Config::new().with_max_depth(0).validate().is_err());
    }

    #[test]
    fn partial_config_from_json() {
        let c: Config = serde_json::from_str(r#"{"max_depth": 16}"#).unwrap();
        assert_eq!(c.max_depth, 16);
        assert_eq!(c.reference_prefix, DEFAULT_REFERENCE_PREFIX);
    }
}
