use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Occurs when the input graph holds something with no textual form: an executable callable,
    /// a non-finite float, a string that would read back as a reference token, or nesting deeper
    /// than the configured limit. Encoding stops immediately and no text is produced.
    #[error("Cannot serialize value: {0}")]
    Serialization(String),
    /// Occurs when a type name cannot be resolved against the running registry.
    #[error("Unknown type name: {0}")]
    TypeResolution(String),
    /// Occurs when an envelope is structurally invalid: unparseable text, missing keys, a
    /// reference to a nonexistent slot, or a field set that doesn't fit its type.
    #[error("Malformed envelope: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn serialization<T: fmt::Display>(msg: T) -> Self {
        Error::Serialization(msg.to_string())
    }

    pub(crate) fn format<T: fmt::Display>(msg: T) -> Self {
        Error::Format(msg.to_string())
    }

    /// Returns true if this is an encode-side failure.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization(_))
    }

    pub fn is_type_resolution(&self) -> bool {
        matches!(self, Error::TypeResolution(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Format(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let err = Error::TypeResolution("Workflow".into());
        assert_eq!(err.to_string(), "Unknown type name: Workflow");
        let err = Error::format("dangling reference to slot 4");
        assert_eq!(
            err.to_string(),
            "Malformed envelope: dangling reference to slot 4"
        );
    }

    #[test]
    fn json_errors_are_format_errors() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{\"o\":")
            .unwrap_err()
            .into();
        assert!(err.is_format());
    }
}
