use std::sync::Arc;

use crate::config::Config;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::Envelope;
use crate::value::Value;

/// Encodes value graphs to text and back, against one registry and one config.
///
/// Cheap to clone, and `Send + Sync`: the registry is shared and never changes after it's
/// built.
#[derive(Clone, Debug)]
pub struct Serializer {
    registry: Arc<Registry>,
    config: Config,
}

impl Serializer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            config: Config::default(),
        }
    }

    /// Fails if the config couldn't produce envelopes that read back.
    pub fn with_config(registry: Arc<Registry>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn encoder(&self) -> Encoder<'_> {
        Encoder::new(&self.registry, &self.config)
    }

    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.registry, &self.config)
    }

    /// Encode a value to JSON text.
    pub fn encode(&self, value: &Value) -> Result<String> {
        self.encode_envelope(value)?
            .to_text(&self.config.reference_prefix)
    }

    pub fn encode_envelope(&self, value: &Value) -> Result<Envelope> {
        self.encoder().encode(value)
    }

    /// Decode JSON text in either the envelope or the legacy form.
    pub fn decode(&self, text: &str) -> Result<Value> {
        self.decoder().decode_str(text)
    }

    pub fn decode_envelope(&self, envelope: &Envelope) -> Result<Value> {
        self.decoder().decode(envelope)
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(Arc::new(Registry::with_builtins()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn custom_prefix_round_trip() {
        let config = Config::new().with_reference_prefix("$ref:");
        let s = Serializer::with_config(Arc::new(Registry::with_builtins()), config).unwrap();
        let v = Value::seq(vec!["@zenaton#0"]);
        let text = s.encode(&v).unwrap();
        assert_eq!(text, r#"{"o":"$ref:0","s":[{"a":["@zenaton#0"]}]}"#);
        assert_eq!(s.decode(&text).unwrap(), v);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config::new().with_reference_prefix("");
        assert!(Serializer::with_config(Arc::new(Registry::default()), config).is_err());
    }

    #[test]
    fn shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Serializer>();
    }
}
