//! graphpack turns in-memory value graphs into JSON text and back, keeping the graph's shape.
//!
//! Plain JSON can only describe trees. graphpack carries arbitrary graphs:
//!
//! - Shared references survive. Two fields pointing at the same sequence decode to two fields
//!   pointing at one sequence, not at two equal copies.
//! - Cycles survive, including an aggregate that contains itself.
//! - A fixed set of special kinds (timestamps, ratios, regex patterns, ranges, symbol tokens,
//!   records, and error values) travel with their own compact field sets.
//! - User types travel as named objects, rebuilt through a [`Registry`] of per-type
//!   [`TypeStrategy`] implementations. There is no reflection: a type name that isn't
//!   registered is an error on decode.
//!
//! Every aggregate in the graph is written once into an object store and referred to by slot
//! everywhere it appears:
//!
//! ```
//! use graphpack::{encode, decode, Value};
//!
//! let shared = Value::seq(vec![1, 2]);
//! let pair = Value::seq(vec![shared.clone(), shared]);
//! let text = encode(&pair).unwrap();
//! assert_eq!(
//!     text,
//!     r#"{"o":"@zenaton#0","s":[{"a":["@zenaton#1","@zenaton#1"]},{"a":[1,2]}]}"#
//! );
//!
//! let back = decode(&text).unwrap();
//! assert!(back.at(0).same(&back.at(1)));
//! ```
//!
//! Scalars never take a slot, so encoding one gives an empty store: `{"d":42,"s":[]}`.
//!
//! Executable values ([`Callable`]) can live in a graph but never serialize. Encoding one fails
//! with [`Error::Serialization`] and produces no output.

mod classify;
mod config;
mod decode;
mod depth_tracking;
mod encode;
mod error;
mod integer;
pub mod kinds;
mod registry;
mod serializer;
mod store;
mod value;

use std::sync::OnceLock;

pub use self::classify::{classify, Kind, SpecialTag};
pub use self::config::Config;
pub use self::decode::Decoder;
pub use self::encode::Encoder;
pub use self::error::{Error, Result};
pub use self::integer::Integer;
pub use self::kinds::{
    Civil, ErrorValue, Pattern, PatternOptions, RangeValue, Ratio, Record, Timestamp, Token,
};
pub use self::registry::{Registry, RegistryBuilder, TypeStrategy};
pub use self::serializer::Serializer;
pub use self::store::{EncodedValue, Envelope, ObjectRecord, ObjectStore, Payload, Scalar};
pub use self::value::{Body, Callable, Entries, Fields, Instance, Map, Object, Seq, Value};

/// Default marker for a reference token on the wire.
pub const DEFAULT_REFERENCE_PREFIX: &str = "@zenaton#";
/// Default limit on aggregate nesting.
pub const MAX_DEPTH: usize = 128;
/// Default limit on the object store, 1 Mi slots.
pub const MAX_SLOTS: usize = 1usize << 20;

fn default_serializer() -> &'static Serializer {
    static DEFAULT: OnceLock<Serializer> = OnceLock::new();
    DEFAULT.get_or_init(Serializer::default)
}

/// Encode with the special kinds registered and default config.
pub fn encode(value: &Value) -> Result<String> {
    default_serializer().encode(value)
}

/// Decode with the special kinds registered and default config. Generic objects need a
/// [`Serializer`] whose registry knows their type names.
pub fn decode(text: &str) -> Result<Value> {
    default_serializer().decode(text)
}
