//! Type registry: maps a type name to the strategy that takes instances of that type apart and
//! puts them back together.
//!
//! A registry is built once through [`RegistryBuilder`] and is read-only afterwards, so one
//! `Arc<Registry>` can back serializers on any number of threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kinds::{self, ErrorStrategy, ObjectStrategy, RecordStrategy};
use crate::value::{Fields, Instance, Object};

/// Per-type capability to extract an instance's state as named fields, to allocate a blank
/// instance, and to inject fields into one.
///
/// `inject` runs while the decoder is still filling in the graph. Aggregates among the injected
/// fields may not have their contents yet, and the instance being injected into may be among
/// them, so an implementation must only store the handles it is given, never look inside them.
pub trait TypeStrategy: Send + Sync {
    /// The canonical type name this strategy is registered under.
    fn type_name(&self) -> &str;

    /// Singleton types have one shared instance; allocation returns it instead of a new one.
    fn is_singleton(&self) -> bool {
        false
    }

    /// Produce a blank instance without running any construction logic.
    fn allocate(&self) -> Result<Instance>;

    /// The minimal set of named fields needed to rebuild an equivalent instance.
    fn extract(&self, instance: &Instance) -> Result<Fields>;

    /// Fill a blank instance from its named fields.
    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()>;
}

thread_local! {
    // Graph handles are `Rc`, so each thread keeps its own singleton instances.
    static SINGLETONS: RefCell<HashMap<String, Object>> = RefCell::new(HashMap::new());
}

/// A read-only map from type name to [`TypeStrategy`].
#[derive(Clone)]
pub struct Registry {
    strategies: HashMap<String, Arc<dyn TypeStrategy>>,
}

impl Registry {
    /// Start an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry holding only the special kinds under their default names.
    pub fn with_builtins() -> Self {
        RegistryBuilder::with_builtins().build()
    }

    /// Look up the strategy for a type name.
    pub fn resolve(&self, type_name: &str) -> Result<&Arc<dyn TypeStrategy>> {
        self.strategies
            .get(type_name)
            .ok_or_else(|| Error::TypeResolution(type_name.to_owned()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.strategies.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Registered type names, in no particular order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Allocate a blank object of the named type. For a singleton type this is the shared
    /// instance.
    pub fn allocate(&self, type_name: &str) -> Result<Object> {
        let strategy = self.resolve(type_name)?;
        if strategy.is_singleton() {
            self.singleton(type_name)
        } else {
            Ok(Object::new(strategy.allocate()?))
        }
    }

    /// The shared instance of a singleton type, created on first use on this thread.
    pub fn singleton(&self, type_name: &str) -> Result<Object> {
        let strategy = self.resolve(type_name)?;
        if !strategy.is_singleton() {
            return Err(Error::TypeResolution(format!(
                "{} is not a singleton type",
                type_name
            )));
        }
        SINGLETONS.with(|cell| {
            let existing = cell.borrow().get(type_name).cloned();
            if let Some(obj) = existing {
                return Ok(obj);
            }
            let obj = Object::new(strategy.allocate()?);
            cell.borrow_mut().insert(type_name.to_owned(), obj.clone());
            Ok(obj)
        })
    }

    /// Extract an instance's fields. Instances whose type name isn't registered still encode,
    /// using the field set their body implies.
    pub fn extract(&self, instance: &Instance) -> Result<Fields> {
        match self.strategies.get(instance.type_name()) {
            Some(strategy) => strategy.extract(instance),
            None => Ok(kinds::extract_builtin(instance)),
        }
    }

    /// Inject fields into a blank instance, through the strategy for its type name.
    pub fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let strategy = self.resolve(instance.type_name())?;
        strategy.inject(instance, fields)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.type_names().collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("types", &names).finish()
    }
}

/// Builds a [`Registry`]. Registering a name twice replaces the earlier strategy.
#[derive(Default)]
pub struct RegistryBuilder {
    strategies: HashMap<String, Arc<dyn TypeStrategy>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the special kinds under their default names.
    pub fn with_builtins() -> Self {
        let mut builder = Self::new();
        for strategy in kinds::builtin_strategies() {
            builder = builder.register_arc(strategy);
        }
        builder
    }

    pub fn register<T: TypeStrategy + 'static>(self, strategy: T) -> Self {
        self.register_arc(Arc::new(strategy))
    }

    pub fn register_arc(mut self, strategy: Arc<dyn TypeStrategy>) -> Self {
        self.strategies
            .insert(strategy.type_name().to_owned(), strategy);
        self
    }

    /// Register a generic object type, whose state is its full set of named fields.
    pub fn register_object<S: Into<String>>(self, type_name: S) -> Self {
        self.register(ObjectStrategy::new(type_name))
    }

    /// Register a generic object type that has exactly one instance per thread.
    pub fn register_singleton<S: Into<String>>(self, type_name: S) -> Self {
        self.register(ObjectStrategy::singleton(type_name))
    }

    /// Register a fixed-field record type with the given member names.
    pub fn register_record<S, I, M>(self, type_name: S, members: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.register(RecordStrategy::with_members(type_name, members))
    }

    /// Register an additional error type carrying a message and trace.
    pub fn register_error<S: Into<String>>(self, type_name: S) -> Self {
        self.register(ErrorStrategy::named(type_name))
    }

    pub fn build(self) -> Registry {
        Registry {
            strategies: self.strategies,
        }
    }
}
