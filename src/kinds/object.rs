use super::{body_mismatch, shell_mismatch};
use crate::error::Result;
use crate::registry::TypeStrategy;
use crate::value::{Fields, Instance};

/// Strategy for generic objects: the full set of named fields is copied out on encode and set
/// directly on a blank instance on decode, with no constructor involved.
pub struct ObjectStrategy {
    name: String,
    singleton: bool,
}

impl ObjectStrategy {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            singleton: false,
        }
    }

    /// A type with one shared instance. Allocating it always hands back that instance.
    pub fn singleton<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            singleton: true,
        }
    }
}

impl TypeStrategy for ObjectStrategy {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn is_singleton(&self) -> bool {
        self.singleton
    }

    fn allocate(&self) -> Result<Instance> {
        Ok(Instance::generic(self.name.as_str()))
    }

    fn extract(&self, instance: &Instance) -> Result<Fields> {
        instance
            .fields()
            .cloned()
            .ok_or_else(|| body_mismatch(&self.name, instance))
    }

    fn inject(&self, instance: &mut Instance, fields: Fields) -> Result<()> {
        let target = instance
            .fields_mut()
            .ok_or_else(|| shell_mismatch(&self.name))?;
        target.extend(fields);
        Ok(())
    }
}
