use crate::error::{Error, Result};

/// Counts aggregate nesting during a walk and fails once it passes the limit.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    depth: usize,
    max: usize,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new(max: usize) -> Self {
        Self { depth: 0, max }
    }

    /// Step into an aggregate. `fail` turns the limit message into the caller's error kind.
    pub fn enter<F: FnOnce(String) -> Error>(&mut self, fail: F) -> Result<()> {
        if self.depth >= self.max {
            return Err(fail(format!("Depth limit of {} exceeded", self.max)));
        }
        self.depth += 1;
        Ok(())
    }

    /// Step back out of an aggregate.
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
