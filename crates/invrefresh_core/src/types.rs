//! Small shared identifier types.

use std::fmt;
use uuid::Uuid;

/// Identifies one reconcile pass in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassId(Uuid);

impl PassId {
    /// Creates a fresh random pass id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PassId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass:{}", self.0)
    }
}
