//! Reconcile pass configuration.

use crate::error::{CoreError, CoreResult};

/// Configuration for reconcile passes.
///
/// Descriptor values apply unless overridden here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Overrides every descriptor's batch size when set.
    pub batch_size: Option<usize>,

    /// Whether a pass with row failures returns
    /// [`CoreError::RowFailures`] instead of a result.
    pub strict: bool,
}

impl ReconcileConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size override.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets strict mode.
    #[must_use]
    pub const fn strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero batch size.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_size == Some(0) {
            return Err(CoreError::invalid_config("batch size must be greater than zero"));
        }
        Ok(())
    }

    /// Batch size for a descriptor, honouring the override.
    #[must_use]
    pub fn effective_batch_size(&self, descriptor_batch_size: usize) -> usize {
        self.batch_size.unwrap_or(descriptor_batch_size).max(1)
    }
}
