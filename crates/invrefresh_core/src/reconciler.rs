//! Entry points of the reconciliation core.

use crate::config::ReconcileConfig;
use crate::descriptor::{Descriptor, Registry};
use crate::error::{CoreError, CoreResult};
use crate::index::{IdentityIndex, IndexBuild, IndexBuilder};
use crate::link::{LinkReport, Linker};
use crate::object::InventoryObject;
use crate::reconnect::ReconnectEngine;
use crate::result::ReconciliationResult;
use crate::scope::{KnownKeys, Scope, ScopeResolver};
use crate::types::PassId;
use invrefresh_storage::RecordStore;
use std::sync::Arc;

/// Reconciles fetched inventory against a record store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use invrefresh_core::{infra_registry, BuildContext, Reconciler};
/// use invrefresh_storage::{InMemoryStore, RecordId, RecordStore};
/// use invrefresh_value::{attributes, Value};
///
/// let store = Arc::new(InMemoryStore::new());
/// let orphan = store
///     .insert("vms", attributes([("ems_ref", Value::from("vm-1")), ("template", false.into())]))
///     .unwrap();
///
/// let reconciler = Reconciler::new(Arc::new(infra_registry().unwrap()), store.clone());
/// let vms = reconciler.descriptor("vms").unwrap();
/// let vm = vms
///     .build_object(&BuildContext::for_manager(RecordId::new(1)), [("ems_ref", "vm-1")])
///     .unwrap();
///
/// let mut index = reconciler.build_index("vms", [vm.clone()]).unwrap().index;
/// let result = reconciler.reconcile("vms", &mut index, None).unwrap();
///
/// assert!(result.updated.contains(&orphan));
/// assert_eq!(vm.resolved_id(), Some(orphan));
/// ```
pub struct Reconciler {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
    config: ReconcileConfig,
}

impl Reconciler {
    /// Creates a reconciler with default configuration.
    pub fn new(registry: Arc<Registry>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            store,
            config: ReconcileConfig::default(),
        }
    }

    /// Creates a reconciler with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the configuration is invalid.
    pub fn with_config(
        registry: Arc<Registry>,
        store: Arc<dyn RecordStore>,
        config: ReconcileConfig,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            store,
            config,
        })
    }

    /// The registry in use.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The configuration in use.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Looks up the descriptor of an entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] if none is registered.
    pub fn descriptor(&self, entity_type: &str) -> CoreResult<Arc<Descriptor>> {
        self.registry.lookup(entity_type)
    }

    /// Indexes fetched objects of an entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] if none is registered.
    pub fn build_index<I>(&self, entity_type: &str, objects: I) -> CoreResult<IndexBuild>
    where
        I: IntoIterator<Item = Arc<InventoryObject>>,
    {
        let descriptor = self.descriptor(entity_type)?;
        Ok(IndexBuilder::new(&descriptor).build(objects))
    }

    /// Reclaims orphaned rows of a registered entity type.
    ///
    /// See [`Reconciler::reconcile_with`].
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::reconcile_with`], plus unknown entity types.
    pub fn reconcile(
        &self,
        entity_type: &str,
        index: &mut IdentityIndex,
        known: Option<&[KnownKeys]>,
    ) -> CoreResult<ReconciliationResult> {
        let descriptor = self.descriptor(entity_type)?;
        self.reconcile_with(&descriptor, index, known)
    }

    /// Reclaims orphaned rows matching entries of `index`.
    ///
    /// With `known` set the pass is targeted: only rows reachable from the
    /// known parents are considered. Entity types that are not
    /// reconnect-eligible return an empty result with every entry
    /// unmatched. Matched entries leave the index; what remains is for the
    /// create path.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store fails at pass level, or
    /// [`CoreError::RowFailures`] in strict mode when rows failed.
    pub fn reconcile_with(
        &self,
        descriptor: &Descriptor,
        index: &mut IdentityIndex,
        known: Option<&[KnownKeys]>,
    ) -> CoreResult<ReconciliationResult> {
        let pass_id = PassId::new();
        let span = tracing::info_span!(
            "reconcile",
            pass_id = %pass_id,
            entity_type = %descriptor.entity_type,
            targeted = known.is_some()
        );
        let _enter = span.enter();

        if !descriptor.reconnect_eligible {
            tracing::debug!("entity type is not reconnect-eligible");
            let mut result = ReconciliationResult::new(&descriptor.entity_type);
            result.unmatched = index.len();
            return Ok(result);
        }

        let scope = match known {
            Some(known) => ScopeResolver::new().resolve(descriptor, known).scope,
            None => Scope::Unscoped,
        };
        let result = ReconnectEngine::new(self.store.as_ref(), &self.config).run(descriptor, index, &scope)?;

        if self.config.strict && result.has_failures() {
            return Err(CoreError::RowFailures {
                entity_type: descriptor.entity_type.clone(),
                result: Box::new(result),
            });
        }
        Ok(result)
    }

    /// Writes same-collection references of saved objects.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] if none is registered,
    /// [`CoreError::InvalidDescriptor`] if the collection has no self
    /// reference, or a storage error if the store fails at pass level.
    pub fn link_cross_references(
        &self,
        entity_type: &str,
        saved: &[Arc<InventoryObject>],
    ) -> CoreResult<LinkReport> {
        let descriptor = self.descriptor(entity_type)?;
        let pass_id = PassId::new();
        let span = tracing::info_span!("link", pass_id = %pass_id);
        let _enter = span.enter();
        Linker::new(self.store.as_ref()).link(&descriptor, saved)
    }
}
