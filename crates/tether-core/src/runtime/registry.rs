//! # Module Registry
//!
//! Ordered set of registered modules. Registration order is the processing
//! order of the startup pass and of commit dispatch.

use crate::config::RuntimeConfig;
use crate::runtime::Module;
use crate::TetherError;
use std::sync::Arc;

/// Registered modules, unique by instance and by id.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
    closed: bool,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.ids())
            .field("closed", &self.closed)
            .finish()
    }
}

impl ModuleRegistry {
    /// Create an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module.
    ///
    /// A duplicate fails with `DuplicateRegistration` even once the registry
    /// is closed.
    pub fn register(
        &mut self,
        module: Arc<dyn Module>,
        config: &RuntimeConfig,
    ) -> Result<(), TetherError> {
        let id = module.id().to_string();
        if self
            .modules
            .iter()
            .any(|m| Arc::ptr_eq(m, &module) || m.id() == id)
        {
            return Err(TetherError::DuplicateRegistration(id));
        }
        if self.closed {
            return Err(TetherError::ClosedRegistry(id));
        }

        if let Some(configured) = module.runtime_configured() {
            configured.configuration_changed(config);
        }
        tracing::debug!(module = %id, "module registered");
        self.modules.push(module);
        Ok(())
    }

    /// Refuse all further registrations.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Check whether registrations are refused.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check whether a module id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.modules.iter().any(|m| m.id() == id)
    }

    /// Registered modules in registration order.
    #[must_use]
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Registered ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.id().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
