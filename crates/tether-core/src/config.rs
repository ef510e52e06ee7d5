//! # Runtime Configuration
//!
//! A single immutable value threaded into every component that formats
//! bookkeeping keys or needs a runtime-wide setting.
//!
//! The struct deserializes with `#[serde(default)]`, so a configuration file
//! only needs the keys it wants to override:
//!
//! ```toml
//! namespace = "_APP_"
//! hook_failure_policy = "log"
//! ```

use crate::primitives::{
    DEFAULT_LOAD_MAX_SAMPLES, DEFAULT_LOAD_WINDOW_MS, DEFAULT_NAMESPACE, DEFAULT_ROLE,
    DEFAULT_WRITER_QUEUE_CAPACITY, ROOT_LABEL_SUFFIX,
};
use crate::TetherError;
use serde::{Deserialize, Serialize};

// =============================================================================
// HOOK FAILURE POLICY
// =============================================================================

/// What the dispatcher does when a commit hook fails with something other
/// than `NeedsInitialization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookFailurePolicy {
    /// Fail the enclosing commit with `TetherError::HookFailed`.
    #[default]
    Abort,
    /// Log a warning and let the commit proceed.
    Log,
    /// Let the commit proceed and mark the module for reinitialization.
    Defer,
}

// =============================================================================
// RUNTIME CONFIGURATION
// =============================================================================

/// Runtime-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Prefix of every runtime-internal label and property key.
    pub namespace: String,
    /// Role segment of bookkeeping keys.
    pub role: String,
    /// Handling of generic commit hook failures.
    pub hook_failure_policy: HookFailurePolicy,
    /// Bound of the deferred writer's queue.
    pub writer_queue_capacity: usize,
    /// Trailing window of the load monitor, in milliseconds.
    pub load_window_ms: u64,
    /// Maximum samples retained by the load monitor.
    pub load_max_samples: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            role: DEFAULT_ROLE.to_string(),
            hook_failure_policy: HookFailurePolicy::default(),
            writer_queue_capacity: DEFAULT_WRITER_QUEUE_CAPACITY,
            load_window_ms: DEFAULT_LOAD_WINDOW_MS,
            load_max_samples: DEFAULT_LOAD_MAX_SAMPLES,
        }
    }
}

impl RuntimeConfig {
    /// Label carried by the runtime root node.
    #[must_use]
    pub fn root_label(&self) -> String {
        format!("{}{}", self.namespace, ROOT_LABEL_SUFFIX)
    }

    /// Common prefix of every bookkeeping key.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("{}{}_", self.namespace, self.role)
    }

    /// Bookkeeping key of a module: `<namespace><role>_<moduleId>`.
    #[must_use]
    pub fn module_key(&self, module_id: &str) -> String {
        format!("{}{}", self.key_prefix(), module_id)
    }

    /// Module id encoded in a bookkeeping key, or `None` for foreign keys.
    #[must_use]
    pub fn module_id_of<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.key_prefix().as_str())
    }

    /// Check whether a label or relationship type belongs to the runtime.
    #[must_use]
    pub fn is_internal(&self, name: &str) -> bool {
        name.starts_with(self.namespace.as_str())
    }

    /// Reject configurations the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.namespace.is_empty() {
            return Err(TetherError::InvalidConfig("namespace must not be empty".into()));
        }
        if self.role.is_empty() {
            return Err(TetherError::InvalidConfig("role must not be empty".into()));
        }
        if self.writer_queue_capacity == 0 {
            return Err(TetherError::InvalidConfig(
                "writer_queue_capacity must be positive".into(),
            ));
        }
        if self.load_window_ms == 0 || self.load_max_samples < 2 {
            return Err(TetherError::InvalidConfig(
                "load monitor needs a positive window and at least 2 samples".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_layout() {
        let config = RuntimeConfig::default();
        assert_eq!(config.root_label(), "_TETHER_ROOT");
        assert_eq!(config.module_key("timetree"), "_TETHER_RUNTIME_timetree");
        assert_eq!(config.module_id_of("_TETHER_RUNTIME_timetree"), Some("timetree"));
        assert_eq!(config.module_id_of("name"), None);
    }

    #[test]
    fn module_ids_may_contain_underscores() {
        let config = RuntimeConfig::default();
        let key = config.module_key("uuid_v2");
        assert_eq!(config.module_id_of(&key), Some("uuid_v2"));
    }

    #[test]
    fn internal_names_share_namespace() {
        let config = RuntimeConfig::default();
        assert!(config.is_internal("_TETHER_ROOT"));
        assert!(!config.is_internal("Person"));
    }

    #[test]
    fn validate_rejects_empty_namespace() {
        let config = RuntimeConfig {
            namespace: String::new(),
            ..RuntimeConfig::default()
        };
        assert!(matches!(config.validate(), Err(TetherError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let config = RuntimeConfig {
            writer_queue_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"hook_failure_policy":"defer"}"#).expect("parse");
        assert_eq!(config.hook_failure_policy, HookFailurePolicy::Defer);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }
}
