//! # Runtime Primitives
//!
//! Hardcoded constants for the Tether runtime.
//!
//! The namespace and role defaults can be overridden through
//! [`RuntimeConfig`](crate::config::RuntimeConfig); the value tags cannot,
//! because they define the on-disk format of the bookkeeping record.

/// Default prefix for runtime-internal labels and property keys.
pub const DEFAULT_NAMESPACE: &str = "_TETHER_";

/// Default role segment of a bookkeeping key: `<namespace><role>_<moduleId>`.
pub const DEFAULT_ROLE: &str = "RUNTIME";

/// Suffix appended to the namespace to form the root node label.
pub const ROOT_LABEL_SUFFIX: &str = "ROOT";

/// Tag that starts every serialized configuration fingerprint.
pub const CONFIG_TAG: &str = "CONFIG";

/// Tag that starts every force-reinitialization marker, followed by epoch millis.
pub const FORCE_INIT_TAG: &str = "FORCE_INIT";

/// Default capacity of the writer's task queue.
pub const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 10_000;

/// Default trailing window of the load monitor, in milliseconds.
pub const DEFAULT_LOAD_WINDOW_MS: u64 = 2_000;

/// Default maximum number of samples the load monitor retains.
pub const DEFAULT_LOAD_MAX_SAMPLES: usize = 200;

/// Id used in logs for writer tasks submitted without one.
pub const UNNAMED_TASK: &str = "UNKNOWN";

/// Current wall-clock time in epoch milliseconds.
///
/// A clock before the epoch reads as 0.
#[must_use]
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_do_not_prefix_each_other() {
        assert!(!CONFIG_TAG.starts_with(FORCE_INIT_TAG));
        assert!(!FORCE_INIT_TAG.starts_with(CONFIG_TAG));
    }

    #[test]
    fn clock_is_past_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
