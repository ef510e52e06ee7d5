//! # Load Monitoring
//!
//! Pull-based estimate of how busy the store is. Nothing runs in the
//! background: every query takes a sample of a monotonic counter and
//! returns the average rate over a trailing time window.

use crate::config::RuntimeConfig;
use crate::primitives::now_millis;
use crate::storage::GraphDatabase;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

// =============================================================================
// TIME SOURCE
// =============================================================================

/// Source of wall-clock time in epoch milliseconds.
pub trait TimeSource: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        now_millis()
    }
}

// =============================================================================
// RUNNING WINDOW AVERAGE
// =============================================================================

/// Average rate of change of a monotonic counter over a trailing window.
///
/// Samples older than the window (relative to the newest sample) are
/// evicted, and so are the oldest samples beyond `max_samples`.
#[derive(Debug, Clone)]
pub struct RunningWindowAverage {
    window_ms: u64,
    max_samples: usize,
    samples: VecDeque<(u64, u64)>,
}

impl RunningWindowAverage {
    /// Create an empty window. `max_samples` is raised to 2 if lower.
    #[must_use]
    pub fn new(window_ms: u64, max_samples: usize) -> Self {
        let max_samples = max_samples.max(2);
        Self {
            window_ms,
            max_samples,
            samples: VecDeque::with_capacity(max_samples),
        }
    }

    /// Window sized by the runtime configuration.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.load_window_ms, config.load_max_samples)
    }

    /// Record `value` observed at `time_ms`.
    pub fn sample(&mut self, time_ms: u64, value: u64) {
        self.samples.push_back((time_ms, value));
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        while let Some(&(oldest, _)) = self.samples.front() {
            if time_ms.saturating_sub(oldest) <= self.window_ms {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Events per second between the oldest and newest retained samples.
    ///
    /// 0 with fewer than two samples or when they share a timestamp.
    #[must_use]
    pub fn average(&self) -> u64 {
        let (Some(&(first_t, first_v)), Some(&(last_t, last_v))) =
            (self.samples.front(), self.samples.back())
        else {
            return 0;
        };
        let elapsed = last_t.saturating_sub(first_t);
        if self.samples.len() < 2 || elapsed == 0 {
            return 0;
        }
        let delta = u128::from(last_v.saturating_sub(first_v));
        u64::try_from(delta * 1000 / u128::from(elapsed)).unwrap_or(u64::MAX)
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// DATABASE LOAD MONITORS
// =============================================================================

/// Current load of a database.
pub trait DatabaseLoadMonitor: Send + Sync {
    /// Load in events per second. Sampling happens on each call.
    fn load(&self) -> u64;
}

/// Load measured as started write transactions per second.
pub struct StartedTxLoadMonitor<C: TimeSource = SystemTimeSource> {
    database: Arc<GraphDatabase>,
    clock: C,
    window: Mutex<RunningWindowAverage>,
}

impl<C: TimeSource> std::fmt::Debug for StartedTxLoadMonitor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartedTxLoadMonitor")
            .field("window", &*self.window.lock())
            .finish_non_exhaustive()
    }
}

impl StartedTxLoadMonitor<SystemTimeSource> {
    #[must_use]
    pub fn new(database: Arc<GraphDatabase>, window: RunningWindowAverage) -> Self {
        Self::with_clock(database, window, SystemTimeSource)
    }
}

impl<C: TimeSource> StartedTxLoadMonitor<C> {
    #[must_use]
    pub fn with_clock(database: Arc<GraphDatabase>, window: RunningWindowAverage, clock: C) -> Self {
        Self {
            database,
            clock,
            window: Mutex::new(window),
        }
    }
}

impl<C: TimeSource> DatabaseLoadMonitor for StartedTxLoadMonitor<C> {
    fn load(&self) -> u64 {
        let now = self.clock.now_millis();
        let started = self.database.started_transactions();
        let mut window = self.window.lock();
        window.sample(now, started);
        window.average()
    }
}

// =============================================================================
// TESTS
// =============================================================================
