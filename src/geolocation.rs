//! Device position tracking for the alert client.
//!
//! A [`PositionSource`] delivers fixes as a stream. [`LocationTracker`] keeps
//! the latest fix and the most accurate one, and owns the platform watch: it
//! is cleared when the tracker is stopped or dropped, whichever comes first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5);
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of the 95% confidence circle, in meters.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl GeoFix {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or_default()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Geolocation is not supported on this device")]
    Unsupported,

    #[error("Unknown location error: {0}")]
    Unknown(String),
}

impl GeoError {
    /// What the user can do about it.
    pub fn guidance(&self) -> &'static str {
        match self {
            GeoError::PermissionDenied => {
                "Location access denied. Please enable location permissions for this site."
            }
            GeoError::PositionUnavailable => {
                "Location unavailable. Turn on GPS or move outdoors for a better signal."
            }
            GeoError::Timeout => "Location request timed out. Retrying, please keep GPS enabled.",
            GeoError::Unsupported => "Geolocation is not supported by your device.",
            GeoError::Unknown(_) => "Could not determine your location. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl PositionOptions {
    // Fresh high-accuracy readings only, never a cached fix
    pub fn high_accuracy(timeout: Duration) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchId(pub u64);

pub struct PositionWatch {
    pub id: WatchId,
    pub updates: mpsc::Receiver<Result<GeoFix, GeoError>>,
}

/// Platform geolocation, modeled after `watchPosition`/`getCurrentPosition`.
#[async_trait]
pub trait PositionSource: Send + Sync {
    fn watch_position(&self, options: PositionOptions) -> Result<PositionWatch, GeoError>;

    fn clear_watch(&self, id: WatchId);

    async fn current_position(&self, options: PositionOptions) -> Result<GeoFix, GeoError>;
}

#[derive(Debug, Default, Clone)]
pub struct TrackerState {
    pub current: Option<GeoFix>,
    pub best: Option<GeoFix>,
    pub tracking: bool,
    pub error: Option<GeoError>,
}

impl TrackerState {
    pub fn record_fix(&mut self, fix: GeoFix) {
        let better = self
            .best
            .as_ref()
            .is_none_or(|best| fix.accuracy < best.accuracy);
        if better {
            self.best = Some(fix.clone());
        }
        self.current = Some(fix);
        self.error = None;
    }

    pub fn apply(&mut self, update: Result<GeoFix, GeoError>) {
        match update {
            Ok(fix) => self.record_fix(fix),
            Err(e) => self.error = Some(e),
        }
    }
}

type SharedState = Arc<RwLock<TrackerState>>;

fn write(state: &SharedState, f: impl FnOnce(&mut TrackerState)) {
    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
}

fn read<T>(state: &SharedState, f: impl FnOnce(&TrackerState) -> T) -> T {
    let guard = state.read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
}

pub struct LocationTracker {
    source: Arc<dyn PositionSource>,
    state: SharedState,
    watch: Option<WatchId>,
    task: Option<JoinHandle<()>>,
    fix_timeout: Duration,
}

impl LocationTracker {
    /// Begins continuous observation. A source that refuses to watch leaves
    /// the tracker idle with its error recorded.
    pub fn start(source: Arc<dyn PositionSource>) -> Self {
        Self::start_with_timeout(source, DEFAULT_FIX_TIMEOUT)
    }

    pub fn start_with_timeout(source: Arc<dyn PositionSource>, fix_timeout: Duration) -> Self {
        let state: SharedState = Arc::default();
        let mut tracker = Self {
            source,
            state: state.clone(),
            watch: None,
            task: None,
            fix_timeout,
        };

        match tracker
            .source
            .watch_position(PositionOptions::high_accuracy(fix_timeout))
        {
            Ok(PositionWatch { id, mut updates }) => {
                write(&state, |s| s.tracking = true);
                tracker.watch = Some(id);
                tracker.task = Some(tokio::spawn(async move {
                    while let Some(update) = updates.recv().await {
                        if let Err(e) = &update {
                            warn!(error = %e, "position update failed");
                        }
                        write(&state, |s| s.apply(update));
                    }
                    debug!("position stream ended");
                    write(&state, |s| s.tracking = false);
                }));
            }
            Err(e) => {
                warn!(error = %e, "could not start position watch");
                write(&state, |s| s.error = Some(e));
            }
        }
        tracker
    }

    pub fn current(&self) -> Option<GeoFix> {
        read(&self.state, |s| s.current.clone())
    }

    pub fn best(&self) -> Option<GeoFix> {
        read(&self.state, |s| s.best.clone())
    }

    pub fn is_tracking(&self) -> bool {
        read(&self.state, |s| s.tracking)
    }

    pub fn error(&self) -> Option<GeoError> {
        read(&self.state, |s| s.error.clone())
    }

    pub fn error_message(&self) -> Option<&'static str> {
        self.error().map(|e| e.guidance())
    }

    pub fn best_age(&self) -> Option<Duration> {
        self.best().map(|fix| fix.age(Utc::now()))
    }

    /// The fix to send with an alert.
    ///
    /// A best fix younger than `freshness` is used as is. Otherwise one fresh
    /// reading is attempted, bounded by the tracker's timeout, before falling
    /// back to the stale best fix.
    pub async fn fix_for_dispatch(&self, freshness: Duration) -> Result<GeoFix, GeoError> {
        let best = self.best();
        if let Some(fix) = &best {
            if fix.age(Utc::now()) <= freshness {
                return Ok(fix.clone());
            }
        }

        let options = PositionOptions::high_accuracy(self.fix_timeout);
        let fresh = tokio::time::timeout(self.fix_timeout, self.source.current_position(options))
            .await
            .unwrap_or(Err(GeoError::Timeout));

        match fresh {
            Ok(fix) => {
                write(&self.state, |s| s.record_fix(fix.clone()));
                Ok(fix)
            }
            Err(e) => {
                warn!(error = %e, has_fallback = best.is_some(), "fresh fix failed");
                match best {
                    Some(fix) => Ok(fix),
                    None => {
                        write(&self.state, |s| s.error = Some(e.clone()));
                        Err(e)
                    }
                }
            }
        }
    }

    /// Stops observation and releases the platform watch. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(id) = self.watch.take() {
            self.source.clear_watch(id);
        }
        write(&self.state, |s| s.tracking = false);
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
