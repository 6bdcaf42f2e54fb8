//! # Recording Session Module
//!
//! Fixed-rate recording of the three motion sensors into an in-memory
//! buffer that is written out as CSV once the configured window has elapsed.
//!
//! ## Lifecycle
//! ```text
//!          start()                 elapsed >= duration (on tick)
//!   Idle ─────────▶ Recording ─────────────────────────▶ Finalizing ──▶ Idle
//!                    │  ▲   tick: assemble row, append      │
//!                    └──┘                                   └─ encode, write, expose path
//! ```
//! - A start request outside Idle is ignored.
//! - The tick that crosses the duration records its own row, then finalizes.
//! - Finalization runs exactly once per session and always ends in Idle,
//!   whether or not the file could be written.
//! - Configuration is frozen outside Idle.
//!
//! ## Threading
//! Rows are assembled on the recording clock's thread only, so they are
//! strictly sequential. Session state is shared with the controlling thread
//! behind one mutex; the Recording → Finalizing transition is made under it.
//! File I/O happens with the lock released.

use crate::clock::{SampleClock, Tick, TickFlow};
use crate::config::RecordingConfig;
use crate::encoder;
use crate::error::{ConfigError, RecorderError};
use crate::events::{emit, SessionEvent};
use crate::row::{self, Row};
use crate::sensor::{FeedLease, SensorFeed};
use crate::storage::{self, StorageLocation};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Recording session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Recording,
    Finalizing,
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running and is left untouched
    AlreadyActive,
}

struct SessionState {
    status: SessionStatus,
    config: RecordingConfig,
    /// Header first, then one row per tick
    buffer: Vec<Row>,
    sample_count: u64,
    stopwatch: Option<Instant>,
    last_stamp: Option<DateTime<Utc>>,
    lease: Option<FeedLease>,
    last_saved_path: Option<PathBuf>,
}

/// State reachable from the clock thread
struct SessionShared {
    feed: Arc<SensorFeed>,
    storage: Arc<dyn StorageLocation>,
    events: Sender<SessionEvent>,
    state: Mutex<SessionState>,
}

impl SessionShared {
    fn on_tick(&self, tick: Tick) -> TickFlow {
        let mut state = self.state.lock();
        if state.status != SessionStatus::Recording {
            return TickFlow::Stop;
        }

        // Wall clock may step backwards; rows keep non-decreasing stamps
        let now = match state.last_stamp {
            Some(last) => Utc::now().max(last),
            None => Utc::now(),
        };
        state.buffer.push(row::assemble_at(now, &self.feed.snapshot()));
        state.last_stamp = Some(now);
        state.sample_count += 1;

        let samples = state.sample_count;
        let fraction = progress_fraction(samples, &state.config);
        let done = state
            .stopwatch
            .map_or(true, |started| started.elapsed() >= state.config.duration());
        drop(state);

        log::trace!("Row {} recorded, tick {:?} late", samples, tick.lateness());
        emit(&self.events, SessionEvent::Progress { samples, fraction });

        if done {
            self.finalize();
            TickFlow::Stop
        } else {
            TickFlow::Continue
        }
    }

    /// Recording → Finalizing → Idle. No-op in any other state.
    fn finalize(&self) {
        let (bytes, samples, lease) = {
            let mut state = self.state.lock();
            if state.status != SessionStatus::Recording {
                return;
            }
            state.status = SessionStatus::Finalizing;
            state.stopwatch = None;
            (
                encoder::encode(&state.buffer),
                state.sample_count,
                state.lease.take(),
            )
        };

        // Releases this session's sensor subscriptions
        drop(lease);

        log::info!("Finalizing recording with {} samples", samples);

        let saved = storage::write_recording(self.storage.as_ref(), Utc::now(), &bytes);

        {
            let mut state = self.state.lock();
            if let Ok(path) = &saved {
                state.last_saved_path = Some(path.clone());
            }
            state.status = SessionStatus::Idle;
        }

        match saved {
            Ok(path) => emit(&self.events, SessionEvent::Saved { path, samples }),
            Err(e) => {
                log::error!("Failed to save recording: {}", e);
                emit(
                    &self.events,
                    SessionEvent::SaveFailed {
                        reason: e.to_string(),
                    },
                );
            }
        }
        emit(&self.events, SessionEvent::RecordingFinished { samples });
    }
}

/// Fraction of the expected rows recorded so far, clamped to 1.0
pub fn progress_fraction(samples: u64, config: &RecordingConfig) -> f64 {
    (samples as f64 / config.expected_samples()).min(1.0)
}

/// Owns one recording session at a time
///
/// The recorder holds the session buffer, the recording clock and, while
/// recording, a lease on the sensor feed.
pub struct Recorder {
    shared: Arc<SessionShared>,
    clock: Mutex<Option<SampleClock>>,
}

impl Recorder {
    pub fn new(
        feed: Arc<SensorFeed>,
        storage: Arc<dyn StorageLocation>,
        config: RecordingConfig,
        events: Sender<SessionEvent>,
    ) -> Self {
        let state = SessionState {
            status: SessionStatus::Idle,
            config,
            buffer: Vec::new(),
            sample_count: 0,
            stopwatch: None,
            last_stamp: None,
            lease: None,
            last_saved_path: None,
        };

        Self {
            shared: Arc::new(SessionShared {
                feed,
                storage,
                events,
                state: Mutex::new(state),
            }),
            clock: Mutex::new(None),
        }
    }

    /// Replace the recording configuration
    ///
    /// Rejected when out of range or while a session is active; the previous
    /// configuration is kept in both cases.
    pub fn configure(&self, rate_hz: u32, duration_secs: f64) -> Result<(), ConfigError> {
        let config = RecordingConfig::new(rate_hz, duration_secs)?;

        let mut state = self.shared.state.lock();
        if state.status != SessionStatus::Idle {
            return Err(ConfigError::SessionActive);
        }
        state.config = config;
        log::info!("Recording configured: {} Hz for {:?}", rate_hz, config.duration());
        Ok(())
    }

    /// Begin a new recording session
    ///
    /// Clears the previous buffer and saved path. Ignored if a session is
    /// already recording or finalizing.
    pub fn start(&self) -> Result<StartOutcome, RecorderError> {
        let mut clock_slot = self.clock.lock();

        let config = {
            let mut state = self.shared.state.lock();
            if state.status != SessionStatus::Idle {
                log::info!("Start ignored, recording already {:?}", state.status);
                return Ok(StartOutcome::AlreadyActive);
            }

            state.buffer.clear();
            state.buffer.push(Row::header());
            state.sample_count = 0;
            state.last_stamp = None;
            state.last_saved_path = None;
            state.lease = Some(self.shared.feed.lease());
            state.stopwatch = Some(Instant::now());
            state.status = SessionStatus::Recording;
            state.config
        };

        // The previous session's clock stopped itself when it finalized
        if let Some(mut previous) = clock_slot.take() {
            previous.stop();
        }

        log::info!(
            "Recording started: {} Hz for {:?}",
            config.rate_hz(),
            config.duration()
        );
        emit(
            &self.shared.events,
            SessionEvent::RecordingStarted {
                rate_hz: config.rate_hz(),
                duration: config.duration(),
            },
        );

        let shared = Arc::clone(&self.shared);
        let period = SampleClock::period_for_rate(config.rate_hz());
        match SampleClock::start("recording", period, move |tick| shared.on_tick(tick)) {
            Ok(clock) => {
                *clock_slot = Some(clock);
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                log::error!("Could not start recording clock: {}", e);
                let lease = {
                    let mut state = self.shared.state.lock();
                    state.status = SessionStatus::Idle;
                    state.stopwatch = None;
                    state.lease.take()
                };
                drop(lease);
                emit(
                    &self.shared.events,
                    SessionEvent::RecordingFinished { samples: 0 },
                );
                Err(e.into())
            }
        }
    }

    /// Stop early, saving whatever has been recorded so far
    pub fn stop(&self) {
        let clock = self.clock.lock().take();
        if let Some(mut clock) = clock {
            clock.stop();
        }
        self.shared.finalize();
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.state.lock().status
    }

    pub fn config(&self) -> RecordingConfig {
        self.shared.state.lock().config
    }

    /// Data rows recorded in the current or last session
    pub fn sample_count(&self) -> u64 {
        self.shared.state.lock().sample_count
    }

    /// Copy of the buffer, header first
    pub fn rows(&self) -> Vec<Row> {
        self.shared.state.lock().buffer.clone()
    }

    /// Path of the last successfully written recording, for sharing
    pub fn last_saved_path(&self) -> Option<PathBuf> {
        self.shared.state.lock().last_saved_path.clone()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Ensure a running session is saved
        self.stop();
    }
}
