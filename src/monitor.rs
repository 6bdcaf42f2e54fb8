//! # Monitoring Module
//!
//! Live preview without recording: a refresh clock that publishes the latest
//! sensor snapshot at a UI rate and stops itself after a configured window.
//! Runs independently of the recorder and may overlap with a recording.

use crate::clock::{SampleClock, TickFlow};
use crate::error::RecorderError;
use crate::events::{emit, SessionEvent};
use crate::recorder::StartOutcome;
use crate::sensor::{FeedLease, SensorFeed};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct MonitorState {
    active: bool,
    duration: Duration,
    started: Option<Instant>,
    elapsed: Duration,
    lease: Option<FeedLease>,
}

struct MonitorShared {
    feed: Arc<SensorFeed>,
    events: Sender<SessionEvent>,
    state: Mutex<MonitorState>,
}

impl MonitorShared {
    fn on_tick(&self) -> TickFlow {
        let mut state = self.state.lock();
        if !state.active {
            return TickFlow::Stop;
        }

        let elapsed = state.started.map_or(Duration::ZERO, |t| t.elapsed());
        state.elapsed = elapsed;
        let done = elapsed >= state.duration;
        drop(state);

        emit(
            &self.events,
            SessionEvent::MonitorRefresh {
                elapsed,
                latest: self.feed.snapshot(),
            },
        );

        if done {
            self.finish();
            TickFlow::Stop
        } else {
            TickFlow::Continue
        }
    }

    fn finish(&self) {
        let (elapsed, lease) = {
            let mut state = self.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            if let Some(started) = state.started.take() {
                state.elapsed = started.elapsed();
            }
            (state.elapsed, state.lease.take())
        };
        drop(lease);

        log::info!("Monitoring stopped after {:?}", elapsed);
        emit(&self.events, SessionEvent::MonitorStopped { elapsed });
    }
}

/// Periodic live preview of the sensor feed
pub struct Monitor {
    refresh_period: Duration,
    shared: Arc<MonitorShared>,
    clock: Mutex<Option<SampleClock>>,
}

impl Monitor {
    pub fn new(feed: Arc<SensorFeed>, refresh_hz: u32, events: Sender<SessionEvent>) -> Self {
        Self {
            refresh_period: SampleClock::period_for_rate(refresh_hz),
            shared: Arc::new(MonitorShared {
                feed,
                events,
                state: Mutex::new(MonitorState {
                    active: false,
                    duration: Duration::ZERO,
                    started: None,
                    elapsed: Duration::ZERO,
                    lease: None,
                }),
            }),
            clock: Mutex::new(None),
        }
    }

    /// Start previewing for `duration`. Ignored while already active.
    pub fn start(&self, duration: Duration) -> Result<StartOutcome, RecorderError> {
        let mut clock_slot = self.clock.lock();

        {
            let mut state = self.shared.state.lock();
            if state.active {
                return Ok(StartOutcome::AlreadyActive);
            }
            state.active = true;
            state.duration = duration;
            state.elapsed = Duration::ZERO;
            state.lease = Some(self.shared.feed.lease());
            state.started = Some(Instant::now());
        }

        if let Some(mut previous) = clock_slot.take() {
            previous.stop();
        }

        log::info!("Monitoring started for {:?}", duration);
        emit(&self.shared.events, SessionEvent::MonitorStarted { duration });

        let shared = Arc::clone(&self.shared);
        match SampleClock::start("monitor", self.refresh_period, move |_| shared.on_tick()) {
            Ok(clock) => {
                *clock_slot = Some(clock);
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                log::error!("Could not start monitor clock: {}", e);
                self.shared.finish();
                Err(e.into())
            }
        }
    }

    /// Stop the preview before its window ends
    pub fn stop(&self) {
        let clock = self.clock.lock().take();
        if let Some(mut clock) = clock {
            clock.stop();
        }
        self.shared.finish();
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    pub fn elapsed(&self) -> Duration {
        self.shared.state.lock().elapsed
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordingConfig;
    use crate::recorder::Recorder;
    use crate::sensor::{silent_sources, simulated_sources, SensorKind, SensorSample};
    use crate::storage::FixedDir;
    use crossbeam_channel::{unbounded, Receiver};
    use tempfile::tempdir;

    fn wait_stopped(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("monitor did not stop");
            let stopped = matches!(event, SessionEvent::MonitorStopped { .. });
            events.push(event);
            if stopped {
                return events;
            }
        }
    }

    #[test]
    fn test_monitor_self_stops() {
        let feed = Arc::new(SensorFeed::new(silent_sources()));
        let (tx, rx) = unbounded();
        let monitor = Monitor::new(feed.clone(), 20, tx);

        assert_eq!(monitor.start(Duration::from_millis(200)).unwrap(), StartOutcome::Started);
        assert!(monitor.is_active());
        assert!(feed.is_subscribed());

        let events = wait_stopped(&rx);
        let refreshes = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::MonitorRefresh { .. }))
            .count();
        // 4 expected at 20 Hz over 200 ms
        assert!((3..=5).contains(&refreshes), "got {} refreshes", refreshes);

        assert!(!monitor.is_active());
        assert!(monitor.elapsed() >= Duration::from_millis(200));
        assert!(!feed.is_subscribed());
    }

    #[test]
    fn test_monitor_publishes_latest_values() {
        let feed = Arc::new(SensorFeed::new(silent_sources()));
        let (tx, rx) = unbounded();
        let monitor = Monitor::new(feed.clone(), 50, tx);
        monitor.start(Duration::from_millis(100)).unwrap();
        feed.ingest(SensorSample::new(SensorKind::Acceleration, 1.0, 2.0, 3.0));

        let events = wait_stopped(&rx);
        let last_refresh = events
            .iter()
            .rev()
            .find_map(|e| match e {
                SessionEvent::MonitorRefresh { latest, .. } => Some(*latest),
                _ => None,
            })
            .expect("no refresh events");
        let acc = last_refresh.get(SensorKind::Acceleration).unwrap();
        assert_eq!(acc.axes(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_double_start_and_early_stop() {
        let feed = Arc::new(SensorFeed::new(silent_sources()));
        let (tx, rx) = unbounded();
        let monitor = Monitor::new(feed, 20, tx);

        monitor.start(Duration::from_secs(30)).unwrap();
        assert_eq!(
            monitor.start(Duration::from_secs(1)).unwrap(),
            StartOutcome::AlreadyActive
        );

        monitor.stop();
        wait_stopped(&rx);
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_monitor_alongside_recording() {
        let feed = Arc::new(SensorFeed::new(simulated_sources(Duration::from_millis(5))));
        let (tx, rx) = unbounded();
        let temp_dir = tempdir().unwrap();
        let monitor = Monitor::new(feed.clone(), 20, tx.clone());
        let recorder = Recorder::new(
            feed.clone(),
            Arc::new(FixedDir(temp_dir.path().to_path_buf())),
            RecordingConfig::new(50, 0.2).unwrap(),
            tx,
        );

        monitor.start(Duration::from_secs(30)).unwrap();
        recorder.start().unwrap();

        // Wait for the recording to finish on its own
        loop {
            match rx.recv_timeout(Duration::from_secs(10)).expect("recording did not finish") {
                SessionEvent::RecordingFinished { .. } => break,
                _ => continue,
            }
        }

        // The recording released its lease; the monitor still holds one
        assert!(feed.is_subscribed());
        assert!(monitor.is_active());
        assert!(recorder.last_saved_path().is_some());

        monitor.stop();
        assert!(!feed.is_subscribed());
    }
}
