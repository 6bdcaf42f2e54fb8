//! # Sensor Feed Module
//!
//! Bridges push-based sensor sources into a "latest known value" view that
//! the sample clock can read at any moment.
//!
//! ## Key Types
//! - `SensorSource`: Platform seam, one implementation per sensor binding
//! - `SensorFeed`: Owns the three sources and the `LatestSensorState`
//! - `FeedLease`: Keeps the feed subscribed while a session is alive
//! - `SimulatedSource` / `SilentSource`: Built-in sources for the CLI and tests
//!
//! ## Threading
//! Sources deliver on their own threads at cadences we do not control.
//! Every delivery and every snapshot goes through one mutex, so a reader
//! never sees half of a three-axis update.

use crate::error::SensorError;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// The three motion sensors sampled by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Acceleration,
    AngularRate,
    MagneticField,
}

impl SensorKind {
    /// All kinds in column order
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Acceleration,
        SensorKind::AngularRate,
        SensorKind::MagneticField,
    ];

    /// Prefix used for this kind's CSV columns
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SensorKind::Acceleration => "acc",
            SensorKind::AngularRate => "gyro",
            SensorKind::MagneticField => "mag",
        }
    }

    fn slot(&self) -> usize {
        match self {
            SensorKind::Acceleration => 0,
            SensorKind::AngularRate => 1,
            SensorKind::MagneticField => 2,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Acceleration => "acceleration",
            SensorKind::AngularRate => "angular rate",
            SensorKind::MagneticField => "magnetic field",
        };
        f.write_str(name)
    }
}

/// One reading delivered by a sensor source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub arrived_at: Instant,
}

impl SensorSample {
    /// Create a sample stamped with the current instant
    pub fn new(kind: SensorKind, x: f64, y: f64, z: f64) -> Self {
        Self {
            kind,
            x,
            y,
            z,
            arrived_at: Instant::now(),
        }
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Latest sample per kind, last-write-wins
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatestSensorState {
    slots: [Option<SensorSample>; 3],
}

impl LatestSensorState {
    pub fn get(&self, kind: SensorKind) -> Option<SensorSample> {
        self.slots[kind.slot()]
    }

    pub fn update(&mut self, sample: SensorSample) {
        self.slots[sample.kind.slot()] = Some(sample);
    }

    pub fn clear(&mut self) {
        self.slots = [None; 3];
    }

    /// Number of kinds that have reported at least once
    pub fn reported(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Callback handed to a source; invoked once per delivered sample
pub type SampleCallback = Arc<dyn Fn(SensorSample) + Send + Sync>;

/// A push-based sensor binding
///
/// Implementations deliver samples of a single kind, at whatever cadence the
/// hardware or OS provides. A source may never deliver anything.
pub trait SensorSource: Send {
    fn kind(&self) -> SensorKind;

    /// Begin delivering samples to `on_sample` until `unsubscribe`
    fn subscribe(&mut self, on_sample: SampleCallback) -> Result<(), SensorError>;

    /// Stop delivery. Must be safe to call when not subscribed.
    fn unsubscribe(&mut self);
}

struct FeedInner {
    sources: Vec<Box<dyn SensorSource>>,
    subscribed: bool,
    leases: usize,
}

/// Sensor feed adapter
///
/// Wraps the live sources and answers "what is the latest value of kind K"
/// without blocking and without consuming anything.
pub struct SensorFeed {
    latest: Arc<Mutex<LatestSensorState>>,
    inner: Mutex<FeedInner>,
}

impl SensorFeed {
    pub fn new(sources: Vec<Box<dyn SensorSource>>) -> Self {
        Self {
            latest: Arc::new(Mutex::new(LatestSensorState::default())),
            inner: Mutex::new(FeedInner {
                sources,
                subscribed: false,
                leases: 0,
            }),
        }
    }

    /// Subscribe all sources. No-op if already subscribed.
    ///
    /// Subscribing from the unsubscribed state clears previously seen values.
    pub fn subscribe(&self) {
        let mut inner = self.inner.lock();
        self.subscribe_locked(&mut inner);
    }

    /// Tear down all subscriptions, keeping the last-seen values readable
    pub fn unsubscribe(&self) {
        let mut inner = self.inner.lock();
        Self::unsubscribe_locked(&mut inner);
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().subscribed
    }

    /// Record a delivered sample, replacing the previous one of its kind
    pub fn ingest(&self, sample: SensorSample) {
        Self::store(&self.latest, sample);
    }

    /// The one place deliveries land, from `ingest` and source callbacks alike
    fn store(latest: &Mutex<LatestSensorState>, sample: SensorSample) {
        latest.lock().update(sample);
    }

    /// Latest sample of `kind`, or `None` if it has not reported yet
    pub fn latest(&self, kind: SensorKind) -> Option<SensorSample> {
        self.latest.lock().get(kind)
    }

    /// Consistent copy of all three slots
    pub fn snapshot(&self) -> LatestSensorState {
        *self.latest.lock()
    }

    /// Keep the feed subscribed for as long as the returned guard lives
    ///
    /// The first outstanding lease subscribes, releasing the last one
    /// unsubscribes.
    pub fn lease(self: &Arc<Self>) -> FeedLease {
        let mut inner = self.inner.lock();
        inner.leases += 1;
        if inner.leases == 1 {
            self.subscribe_locked(&mut inner);
        }
        FeedLease {
            feed: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.leases = inner.leases.saturating_sub(1);
        if inner.leases == 0 {
            Self::unsubscribe_locked(&mut inner);
        }
    }

    fn subscribe_locked(&self, inner: &mut FeedInner) {
        if inner.subscribed {
            return;
        }

        self.latest.lock().clear();

        for source in inner.sources.iter_mut() {
            let latest = Arc::clone(&self.latest);
            let callback: SampleCallback =
                Arc::new(move |sample: SensorSample| Self::store(&latest, sample));
            let kind = source.kind();
            match source.subscribe(callback) {
                Ok(()) => log::debug!("Subscribed to {} sensor", kind),
                // The kind stays empty and is recorded as NaN
                Err(e) => log::warn!("Could not subscribe to {} sensor: {}", kind, e),
            }
        }

        inner.subscribed = true;
        log::info!("Sensor feed subscribed ({} sources)", inner.sources.len());
    }

    fn unsubscribe_locked(inner: &mut FeedInner) {
        if !inner.subscribed {
            return;
        }

        for source in inner.sources.iter_mut() {
            source.unsubscribe();
        }

        inner.subscribed = false;
        log::info!("Sensor feed unsubscribed");
    }
}

impl Drop for SensorFeed {
    fn drop(&mut self) {
        Self::unsubscribe_locked(self.inner.get_mut());
    }
}

/// Guard returned by [`SensorFeed::lease`]
pub struct FeedLease {
    feed: Arc<SensorFeed>,
}

impl Drop for FeedLease {
    fn drop(&mut self) {
        self.feed.release();
    }
}

/// Source that emits a synthetic signal from a background thread
///
/// Stands in for platform bindings when running on a host without motion
/// sensors. Values are smooth sinusoids around plausible resting readings.
pub struct SimulatedSource {
    kind: SensorKind,
    interval: Duration,
    worker: Option<(Sender<()>, thread::JoinHandle<()>)>,
}

impl SimulatedSource {
    pub fn new(kind: SensorKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            worker: None,
        }
    }

    /// Synthetic reading for `kind` at `t` seconds after subscription
    fn signal(kind: SensorKind, t: f64) -> (f64, f64, f64) {
        match kind {
            // m/s^2, device lying flat with a gentle sway
            SensorKind::Acceleration => (
                0.15 * (TAU * 0.5 * t).sin(),
                0.10 * (TAU * 0.3 * t).cos(),
                9.81 + 0.05 * (TAU * 1.1 * t).sin(),
            ),
            // rad/s
            SensorKind::AngularRate => (
                0.02 * (TAU * 0.7 * t).sin(),
                -0.01 * (TAU * 0.4 * t).sin(),
                0.005 * (TAU * 0.2 * t).cos(),
            ),
            // µT
            SensorKind::MagneticField => (
                22.0 + 0.5 * (TAU * 0.1 * t).sin(),
                -5.0 + 0.3 * (TAU * 0.15 * t).cos(),
                -42.0,
            ),
        }
    }
}

impl SensorSource for SimulatedSource {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn subscribe(&mut self, on_sample: SampleCallback) -> Result<(), SensorError> {
        self.unsubscribe();

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let kind = self.kind;
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name(format!("sim-{}", kind.column_prefix()))
            .spawn(move || {
                let origin = Instant::now();
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let (x, y, z) = Self::signal(kind, origin.elapsed().as_secs_f64());
                            on_sample(SensorSample::new(kind, x, y, z));
                        }
                        // Stop requested or sender dropped
                        _ => break,
                    }
                }
            })
            .map_err(|source| SensorError::Spawn { kind, source })?;

        self.worker = Some((stop_tx, handle));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            drop(stop_tx);
            if handle.join().is_err() {
                log::error!("Simulated {} source thread panicked", self.kind);
            }
        }
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Source for a sensor that never reports
pub struct SilentSource {
    kind: SensorKind,
}

impl SilentSource {
    pub fn new(kind: SensorKind) -> Self {
        Self { kind }
    }
}

impl SensorSource for SilentSource {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn subscribe(&mut self, _on_sample: SampleCallback) -> Result<(), SensorError> {
        Ok(())
    }

    fn unsubscribe(&mut self) {}
}

/// One silent source per kind
pub fn silent_sources() -> Vec<Box<dyn SensorSource>> {
    SensorKind::ALL
        .iter()
        .map(|&kind| Box::new(SilentSource::new(kind)) as Box<dyn SensorSource>)
        .collect()
}

/// One simulated source per kind, all delivering every `interval`
pub fn simulated_sources(interval: Duration) -> Vec<Box<dyn SensorSource>> {
    SensorKind::ALL
        .iter()
        .map(|&kind| Box::new(SimulatedSource::new(kind, interval)) as Box<dyn SensorSource>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts subscribe/unsubscribe calls
    struct CountingSource {
        kind: SensorKind,
        subscribes: Arc<AtomicUsize>,
        unsubscribes: Arc<AtomicUsize>,
    }

    impl SensorSource for CountingSource {
        fn kind(&self) -> SensorKind {
            self.kind
        }

        fn subscribe(&mut self, _on_sample: SampleCallback) -> Result<(), SensorError> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unsubscribe(&mut self) {
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MissingSource(SensorKind);

    impl SensorSource for MissingSource {
        fn kind(&self) -> SensorKind {
            self.0
        }

        fn subscribe(&mut self, _on_sample: SampleCallback) -> Result<(), SensorError> {
            Err(SensorError::Unavailable(self.0))
        }

        fn unsubscribe(&mut self) {}
    }

    /// Hands its callback to the test so deliveries can be driven by hand
    struct ManualSource {
        kind: SensorKind,
        callback: Arc<Mutex<Option<SampleCallback>>>,
    }

    impl SensorSource for ManualSource {
        fn kind(&self) -> SensorKind {
            self.kind
        }

        fn subscribe(&mut self, on_sample: SampleCallback) -> Result<(), SensorError> {
            *self.callback.lock() = Some(on_sample);
            Ok(())
        }

        fn unsubscribe(&mut self) {
            *self.callback.lock() = None;
        }
    }

    fn counting_feed() -> (Arc<SensorFeed>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let subscribes = Arc::new(AtomicUsize::new(0));
        let unsubscribes = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            kind: SensorKind::Acceleration,
            subscribes: subscribes.clone(),
            unsubscribes: unsubscribes.clone(),
        };
        let feed = Arc::new(SensorFeed::new(vec![Box::new(source)]));
        (feed, subscribes, unsubscribes)
    }

    #[test]
    fn test_latest_empty_until_ingest() {
        let feed = SensorFeed::new(silent_sources());
        for kind in SensorKind::ALL {
            assert!(feed.latest(kind).is_none());
        }
    }

    #[test]
    fn test_ingest_is_last_write_wins() {
        let feed = SensorFeed::new(silent_sources());
        feed.ingest(SensorSample::new(SensorKind::AngularRate, 1.0, 2.0, 3.0));
        feed.ingest(SensorSample::new(SensorKind::AngularRate, 4.0, 5.0, 6.0));

        let latest = feed.latest(SensorKind::AngularRate).unwrap();
        assert_eq!(latest.axes(), [4.0, 5.0, 6.0]);
        assert!(feed.latest(SensorKind::Acceleration).is_none());
    }

    #[test]
    fn test_source_delivery_and_ingest_share_one_slot() {
        let callback = Arc::new(Mutex::new(None));
        let feed = SensorFeed::new(vec![Box::new(ManualSource {
            kind: SensorKind::Acceleration,
            callback: callback.clone(),
        })]);
        feed.subscribe();

        let deliver = callback.lock().clone().expect("source was not subscribed");
        deliver(SensorSample::new(SensorKind::Acceleration, 1.0, 2.0, 3.0));
        assert_eq!(feed.latest(SensorKind::Acceleration).unwrap().axes(), [1.0, 2.0, 3.0]);

        feed.ingest(SensorSample::new(SensorKind::Acceleration, 4.0, 5.0, 6.0));
        deliver(SensorSample::new(SensorKind::Acceleration, 7.0, 8.0, 9.0));
        assert_eq!(feed.latest(SensorKind::Acceleration).unwrap().axes(), [7.0, 8.0, 9.0]);
        assert_eq!(feed.snapshot().reported(), 1);
    }

    #[test]
    fn test_latest_does_not_consume() {
        let feed = SensorFeed::new(silent_sources());
        feed.ingest(SensorSample::new(SensorKind::MagneticField, 20.0, -5.0, -40.0));

        let first = feed.latest(SensorKind::MagneticField);
        let second = feed.latest(SensorKind::MagneticField);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn test_unsubscribe_keeps_last_values() {
        let feed = SensorFeed::new(silent_sources());
        feed.subscribe();
        feed.ingest(SensorSample::new(SensorKind::Acceleration, 0.1, 0.2, 9.8));
        feed.unsubscribe();

        assert!(!feed.is_subscribed());
        assert_eq!(feed.snapshot().reported(), 1);
    }

    #[test]
    fn test_resubscribe_clears_state() {
        let feed = SensorFeed::new(silent_sources());
        feed.subscribe();
        feed.ingest(SensorSample::new(SensorKind::Acceleration, 0.1, 0.2, 9.8));

        // Already subscribed: values survive
        feed.subscribe();
        assert_eq!(feed.snapshot().reported(), 1);

        feed.unsubscribe();
        feed.subscribe();
        assert_eq!(feed.snapshot().reported(), 0);
    }

    #[test]
    fn test_lease_reference_counting() {
        let (feed, subscribes, unsubscribes) = counting_feed();

        let first = feed.lease();
        let second = feed.lease();
        assert!(feed.is_subscribed());
        assert_eq!(subscribes.load(Ordering::SeqCst), 1);

        drop(first);
        assert!(feed.is_subscribed());
        assert_eq!(unsubscribes.load(Ordering::SeqCst), 0);

        drop(second);
        assert!(!feed.is_subscribed());
        assert_eq!(unsubscribes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_source_does_not_block_others() {
        let feed = SensorFeed::new(vec![
            Box::new(MissingSource(SensorKind::MagneticField)),
            Box::new(SilentSource::new(SensorKind::Acceleration)),
        ]);
        feed.subscribe();
        assert!(feed.is_subscribed());
        assert!(feed.latest(SensorKind::MagneticField).is_none());
    }

    #[test]
    fn test_simulated_source_delivers() {
        let feed = Arc::new(SensorFeed::new(simulated_sources(Duration::from_millis(5))));
        let _lease = feed.lease();

        let deadline = Instant::now() + Duration::from_secs(2);
        while feed.snapshot().reported() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let acc = feed.latest(SensorKind::Acceleration).expect("no acceleration sample");
        assert!((acc.z - 9.81).abs() < 0.1);
        assert_eq!(feed.snapshot().reported(), 3);
    }

    #[test]
    fn test_simulated_source_stops_on_unsubscribe() {
        let mut source = SimulatedSource::new(SensorKind::AngularRate, Duration::from_millis(1));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        source
            .subscribe(Arc::new(move |_: SensorSample| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        source.unsubscribe();

        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_column_prefixes() {
        assert_eq!(SensorKind::Acceleration.column_prefix(), "acc");
        assert_eq!(SensorKind::AngularRate.column_prefix(), "gyro");
        assert_eq!(SensorKind::MagneticField.column_prefix(), "mag");
    }
}
