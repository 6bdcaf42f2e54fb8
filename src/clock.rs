//! # Sample Clock Module
//!
//! Periodic timer that drives both the recording and the monitoring loops.
//!
//! ## Scheduling
//! The clock thread captures an origin instant when started and computes
//! every deadline as `origin + slot * period`. Sleeping towards an absolute
//! deadline means a late wake-up does not push later ticks back, so the
//! session never accumulates drift.
//!
//! When a tick (or the host) runs so late that later deadlines have already
//! passed, those slots are skipped and the next tick lands back on the
//! original grid. There is no catch-up burst.
//!
//! ## Cancellation
//! The thread waits on a stop channel with a timeout equal to the time left
//! until the next deadline. Dropping the sender wakes it immediately; a tick
//! callback already running is allowed to finish.

use crate::error::ClockError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// One firing of a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based count of ticks delivered so far
    pub index: u64,
    /// Offset of the deadline this tick was scheduled for
    pub scheduled: Duration,
    /// Offset at which the tick was actually delivered
    pub fired: Duration,
}

impl Tick {
    /// How late the tick was delivered relative to its deadline
    pub fn lateness(&self) -> Duration {
        self.fired.saturating_sub(self.scheduled)
    }
}

/// Returned by a tick callback to keep or end its clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Handle to a running clock thread
pub struct SampleClock {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SampleClock {
    /// Period of a clock firing `rate_hz` times per second
    ///
    /// A zero rate maps to a zero period, which `start` rejects.
    pub fn period_for_rate(rate_hz: u32) -> Duration {
        match rate_hz {
            0 => Duration::ZERO,
            hz => Duration::from_nanos(NANOS_PER_SECOND / u64::from(hz)),
        }
    }

    /// Start firing `on_tick` every `period` on a new thread named `clock-<name>`
    pub fn start<F>(name: &str, period: Duration, on_tick: F) -> Result<Self, ClockError>
    where
        F: FnMut(Tick) -> TickFlow + Send + 'static,
    {
        if period.is_zero() {
            return Err(ClockError::ZeroPeriod);
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let origin = Instant::now();

        let handle = thread::Builder::new()
            .name(format!("clock-{}", name))
            .spawn(move || Self::run(origin, period, stop_rx, on_tick))
            .map_err(ClockError::Spawn)?;

        log::debug!("Sample clock '{}' started with period {:?}", name, period);

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Whether the clock thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Cancel future ticks and wait for the thread to exit
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel
        self.stop_tx = None;

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("Sample clock thread panicked");
            }
        }
    }

    fn run<F>(origin: Instant, period: Duration, stop_rx: Receiver<()>, mut on_tick: F)
    where
        F: FnMut(Tick) -> TickFlow,
    {
        let period_nanos = period.as_nanos() as u64;
        let mut index: u64 = 0;
        let mut slot: u64 = 1;

        loop {
            let scheduled = Duration::from_nanos(period_nanos.saturating_mul(slot));
            let wait = (origin + scheduled).saturating_duration_since(Instant::now());

            match stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }

            index += 1;
            let tick = Tick {
                index,
                scheduled,
                fired: origin.elapsed(),
            };

            match panic::catch_unwind(AssertUnwindSafe(|| on_tick(tick))) {
                Ok(TickFlow::Continue) => {}
                Ok(TickFlow::Stop) => break,
                Err(_) => log::error!("Tick {} callback panicked; clock keeps running", index),
            }

            // Next slot is the first one strictly after now
            let elapsed = origin.elapsed().as_nanos() as u64;
            let next = (slot + 1).max(elapsed / period_nanos + 1);
            if next > slot + 1 {
                log::debug!("Sample clock overran, skipping {} slot(s)", next - slot - 1);
            }
            slot = next;
        }
    }
}

impl Drop for SampleClock {
    fn drop(&mut self) {
        self.stop();
    }
}
