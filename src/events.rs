//! Notifications sent from the recording and monitoring sessions to whatever
//! renders them (the CLI driver, or a UI).

use crate::sensor::LatestSensorState;
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    RecordingStarted {
        rate_hz: u32,
        duration: Duration,
    },
    /// Emitted after every recorded row
    Progress {
        samples: u64,
        fraction: f64,
    },
    /// Recording written; `path` is ready to be shared
    Saved {
        path: PathBuf,
        samples: u64,
    },
    SaveFailed {
        reason: String,
    },
    /// Session is back to Idle, whatever the save outcome
    RecordingFinished {
        samples: u64,
    },
    MonitorStarted {
        duration: Duration,
    },
    MonitorRefresh {
        elapsed: Duration,
        latest: LatestSensorState,
    },
    MonitorStopped {
        elapsed: Duration,
    },
}

/// Send an event, tolerating a receiver that has gone away
pub(crate) fn emit(sender: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(why) = sender.send(event) {
        log::debug!("Dropped session event, receiver closed: {:?}", why.into_inner());
    }
}
