use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver};
use imu_recorder::config::{Config, RecordingConfig};
use imu_recorder::events::SessionEvent;
use imu_recorder::monitor::Monitor;
use imu_recorder::recorder::Recorder;
use imu_recorder::sensor::{self, LatestSensorState, SensorFeed, SensorKind};
use imu_recorder::storage::{AppDataDir, FixedDir, StorageLocation};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "imu-recorder")]
#[command(about = "Fixed-rate recorder for acceleration, angular rate and magnetic field", long_about = None)]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Interval between simulated sensor samples, in milliseconds
    #[arg(long, global = true, default_value = "5")]
    sensor_interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a fixed window of samples to CSV
    Record {
        /// Sample rate in Hz (5-500)
        #[arg(long)]
        rate: Option<u32>,

        /// Recording window in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Directory to write the recording into
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Preview live values without recording
    Monitor {
        /// Preview window in seconds
        #[arg(long)]
        duration: Option<f64>,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let loaded = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Using default settings: {}", e);
        Config::default()
    });

    let interval = Duration::from_millis(args.sensor_interval_ms.max(1));
    let feed = Arc::new(SensorFeed::new(sensor::simulated_sources(interval)));

    match args.command {
        Command::Record {
            rate,
            duration,
            output,
        } => {
            let output_dir = output.or_else(|| config.output_dir.clone());
            let storage: Arc<dyn StorageLocation> = match output_dir {
                Some(dir) => Arc::new(FixedDir(dir)),
                None => Arc::new(AppDataDir),
            };
            record(
                feed,
                storage,
                rate.unwrap_or(config.sample_rate_hz),
                duration.unwrap_or(config.duration_secs),
            )
        }
        Command::Monitor { duration } => {
            let window = match duration {
                Some(secs) => Config {
                    monitor_duration_secs: secs,
                    ..config.clone()
                }
                .monitor_duration()?,
                None => config.monitor_duration()?,
            };
            monitor(feed, config.monitor_refresh_hz, window)
        }
    }
}

fn record(
    feed: Arc<SensorFeed>,
    storage: Arc<dyn StorageLocation>,
    rate_hz: u32,
    duration_secs: f64,
) -> Result<(), Box<dyn Error>> {
    let (sender, receiver) = unbounded();
    let recorder = Recorder::new(feed, storage, RecordingConfig::default(), sender);
    recorder.configure(rate_hz, duration_secs)?;
    recorder.start()?;

    render_until(&receiver, |event| matches!(event, SessionEvent::RecordingFinished { .. }));

    // Hand the file to whoever shares it; here, stdout
    match recorder.last_saved_path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err("recording finished but was not saved".into()),
    }
}

fn monitor(feed: Arc<SensorFeed>, refresh_hz: u32, window: Duration) -> Result<(), Box<dyn Error>> {
    let (sender, receiver) = unbounded();
    let monitor = Monitor::new(feed, refresh_hz, sender);
    monitor.start(window)?;

    render_until(&receiver, |event| matches!(event, SessionEvent::MonitorStopped { .. }));
    Ok(())
}

/// Log events until `is_last` matches one
fn render_until(receiver: &Receiver<SessionEvent>, is_last: impl Fn(&SessionEvent) -> bool) {
    let mut last_decile = 0;

    for event in receiver.iter() {
        match &event {
            SessionEvent::RecordingStarted { rate_hz, duration } => {
                log::info!("Recording {} Hz for {:.2}s", rate_hz, duration.as_secs_f64());
            }
            SessionEvent::Progress { samples, fraction } => {
                let decile = (fraction * 10.0).floor() as u32;
                if decile > last_decile {
                    last_decile = decile;
                    log::info!("{:>3.0}% ({} samples)", fraction * 100.0, samples);
                } else {
                    log::debug!("{} samples", samples);
                }
            }
            SessionEvent::Saved { path, samples } => {
                log::info!("Saved {} samples to {}", samples, path.display());
            }
            SessionEvent::SaveFailed { reason } => {
                log::error!("Recording not saved: {}", reason);
            }
            SessionEvent::RecordingFinished { samples } => {
                log::info!("Recording finished ({} samples)", samples);
            }
            SessionEvent::MonitorStarted { duration } => {
                log::info!("Monitoring for {:.2}s", duration.as_secs_f64());
            }
            SessionEvent::MonitorRefresh { elapsed, latest } => {
                log::info!("[{:>6.2}s] {}", elapsed.as_secs_f64(), describe(latest));
            }
            SessionEvent::MonitorStopped { elapsed } => {
                log::info!("Monitoring stopped after {:.2}s", elapsed.as_secs_f64());
            }
        }

        if is_last(&event) {
            break;
        }
    }
}

/// One-line summary of the latest values, e.g. `acc=(0.01, 0.02, 9.81) gyro=- mag=-`
fn describe(latest: &LatestSensorState) -> String {
    SensorKind::ALL
        .iter()
        .map(|&kind| match latest.get(kind) {
            Some(s) => format!("{}=({:.3}, {:.3}, {:.3})", kind.column_prefix(), s.x, s.y, s.z),
            None => format!("{}=-", kind.column_prefix()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
