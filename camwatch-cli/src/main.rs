use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use camwatch_manager::logging::{init_logging_with_default, LoggingMode};
use camwatch_manager::{CameraRegistry, DeviceHost, InMemoryHost, ManagerConfig};
use camwatch_stream::StreamConfig;

pub mod cameras;

/// Camera motion alarm monitor
///
/// Keeps an alarm event stream open to every camera in the list, logs each
/// alarm change and prints a status table until Ctrl+C.
#[derive(Parser, Debug)]
#[command(name = "camwatch")]
#[command(about = "Monitor motion alarms from network cameras")]
#[command(version)]
pub struct Args {
    /// JSON file listing the cameras to watch
    pub cameras: PathBuf,

    /// Camera HTTP port
    #[arg(short, long, default_value = "80")]
    pub port: u16,

    /// Milliseconds without a decoded event before a stream is presumed dead
    #[arg(long, default_value = "2000")]
    pub staleness_ms: u64,

    /// Seconds between status tables (0 disables them)
    #[arg(short = 'i', long, default_value = "10")]
    pub status_interval: u64,

    /// Log level (error, warn, info, debug, trace); defaults to info, or
    /// debug with --debug
    #[arg(long)]
    pub log_level: Option<String>,

    /// Verbose logs with thread names and source locations
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.staleness_ms == 0 {
            return Err(anyhow::anyhow!("Staleness window must be positive"));
        }

        if let Some(level) = &self.log_level {
            match level.to_lowercase().as_str() {
                "error" | "warn" | "info" | "debug" | "trace" => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                        level
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new()
            .with_port(self.port)
            .with_staleness_window(Duration::from_millis(self.staleness_ms))
    }

    pub fn logging_mode(&self) -> LoggingMode {
        if self.debug {
            LoggingMode::Debug
        } else {
            LoggingMode::Development
        }
    }

    /// Explicit `--log-level`, else the logging mode's own default
    pub fn log_level(&self) -> String {
        self.log_level
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.logging_mode().default_level().to_string())
    }

    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval > 0).then(|| Duration::from_secs(self.status_interval))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    init_logging_with_default(args.logging_mode(), &args.log_level())
        .context("Failed to initialize logging")?;

    let entries = cameras::load(&args.cameras)?;
    if entries.is_empty() {
        return Err(anyhow::anyhow!(
            "No cameras listed in {}",
            args.cameras.display()
        ));
    }

    let host = InMemoryHost::new();
    for entry in &entries {
        if let Some(name) = &entry.name {
            host.set_name(entry.device_id(), name);
        }
    }
    let host = Arc::new(host);

    let config = ManagerConfig::new().with_stream(args.stream_config());
    let registry = CameraRegistry::with_config(config, host.clone())
        .context("Failed to start camera registry")?;

    for entry in &entries {
        info!("Watching {} ({})", entry.address, entry.device_id());
        registry.add_device(entry.device_id(), entry.camera_config());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    println!("Watching {} camera(s), press Ctrl+C to stop", entries.len());

    let interval = args.status_interval();
    let mut last_table = Instant::now();
    while running.load(Ordering::SeqCst) {
        if let Some(change) = host.recv_change_timeout(Duration::from_millis(250)) {
            let name = host
                .device_name(change.device_id)
                .unwrap_or_else(|| change.device_id.to_string());
            info!("{}: {}", name, change.state);
        }

        if let Some(interval) = interval {
            if last_table.elapsed() >= interval {
                print_status(&registry);
                last_table = Instant::now();
            }
        }
    }

    info!("Shutting down");
    registry.shutdown_all();
    Ok(())
}

fn print_status(registry: &CameraRegistry) {
    let mut names: Vec<_> = registry.list_names().into_iter().collect();
    names.sort_by_key(|(_, id)| *id);

    println!();
    println!("{:<24} {:<10} {:<10}", "CAMERA", "ALARM", "PHASE");
    for (name, id) in names {
        let status = registry
            .get_status(id)
            .map(|state| state.to_string())
            .unwrap_or_else(|| "-".to_string());
        let phase = registry
            .phase(id)
            .map(|phase| phase.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<24} {:<10} {:<10}", name, status, phase);
    }
}
