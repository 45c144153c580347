//! BMS Log CLI Application
//!
//! Command-line monitor for battery management frames on a CAN bus.
//! It uses the bms-log-decoder library and adds:
//! - Live SocketCAN capture or candump replay
//! - Appending text log of every recognized frame
//! - Live console display
//! - SVG plots and a JSON summary when the session ends

use anyhow::{bail, Context, Result};
use bms_log_decoder::{
    CancelToken, FrameSource, IngestConfig, IngestLoop, ReplaySource, ReportBuilder,
    SessionOutcome, StopReason, TimeBase,
};
use clap::Parser;
use std::path::PathBuf;

mod config;
mod display;
mod log_file;
mod report;

use config::AppConfig;

/// BMS Log - Decode, log and plot battery frames from a CAN bus
#[derive(Parser, Debug)]
#[command(name = "bms-log-cli")]
#[command(about = "Monitor battery algorithm and aux battery frames on a CAN bus", long_about = None)]
#[command(version)]
struct Args {
    /// CAN interface to capture from (e.g. can0, vcan0)
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Replay a candump log file instead of capturing live
    #[arg(short, long, value_name = "FILE", conflicts_with = "interface")]
    replay: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Text log file (appended, never truncated)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Directory for the plots written at the end of the session
    #[arg(long, value_name = "DIR")]
    plot_dir: Option<PathBuf>,

    /// Write a JSON session summary to this file
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Disable the live console display
    #[arg(long)]
    no_display: bool,

    /// Skip plot generation
    #[arg(long)]
    no_plots: bool,

    /// Bounded wait per bus poll, in milliseconds
    #[arg(long, value_name = "MS")]
    poll_timeout_ms: Option<u64>,

    /// Stop after this many received frames
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Command-line flags win over the config file
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(interface) = &self.interface {
            config.bus.interface = interface.clone();
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.bus.poll_timeout_ms = ms;
        }
        if let Some(path) = &self.log_file {
            config.output.log_file = path.clone();
        }
        if let Some(dir) = &self.plot_dir {
            config.output.plot_dir = dir.clone();
        }
        if let Some(path) = &self.summary_json {
            config.output.summary_json = Some(path.clone());
        }
        if self.no_plots {
            config.output.plots = false;
        }
        if self.no_display || self.quiet {
            config.display.enabled = false;
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("BMS Log CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", bms_log_decoder::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .context("Failed to install Ctrl+C handler")?;
    }

    let outcome = run_session(&args, &config, cancel)?;
    finish_session(&config, outcome)
}

/// Open the source and sinks and run the ingest loop until it stops
fn run_session(args: &Args, config: &AppConfig, cancel: CancelToken) -> Result<SessionOutcome> {
    // Sinks first: once opened, the source is only released through the ingest loop
    let mut log_sink = log_file::TextLogSink::open(&config.output.log_file)?;
    let mut console = display::ConsoleDisplay::stdout();

    let (source, time_base): (Box<dyn FrameSource>, TimeBase) = match &args.replay {
        Some(path) => (Box::new(ReplaySource::open(path)?), TimeBase::recorded()),
        None => (open_live_source(&config.bus.interface)?, TimeBase::live()),
    };

    let ingest_config = IngestConfig::new()
        .with_poll_timeout(config.bus.poll_timeout())
        .with_max_frames(args.max_frames);

    let mut ingest = IngestLoop::new(ingest_config, &mut log_sink)
        .with_cancel_token(cancel)
        .with_time_base(time_base);
    if config.display.enabled {
        ingest = ingest.with_display(&mut console);
    }

    let outcome = ingest.run(source);
    log::info!(
        "{} records written to {:?}",
        log_sink.entries(),
        log_sink.path()
    );
    Ok(outcome)
}

#[cfg(target_os = "linux")]
fn open_live_source(interface: &str) -> Result<Box<dyn FrameSource>> {
    let source = bms_log_decoder::SocketCanSource::open(interface)
        .with_context(|| format!("Failed to start capture on {}", interface))?;
    Ok(Box::new(source))
}

#[cfg(not(target_os = "linux"))]
fn open_live_source(interface: &str) -> Result<Box<dyn FrameSource>> {
    bail!(
        "Live capture on {} needs SocketCAN (Linux only); use --replay <candump.log>",
        interface
    )
}

/// Report on a stopped session: plots, summary, exit status
fn finish_session(config: &AppConfig, outcome: SessionOutcome) -> Result<()> {
    print_summary(&outcome);

    let plots = if config.output.plots {
        let builder = ReportBuilder::new(&config.output.plot_dir);
        report::render_plots(&builder, &outcome, &report::SvgPlotSink::default())?
    } else {
        Default::default()
    };

    if !plots.rendered.is_empty() {
        println!("\nPlots:");
        for path in &plots.rendered {
            println!("  {}", path.display());
        }
    }

    if let Some(path) = &config.output.summary_json {
        report::SessionSummary::new(&outcome, &plots).write_json(path)?;
    }

    if let StopReason::SourceFailed(e) = &outcome.reason {
        bail!("Session ended on a frame source error: {}", e);
    }
    Ok(())
}

fn print_summary(outcome: &SessionOutcome) {
    let stats = &outcome.stats;
    let snap = outcome.state.snapshot();

    println!("\n═══════════════════════════════════════════════");
    println!("  Session stopped: {}", outcome.reason);
    println!("═══════════════════════════════════════════════");
    println!("  Frames received:   {}", stats.frames_received);
    println!("  Recognized:        {}", stats.frames_recognized);
    println!("  Ignored:           {}", stats.frames_ignored);
    println!("  Decode errors:     {}", stats.decode_errors);
    if stats.sink_errors > 0 {
        println!("  Sink errors:       {}", stats.sink_errors);
    }

    println!("\nLast values:");
    if snap.is_empty() {
        println!("  (no battery frames received)");
    }
    if let Some(minutes) = snap.time_remaining_minutes {
        println!("  Time Remaining:  {:.1} minutes", minutes);
    }
    if let Some(soc) = snap.state_of_charge_percent {
        println!("  SoC:             {}%", soc);
    }
    if let Some(soh) = snap.state_of_health_percent {
        println!("  SoH:             {}%", soh);
    }
    if let Some(voltage) = snap.aux_voltage {
        println!("  Aux Voltage:     {:.2} VDC", voltage);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "bms-log-cli",
            "--interface",
            "vcan1",
            "--poll-timeout-ms",
            "200",
            "--plot-dir",
            "out",
            "--no-display",
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.bus.interface, "vcan1");
        assert_eq!(config.bus.poll_timeout(), Duration::from_millis(200));
        assert_eq!(config.output.plot_dir, PathBuf::from("out"));
        assert!(!config.display.enabled);
        assert!(config.output.plots);
    }

    #[test]
    fn test_replay_conflicts_with_interface() {
        let result = Args::try_parse_from([
            "bms-log-cli",
            "--interface",
            "can0",
            "--replay",
            "capture.log",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_session_end_to_end() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("capture.log");
        let mut file = std::fs::File::create(&capture).unwrap();
        writeln!(file, "(1700000000.000000) can0 18FF02F3#0A00325000000000").unwrap();
        writeln!(file, "(1700000000.500000) can0 18FF00F3#0000000010270000").unwrap();
        writeln!(file, "(1700000001.000000) can0 12345678#DEADBEEF").unwrap();
        drop(file);

        let log_path = dir.path().join("bms.txt");
        let plot_dir = dir.path().join("plots");
        let summary_path = dir.path().join("summary.json");
        let args = Args::parse_from([
            "bms-log-cli".to_string(),
            "--replay".to_string(),
            capture.display().to_string(),
            "--log-file".to_string(),
            log_path.display().to_string(),
            "--plot-dir".to_string(),
            plot_dir.display().to_string(),
            "--summary-json".to_string(),
            summary_path.display().to_string(),
            "--no-display".to_string(),
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        let outcome = run_session(&args, &config, CancelToken::new()).unwrap();
        assert_eq!(outcome.reason, StopReason::SourceExhausted);
        finish_session(&config, outcome).unwrap();

        let log_text = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log_text.matches("Arbitration ID: ").count(), 2);
        for slug in ["time_remaining", "state_of_charge", "state_of_health", "aux_battery_voltage"] {
            assert!(plot_dir.join(format!("{}.svg", slug)).exists(), "{} missing", slug);
        }
        assert!(summary_path.exists());
    }

    #[test]
    fn test_log_sink_failure_leaves_source_unopened() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as the log file
        let log_dir = dir.path().join("not-a-file");
        std::fs::create_dir(&log_dir).unwrap();

        let args = Args::parse_from([
            "bms-log-cli".to_string(),
            "--replay".to_string(),
            dir.path().join("missing.log").display().to_string(),
            "--log-file".to_string(),
            log_dir.display().to_string(),
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        let err = run_session(&args, &config, CancelToken::new()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open log file"));
    }
}
