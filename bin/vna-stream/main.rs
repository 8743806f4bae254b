mod config;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, debug, error, info, warn};
use rusty_vna::{
    DiagnosticEvent, InstrumentClient, Logger, TraceSet, TraceStreamer, configure_sweep,
    default_recording_name, load_csv, plot_trace_set, save_csv, stop_sweep,
};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::config::{AppConfig, CliOverrides, load_config};

/// Vector network analyzer streaming tool
#[derive(Parser, Debug)]
#[command(name = "vna-stream")]
#[command(
    about = "Configure a VNA over SCPI/TCP, stream S-parameters and record them",
    long_about = None
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override instrument host
    #[arg(long)]
    host: Option<String>,

    /// Override instrument port
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Configure the sweep and stream traces until Ctrl+C
    Stream {
        /// Stop after this many sweeps
        #[arg(long)]
        sweeps: Option<usize>,

        /// Write the final snapshot to this CSV file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Redraw terminal plots every N sweeps
        #[arg(long, value_name = "N")]
        plot_every: Option<usize>,
    },
    /// Plot a CSV recording
    Show {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    let command = args.command.unwrap_or(Command::Stream {
        sweeps: None,
        output: None,
        plot_every: None,
    });
    let (max_sweeps, plot_every) = match &command {
        Command::Stream {
            sweeps, plot_every, ..
        } => (*sweeps, *plot_every),
        Command::Show { .. } => (None, None),
    };
    config.apply_overrides(CliOverrides {
        host: args.host,
        port: args.port,
        max_sweeps,
        plot_every,
    })?;

    let log_level = args.log_level.unwrap_or(config.console.verbosity.clone());
    initialize_logging(&log_level);

    match command {
        Command::Stream { output, .. } => run_stream(&config, output),
        Command::Show { file } => show_recording(&file),
    }
}

/// Connect, configure, stream until stopped, then record the last snapshot
fn run_stream(
    config: &AppConfig,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sweep = config.sweep.resolve()?;
    let endpoint = config.instrument.endpoint();

    info!("=== VNA Stream ===");
    info!("Instrument: {endpoint}");
    info!(
        "Sweep: {} Hz to {} Hz, {} points, {}",
        sweep.start_hz, sweep.stop_hz, sweep.points, sweep.sweep_type
    );

    let mut client = setup_client(config)?;
    debug!("Connection timeouts: {:?}", client.config());
    client.connect(endpoint)?;

    let report = configure_sweep(&mut client, &sweep, config.streaming.error_policy)?;
    if !report.is_clean() {
        warn!(
            "Sweep configured with {} failed commands, continuing",
            report.failures.len()
        );
    }

    let streamer = TraceStreamer::new()
        .interval(Duration::from_millis(config.streaming.interval_ms))
        .max_sweeps(config.streaming.max_sweeps);
    setup_shutdown_handler(&streamer)?;

    let plot_every = config.streaming.plot_every;
    let mut latest = TraceSet::new();
    let mut sweep_count = 0usize;
    let stats = streamer.run(&mut client, &mut latest, |traces| {
        sweep_count += 1;
        if plot_every.is_some_and(|every| every > 0 && sweep_count % every == 0) {
            if let Err(e) = plot_trace_set(traces, None, None) {
                warn!("Plot failed: {e}");
            }
        }
    });

    stop_sweep(&mut client);
    info!(
        "Streamed {} sweeps in {:.1} s ({} failed fetches)",
        stats.sweeps,
        stats.elapsed.as_secs_f64(),
        stats.failed_fetches
    );

    if !latest.is_consistent() {
        warn!("Last snapshot mixes traces from different sweeps");
    }
    save_snapshot(config, output, &latest)
}

/// Build the client, attaching a JSON session log when enabled
fn setup_client(config: &AppConfig) -> Result<InstrumentClient, Box<dyn std::error::Error>> {
    let mut builder = InstrumentClient::builder().config(config.instrument.connection());

    if config.recording.session_log {
        let dir = PathBuf::from(&config.recording.output_path);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!(
            "session_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        info!("Session log: {}", path.display());

        let mut session_log: Logger<DiagnosticEvent> = Logger::new(path, 100, true);
        builder = builder.on_diagnostic(move |event| {
            if let Err(e) = session_log.add(event.clone()) {
                error!("Session log: {e}");
            }
        });
    }

    Ok(builder.build())
}

fn save_snapshot(
    config: &AppConfig,
    output: Option<PathBuf>,
    traces: &TraceSet,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = match output {
        Some(path) => path,
        None if config.recording.save_on_exit => {
            let dir = PathBuf::from(&config.recording.output_path);
            fs::create_dir_all(&dir)?;
            dir.join(default_recording_name())
        }
        None => return Ok(()),
    };

    if traces.is_empty() {
        warn!("No trace data received, nothing saved");
        return Ok(());
    }

    let rows = save_csv(&path, traces)?;
    info!("Recorded {rows} points to {}", path.display());
    Ok(())
}

fn show_recording(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Reading {}", file.display());
    let traces = load_csv(file)?;
    info!("{} points loaded", traces.sweep_len());
    plot_trace_set(&traces, None, None)
}

/// Setup Ctrl+C handler for graceful shutdown
fn setup_shutdown_handler(streamer: &TraceStreamer) -> Result<(), Box<dyn std::error::Error>> {
    let stop = streamer.handle();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received - stopping after the current sweep...");
        stop.stop();
    })?;
    Ok(())
}

/// Initialize logging with configurable level
fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}
