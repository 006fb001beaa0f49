//! sensorlog - buffered, rotating CSV logging for sensor readings
//!
//! The entry point handles:
//! - Ingesting readings from stdin or a file
//! - Time-range and sensor queries over live and archived data
//! - Manual rotation and retention sweeps
//! - Reporting the resolved configuration and storage state

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sl_common::{format_error_human, parse_timestamp, Error, StructuredError};
use sl_config::{load_config, ConfigOptions, LoggerConfig, ResolvedConfig};
use sl_core::exit_codes::ExitCode;
use sl_core::ingest::{parse_line, IngestSummary};
use sl_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use sl_core::output::{write_readings, QueryFormat};
use sl_storage::{
    ArchiveOutcome, ArchiveStatus, LogIter, LogQuery, RetentionSweeper, SensorLogger,
    StorageLayout,
};
use tracing::{debug, info, warn};

/// Buffered, rotating CSV logger for sensor readings
#[derive(Parser)]
#[command(name = "sensorlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to a JSON config file (default: $SENSORLOG_CONFIG, then XDG, then /etc)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Diagnostic output format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append readings (sensor_id,value,unit[,timestamp] per line)
    Record(RecordArgs),

    /// Print stored readings in a time range
    Query(QueryArgs),

    /// Close the active file and archive it now
    Rotate,

    /// Delete archive entries older than the retention window
    Prune(PruneArgs),

    /// Show the resolved configuration and storage state
    Status,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Read from this file instead of stdin
    #[arg(long, short)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Inclusive lower bound (YYYY-MM-DDTHH:MM:SS[.f])
    #[arg(long)]
    from: String,

    /// Inclusive upper bound
    #[arg(long)]
    to: String,

    /// Only readings from this sensor
    #[arg(long)]
    sensor: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = QueryFormat::Jsonl)]
    format: QueryFormat,
}

#[derive(Args, Debug)]
struct PruneArgs {
    /// Report what would be deleted without deleting it
    #[arg(long)]
    dry_run: bool,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if !e.use_stderr() {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(ExitCode::ArgsError.as_i32());
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format);
    let _ = ERROR_FORMAT.set(log_config.format);
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Record(args) => run_record(&cli.global, args),
        Commands::Query(args) => run_query(&cli.global, args),
        Commands::Rotate => run_rotate(&cli.global),
        Commands::Prune(args) => run_prune(&cli.global, args),
        Commands::Status => run_status(&cli.global),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve(global: &GlobalOpts) -> Result<ResolvedConfig, Error> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        log_dir: global.log_dir.clone(),
    };
    Ok(load_config(&options)?)
}

/// Format for fatal errors on stderr; follows the diagnostic log format.
static ERROR_FORMAT: OnceLock<LogFormat> = OnceLock::new();

fn fail(err: Error) -> ExitCode {
    match ERROR_FORMAT.get() {
        Some(LogFormat::Jsonl) => eprintln!("{}", StructuredError::from(&err).to_json()),
        _ => {
            let use_color = io::stderr().is_terminal();
            eprintln!("{}", format_error_human(&err, use_color));
        }
    }
    ExitCode::from_error(&err)
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::Clean
        }
        Err(e) => fail(e.into()),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_record(global: &GlobalOpts, args: &RecordArgs) -> ExitCode {
    match record(global, args) {
        Ok(summary) => print_json(&summary),
        Err(e) => fail(e),
    }
}

fn record(global: &GlobalOpts, args: &RecordArgs) -> Result<IngestSummary, Error> {
    let resolved = resolve(global)?;
    let mut logger = SensorLogger::new(resolved.config)?;

    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let mut summary = IngestSummary::default();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        match parse_line(&line, Local::now().naive_local()) {
            Ok(Some(reading)) => {
                logger.log(reading)?;
                summary.accepted += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(line = index + 1, error = %e, "Rejected input line");
                summary.rejected += 1;
            }
        }
    }
    logger.stop()?;

    let stats = logger.stats();
    summary.rotations = stats.rotations;
    summary.archived = stats.archives_compressed + stats.archives_relocated;
    summary.stranded = stats.archives_stranded;
    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        rotations = summary.rotations,
        "Ingestion finished"
    );
    Ok(summary)
}

fn run_query(global: &GlobalOpts, args: &QueryArgs) -> ExitCode {
    let query = match build_query(args) {
        Ok(q) => q,
        Err(e) => return fail(e),
    };

    // Read-only: never create directories on behalf of a query.
    let layout = match resolve(global).and_then(|r| Ok(StorageLayout::new(&r.config)?)) {
        Ok(layout) => layout,
        Err(e) => return fail(e),
    };

    let mut readings = LogIter::new(&layout, None, query);
    let mut stdout = io::stdout().lock();
    let written = write_readings(args.format, readings.by_ref(), &mut stdout);

    let stats = readings.stats();
    debug!(
        sources = stats.sources_scanned,
        failed = stats.sources_failed,
        matched = stats.rows_matched,
        skipped = stats.rows_skipped,
        "Query finished"
    );

    match written {
        Ok(_) => ExitCode::Clean,
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::Clean,
        Err(e) => fail(e.into()),
    }
}

fn build_query(args: &QueryArgs) -> Result<LogQuery, Error> {
    let parse = |flag: &str, raw: &str| {
        parse_timestamp(raw)
            .ok_or_else(|| Error::InvalidQuery(format!("--{flag}: unparsable timestamp {raw:?}")))
    };
    let start = parse("from", &args.from)?;
    let end = parse("to", &args.to)?;
    if start > end {
        return Err(Error::InvalidQuery(format!(
            "--from {start} is after --to {end}"
        )));
    }

    let query = LogQuery::new(start, end);
    Ok(match &args.sensor {
        Some(sensor) => query.with_sensor(sensor.clone()),
        None => query,
    })
}

#[derive(Serialize)]
struct RotateOutput {
    archive: ArchiveOutcome,
    active_path: Option<PathBuf>,
}

fn run_rotate(global: &GlobalOpts) -> ExitCode {
    let output = match rotate(global) {
        Ok(output) => output,
        Err(e) => return fail(e),
    };

    let code = print_json(&output);
    match output.archive.stranded_error() {
        Some(err) => fail(err),
        None => code,
    }
}

fn rotate(global: &GlobalOpts) -> Result<RotateOutput, Error> {
    let resolved = resolve(global)?;
    let mut logger = SensorLogger::new(resolved.config)?;
    logger.start()?;
    let archive = logger.rotate()?;
    let active_path = logger.active_path().map(Path::to_path_buf);
    logger.stop()?;
    Ok(RotateOutput {
        archive,
        active_path,
    })
}

fn run_prune(global: &GlobalOpts, args: &PruneArgs) -> ExitCode {
    let resolved = match resolve(global) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let config = resolved.config;
    let sweeper = RetentionSweeper::new(config.archive_dir(), config.retention_days);
    if !sweeper.is_enabled() {
        info!("Retention is disabled; nothing to prune");
    }

    let report = if args.dry_run {
        sweeper.preview()
    } else {
        sweeper.sweep()
    };

    let code = print_json(&report);
    match report.failure_error() {
        Some(err) => fail(err),
        None => code,
    }
}

#[derive(Serialize)]
struct StatusOutput {
    config_source: String,
    config_path: Option<PathBuf>,
    config: LoggerConfig,
    active_file: PathBuf,
    unarchived: Vec<FileStatus>,
    archive: ArchiveStatus,
}

#[derive(Serialize)]
struct FileStatus {
    path: PathBuf,
    size_bytes: u64,
}

fn run_status(global: &GlobalOpts) -> ExitCode {
    match status(global) {
        Ok(output) => print_json(&output),
        Err(e) => fail(e),
    }
}

fn status(global: &GlobalOpts) -> Result<StatusOutput, Error> {
    let resolved = resolve(global)?;
    let layout = StorageLayout::new(&resolved.config)?;
    let active_file = layout.active_path(&Local::now())?;
    let sweeper = RetentionSweeper::new(layout.archive_dir(), resolved.config.retention_days);

    Ok(StatusOutput {
        config_source: resolved.source.to_string(),
        config_path: resolved.path,
        active_file,
        unarchived: unarchived_files(&layout)?,
        archive: sweeper.status(),
        config: resolved.config,
    })
}

fn unarchived_files(layout: &StorageLayout) -> Result<Vec<FileStatus>, Error> {
    let read_dir = match std::fs::read_dir(layout.log_dir()) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in read_dir.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !layout.is_active_file_name(name) {
            continue;
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            files.push(FileStatus {
                path: entry.path(),
                size_bytes: metadata.len(),
            });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
