use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::exit;

use clap::{Args, Parser, Subcommand};

use rawmzml::convert::{parse_levels, ConversionOptions, OutputFormat, RunOrchestrator};
use rawmzml::io::query::parse_scan_numbers;
use rawmzml::io::thermo::{raw_files_in, SnapshotOpener, DEFAULT_SOFTWARE_NAME};
use rawmzml::io::{run_query, run_xic, MetadataFormat, QueryOptions, XicOptions};

/// Convert Thermo RAW runs to mzML, indexed mzML or MGF
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about,
    long_about = None,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// The RAW file to convert
    #[arg(short = 'i', long, conflicts_with = "input_directory")]
    input: Option<PathBuf>,

    /// Convert every RAW file in this directory
    #[arg(short = 'd', long, required_unless_present = "input")]
    input_directory: Option<PathBuf>,

    /// Write output files to this directory, defaulting to the input's directory
    #[arg(short = 'o', long)]
    output_directory: Option<PathBuf>,

    /// Write spectra to this file. Ignored in directory mode.
    #[arg(short = 'b', long)]
    output: Option<PathBuf>,

    /// 0 for MGF, 1 for mzML, 2 for indexed mzML, 3 for Parquet, 4 for no spectra
    #[arg(short = 'f', long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=4))]
    format: u8,

    /// 0 for JSON, 1 for TXT, 2 for no metadata
    #[arg(short = 'm', long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
    metadata: u8,

    /// Write the metadata summary to this file. Ignored in directory mode.
    #[arg(short = 'c', long)]
    metadata_output: Option<PathBuf>,

    /// Compress the spectrum output with gzip
    #[arg(short = 'g', long)]
    gzip: bool,

    /// Use the profile data of these MS levels instead of vendor centroids,
    /// all levels when no list is given
    #[arg(short = 'p', long, num_args = 0..=1, default_missing_value = "1-255", value_parser = parse_levels)]
    no_peak_picking: Option<BTreeSet<u8>>,

    /// Do not zlib compress binary data arrays
    #[arg(short = 'z', long)]
    no_zlib_compression: bool,

    /// Include sampled noise and baseline arrays with centroid streams
    #[arg(short = 'N', long)]
    noise_data: bool,

    /// Centroid profile scans that have no vendor centroids
    #[arg(long)]
    exclude_profile: bool,

    /// The MS levels written to MGF, such as `2` or `2-3`
    #[arg(short = 'L', long, default_value = "2", value_parser = parse_levels)]
    ms_levels: BTreeSet<u8>,

    /// Do not warn about unrecognized instrument models
    #[arg(short = 'e', long)]
    ignore_instrument_errors: bool,

    /// Exit with status 2 when any warning was raised
    #[arg(short = 'w', long)]
    warnings_are_errors: bool,

    /// 0 for errors only, 1 for warnings, 2 for info, 3 for debug
    #[arg(short = 'l', long, global = true, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=3))]
    logging: u8,

    /// The name the converter records for itself in mzML output
    #[arg(long, default_value = DEFAULT_SOFTWARE_NAME)]
    software_name: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write selected scans of one RAW file as PROXI JSON spectra
    Query(QueryArgs),
    /// Extract ion chromatograms described by a JSON request file
    Xic(XicArgs),
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// The RAW file to read
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Scan numbers and ranges, such as `1-5,20`
    #[arg(short = 'n', long, value_parser = parse_scan_numbers)]
    scans: BTreeSet<i32>,

    /// Write the spectra to this file instead of `<run name>.json`
    #[arg(short = 'b', long)]
    output: Option<PathBuf>,

    /// Report profile data as recorded instead of centroids
    #[arg(short = 'p', long)]
    no_peak_picking: bool,

    /// Write to standard output
    #[arg(short = 's', long)]
    stdout: bool,
}

impl From<QueryArgs> for QueryOptions {
    fn from(args: QueryArgs) -> Self {
        QueryOptions {
            input_file: args.input,
            scans: args.scans,
            output_file: args.output,
            no_peak_picking: args.no_peak_picking,
            stdout: args.stdout,
        }
    }
}

#[derive(Debug, Args)]
struct XicArgs {
    /// RAW files, or directories of them
    #[arg(short = 'i', long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// The JSON file describing the traces to extract
    #[arg(short = 'j', long)]
    json: PathBuf,

    /// Write one `<run name>.json` per input to this directory
    #[arg(short = 'o', long)]
    output_directory: Option<PathBuf>,

    /// Encode traces as base64 little endian doubles
    #[arg(long)]
    base64: bool,

    /// Write to standard output
    #[arg(short = 's', long)]
    stdout: bool,
}

impl XicArgs {
    fn into_options(self) -> std::io::Result<XicOptions> {
        let mut input_files = Vec::new();
        for path in self.input {
            if path.is_dir() {
                input_files.extend(raw_files_in(&SnapshotOpener, &path)?);
            } else {
                input_files.push(path);
            }
        }
        Ok(XicOptions {
            input_files,
            json_file: self.json,
            output_directory: self.output_directory,
            base64: self.base64,
            stdout: self.stdout,
        })
    }
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        match self.logging {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }

    fn into_options(self) -> ConversionOptions {
        ConversionOptions {
            input_file: self.input,
            input_directory: self.input_directory,
            output_directory: self.output_directory,
            output_file: self.output,
            output_format: OutputFormat::from_index(self.format).unwrap_or_default(),
            metadata_format: MetadataFormat::from_index(self.metadata).unwrap_or_default(),
            metadata_output_file: self.metadata_output,
            gzip: self.gzip,
            no_peak_picking: self.no_peak_picking.unwrap_or_default(),
            no_zlib_compression: self.no_zlib_compression,
            noise_data: self.noise_data,
            exclude_profile: self.exclude_profile,
            ms_levels: self.ms_levels,
            ignore_instrument_errors: self.ignore_instrument_errors,
            warnings_are_errors: self.warnings_are_errors,
            software_name: self.software_name,
        }
    }
}

fn query(args: QueryArgs) -> ! {
    match run_query(&SnapshotOpener, &args.into()) {
        Ok((spectra, warnings)) => {
            log::info!("Retrieved {spectra} spectra with {warnings} warnings");
            exit(0)
        }
        Err(e) => {
            log::error!("{e}");
            exit(1)
        }
    }
}

fn xic(args: XicArgs) -> ! {
    let options = match args.into_options() {
        Ok(options) => options,
        Err(e) => {
            log::error!("Failed to list input files: {e}");
            exit(1)
        }
    };
    match run_xic(&SnapshotOpener, &options) {
        Ok(summary) => {
            log::info!(
                "Extracted ion chromatograms from {} of {} files",
                summary.files - summary.errors,
                summary.files
            );
            exit(if summary.errors > 0 { 1 } else { 0 })
        }
        Err(e) => {
            log::error!("{e}");
            exit(1)
        }
    }
}

fn main() {
    let mut cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match cli.command.take() {
        Some(Command::Query(args)) => query(args),
        Some(Command::Xic(args)) => xic(args),
        None => {}
    }

    let options = cli.into_options();
    let warnings_are_errors = options.warnings_are_errors;
    let mut orchestrator = RunOrchestrator::new(options, SnapshotOpener);
    match orchestrator.run() {
        Ok(summary) => {
            log::info!(
                "Converted {} files containing {} spectra",
                summary.files.saturating_sub(summary.errors),
                summary.spectra
            );
            exit(summary.exit_code(warnings_are_errors))
        }
        Err(e) => {
            log::error!("{e}");
            exit(1)
        }
    }
}
