use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Env, Target};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use regionmatch::config::{DEFAULT_REGION_SIZE, DEFAULT_SAMPLES, DEFAULT_SEED};
use regionmatch::decode::open_image;
use regionmatch::{
    FingerprintLayout, Index, MatchConfig, MatchOutcome, build_index, find_best_match, store,
};

#[derive(Parser, Debug)]
#[command(
    name = "regionmatch",
    about = "Perform an image fingerprint search in the specified directory."
)]
struct Cli {
    /// Image file to search for
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Directory to search in
    #[arg(value_name = "SEARCH_DIR")]
    search_dir: PathBuf,

    /// Output file for the constructed image index
    #[arg(short = 'O', long, value_name = "FILE", default_value = "hashes")]
    output: PathBuf,

    /// Load a pre-constructed index instead of scanning SEARCH_DIR
    #[arg(short = 'L', long, value_name = "FILE")]
    load_index: Option<PathBuf>,

    /// Side length of square fingerprinting regions, in pixels (also -RS)
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    region_size: Option<u32>,

    /// Number of samples to take from the input image for matching
    #[arg(short = 'S', long, value_name = "N", default_value_t = DEFAULT_SAMPLES)]
    samples: usize,

    /// Seed for choosing sample positions
    #[arg(long, value_name = "SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Pack fingerprints as red/green/red like older index builds
    #[arg(long)]
    legacy_fingerprint: bool,

    /// How to print the result
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    format: OutputFormat,

    /// Print debug output
    #[arg(short = 'V', long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            region_size: self.region_size.unwrap_or(DEFAULT_REGION_SIZE),
            samples: self.samples,
            seed: self.seed,
            layout: if self.legacy_fingerprint {
                FingerprintLayout::LegacyRgr
            } else {
                FingerprintLayout::Rgb
            },
            ..MatchConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.verbose);

    let config = cli.match_config();
    config.validate()?;

    let query = open_image(&cli.image).context("Could not open image file")?;

    let index = match &cli.load_index {
        Some(path) => {
            let index = benchmark("loading index", || store::load(path))
                .with_context(|| format!("Failed to load index {}", path.display()))?;
            check_loaded_config(&cli, &index);
            index
        }
        None => {
            let index = scan(&cli, &config)?;
            benchmark("saving index", || store::save(&index, &cli.output))
                .with_context(|| format!("Failed to save index {}", cli.output.display()))?;
            index
        }
    };

    let outcome = benchmark("matching", || find_best_match(&index, &query, &config));
    print_outcome(&outcome, cli.format)
}

/// `-RS` is a two-letter short flag, which clap cannot express; rewrite it to
/// the long form before parsing.
fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| {
            let rewritten = match arg.to_str() {
                Some("-RS") => Some(OsString::from("--region-size")),
                Some(s) => s
                    .strip_prefix("-RS=")
                    .map(|value| OsString::from(format!("--region-size={}", value))),
                None => None,
            };
            rewritten.unwrap_or(arg)
        })
        .collect()
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_filter));
    if verbose {
        builder.target(Target::Stdout);
    }
    builder.init();
}

fn scan(cli: &Cli, config: &MatchConfig) -> Result<Index> {
    debug!("Indexing {}", cli.search_dir.display());
    let progress = ProgressBar::new(0);
    progress.set_style(ProgressStyle::with_template(
        "{spinner:.green} Indexing [{bar:30}] {pos}/{len} {msg}",
    )?);
    progress.enable_steady_tick(Duration::from_millis(100));

    let (index, stats) = benchmark("indexing all images", || {
        build_index(&cli.search_dir, config, &progress)
    })
    .with_context(|| format!("Failed to index {}", cli.search_dir.display()))?;
    debug!(
        "{} images indexed, {} files skipped, {} region entries",
        stats.indexed, stats.skipped, stats.entries
    );
    Ok(index)
}

/// The loaded index decides region size and layout; warn when the command line
/// asked for something else.
fn check_loaded_config(cli: &Cli, index: &Index) {
    if let Some(requested) = cli.region_size {
        if requested != index.region_size() {
            warn!(
                "Index was built with region size {}; ignoring --region-size {}",
                index.region_size(),
                requested
            );
        }
    }
    if cli.legacy_fingerprint && index.layout() != FingerprintLayout::LegacyRgr {
        warn!(
            "Index was built with {:?} fingerprints; ignoring --legacy-fingerprint",
            index.layout()
        );
    }
}

fn print_outcome(outcome: &MatchOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => match outcome {
            MatchOutcome::Exact { image } => println!("Exact Match Found: {}", image),
            MatchOutcome::Sampled { image, score, .. } => {
                println!("Best Match: {} with {} matches.", image, score)
            }
            MatchOutcome::None => println!("No matches found."),
        },
    }
    Ok(())
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    debug!("{} took {:.2?}", label, start.elapsed());
    result
}
