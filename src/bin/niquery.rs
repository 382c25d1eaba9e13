use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use niquery::bold::{discover_listings, identify_bold};
use niquery::config::{ConfigLoader, ResolvedConfig};
use niquery::error::NiqueryError;
use niquery::features::{extract_features, load_listings};
use niquery::logging::init_logging;
use niquery::output::{OutputMode, StepSummary, print_summary};
use niquery::progress::LogProgress;
use niquery::relevance::filter_relevant;
use niquery::remote::{HttpReaderOptions, HttpTimepointReader, RemoteSource, TimepointReader};
use niquery::selection::select_runs;
use niquery::table::{Table, read_table, write_table};

#[derive(Parser)]
#[command(name = "niquery")]
#[command(about = "Curate neuroimaging catalogue records into a reproducible selection of BOLD runs")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Filter, annotate and select catalogue records")]
    Curate(CurateArgs),
}

#[derive(Args)]
struct CurateArgs {
    #[command(subcommand)]
    command: CurateCommand,
}

#[derive(Subcommand)]
enum CurateCommand {
    #[command(about = "Keep human functional-MRI datasets")]
    Relevant(RelevantArgs),
    #[command(about = "Keep BOLD files of every dataset listing")]
    Bold(BoldArgs),
    #[command(about = "Fetch the timepoint count of every BOLD file")]
    Features(FeaturesArgs),
    #[command(about = "Select runs by timepoint range and per-dataset contribution")]
    Select(SelectArgs),
}

impl CurateCommand {
    fn name(&self) -> &'static str {
        match self {
            CurateCommand::Relevant(_) => "relevant",
            CurateCommand::Bold(_) => "bold",
            CurateCommand::Features(_) => "features",
            CurateCommand::Select(_) => "select",
        }
    }
}

#[derive(Args)]
struct RelevantArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    sep: Option<char>,
}

#[derive(Args)]
struct BoldArgs {
    #[arg(long)]
    listings: Utf8PathBuf,

    #[arg(long)]
    output_dir: Utf8PathBuf,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    sep: Option<char>,
}

#[derive(Args)]
struct FeaturesArgs {
    #[arg(long)]
    input_dir: Utf8PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    failures: PathBuf,

    #[arg(long)]
    remote: Option<String>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    sep: Option<char>,
}

#[derive(Args)]
struct SelectArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    contrib: Option<usize>,

    #[arg(long)]
    min: Option<u64>,

    #[arg(long)]
    max: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    sep: Option<char>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<NiqueryError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &NiqueryError) -> u8 {
    match error {
        NiqueryError::ConfigRead(_)
        | NiqueryError::ConfigParse(_)
        | NiqueryError::InvalidThreshold(_)
        | NiqueryError::InvalidSeparator(_)
        | NiqueryError::InvalidWorkers
        | NiqueryError::UnsupportedRemote(_) => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let Commands::Curate(curate) = cli.command;

    if let Some(path) = init_logging(cli.log_dir.as_deref(), curate.command.name())? {
        tracing::info!("Logging to {}", path.display());
    }

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let summary = match curate.command {
        CurateCommand::Relevant(args) => run_relevant(args, &config)?,
        CurateCommand::Bold(args) => run_bold(args, &config)?,
        CurateCommand::Features(args) => run_features(args, &config)?,
        CurateCommand::Select(args) => run_select(args, &config)?,
    };
    print_summary(&summary, mode).map_err(|err| NiqueryError::Filesystem(err.to_string()))?;
    Ok(())
}

fn run_relevant(args: RelevantArgs, config: &ResolvedConfig) -> Result<StepSummary, NiqueryError> {
    let sep = args.sep.unwrap_or(config.separator);
    let datasets = read_table(&args.input, sep)?;
    let relevant = filter_relevant(&datasets);
    write_table(&args.output, &relevant, sep)?;
    Ok(StepSummary::new("relevant", datasets.len(), relevant.len())
        .with_output(args.output.display().to_string()))
}

fn run_bold(args: BoldArgs, config: &ResolvedConfig) -> Result<StepSummary, NiqueryError> {
    let sep = args.sep.unwrap_or(config.separator);
    let workers = args.workers.unwrap_or(config.max_workers);
    let listings = discover_listings(&args.listings)?;
    let identification = identify_bold(&listings, sep, workers, &LogProgress::default())?;

    let extension = listing_extension(sep);
    for (dataset_id, table) in &identification.datasets {
        let path = args.output_dir.join(format!("{dataset_id}.{extension}"));
        write_table(path.as_std_path(), table, sep)?;
    }
    Ok(StepSummary::from_bold(&identification, listings.len())
        .with_output(args.output_dir.as_str()))
}

fn run_features(args: FeaturesArgs, config: &ResolvedConfig) -> Result<StepSummary, NiqueryError> {
    let sep = args.sep.unwrap_or(config.separator);
    let workers = args.workers.unwrap_or(config.max_workers);
    let source: RemoteSource = match args.remote.as_deref() {
        Some(remote) => remote.parse()?,
        None => config.remote.clone(),
    };

    let (datasets, failed_listings) = load_listings(&discover_listings(&args.input_dir)?, sep);
    let input_rows = datasets.values().map(Table::len).sum();

    let reader = build_reader(&source, config)?;
    let extraction = extract_features(
        &datasets,
        &source,
        &*reader,
        workers,
        &LogProgress::default(),
    )?;

    write_table(&args.failures, &extraction.failures_table(), sep)?;
    let mut summary = StepSummary::from_features(&extraction, input_rows)
        .with_output(args.output.display().to_string());
    summary.failed_listings = failed_listings;
    write_table(&args.output, &extraction.into_run_table(), sep)?;
    Ok(summary)
}

fn run_select(args: SelectArgs, config: &ResolvedConfig) -> Result<StepSummary, NiqueryError> {
    let sep = args.sep.unwrap_or(config.separator);
    let params = &config.selection;
    let runs = read_table(&args.input, sep)?;
    let selected = select_runs(
        &runs,
        args.contrib.unwrap_or(params.contribution_threshold),
        args.min.unwrap_or(params.min_timepoints),
        args.max.unwrap_or(params.max_timepoints),
        args.seed.unwrap_or(params.seed),
    )?;
    write_table(&args.output, &selected, sep)?;
    Ok(StepSummary::new("select", runs.len(), selected.len())
        .with_output(args.output.display().to_string()))
}

fn build_reader(
    source: &RemoteSource,
    config: &ResolvedConfig,
) -> Result<Box<dyn TimepointReader>, NiqueryError> {
    match source {
        RemoteSource::Http { .. } => {
            let reader = HttpTimepointReader::new(HttpReaderOptions {
                range_bytes: config.range_bytes,
                timeout: config.timeout,
                token: config.http_token.clone(),
            })?;
            Ok(Box::new(reader))
        }
        RemoteSource::S3 { .. } => build_s3_reader(config),
    }
}

#[cfg(feature = "s3")]
fn build_s3_reader(config: &ResolvedConfig) -> Result<Box<dyn TimepointReader>, NiqueryError> {
    use niquery::s3::{ObjectStoreTimepointReader, S3ObjectStore};

    let store = S3ObjectStore::from_env(false)?;
    Ok(Box::new(ObjectStoreTimepointReader::with_range_bytes(
        store,
        config.range_bytes,
    )))
}

#[cfg(not(feature = "s3"))]
fn build_s3_reader(_config: &ResolvedConfig) -> Result<Box<dyn TimepointReader>, NiqueryError> {
    Err(NiqueryError::UnsupportedRemote(
        "s3 support not compiled in (enable the `s3` feature)".to_string(),
    ))
}

fn listing_extension(sep: char) -> &'static str {
    if sep == '\t' { "tsv" } else { "csv" }
}
