//! chyron-detect - bill and speaker detection over screenshot manifests

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use chyron_index::api::{ChyronDetector, DetectRequest, DetectorSettings};
use chyron_index::core::legislator::Roster;
use chyron_index::core::pipeline::ocr::{SystemCommandRunner, TesseractOcr};
use chyron_index::core::pipeline::{JsonLinesSink, LogObserver};
use chyron_index::core::region::{DetectionType, RegionCatalog};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "chyron-detect",
    version,
    about = "Detect bills and speakers in legislative video chyrons",
    after_help = "EXAMPLES:\n  \
                  chyron-detect detect --regions regions.json5 --manifest 1234/manifest.json \\\n    \
                  --chamber house --event floor --date 2024-01-15 --mode bill --file-id 1234\n  \
                  chyron-detect batch --regions regions.json5 --roster roster.json jobs.json\n  \
                  chyron-detect resolve --mode speaker --roster roster.json \"Del. Watts (D-39)\"\n\n\
                  Set RUST_LOG=debug for per-screenshot decisions."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one video
    Detect(DetectCommand),
    /// Scan the videos listed in a JSON file of detect requests, in parallel
    Batch(BatchCommand),
    /// Resolve one raw OCR string and print the result as JSON
    Resolve(ResolveCommand),
}

#[derive(Args)]
struct CommonArgs {
    /// Region catalog (JSON5)
    #[arg(long, env = "CHYRON_REGIONS")]
    regions: PathBuf,

    /// Legislator roster (JSON)
    #[arg(long, env = "CHYRON_ROSTER")]
    roster: Option<PathBuf>,

    /// Detector settings (JSON5)
    #[arg(long, env = "CHYRON_SETTINGS")]
    settings: Option<PathBuf>,

    /// JSON Lines output; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DetectCommand {
    #[command(flatten)]
    common: CommonArgs,

    /// Screenshot manifest path or file:// URL
    #[arg(long)]
    manifest: String,

    #[arg(long)]
    chamber: String,

    /// floor, committee or subcommittee
    #[arg(long)]
    event: String,

    /// Meeting date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    /// bill or speaker
    #[arg(long)]
    mode: DetectionType,

    #[arg(long, default_value_t = 0)]
    file_id: u64,

    /// Agenda bill identifiers, comma separated
    #[arg(long, value_delimiter = ',')]
    agenda: Vec<String>,

    /// Roster ids of the meeting's listed speakers, comma separated
    #[arg(long, value_delimiter = ',')]
    speakers: Vec<u64>,
}

#[derive(Args)]
struct BatchCommand {
    #[command(flatten)]
    common: CommonArgs,

    /// JSON list of detect requests
    jobs: PathBuf,
}

#[derive(Args)]
struct ResolveCommand {
    /// bill or speaker
    #[arg(long)]
    mode: DetectionType,

    #[arg(long, env = "CHYRON_ROSTER")]
    roster: Option<PathBuf>,

    /// Raw OCR text
    text: String,
}

fn load_settings(path: Option<&Path>) -> Result<DetectorSettings> {
    match path {
        Some(path) => DetectorSettings::from_path(path).with_context(|| format!("reading settings {:?}", path)),
        None => Ok(DetectorSettings::default()),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating output {:?}", path))?,
        )),
        None => Box::new(std::io::stdout()),
    })
}

fn detector(common: &CommonArgs) -> Result<(ChyronDetector, TesseractOcr<SystemCommandRunner>)> {
    let settings = load_settings(common.settings.as_deref())?;
    let ocr = TesseractOcr::new(SystemCommandRunner, settings.tesseract.clone()).with_units(settings.crop_units);
    let detector = ChyronDetector::create(&common.regions, common.roster.as_deref(), settings)
        .with_context(|| format!("loading regions {:?}", common.regions))?;
    Ok((detector, ocr))
}

fn run_detect(cmd: DetectCommand) -> Result<()> {
    let (detector, ocr) = detector(&cmd.common)?;
    let sink = JsonLinesSink::new(open_output(cmd.common.output.as_deref())?);

    let request = DetectRequest {
        file_id: cmd.file_id,
        chamber: cmd.chamber,
        event_type: cmd.event,
        date: cmd.date,
        detection_type: cmd.mode,
        manifest: cmd.manifest,
        agenda: cmd.agenda,
        speaker_ids: cmd.speakers,
    };

    let summary = detector
        .detect(&request, &ocr, &sink, &LogObserver)
        .with_context(|| format!("detecting in {}", request.manifest))?;
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_batch(cmd: BatchCommand) -> Result<()> {
    let text = std::fs::read_to_string(&cmd.jobs).with_context(|| format!("reading jobs {:?}", cmd.jobs))?;
    let requests: Vec<DetectRequest> =
        serde_json::from_str(&text).with_context(|| format!("parsing jobs {:?}", cmd.jobs))?;

    let (detector, ocr) = detector(&cmd.common)?;
    let sink = JsonLinesSink::new(open_output(cmd.common.output.as_deref())?);

    let summaries = detector.detect_batch(&requests, &ocr, &sink, &LogObserver)?;
    eprintln!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

fn run_resolve(cmd: ResolveCommand) -> Result<()> {
    let roster = match &cmd.roster {
        Some(path) => Roster::from_path(path).with_context(|| format!("loading roster {:?}", path))?,
        None => Roster::default(),
    };
    let detector = ChyronDetector::from_parts(RegionCatalog::empty(), roster, DetectorSettings::default());

    let response = detector.resolve(cmd.mode, &cmd.text);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn main() -> Result<()> {
    chyron_index::init_logging();

    match Cli::parse().command {
        Commands::Detect(cmd) => run_detect(cmd),
        Commands::Batch(cmd) => run_batch(cmd),
        Commands::Resolve(cmd) => run_resolve(cmd),
    }
}
