//! `depthbench` replays a packet log through a reference and a candidate
//! depth pipeline and reports timing and per pixel divergence per frame.
//!
//! Exits 1 if the log cannot be read or is malformed.

use std::{fs::File, io::BufReader, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, ensure};
use clap::Parser;
use depthbench::{
    ATAN2_RESOLUTION, Atan2, Atan2Table, BenchError, DiffBench, Exact, PacketReader,
    PhaseProcessor, ProcessorConfig, Summary,
};
use tracing_subscriber::EnvFilter;

/// Arctangent used by a pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum Atan2Kind {
    /// Library `atan2`
    Exact,
    /// Octant table lookup
    Table,
}

/// Compare two depth pipelines on a recorded packet log.
#[derive(Parser, Debug)]
#[command(name = "depthbench", version)]
struct Args {
    /// Packet log (kct2)
    log: PathBuf,

    /// Arctangent of the reference pipeline: exact or table
    #[arg(long, default_value = "exact")]
    reference: Atan2Kind,

    /// Arctangent of the candidate pipeline: exact or table
    #[arg(long, default_value = "table")]
    candidate: Atan2Kind,

    /// Slope buckets per octant of the atan2 table
    #[arg(long, default_value_t = ATAN2_RESOLUTION)]
    resolution: usize,

    /// Pipeline configuration (JSON), defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame width override
    #[arg(long)]
    width: Option<usize>,

    /// Frame height override
    #[arg(long)]
    height: Option<usize>,

    /// Enable the bilateral filter in both pipelines
    #[arg(long)]
    bilateral_filter: bool,

    /// Enable the edge aware filter in both pipelines
    #[arg(long)]
    edge_aware_filter: bool,
}

fn load_config(args: &Args) -> Result<ProcessorConfig> {
    let mut config: ProcessorConfig = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("could not open config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => ProcessorConfig::default(),
    };
    config.width = args.width.unwrap_or(config.width);
    config.height = args.height.unwrap_or(config.height);
    config.enable_bilateral_filter |= args.bilateral_filter;
    config.enable_edge_aware_filter |= args.edge_aware_filter;
    Ok(config)
}

fn replay<R: Atan2<f32>, C: Atan2<f32>>(
    reader: &mut PacketReader<BufReader<File>>,
    reference: R,
    candidate: C,
    config: ProcessorConfig,
) -> Result<Summary, BenchError> {
    let mut bench = DiffBench::new(
        PhaseProcessor::new(reference, config),
        PhaseProcessor::new(candidate, config),
    );
    bench.run(reader, |report| {
        println!("----------------------------------------");
        println!("{report}");
    })
}

fn run(args: &Args) -> Result<()> {
    ensure!(args.resolution >= 2, "table resolution must be at least 2");
    let config = load_config(args)?;
    log::info!("pipeline configuration: {}", serde_json::to_string(&config)?);

    let mut reader = PacketReader::open(&args.log)
        .with_context(|| format!("could not open {}", args.log.display()))?;

    let table = Atan2Table::<f32>::new(args.resolution);
    log::info!(
        "reference {}, candidate {}, table resolution {}",
        args.reference,
        args.candidate,
        table.resolution()
    );

    let summary = match (args.reference, args.candidate) {
        (Atan2Kind::Exact, Atan2Kind::Exact) => replay(&mut reader, Exact, Exact, config),
        (Atan2Kind::Exact, Atan2Kind::Table) => replay(&mut reader, Exact, &table, config),
        (Atan2Kind::Table, Atan2Kind::Exact) => replay(&mut reader, &table, Exact, config),
        (Atan2Kind::Table, Atan2Kind::Table) => replay(&mut reader, &table, &table, config),
    }
    .context("replay failed")?;
    println!("========================================");
    println!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
