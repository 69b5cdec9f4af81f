//! Access Selector CLI
//!
//! Scores a batch of satellite access candidates for one UE and prints
//! the winning access plan.
//!
//! Usage:
//!   access-selector --candidates data/candidates.json --service-class data

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Result;
use access_selector::{loader, selector, ScorerConfig, ServiceClass};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ServiceClassArg {
    Emergency,
    Voice,
    Video,
    Data,
    Iot,
    Background,
}

impl From<ServiceClassArg> for ServiceClass {
    fn from(arg: ServiceClassArg) -> Self {
        match arg {
            ServiceClassArg::Emergency => ServiceClass::Emergency,
            ServiceClassArg::Voice => ServiceClass::Voice,
            ServiceClassArg::Video => ServiceClass::Video,
            ServiceClassArg::Data => ServiceClass::Data,
            ServiceClassArg::Iot => ServiceClass::Iot,
            ServiceClassArg::Background => ServiceClass::Background,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "access-selector", about = "Score and select a satellite access candidate")]
struct Args {
    /// Path to access candidates JSON file
    #[arg(short, long)]
    candidates: PathBuf,

    /// Service class driving compatibility requirements and the overload filter
    #[arg(short, long, value_enum, default_value_t = ServiceClassArg::Data)]
    service_class: ServiceClassArg,

    /// Output JSON file for the access plan
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let candidates = loader::load_candidates(&args.candidates)?;
    let service_class: ServiceClass = args.service_class.into();
    let config = ScorerConfig::default();

    let plan = selector::filter_score_select(candidates, service_class, &config)?;

    info!(
        "winner: {} (score={:.3})",
        plan.winner.candidate.satellite_id, plan.winner.composite_score
    );
    if let Some(runner_up) = &plan.runner_up {
        info!(
            "runner-up: {} (score={:.3})",
            runner_up.candidate.satellite_id, runner_up.composite_score
        );
    }

    if let Some(output) = args.output {
        let file = File::create(&output)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &plan)?;
    }

    Ok(())
}
