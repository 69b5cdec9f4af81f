//! `ntn-core` reference CLI (spec.md §6): drives the per-UE orchestrator
//! loop against a TLE batch and an observer location, emitting Prediction
//! and Event Records to the configured sink.
//!
//! ```text
//! ntn-core run --observer-lat <deg> --observer-lon <deg> --observer-alt <m>
//!              --tle <path> --tick-ms <n> --min-elev <deg>
//!              --ues <json-file> --sink <stdout|unix-socket:path>
//! Exit codes: 0 ok; 2 bad config; 3 TLE fetch failed; 4 runtime panic
//! Environment: NTN_LOG=<level>, NTN_WORKERS=<n>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ntn_core::api::StaticTleSource;
use ntn_core::sink::StdoutSink;
use ntn_core::{Core, CoreError, DecisionSink, UeConfig, UeTaskState};
use orbital_mechanics::Observer;
use serde::Deserialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ntn-core", about = "NTN satellite handover decision core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the orchestrator against a TLE batch and a UE roster.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[arg(long = "observer-lat")]
    observer_lat: f64,
    #[arg(long = "observer-lon")]
    observer_lon: f64,
    #[arg(long = "observer-alt", default_value_t = 0.0)]
    observer_alt: f64,

    /// Path to a TLE batch file. URL fetch is not implemented by this
    /// reference binary; a real deployment wires a `TleSource` that
    /// fetches from CelesTrak/Space-Track instead.
    #[arg(long)]
    tle: PathBuf,

    #[arg(long = "tick-ms", default_value_t = 10_000)]
    tick_ms: u64,

    #[arg(long = "min-elev", default_value_t = 10.0)]
    min_elev: f64,

    /// JSON array of `{ue_id, service_class, required_bandwidth_mbps}`.
    #[arg(long)]
    ues: PathBuf,

    /// `stdout` or `unix-socket:<path>` (accepted but not wired — see
    /// spec.md §6, the façade protocol is an external-collaborator
    /// concern).
    #[arg(long, default_value = "stdout")]
    sink: String,
}

#[derive(Debug, Deserialize)]
struct UeSpec {
    ue_id: String,
    service_class: access_selector::ServiceClass,
    required_bandwidth_mbps: f64,
}

fn build_sink(spec: &str) -> anyhow::Result<Arc<dyn DecisionSink>> {
    if spec == "stdout" {
        return Ok(Arc::new(StdoutSink::new()));
    }
    if let Some(path) = spec.strip_prefix("unix-socket:") {
        bail!(
            "unix-socket sink ({path}) is accepted by the CLI parser but not implemented by this \
             reference binary; the wire protocol is an external-collaborator concern"
        );
    }
    bail!("unknown sink {spec:?}, expected \"stdout\" or \"unix-socket:<path>\"")
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    if !(-90.0..=90.0).contains(&args.observer_lat) {
        return Err(CoreError::BadConfig(format!("observer-lat {} out of [-90, 90]", args.observer_lat)).into());
    }
    if !(-180.0..=180.0).contains(&args.observer_lon) {
        return Err(CoreError::BadConfig(format!("observer-lon {} out of [-180, 180]", args.observer_lon)).into());
    }

    let sink = build_sink(&args.sink).map_err(|e| CoreError::BadConfig(e.to_string()))?;

    let observer = Observer {
        geodetic_latitude_deg: args.observer_lat,
        geodetic_longitude_deg: args.observer_lon,
        altitude_m: args.observer_alt,
        min_elevation_deg: args.min_elev,
    };

    let core = Arc::new(Core::new(observer, Arc::new(signal_model::NoAtmosphericLoss), sink));

    let tle_text = std::fs::read_to_string(&args.tle)
        .with_context(|| format!("reading TLE file {:?}", args.tle))
        .map_err(|e| CoreError::TleFetchFailed { constellation: "default".to_string(), reason: e.to_string() })?;
    let tle_source = StaticTleSource::new(&tle_text);
    let lines = tle_source
        .fetch_latest("default")
        .map_err(|e| CoreError::TleFetchFailed { constellation: "default".to_string(), reason: e.to_string() })?;
    core.refresh_tle(&lines.join("\n")).await?;

    let ue_specs_text = std::fs::read_to_string(&args.ues)
        .with_context(|| format!("reading UE roster {:?}", args.ues))
        .map_err(|e| CoreError::BadConfig(e.to_string()))?;
    let ue_specs: Vec<UeSpec> = serde_json::from_str(&ue_specs_text).map_err(|e| CoreError::BadConfig(e.to_string()))?;
    if ue_specs.is_empty() {
        return Err(CoreError::BadConfig("--ues roster is empty".to_string()).into());
    }

    let delta_t_s = (args.tick_ms as f64) / 1000.0;
    let mut handles = Vec::new();
    for spec in ue_specs {
        core.register_ue(UeConfig {
            ue_id: spec.ue_id.clone(),
            service_class: spec.service_class,
            required_bandwidth_mbps: spec.required_bandwidth_mbps,
        })
        .await;

        let resolver = core.access_resolver();
        let state = UeTaskState::new(spec.ue_id.clone(), delta_t_s);
        let core_for_task = core.clone();
        info!("starting orchestrator task for UE {}", spec.ue_id);
        handles.push(tokio::spawn(core_for_task.run_forever(resolver, state)));
    }

    for handle in handles {
        handle.await.context("UE orchestrator task panicked")?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = std::env::var("NTN_LOG").unwrap_or_else(|_| "info".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }

    let workers: usize = std::env::var("NTN_WORKERS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);
    let runtime = match tokio::runtime::Builder::new_multi_thread().worker_threads(workers.max(1)).enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to build tokio runtime: {e}");
            return ExitCode::from(4);
        }
    };

    let Command::Run(args) = cli.command;
    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if let Some(core_err) = e.downcast_ref::<CoreError>() {
                return match core_err {
                    CoreError::BadConfig(msg) => {
                        eprintln!("bad configuration: {msg}");
                        ExitCode::from(2)
                    }
                    CoreError::TleFetchFailed { constellation, reason } => {
                        eprintln!("TLE fetch failed for {constellation}: {reason}");
                        ExitCode::from(3)
                    }
                    other => {
                        eprintln!("runtime error: {other}");
                        ExitCode::from(4)
                    }
                };
            }
            eprintln!("runtime error: {e:#}");
            ExitCode::from(4)
        }
    }
}
