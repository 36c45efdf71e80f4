use bcusim::{
    bcu::Evaluation,
    config::Config,
    sim::Simulator,
    trace::{self, MemoryTrace},
};
use clap::Parser;
use color_eyre::eyre;
use console::style;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(
    version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
    about = "simulate bounds checking of GPU memory traces",
)]
pub struct Options {
    /// YAML config, defaults to the built-in benchmark model.
    #[clap(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// JSON list of memory traces, defaults to the built-in benchmark traces.
    #[clap(short = 't', long = "traces")]
    pub traces: Option<PathBuf>,
    #[clap(long = "max-cycles", default_value = "1000000")]
    pub max_cycles: u64,
    /// Write the report to a file instead of stdout.
    #[clap(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Increase log verbosity.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Serialize)]
struct Report {
    cycles: u64,
    evaluations: Vec<CoreEvaluation>,
    stats: stats::Stats,
}

#[derive(Debug, Serialize)]
struct CoreEvaluation {
    core_id: usize,
    #[serde(flatten)]
    evaluation: Evaluation,
}

/// Accesses of the bounds checking regression kernel.
fn benchmark_traces() -> Vec<MemoryTrace> {
    vec![
        MemoryTrace::load(1, 0xFEFF_FFC8, 4),
        MemoryTrace::load(2, 0xFEFF_FFBC, 4),
        MemoryTrace::store(3, 0xFEFF_FFC8, 4),
        MemoryTrace::load(4, 0x8000_A820, 4),
        MemoryTrace::store(5, 0x8000_A820, 4),
        MemoryTrace::load(6, 0x8000_BA5C, 4),
        MemoryTrace::store(7, 0x8000_BA5C, 4),
        MemoryTrace::load(8, 0xFEFF_FFC8, 4),
    ]
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();
    init_logging(options.verbose);

    let start = std::time::Instant::now();

    let config = match options.config {
        Some(ref path) => Config::from_yaml(path)?,
        None => Config::default(),
    };
    let traces = match options.traces {
        Some(ref path) => trace::parse_traces(path)?,
        None => benchmark_traces(),
    };

    let mut sim = Simulator::new(config)?;
    for trace in traces {
        // only memory accesses are routed through the bounds checking unit
        if trace.first_access().is_none() {
            log::warn!("skipping trace without memory accesses: {}", trace);
            continue;
        }
        sim.push_trace(trace)?;
    }
    let cycles = sim.run_to_completion(options.max_cycles)?;

    let evaluations = sim.take_evaluations();
    for (core_id, evaluation) in &evaluations {
        if evaluation.is_violation() {
            eprintln!(
                "{} core {}: {}",
                style("VIOLATION").red().bold(),
                core_id,
                evaluation
            );
        }
    }

    let report = Report {
        cycles,
        evaluations: evaluations
            .into_iter()
            .map(|(core_id, evaluation)| CoreEvaluation {
                core_id,
                evaluation,
            })
            .collect(),
        stats: sim.stats(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    match options.output {
        Some(ref path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    eprintln!("simulated {} cycles in {:?}", cycles, start.elapsed());
    Ok(())
}
