//! Superscalar RISC-V simulator CLI.
//!
//! This binary wraps the `superscalar-core` library. It provides:
//! 1. **Run:** Load a configuration and an assembly program, simulate to completion or
//!    a tick limit, and print the stop reason, statistics or a JSON report.
//! 2. **Check:** Validate a configuration and program without simulating.
//! 3. **Resume:** Continue a run from a JSON snapshot.
//! 4. **ISA:** List the instructions the simulator understands.
//!
//! Logging goes through `tracing`; set `RUST_LOG=superscalar_core=debug` to see
//! pipeline events.

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use superscalar_core::common::error::SimError;
use superscalar_core::stats::SimStats;
use superscalar_core::{Simulation, SimulationConfig, SimulationReport, Snapshot};

#[derive(Parser, Debug)]
#[command(
    name = "superscalar",
    author,
    version,
    about = "Cycle-accurate superscalar out-of-order RISC-V simulator",
    long_about = "Simulate an assembly program on a configurable out-of-order core.\n\nThe configuration file is a JSON simulation configuration (cpuConfig, memoryLocations, entryPoint). A program file, if given, replaces its code.\n\nExamples:\n  superscalar run --program qsort.s --stats\n  superscalar run --config cfg.json --program qsort.s --ticks 500 --json\n  superscalar check --config cfg.json --program qsort.s"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a program.
    Run {
        #[command(flatten)]
        input: Input,

        /// Stop after this many ticks even if the program has not finished.
        #[arg(long)]
        ticks: Option<u64>,

        /// Print the report and statistics as JSON.
        #[arg(long)]
        json: bool,

        /// Print statistics after the run.
        #[arg(long)]
        stats: bool,

        /// Statistics sections to print (summary, pipeline, instruction_mix, branch,
        /// units, memory). Defaults to all.
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,

        /// Write a JSON snapshot of the final state to this path.
        #[arg(long)]
        save_snapshot: Option<PathBuf>,
    },

    /// Validate a configuration and program without simulating.
    Check {
        #[command(flatten)]
        input: Input,
    },

    /// Resume a simulation from a JSON snapshot.
    Resume {
        /// Snapshot written by `run --save-snapshot`.
        snapshot: PathBuf,

        /// Stop at this tick even if the program has not finished.
        #[arg(long)]
        ticks: Option<u64>,

        /// Print statistics after the run.
        #[arg(long)]
        stats: bool,
    },

    /// List supported instructions.
    Isa,
}

#[derive(clap::Args, Debug)]
struct Input {
    /// JSON simulation configuration. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Assembly program; replaces the configuration's code.
    #[arg(short, long)]
    program: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Sim(#[from] SimError),
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    report: SimulationReport,
    stats: &'a SimStats,
    ipc: f64,
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            input,
            ticks,
            json,
            stats,
            sections,
            save_snapshot,
        } => cmd_run(&input, ticks, json, stats, &sections, save_snapshot.as_deref()),
        Commands::Check { input } => cmd_check(&input),
        Commands::Resume {
            snapshot,
            ticks,
            stats,
        } => cmd_resume(&snapshot, ticks, stats),
        Commands::Isa => cmd_isa(),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(input: &Input) -> Result<SimulationConfig, CliError> {
    let mut config = match &input.config {
        Some(path) => serde_json::from_str(&read(path)?).map_err(|source| CliError::Json {
            path: path.clone(),
            source,
        })?,
        None => SimulationConfig::with_code(""),
    };
    if let Some(path) = &input.program {
        config.code = read(path)?;
    }
    Ok(config)
}

fn advance(sim: &mut Simulation, ticks: Option<u64>) -> Result<SimulationReport, SimError> {
    match ticks {
        Some(tick) => sim.simulate_to(tick),
        None => sim.run(),
    }
}

fn cmd_run(
    input: &Input,
    ticks: Option<u64>,
    json: bool,
    stats: bool,
    sections: &[String],
    save_snapshot: Option<&Path>,
) -> Result<(), CliError> {
    let mut sim = Simulation::new(load_config(input)?)?;
    let report = advance(&mut sim, ticks)?;

    if json {
        let output = JsonOutput {
            report,
            stats: sim.stats(),
            ipc: sim.stats().ipc(),
        };
        println!("{}", serde_json::to_string_pretty(&output).map_err(SimError::from)?);
    } else {
        print_report(&sim, &report);
        if stats {
            sim.stats().print_sections(sections);
        }
    }

    if let Some(path) = save_snapshot {
        fs::write(path, sim.snapshot().to_json()?).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), tick = report.tick, "snapshot written");
    }
    Ok(())
}

fn cmd_check(input: &Input) -> Result<(), CliError> {
    let sim = Simulation::new(load_config(input)?)?;
    println!(
        "ok: {} instructions, {} functional units",
        sim.context().program.instructions.len(),
        sim.context().config.f_units.len()
    );
    Ok(())
}

fn cmd_resume(path: &Path, ticks: Option<u64>, stats: bool) -> Result<(), CliError> {
    let snapshot = Snapshot::from_json(&read(path)?)?;
    let mut sim = Simulation::from_snapshot(snapshot)?;
    println!("[*] Resuming at tick {}", sim.tick());
    let report = advance(&mut sim, ticks)?;
    print_report(&sim, &report);
    if stats {
        sim.stats().print();
    }
    Ok(())
}

fn cmd_isa() -> Result<(), CliError> {
    let sim = Simulation::new(SimulationConfig::with_code(""))?;
    for descriptor in sim.isa().instructions() {
        let args: Vec<&str> = descriptor
            .args
            .iter()
            .filter(|a| !a.silent)
            .map(|a| a.name.as_str())
            .collect();
        let class = format!("{:?}", descriptor.class);
        println!("{:<10} {class:<16} {}", descriptor.name, args.join(", "));
    }
    Ok(())
}

fn print_report(sim: &Simulation, report: &SimulationReport) {
    println!(
        "[*] Stopped at tick {} ({:?}) after {} ticks",
        report.tick, report.stop_reason, report.ticks_simulated
    );
    if let Some(exception) = &sim.state().status.exception {
        println!(
            "    exception at pc {:#x}: {}",
            exception.pc, exception.exception
        );
    }
    println!(
        "    committed {} instructions, IPC {:.4}",
        sim.stats().committed,
        sim.stats().ipc()
    );
}
