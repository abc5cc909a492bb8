/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! `symnmf <goal> <input>` command-line driver.
//!
//! Prints the requested matrix to stdout, four decimals per value. Logs go
//! to stderr. Any failure prints `An Error Has Occurred` to stdout and
//! exits non-zero.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use symnmf::factorize::{EPSILON, MAX_ITERATIONS};
use symnmf::init::DEFAULT_SEED;
use symnmf::loader::load_points;
use symnmf::report::{write_diagonal, write_matrix};
use symnmf::{ArenaConfig, FactorizeConfig, Goal, GoalOutput, Pipeline, PipelineConfig};

const FATAL_MESSAGE: &str = "An Error Has Occurred";

/// Symmetric NMF clustering: similarity, degree, normalized and factorized matrices
#[derive(Parser, Debug)]
#[command(name = "symnmf")]
#[command(version)]
struct Cli {
    /// What to compute: sym, ddg, norm or symnmf
    goal: String,

    /// Points file, one comma-separated point per line
    input: PathBuf,

    /// Number of clusters (required for symnmf)
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Seed for the initial association matrix
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Iteration cap for symnmf
    #[arg(long, default_value_t = MAX_ITERATIONS)]
    max_iterations: usize,

    /// Convergence threshold for symnmf
    #[arg(long, default_value_t = EPSILON)]
    epsilon: f64,

    /// Fail once the run holds more than this many bytes
    #[arg(long)]
    memory_limit: Option<usize>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let goal: Goal = cli.goal.parse()?;
    let config = PipelineConfig {
        arena: ArenaConfig {
            max_bytes: cli.memory_limit,
            ..ArenaConfig::default()
        },
        factorize: FactorizeConfig {
            max_iterations: cli.max_iterations,
            epsilon: cli.epsilon,
        },
        seed: cli.seed,
    };

    let mut pipeline = Pipeline::new(config);
    let points = load_points(pipeline.arena_mut(), &cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    let output = pipeline
        .run(points, goal, cli.clusters)
        .with_context(|| format!("computing {goal}"))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let arena = pipeline.arena();
    let written = match output {
        GoalOutput::Matrix(m) => write_matrix(&mut out, arena, m),
        GoalOutput::Degree(v) => write_diagonal(&mut out, arena, v),
        GoalOutput::Association(result) => write_matrix(&mut out, arena, result.matrix),
    };
    written.and_then(|()| out.flush()).context("writing output")?;

    pipeline.finish();
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            println!("{FATAL_MESSAGE}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            println!("{FATAL_MESSAGE}");
            ExitCode::FAILURE
        }
    }
}
