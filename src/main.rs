#[macro_use]
extern crate log;

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use cdclite::{
    formula::{Clause, Cnf, Model},
    parser::{self, parse_file},
    prelude::*,
    report::{formula_summary, result_summary, Report},
    solver::{
        self, Budget, CdclConfig, CdclSolver, DpSolver, DpllSolver, ResolutionSolver,
        RestartStrategy, SolveResult, Solver,
    },
};
use clap::{ArgAction, Parser, ValueEnum};
use pretty_env_logger::formatted_builder;

/// Solver backend, or restart policy of the CDCL engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// CDCL with Luby restarts
    #[value(aliases = ["luby", "m22", "minisat22", "glucose3", "cadical"])]
    Cdcl,
    /// CDCL with geometrically growing restart intervals
    Geometric,
    /// CDCL without restarts
    NoRestart,
    /// Chronological backtracking DPLL
    Dpll,
    /// Davis-Putnam variable elimination
    Dp,
    /// Resolution saturation
    #[value(alias = "resolution")]
    Res,
}

#[derive(Debug, Parser)]
#[command(name = "cdclite", version, about = "Conflict-driven clause learning SAT solver")]
struct Cli {
    /// DIMACS CNF file, optionally gzip compressed
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Solver backend or restart strategy
    #[arg(short, long, value_enum, default_value = "cdcl")]
    solver: Strategy,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    timeout: Option<Duration>,

    /// Give up after this many conflicts (backtracks or resolvents for the other backends)
    #[arg(long, value_name = "N")]
    conflicts: Option<u64>,

    /// Seed of the random decision generator
    #[arg(long)]
    seed: Option<u64>,

    /// Probability of a random branching decision
    #[arg(long, value_name = "F")]
    random_freq: Option<f64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{}", e))?;
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(format!("'{}' is not a non-negative number of seconds", value))
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Input file '{}' does not exist", path.display()))]
    MissingInput { path: PathBuf },
    #[snafu(display("Failed to parse CNF"))]
    ParserError { source: parser::Error },
    #[snafu(display("Solver failed"))]
    SolverError { source: solver::Error },
    #[snafu(display("Model does not satisfy clause {:?}", clause))]
    InvalidModel { clause: Clause },
    #[snafu(display("Failed to initialize the logger"))]
    LoggerError { source: log::SetLoggerError },
}

impl Cli {
    fn budget(&self) -> Budget {
        Budget {
            max_conflicts: self.conflicts,
            timeout: self.timeout,
        }
    }

    fn cdcl_config(&self) -> CdclConfig {
        let defaults = CdclConfig::default();
        let restart = match self.solver {
            Strategy::Geometric => RestartStrategy::Geometric {
                first: 100,
                factor: 1.5,
            },
            Strategy::NoRestart => RestartStrategy::Never,
            _ => defaults.restart,
        };

        CdclConfig {
            restart,
            seed: self.seed.unwrap_or(defaults.seed),
            random_var_freq: self.random_freq.unwrap_or(defaults.random_var_freq),
            budget: self.budget(),
            ..defaults
        }
    }
}

fn solve(cli: &Cli, formula: Cnf) -> Result<SolveResult, Error> {
    let result = match cli.solver {
        Strategy::Dpll => DpllSolver::with_budget(formula, cli.budget()).solve(),
        Strategy::Dp => DpSolver::with_budget(formula, cli.budget()).solve(),
        Strategy::Res => ResolutionSolver::with_budget(formula, cli.budget()).solve(),
        _ => CdclSolver::with_config(formula, cli.cdcl_config()).solve(),
    };

    result.context(SolverError)
}

fn verify(model: &Model) -> Result<(), Error> {
    match model.unsatisfied_clause() {
        Some(clause) => InvalidModel {
            clause: clause.clone(),
        }
        .fail(),
        None => Ok(()),
    }
}

fn load(path: &Path) -> Result<Cnf, Error> {
    ensure!(
        path.is_file(),
        MissingInput {
            path: path.to_owned()
        }
    );

    parse_file(path).context(ParserError)
}

fn init_logger(verbose: u8) -> Result<(), Error> {
    let mut builder = formatted_builder();

    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        match verbose {
            0 if cfg!(debug_assertions) => builder.parse_filters("cdclite=debug"),
            0 => builder.parse_filters("cdclite=warn"),
            1 => builder.parse_filters("cdclite=info"),
            2 => builder.parse_filters("cdclite=debug"),
            _ => builder.parse_filters("cdclite=trace"),
        };
    }

    builder.try_init().context(LoggerError)
}

fn main() -> Result<(), Report> {
    let cli = Cli::parse();
    init_logger(cli.verbose)?;

    let formula = load(&cli.input)?;
    println!("{}", formula_summary(&formula));
    info!("Solving {} with {:?}", cli.input.display(), cli.solver);

    let start = Instant::now();
    let result = solve(&cli, formula)?;
    let elapsed = start.elapsed();

    if let SolveResult::Sat(model) = &result {
        verify(model)?;
    }
    println!("{}", result_summary(&result, elapsed));

    Ok(())
}
