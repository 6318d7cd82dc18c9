use std::time::{Duration, Instant};

use crate::formula::{Cnf, Literal, Model};
use crate::prelude::*;

pub mod cdcl;
mod dp;
mod dpll;
mod resolution;

pub use cdcl::{CdclConfig, CdclSolver, RestartStrategy, Stats, Verdict};
pub use dp::DpSolver;
pub use dpll::DpllSolver;
pub use resolution::ResolutionSolver;

/// Internal invariant violations. Reaching one of these indicates a solver bug,
/// never a property of the input formula.
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Literal {} is assigned while its negation already holds", literal))]
    ConflictingAssignment { literal: Literal },
    #[snafu(display("Literal {} is assigned twice", literal))]
    AlreadyAssigned { literal: Literal },
}

/// Verdict of a solver run.
#[derive(Debug)]
pub enum SolveResult {
    /// The formula is satisfiable; the model assigns every variable.
    Sat(Model),
    /// The formula is unsatisfiable.
    Unsat,
    /// The resource budget ran out before a verdict was reached.
    Indeterminate,
}

impl SolveResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SolveResult::Sat(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SolveResult::Unsat)
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            SolveResult::Sat(model) => Some(model),
            _ => None,
        }
    }
}

/// Caller supplied resource limits, checked before every decision or resolution step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
    /// Maximum number of conflicts.
    /// DPLL counts backtracks instead, DP and resolution count resolvents.
    pub max_conflicts: Option<u64>,
    /// Wall-clock limit measured from the start of `solve`.
    pub timeout: Option<Duration>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Default::default()
    }

    pub fn with_max_conflicts(mut self, max_conflicts: u64) -> Self {
        self.max_conflicts = Some(max_conflicts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fixes the deadline of a run that starts now.
    pub(crate) fn start(&self) -> BudgetTracker {
        BudgetTracker {
            max_conflicts: self.max_conflicts,
            deadline: self.timeout.map(|timeout| Instant::now() + timeout),
        }
    }
}

pub(crate) struct BudgetTracker {
    max_conflicts: Option<u64>,
    deadline: Option<Instant>,
}

impl BudgetTracker {
    pub fn within(&self, conflicts: u64) -> bool {
        self.max_conflicts.map_or(true, |max| conflicts < max)
            && self.deadline.map_or(true, |deadline| Instant::now() < deadline)
    }
}

pub trait Solver {
    /// Creates a new solver instance.
    fn new(formula: Cnf) -> Self;

    /// Solves a CNF SAT problem with the solver.
    fn solve(self) -> Result<SolveResult, Error>;
}
