use std::fmt::Display;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::formula::{Cnf, Literal, Model};

use self::{
    clause_db::{ClauseDb, ClauseIdx},
    conflict::{ConflictAnalyzer, SearchState},
    propagate::propagate,
    restart::RestartSchedule,
    trail::Trail,
    vsids::{choose_polarity, VsidsScoring},
};

use super::{Budget, Error, SolveResult, Solver};

pub mod clause_db;
mod conflict;
mod propagate;
mod restart;
pub mod trail;
pub mod vsids;

pub use restart::RestartStrategy;

/// Search parameters, fixed when the solver is constructed.
#[derive(Debug, Clone)]
pub struct CdclConfig {
    pub restart: RestartStrategy,
    /// Variable activity decay factor.
    pub var_decay: f64,
    /// Learned clause activity decay factor.
    pub clause_decay: f64,
    /// Probability of branching on a random variable.
    pub random_var_freq: f64,
    pub seed: u64,
    /// Polarity of a variable that was never assigned.
    pub default_polarity: bool,
    pub phase_saving: bool,
    pub minimize: bool,
    /// Initial learned clause limit relative to the original clause count.
    pub learned_size_factor: f64,
    /// Growth of the learned clause limit after each reduction.
    pub learned_size_growth: f64,
    pub min_learned_limit: usize,
    pub budget: Budget,
}

impl Default for CdclConfig {
    fn default() -> Self {
        CdclConfig {
            restart: RestartStrategy::default(),
            var_decay: 0.95,
            clause_decay: 0.999,
            random_var_freq: 0.0,
            seed: 91_648_253,
            default_polarity: false,
            phase_saving: true,
            minimize: true,
            learned_size_factor: 1.0 / 3.0,
            learned_size_growth: 1.1,
            min_learned_limit: 1000,
            budget: Budget::unlimited(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub restarts: u64,
    pub learned: u64,
    pub removed: u64,
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "decisions: {}, propagations: {}, conflicts: {}, restarts: {}, learned: {}, removed: {}",
            self.decisions,
            self.propagations,
            self.conflicts,
            self.restarts,
            self.learned,
            self.removed
        )
    }
}

/// Final state of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Searching,
    Propagating,
    Conflict(ClauseIdx),
    Sat,
    Unsat,
}

pub struct CdclSolver {
    formula: Cnf,
    config: CdclConfig,
    db: ClauseDb,
    trail: Trail,
    analyzer: ConflictAnalyzer,
    vsids: VsidsScoring,
    restarts: RestartSchedule,
    rng: StdRng,
    learned_limit: f64,
    stats: Stats,
    loaded: bool,
    verdict: Option<Verdict>,
}

impl CdclSolver {
    pub fn with_config(formula: Cnf, config: CdclConfig) -> Self {
        let num_variables = formula.num_variables();
        let initial_scores = formula
            .variable_occurrences()
            .into_iter()
            .map(|count| count as f64)
            .collect::<Vec<_>>();
        let learned_limit = (formula.clauses().len() as f64 * config.learned_size_factor)
            .max(config.min_learned_limit as f64);

        CdclSolver {
            db: ClauseDb::new(num_variables, config.clause_decay),
            trail: Trail::new(num_variables),
            analyzer: ConflictAnalyzer::new(num_variables, config.minimize),
            vsids: VsidsScoring::new(&initial_scores, config.var_decay),
            restarts: RestartSchedule::new(config.restart),
            rng: StdRng::seed_from_u64(config.seed),
            learned_limit,
            stats: Stats::default(),
            loaded: false,
            verdict: None,
            formula,
            config,
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            restarts: self.restarts.restarts(),
            ..self.stats
        }
    }

    /// Runs the search until a verdict is reached or the budget runs out.
    /// A SAT or UNSAT verdict is final. After `Indeterminate` another call resumes
    /// with the learned clauses kept and a fresh budget.
    pub fn run(&mut self) -> Result<Verdict, Error> {
        if let Some(verdict) = self.verdict {
            return Ok(verdict);
        }

        let verdict = if self.formula.has_empty_clause() || !self.load()? {
            Verdict::Unsat
        } else {
            self.search()?
        };

        if verdict != Verdict::Indeterminate {
            self.verdict = Some(verdict);
        }
        info!("{:?} ({})", verdict, self.stats());

        Ok(verdict)
    }

    /// Total assignment after a SAT verdict.
    pub fn assignment(&self) -> Option<Vec<bool>> {
        if self.verdict != Some(Verdict::Sat) {
            return None;
        }

        Some(
            self.trail
                .assignments()
                .iter()
                .map(|value| value.unwrap_or(self.config.default_polarity))
                .collect(),
        )
    }

    /// Moves the original clauses into the database. Units are asserted at level 0.
    /// Returns `false` if two unit clauses contradict each other.
    fn load(&mut self) -> Result<bool, Error> {
        if self.loaded {
            return Ok(true);
        }
        self.loaded = true;

        for clause in self.formula.clauses() {
            if clause.is_tautology() {
                trace!("Skipping tautology {}", clause);
                continue;
            }

            if let [unit] = clause.literals() {
                match self.trail.value(*unit) {
                    None => self.trail.assign(*unit, None)?,
                    Some(true) => (),
                    Some(false) => return Ok(false),
                }
            } else {
                self.db.add(clause.literals().to_vec(), false);
            }
        }

        debug!(
            "Loaded {} clauses and {} unit facts",
            self.db.num_original(),
            self.trail.num_assigned()
        );

        Ok(true)
    }

    fn search(&mut self) -> Result<Verdict, Error> {
        let budget = self.config.budget.start();
        let start_conflicts = self.stats.conflicts;
        let mut state = State::Propagating;

        loop {
            trace!("{:?}", state);
            state = match state {
                State::Propagating => {
                    match propagate(&mut self.db, &mut self.trail, &mut self.stats.propagations)? {
                        Some(conflict) => State::Conflict(conflict),
                        None if self.trail.is_complete() => State::Sat,
                        None => State::Searching,
                    }
                }
                State::Conflict(conflict) => self.resolve_conflict(conflict)?,
                State::Searching => {
                    if !budget.within(self.stats.conflicts - start_conflicts) {
                        debug!(
                            "Budget exhausted after {} conflicts",
                            self.stats.conflicts - start_conflicts
                        );
                        self.backtrack_to(0);
                        return Ok(Verdict::Indeterminate);
                    }
                    if self.restarts.restart_due() {
                        self.restart();
                    }
                    if self.db.num_learned() as f64 >= self.learned_limit {
                        self.reduce_learned();
                    }
                    self.decide()?
                }
                State::Sat => return Ok(Verdict::Sat),
                State::Unsat => return Ok(Verdict::Unsat),
            }
        }
    }

    /// Learns from a conflict, backjumps and asserts the learned clause.
    fn resolve_conflict(&mut self, conflict: ClauseIdx) -> Result<State, Error> {
        self.stats.conflicts += 1;
        self.restarts.on_conflict();

        let level = self.trail.current_level();
        if level == 0 {
            return Ok(State::Unsat);
        }

        let learned = self.analyzer.analyze(
            &SearchState {
                db: &self.db,
                trail: &self.trail,
            },
            level,
            conflict,
            self.trail.current_level_literals(),
        );

        self.vsids.bump_all(&learned.involved);
        for &clause in &learned.resolved {
            self.db.bump_activity(clause);
        }
        self.vsids.decay();
        self.db.decay_activity();

        trace!(
            "Learned {:?}, backjump {} -> {}",
            learned
                .literals
                .iter()
                .map(Literal::to_dimacs)
                .collect::<Vec<_>>(),
            level,
            learned.backjump_level
        );

        self.backtrack_to(learned.backjump_level);

        let asserting = learned.literals[0];
        if learned.literals.len() == 1 {
            self.trail.assign(asserting, None)?;
        } else {
            let clause = self.db.add(learned.literals, true);
            self.db.bump_activity(clause);
            self.stats.learned += 1;
            self.trail.assign(asserting, Some(clause))?;
        }

        Ok(State::Propagating)
    }

    fn backtrack_to(&mut self, level: usize) {
        let vsids = &mut self.vsids;
        self.trail
            .backtrack_to(level, |variable| vsids.insert(variable));
    }

    fn restart(&mut self) {
        debug!(
            "Restart #{} after {} conflicts",
            self.restarts.restarts() + 1,
            self.stats.conflicts
        );
        self.backtrack_to(0);
        self.restarts.restarted();
    }

    fn reduce_learned(&mut self) {
        let trail = &self.trail;
        let removed = self.db.reduce(|clause, literals| {
            trail.antecedent(literals[0].variable()) == Some(clause)
                && trail.value(literals[0]) == Some(true)
        });

        self.stats.removed += removed as u64;
        self.learned_limit *= self.config.learned_size_growth;
        debug!(
            "Removed {} learned clauses, {} left, next limit {:.0}",
            removed,
            self.db.num_learned(),
            self.learned_limit
        );
    }

    /// Next decision literal, or `None` when every variable is assigned.
    fn pick_branch_literal(&mut self) -> Option<Literal> {
        let mut variable = None;
        if self.config.random_var_freq > 0.0 && self.rng.gen::<f64>() < self.config.random_var_freq
        {
            variable = self.vsids.random(&self.trail, &mut self.rng);
        }

        let variable = match variable {
            Some(variable) => variable,
            None => self.vsids.top(&self.trail)?,
        };

        Some(choose_polarity(
            &self.trail,
            variable,
            self.config.phase_saving,
            self.config.default_polarity,
        ))
    }

    /// Opens a new decision level with the next branching literal.
    fn decide(&mut self) -> Result<State, Error> {
        match self.pick_branch_literal() {
            Some(literal) => {
                self.stats.decisions += 1;
                self.trail.new_decision_level();
                self.trail.assign(literal, None)?;
                Ok(State::Propagating)
            }
            None => Ok(State::Sat),
        }
    }
}

impl Solver for CdclSolver {
    fn new(formula: Cnf) -> Self {
        CdclSolver::with_config(formula, CdclConfig::default())
    }

    fn solve(mut self) -> Result<SolveResult, Error> {
        let result = match self.run()? {
            Verdict::Sat => match self.assignment() {
                Some(assignment) => {
                    let model = Model::new(self.formula, assignment);
                    debug_assert!(model.is_satisfying(), "model violates the formula");
                    SolveResult::Sat(model)
                }
                None => SolveResult::Indeterminate,
            },
            Verdict::Unsat => SolveResult::Unsat,
            Verdict::Indeterminate => SolveResult::Indeterminate,
        };

        Ok(result)
    }
}
