use std::collections::BTreeSet;

use crate::formula::{Cnf, Literal, Model, Variable};

use super::{
    resolution::{normalize, resolve},
    Budget, BudgetTracker, Error, SolveResult, Solver,
};

/// Clauses removed by eliminating a variable, kept to extend the model afterwards.
#[derive(Debug)]
struct Elimination {
    variable: Variable,
    clauses: Vec<Vec<Literal>>,
}

enum Outcome {
    Satisfiable,
    Refuted,
    OutOfBudget,
}

/// Davis-Putnam procedure: unit propagation, pure literals and
/// variable elimination by resolution, without any branching.
#[derive(Debug)]
pub struct DpSolver {
    formula: Cnf,
    budget: Budget,
    /// Sorted, tautology free clauses of the current formula
    clauses: BTreeSet<Vec<Literal>>,
    /// Values fixed by the unit and pure literal rules
    assignment: Vec<Option<bool>>,
    eliminated: Vec<Elimination>,
    /// Number of resolvents, counted against the conflict budget.
    resolvents: u64,
}

impl DpSolver {
    pub fn with_budget(formula: Cnf, budget: Budget) -> Self {
        let clauses = formula
            .clauses()
            .iter()
            .filter_map(|clause| normalize(clause.iter()))
            .collect();

        DpSolver {
            assignment: vec![None; formula.num_variables()],
            clauses,
            eliminated: Vec::new(),
            resolvents: 0,
            formula,
            budget,
        }
    }

    /// Makes `literal` true: drops the clauses it satisfies and its negation from the rest.
    fn assign(&mut self, literal: Literal) {
        trace!("Assigning {}", literal);
        self.assignment[literal.index()] = Some(literal.positive());

        self.clauses = std::mem::take(&mut self.clauses)
            .into_iter()
            .filter(|clause| clause.binary_search(&literal).is_err())
            .map(|mut clause| {
                clause.retain(|&other| other != !literal);
                clause
            })
            .collect();
    }

    fn unit_literal(&self) -> Option<Literal> {
        self.clauses
            .iter()
            .find(|clause| clause.len() == 1)
            .map(|clause| clause[0])
    }

    /// Occurrences of every variable, `(positive, negative)`.
    fn polarities(&self) -> Vec<(u64, u64)> {
        let mut polarities = vec![(0, 0); self.assignment.len()];
        for literal in self.clauses.iter().flatten() {
            let counts = &mut polarities[literal.index()];
            if literal.positive() {
                counts.0 += 1;
            } else {
                counts.1 += 1;
            }
        }
        polarities
    }

    fn pure_literals(&self) -> Vec<Literal> {
        self.polarities()
            .into_iter()
            .enumerate()
            .filter_map(|(index, (positive, negative))| match (positive, negative) {
                (0, 0) => None,
                (_, 0) => Variable::from_index(index).map(|variable| Literal::new(variable, true)),
                (0, _) => Variable::from_index(index).map(|variable| Literal::new(variable, false)),
                _ => None,
            })
            .collect()
    }

    /// Variable with the fewest candidate resolvents.
    fn pick_variable(&self) -> Option<Variable> {
        self.polarities()
            .into_iter()
            .enumerate()
            .filter(|&(_, (positive, negative))| positive + negative > 0)
            .min_by_key(|&(_, (positive, negative))| positive * negative)
            .and_then(|(index, _)| Variable::from_index(index))
    }

    /// Replaces every clause mentioning `variable` by their non-tautological resolvents.
    fn eliminate(&mut self, variable: Variable) {
        let pivot = Literal::new(variable, true);
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.clauses)
            .into_iter()
            .partition(|clause| clause.iter().any(|literal| literal.variable() == variable));
        self.clauses = kept.into_iter().collect();

        let (positive, negative): (Vec<_>, Vec<_>) = removed
            .iter()
            .partition(|clause| clause.binary_search(&pivot).is_ok());
        let before = self.resolvents;
        for first in &positive {
            for second in &negative {
                if let Some(resolvent) = resolve(first, second, pivot) {
                    self.resolvents += 1;
                    self.clauses.insert(resolvent);
                }
            }
        }
        trace!(
            "Eliminated {}: {} clauses out, {} resolvents in",
            variable,
            removed.len(),
            self.resolvents - before
        );

        self.eliminated.push(Elimination {
            variable,
            clauses: removed,
        });
    }

    fn run(&mut self, budget: &BudgetTracker) -> Outcome {
        loop {
            if self.clauses.iter().any(Vec::is_empty) {
                return Outcome::Refuted;
            }
            if self.clauses.is_empty() {
                return Outcome::Satisfiable;
            }

            if let Some(literal) = self.unit_literal() {
                self.assign(literal);
                continue;
            }

            // Assigning a pure literal keeps the others pure
            let pure = self.pure_literals();
            if !pure.is_empty() {
                for literal in pure {
                    self.assign(literal);
                }
                continue;
            }

            if !budget.within(self.resolvents) {
                return Outcome::OutOfBudget;
            }
            match self.pick_variable() {
                Some(variable) => self.eliminate(variable),
                None => return Outcome::Satisfiable,
            }
        }
    }

    /// Extends the fixed values to a model, undoing the eliminations last to first.
    /// Free variables default to true.
    fn model(&self) -> Vec<bool> {
        let mut values = self
            .assignment
            .iter()
            .map(|value| value.unwrap_or(true))
            .collect::<Vec<_>>();

        for elimination in self.eliminated.iter().rev() {
            let index = elimination.variable.index();
            values[index] = false;
            let satisfied = elimination.clauses.iter().all(|clause| {
                clause
                    .iter()
                    .any(|literal| values[literal.index()] == literal.positive())
            });
            values[index] = !satisfied;
        }

        values
    }
}

impl Solver for DpSolver {
    fn new(formula: Cnf) -> Self {
        DpSolver::with_budget(formula, Budget::unlimited())
    }

    fn solve(mut self) -> Result<SolveResult, Error> {
        if self.formula.has_empty_clause() {
            return Ok(SolveResult::Unsat);
        }

        let budget = self.budget.start();
        let result = match self.run(&budget) {
            Outcome::Satisfiable => {
                let assignment = self.model();
                SolveResult::Sat(Model::new(self.formula, assignment))
            }
            Outcome::Refuted => SolveResult::Unsat,
            Outcome::OutOfBudget => SolveResult::Indeterminate,
        };
        debug!(
            "DP finished after {} eliminations and {} resolvents",
            self.eliminated.len(),
            self.resolvents
        );

        Ok(result)
    }
}
