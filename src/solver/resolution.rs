use std::{cmp::Reverse, collections::BinaryHeap};

use crate::formula::{Cnf, Literal, Model};

use super::{Budget, BudgetTracker, Error, SolveResult, Solver};

/// Sorts and deduplicates literals, returns `None` for a tautology.
pub(super) fn normalize(literals: impl IntoIterator<Item = Literal>) -> Option<Vec<Literal>> {
    let mut literals = literals.into_iter().collect::<Vec<_>>();
    literals.sort_unstable();
    literals.dedup();

    // Complementary literals are adjacent once sorted
    if literals
        .windows(2)
        .any(|pair| pair[0].variable() == pair[1].variable())
    {
        None
    } else {
        Some(literals)
    }
}

/// Resolvent of two sorted clauses on the variable of `pivot`.
pub(super) fn resolve(first: &[Literal], second: &[Literal], pivot: Literal) -> Option<Vec<Literal>> {
    normalize(
        first
            .iter()
            .chain(second)
            .copied()
            .filter(|literal| literal.variable() != pivot.variable()),
    )
}

/// Both clauses sorted.
fn subsumes(smaller: &[Literal], larger: &[Literal]) -> bool {
    smaller.len() <= larger.len()
        && smaller
            .iter()
            .all(|literal| larger.binary_search(literal).is_ok())
}

/// The literal of `first` whose negation is in `second`, if it is the only such literal.
/// Clauses clashing on two variables only have tautological resolvents.
fn single_clash(first: &[Literal], second: &[Literal]) -> Option<Literal> {
    let mut clashes = first
        .iter()
        .filter(|&&literal| second.binary_search(&!literal).is_ok());

    match (clashes.next(), clashes.next()) {
        (Some(&literal), None) => Some(literal),
        _ => None,
    }
}

enum Saturation {
    Refuted,
    Saturated,
    OutOfBudget,
}

/// Saturates the clause set under resolution, shortest clauses first,
/// discarding subsumed clauses along the way.
#[derive(Debug)]
pub struct ResolutionSolver {
    formula: Cnf,
    budget: Budget,
    /// Clauses already resolved against each other
    processed: Vec<Vec<Literal>>,
    queue: BinaryHeap<Reverse<(usize, Vec<Literal>)>>,
    /// Number of resolvents, counted against the conflict budget.
    resolvents: u64,
}

impl ResolutionSolver {
    pub fn with_budget(formula: Cnf, budget: Budget) -> Self {
        let queue = formula
            .clauses()
            .iter()
            .filter_map(|clause| normalize(clause.iter()))
            .map(|literals| Reverse((literals.len(), literals)))
            .collect();

        ResolutionSolver {
            formula,
            budget,
            processed: Vec::new(),
            queue,
            resolvents: 0,
        }
    }

    fn saturate(&mut self, budget: &BudgetTracker) -> Saturation {
        while let Some(Reverse((_, given))) = self.queue.pop() {
            if given.is_empty() {
                return Saturation::Refuted;
            }
            if self
                .processed
                .iter()
                .any(|clause| subsumes(clause, &given))
            {
                continue;
            }
            if !budget.within(self.resolvents) {
                return Saturation::OutOfBudget;
            }

            self.processed.retain(|clause| !subsumes(&given, clause));
            for clause in &self.processed {
                let resolvent = single_clash(&given, clause)
                    .and_then(|pivot| resolve(&given, clause, pivot));
                if let Some(resolvent) = resolvent {
                    self.resolvents += 1;
                    self.queue.push(Reverse((resolvent.len(), resolvent)));
                }
            }
            self.processed.push(given);
        }

        Saturation::Saturated
    }

    /// Assigns the variables in index order, each with a value that falsifies no
    /// saturated clause. A saturated set without the empty clause always admits one.
    fn model(&self) -> Vec<bool> {
        let num_variables = self.formula.num_variables();

        // Clauses grouped by their largest variable
        let mut by_last = vec![Vec::new(); num_variables];
        for clause in &self.processed {
            if let Some(last) = clause.last() {
                by_last[last.index()].push(clause);
            }
        }

        let mut assignment = vec![None; num_variables];
        for (index, clauses) in by_last.iter().enumerate() {
            assignment[index] = Some(false);
            let falsified = clauses.iter().any(|clause| {
                clause
                    .iter()
                    .all(|literal| literal.partial_value(&assignment) == Some(false))
            });
            if falsified {
                assignment[index] = Some(true);
            }
        }

        assignment
            .into_iter()
            .map(|value| value.unwrap_or_default())
            .collect()
    }
}

impl Solver for ResolutionSolver {
    fn new(formula: Cnf) -> Self {
        ResolutionSolver::with_budget(formula, Budget::unlimited())
    }

    fn solve(mut self) -> Result<SolveResult, Error> {
        if self.formula.has_empty_clause() {
            return Ok(SolveResult::Unsat);
        }

        let budget = self.budget.start();
        let result = match self.saturate(&budget) {
            Saturation::Refuted => SolveResult::Unsat,
            Saturation::Saturated => {
                let assignment = self.model();
                SolveResult::Sat(Model::new(self.formula, assignment))
            }
            Saturation::OutOfBudget => SolveResult::Indeterminate,
        };
        debug!(
            "Resolution finished after {} resolvents, {} clauses kept",
            self.resolvents,
            self.processed.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formula::Clause, parser::parse_str};

    fn literals(values: &[i64]) -> Vec<Literal> {
        Clause::from_dimacs(values).iter().collect()
    }

    #[test]
    fn resolvent_drops_pivot() {
        let first = normalize(literals(&[1, 2])).unwrap();
        let second = normalize(literals(&[-1, 3, 2])).unwrap();
        let pivot = single_clash(&first, &second).unwrap();

        assert_eq!(pivot.to_dimacs(), 1);
        assert_eq!(
            resolve(&first, &second, pivot).unwrap(),
            normalize(literals(&[2, 3])).unwrap()
        );
    }

    #[test]
    fn double_clash_is_skipped() {
        let first = normalize(literals(&[1, 2])).unwrap();
        let second = normalize(literals(&[-1, -2])).unwrap();
        assert!(single_clash(&first, &second).is_none());
        assert!(normalize(literals(&[3, -3])).is_none());
    }

    #[test]
    fn finds_model() {
        let cnf = parse_str("p cnf 3 3\n1 -2 0\n2 3 0\n-1 -3 0\n").unwrap();
        let result = ResolutionSolver::new(cnf).solve().unwrap();
        assert!(result.model().unwrap().is_satisfying());
    }

    #[test]
    fn refutes_contradiction() {
        let cnf = parse_str("p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n").unwrap();
        assert!(ResolutionSolver::new(cnf).solve().unwrap().is_unsat());
    }

    #[test]
    fn empty_clause_is_unsat() {
        let cnf = parse_str("p cnf 1 2\n1 0\n0\n").unwrap();
        assert!(ResolutionSolver::new(cnf).solve().unwrap().is_unsat());
    }

    #[test]
    fn subsumed_clauses_are_dropped() {
        let cnf = parse_str("p cnf 2 2\n1 2 0\n1 0\n").unwrap();
        let mut solver = ResolutionSolver::new(cnf);

        assert!(matches!(
            solver.saturate(&Budget::unlimited().start()),
            Saturation::Saturated
        ));
        assert_eq!(solver.processed, vec![literals(&[1])]);
        assert!(solver.model()[0]);
    }

    #[test]
    fn respects_resolvent_budget() {
        let cnf = parse_str("p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n").unwrap();
        let solver = ResolutionSolver::with_budget(cnf, Budget::unlimited().with_max_conflicts(2));
        assert!(matches!(
            solver.solve().unwrap(),
            SolveResult::Indeterminate
        ));
    }
}
