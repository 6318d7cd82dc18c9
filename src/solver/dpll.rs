use std::ops::{Index, IndexMut};

use crate::formula::{Clause, Cnf, Literal, Model, Variable};

use super::{Budget, BudgetTracker, Error, SolveResult, Solver};

/// Occurrence lists: every clause a literal appears in.
#[derive(Debug)]
struct Occurrences {
    positive: Vec<Vec<usize>>,
    negative: Vec<Vec<usize>>,
}

impl Occurrences {
    fn new(num_variables: usize, clauses: &[Clause]) -> Self {
        let mut occurrences = Occurrences {
            positive: vec![Vec::new(); num_variables],
            negative: vec![Vec::new(); num_variables],
        };

        for (index, clause) in clauses.iter().enumerate() {
            for literal in clause.iter() {
                occurrences[literal].push(index);
            }
        }

        occurrences
    }
}

impl Index<Literal> for Occurrences {
    type Output = Vec<usize>;

    fn index(&self, literal: Literal) -> &Self::Output {
        if literal.positive() {
            &self.positive[literal.index()]
        } else {
            &self.negative[literal.index()]
        }
    }
}

impl IndexMut<Literal> for Occurrences {
    fn index_mut(&mut self, literal: Literal) -> &mut Self::Output {
        if literal.positive() {
            &mut self.positive[literal.index()]
        } else {
            &mut self.negative[literal.index()]
        }
    }
}

/// Literal counters of a clause under the current partial assignment.
#[derive(Clone, Debug, Default)]
struct Counters {
    satisfied: usize,
    falsified: usize,
}

/// Outcome of a subtree of the search.
enum Search {
    Found(Vec<bool>),
    Exhausted,
    OutOfBudget,
}

/// Chronological backtracking solver with counter-based clause tracking.
#[derive(Debug)]
pub struct DpllSolver {
    formula: Cnf,
    budget: Budget,
    occurrences: Occurrences,
    /// Variable index -> assigned value
    assignment: Vec<Option<bool>>,
    /// Clause index -> literal counters
    counters: Vec<Counters>,
    /// Number of clauses with at least one satisfied literal
    satisfied_clauses: usize,
    /// Number of clauses whose literals are all falsified
    falsified_clauses: usize,
    stack: Vec<Literal>,
    /// Number of refuted branches, counted against the conflict budget.
    backtracks: u64,
}

impl DpllSolver {
    pub fn with_budget(formula: Cnf, budget: Budget) -> Self {
        let num_variables = formula.num_variables();

        DpllSolver {
            occurrences: Occurrences::new(num_variables, formula.clauses()),
            assignment: vec![None; num_variables],
            counters: vec![Counters::default(); formula.clauses().len()],
            satisfied_clauses: 0,
            falsified_clauses: 0,
            stack: Vec::with_capacity(num_variables),
            backtracks: 0,
            formula,
            budget,
        }
    }

    /// The unassigned literal of a clause whose other literals are all falsified.
    fn forced_literal(&self, index: usize) -> Option<Literal> {
        let clause = &self.formula.clauses()[index];
        let counters = &self.counters[index];
        if counters.satisfied > 0 || counters.falsified + 1 != clause.len() {
            return None;
        }

        clause
            .iter()
            .find(|literal| literal.partial_value(&self.assignment).is_none())
    }

    /// An unassigned literal whose negation occurs in no unsatisfied clause.
    fn pure_literal(&self) -> Option<Literal> {
        let active = |literal: Literal| {
            self.occurrences[literal]
                .iter()
                .any(|&index| self.counters[index].satisfied == 0)
        };

        (0..self.assignment.len())
            .filter(|&index| self.assignment[index].is_none())
            .filter_map(Variable::from_index)
            .find_map(|variable| {
                let positive = Literal::new(variable, true);
                match (active(positive), active(!positive)) {
                    (true, false) => Some(positive),
                    (false, true) => Some(!positive),
                    _ => None,
                }
            })
    }

    fn first_unassigned(&self) -> Option<Variable> {
        let index = self.assignment.iter().position(Option::is_none)?;
        Variable::from_index(index)
    }

    /// Updates the counters of every clause containing `literal` or its negation.
    /// `assigned` tells whether the literal became true or was just undone.
    fn count(&mut self, literal: Literal, assigned: bool) {
        let clauses = self.formula.clauses();

        for &index in &self.occurrences[literal] {
            let counters = &mut self.counters[index];
            if assigned {
                counters.satisfied += 1;
                if counters.satisfied == 1 {
                    self.satisfied_clauses += 1;
                }
            } else {
                if counters.satisfied == 1 {
                    self.satisfied_clauses -= 1;
                }
                counters.satisfied -= 1;
            }
        }

        for &index in &self.occurrences[!literal] {
            let full = clauses[index].len();
            let counters = &mut self.counters[index];
            if assigned {
                counters.falsified += 1;
                if counters.falsified == full {
                    self.falsified_clauses += 1;
                }
            } else {
                if counters.falsified == full {
                    self.falsified_clauses -= 1;
                }
                counters.falsified -= 1;
            }
        }
    }

    fn push(&mut self, literal: Literal) {
        self.stack.push(literal);
        self.assignment[literal.index()] = Some(literal.positive());
        self.count(literal, true);
    }

    fn pop(&mut self) {
        if let Some(literal) = self.stack.pop() {
            self.assignment[literal.index()] = None;
            self.count(literal, false);
        }
    }

    /// Assigns `literal`, explores the subtree and undoes the assignment unless a model was found.
    fn branch(&mut self, literal: Literal, budget: &BudgetTracker) -> Search {
        self.push(literal);
        let result = self.solve_inner(budget);
        if !matches!(result, Search::Found(_)) {
            self.pop();
        }
        result
    }

    fn solve_inner(&mut self, budget: &BudgetTracker) -> Search {
        if self.satisfied_clauses == self.formula.clauses().len() {
            // Free variables default to true
            let assignment = self
                .assignment
                .iter()
                .map(|assign| assign.unwrap_or(true))
                .collect::<Vec<_>>();

            return Search::Found(assignment);
        } else if self.falsified_clauses > 0 {
            self.backtracks += 1;
            return Search::Exhausted;
        }

        if !budget.within(self.backtracks) {
            return Search::OutOfBudget;
        }

        let forced = (0..self.formula.clauses().len())
            .find_map(|clause_index| self.forced_literal(clause_index));
        if let Some(literal) = forced.or_else(|| self.pure_literal()) {
            return self.branch(literal, budget);
        }

        let variable = match self.first_unassigned() {
            Some(variable) => variable,
            None => return Search::Exhausted,
        };
        let literal = Literal::new(variable, true);

        match self.branch(literal, budget) {
            Search::Exhausted => self.branch(!literal, budget),
            result => result,
        }
    }
}

impl Solver for DpllSolver {
    fn new(formula: Cnf) -> Self {
        DpllSolver::with_budget(formula, Budget::unlimited())
    }

    fn solve(mut self) -> Result<SolveResult, Error> {
        if self.formula.has_empty_clause() {
            return Ok(SolveResult::Unsat);
        }

        let budget = self.budget.start();
        let result = match self.solve_inner(&budget) {
            Search::Found(assignment) => {
                SolveResult::Sat(Model::new(self.formula, assignment))
            }
            Search::Exhausted => SolveResult::Unsat,
            Search::OutOfBudget => SolveResult::Indeterminate,
        };
        debug!("DPLL finished after {} backtracks", self.backtracks);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    #[test]
    fn finds_model() {
        let cnf = parse_str("p cnf 3 3\n1 -2 0\n2 3 0\n-1 -3 0\n").unwrap();
        let result = DpllSolver::new(cnf).solve().unwrap();
        assert!(result.model().unwrap().is_satisfying());
    }

    #[test]
    fn refutes_contradiction() {
        let cnf = parse_str("p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n").unwrap();
        assert!(DpllSolver::new(cnf).solve().unwrap().is_unsat());
    }

    #[test]
    fn empty_clause_is_unsat() {
        let cnf = parse_str("p cnf 1 2\n1 0\n0\n").unwrap();
        assert!(DpllSolver::new(cnf).solve().unwrap().is_unsat());
    }

    #[test]
    fn pure_literal_is_assigned_without_branching() {
        // Branching would try x1 first and then force x2 and x3
        let cnf = parse_str("p cnf 3 2\n-1 2 0\n-1 3 0\n").unwrap();
        let mut solver = DpllSolver::new(cnf);
        let budget = Budget::unlimited().start();

        match solver.solve_inner(&budget) {
            Search::Found(assignment) => assert!(!assignment[0]),
            _ => panic!("expected a model"),
        }
        assert_eq!(solver.stack.len(), 1);
        assert_eq!(solver.backtracks, 0);
    }

    #[test]
    fn respects_backtrack_budget() {
        let cnf = parse_str("p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n").unwrap();
        let solver = DpllSolver::with_budget(cnf, Budget::unlimited().with_max_conflicts(1));
        assert!(matches!(
            solver.solve().unwrap(),
            SolveResult::Indeterminate
        ));
    }
}
