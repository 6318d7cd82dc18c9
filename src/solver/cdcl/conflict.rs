use std::mem::take;

use crate::formula::{Literal, Variable};

use super::clause_db::{ClauseDb, ClauseIdx};
use super::trail::Trail;

pub trait ConflictDataProvider {
    /// Returns the current value assigned to a variable.
    fn value(&self, variable: Variable) -> bool;

    /// Returns the decision level of a variable.
    fn level(&self, variable: Variable) -> usize;

    /// Returns the antecedent clause of a variable.
    /// `None` if the variable is a decision variable.
    fn antecedent(&self, variable: Variable) -> Option<ClauseIdx>;

    /// Returns the literals of a clause.
    fn clause(&self, clause: ClauseIdx) -> &[Literal];
}

/// Read-only view of the search state used during analysis.
pub struct SearchState<'a> {
    pub db: &'a ClauseDb,
    pub trail: &'a Trail,
}

impl ConflictDataProvider for SearchState<'_> {
    fn value(&self, variable: Variable) -> bool {
        self.trail.variable_value(variable).unwrap_or(false)
    }

    fn level(&self, variable: Variable) -> usize {
        self.trail.level(variable)
    }

    fn antecedent(&self, variable: Variable) -> Option<ClauseIdx> {
        self.trail.antecedent(variable)
    }

    fn clause(&self, clause: ClauseIdx) -> &[Literal] {
        self.db.literals(clause)
    }
}

/// Result of First-UIP conflict analysis.
#[derive(Debug)]
pub struct LearnedClause {
    /// `literals[0]` is the negated UIP. If present, `literals[1]` has the highest level
    /// among the remaining literals.
    pub literals: Vec<Literal>,
    /// Level to backjump to before asserting `literals[0]`.
    pub backjump_level: usize,
    /// Variables that took part in the resolution.
    pub involved: Vec<Variable>,
    /// Clauses resolved during the analysis, the conflicting clause first.
    pub resolved: Vec<ClauseIdx>,
}

pub struct ConflictAnalyzer {
    /// Bitmap to check if each variable is previously seen.
    seen: Vec<bool>,
    /// A queue that records seen variables.
    seen_queue: Vec<Variable>,
    /// A clause to learn
    recorded: Vec<Literal>,
    /// Clauses used as resolution premises
    resolved: Vec<ClauseIdx>,
    /// Unresolved variables on the current level
    unresolved_on_current_level: usize,
    /// Drop literals implied by the rest of the learned clause
    minimize: bool,
}

impl ConflictAnalyzer {
    pub fn new(num_variables: usize, minimize: bool) -> Self {
        ConflictAnalyzer {
            seen: vec![false; num_variables],
            seen_queue: Vec::new(),
            recorded: Vec::new(),
            resolved: Vec::new(),
            unresolved_on_current_level: 0,
            minimize,
        }
    }

    fn finalize<P>(&mut self, data_provider: &P) -> LearnedClause
    where
        P: ConflictDataProvider,
    {
        if self.minimize {
            self.minimize_recorded(data_provider);
        }

        for &var in &self.seen_queue {
            self.seen[var.index()] = false;
        }
        let involved = take(&mut self.seen_queue);
        let mut literals = take(&mut self.recorded);
        let resolved = take(&mut self.resolved);
        self.unresolved_on_current_level = 0;

        let backjump_level = if literals.len() > 1 {
            // Move the literal with the highest level right after the UIP
            let (position, level) = literals
                .iter()
                .enumerate()
                .skip(1)
                .map(|(position, literal)| (position, data_provider.level(literal.variable())))
                .max_by_key(|&(_, level)| level)
                .unwrap_or((1, 0));
            literals.swap(1, position);
            level
        } else {
            0
        };

        LearnedClause {
            literals,
            backjump_level,
            involved,
            resolved,
        }
    }

    /// Removes every recorded literal whose antecedent is covered by the other literals.
    /// The UIP in front is never removed.
    fn minimize_recorded<P>(&mut self, data_provider: &P)
    where
        P: ConflictDataProvider,
    {
        let seen = &self.seen;
        let mut kept = 1;
        for position in 1..self.recorded.len() {
            let literal = self.recorded[position];
            let redundant = match data_provider.antecedent(literal.variable()) {
                Some(clause) => data_provider.clause(clause).iter().all(|other| {
                    other.variable() == literal.variable()
                        || seen[other.index()]
                        || data_provider.level(other.variable()) == 0
                }),
                None => false,
            };

            if !redundant {
                self.recorded[kept] = literal;
                kept += 1;
            }
        }
        self.recorded.truncate(kept);
    }

    /// Mark the variable, return true if the variable is previously unseen.
    fn mark_if_unseen(&mut self, variable: Variable) -> bool {
        if self.seen[variable.index()] {
            false
        } else {
            self.seen[variable.index()] = true;
            self.seen_queue.push(variable);
            true
        }
    }

    fn add_clause<P>(&mut self, current_level: usize, data_provider: &P, clause: ClauseIdx)
    where
        P: ConflictDataProvider,
    {
        self.resolved.push(clause);
        for &literal in data_provider.clause(clause) {
            if self.mark_if_unseen(literal.variable()) {
                let literal_level = data_provider.level(literal.variable());
                if literal_level == current_level {
                    self.unresolved_on_current_level += 1;
                } else if literal_level != 0 {
                    self.recorded.push(literal);
                }
            }
        }
    }

    /// Derives the First-UIP clause of a conflict at `current_level` (which must be > 0).
    /// `literals` are the literals assigned at the current level, in chronological order.
    pub fn analyze<P>(
        &mut self,
        data_provider: &P,
        current_level: usize,
        conflicting_clause: ClauseIdx,
        literals: &[Literal],
    ) -> LearnedClause
    where
        P: ConflictDataProvider,
    {
        debug_assert!(current_level > 0);

        // Reserve the slot of the UIP
        self.recorded.push(literals[0]);
        self.add_clause(current_level, data_provider, conflicting_clause);

        for literal in literals.iter().rev().copied() {
            let variable = literal.variable();
            if self.seen[variable.index()] {
                self.unresolved_on_current_level -= 1;
                if self.unresolved_on_current_level == 0 {
                    // First UIP reached
                    self.recorded[0] = Literal::new(variable, !data_provider.value(variable));
                    return self.finalize(data_provider);
                }

                // If this was not UIP, mark its antecedents
                match data_provider.antecedent(variable) {
                    Some(antecedent) => self.add_clause(current_level, data_provider, antecedent),
                    None => break,
                }
            }
        }

        // The decision literal opens the level and is always a UIP
        unreachable!("conflict analysis passed the decision literal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::cdcl::propagate::propagate;

    fn lit(value: i64) -> Literal {
        Literal::from_dimacs(value).unwrap()
    }

    fn lits(values: &[i64]) -> Vec<Literal> {
        values.iter().map(|&value| lit(value)).collect()
    }

    fn dimacs(literals: &[Literal]) -> Vec<i64> {
        let mut values = literals.iter().map(Literal::to_dimacs).collect::<Vec<_>>();
        values[1..].sort_unstable();
        values
    }

    /// Decides the given literals one level at a time, propagating after each,
    /// and returns the conflicting clause.
    fn run_until_conflict(db: &mut ClauseDb, trail: &mut Trail, decisions: &[i64]) -> ClauseIdx {
        let mut propagations = 0;
        for &decision in decisions {
            trail.new_decision_level();
            trail.assign(lit(decision), None).unwrap();
            if let Some(conflict) = propagate(db, trail, &mut propagations).unwrap() {
                return conflict;
            }
        }
        panic!("no conflict");
    }

    #[test]
    fn learns_first_uip() {
        // x1@1, x2@2, then x3@3 implies x4, x5 and a conflict on (¬x4 ∨ ¬x5 ∨ ¬x2).
        // x4 is the first UIP, learned clause is (¬x4 ∨ ¬x2) with backjump level 2.
        let mut db = ClauseDb::new(6, 0.999);
        let mut trail = Trail::new(6);
        db.add(lits(&[-3, 4]), false);
        db.add(lits(&[-4, -1, 5]), false);
        db.add(lits(&[-4, -5, -2]), false);

        let conflict = run_until_conflict(&mut db, &mut trail, &[1, 2, 3]);
        let mut analyzer = ConflictAnalyzer::new(6, false);
        let learned = analyzer.analyze(
            &SearchState {
                db: &db,
                trail: &trail,
            },
            trail.current_level(),
            conflict,
            trail.current_level_literals(),
        );

        assert_eq!(dimacs(&learned.literals), vec![-4, -2, -1]);
        assert_eq!(learned.backjump_level, 2);
        assert_eq!(learned.literals[1], lit(-2));
        assert_eq!(learned.resolved.len(), 2);
        assert_eq!(learned.involved.len(), 4);
    }

    #[test]
    fn unit_learned_clause_backjumps_to_root() {
        // x1 implies both x2 and ¬x2.
        let mut db = ClauseDb::new(3, 0.999);
        let mut trail = Trail::new(3);
        db.add(lits(&[-1, 2]), false);
        db.add(lits(&[-1, 3]), false);
        db.add(lits(&[-2, -3]), false);

        let conflict = run_until_conflict(&mut db, &mut trail, &[1]);
        let mut analyzer = ConflictAnalyzer::new(3, true);
        let learned = analyzer.analyze(
            &SearchState {
                db: &db,
                trail: &trail,
            },
            1,
            conflict,
            trail.current_level_literals(),
        );

        assert_eq!(learned.literals, vec![lit(-1)]);
        assert_eq!(learned.backjump_level, 0);
    }

    #[test]
    fn minimization_drops_implied_literals() {
        // x1@1 implies x2; x3@2 implies x4 and x5, falsifying (¬x4 ∨ ¬x5 ∨ ¬x1 ∨ ¬x2).
        // The plain First-UIP clause is (¬x3 ∨ ¬x1 ∨ ¬x2), and ¬x2 is implied by ¬x1.
        let mut db = ClauseDb::new(5, 0.999);
        let mut trail = Trail::new(5);
        db.add(lits(&[-1, 2]), false);
        db.add(lits(&[-3, 4]), false);
        db.add(lits(&[-3, 5]), false);
        db.add(lits(&[-4, -5, -1, -2]), false);

        let conflict = run_until_conflict(&mut db, &mut trail, &[1, 3]);
        let state = SearchState {
            db: &db,
            trail: &trail,
        };

        let plain = ConflictAnalyzer::new(5, false).analyze(
            &state,
            2,
            conflict,
            trail.current_level_literals(),
        );
        assert_eq!(dimacs(&plain.literals), vec![-3, -2, -1]);

        let minimized = ConflictAnalyzer::new(5, true).analyze(
            &state,
            2,
            conflict,
            trail.current_level_literals(),
        );
        assert_eq!(dimacs(&minimized.literals), vec![-3, -1]);
        assert_eq!(minimized.backjump_level, 1);
    }
}
