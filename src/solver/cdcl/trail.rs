use crate::formula::{Literal, Variable};
use crate::solver::{AlreadyAssigned, ConflictingAssignment, Error};

use super::clause_db::ClauseIdx;

/// Partial assignment together with the chronological record of how it was built.
pub struct Trail {
    /// The current assignments to variables.
    values: Vec<Option<bool>>,
    /// Decision level of each assigned variable.
    levels: Vec<usize>,
    /// Clause that forced each assigned variable, `None` for decisions and level 0 facts.
    antecedents: Vec<Option<ClauseIdx>>,
    /// Last polarity each variable held.
    saved_phases: Vec<Option<bool>>,
    /// Assigned literals in chronological order.
    literals: Vec<Literal>,
    /// `level_starts[k]` is the trail position where level `k + 1` begins.
    level_starts: Vec<usize>,
    /// Literals before this position have been propagated.
    propagate_head: usize,
}

impl Trail {
    pub fn new(num_variables: usize) -> Self {
        Trail {
            values: vec![None; num_variables],
            levels: vec![0; num_variables],
            antecedents: vec![None; num_variables],
            saved_phases: vec![None; num_variables],
            literals: Vec::with_capacity(num_variables),
            level_starts: Vec::new(),
            propagate_head: 0,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.values.len()
    }

    pub fn num_assigned(&self) -> usize {
        self.literals.len()
    }

    pub fn is_complete(&self) -> bool {
        self.literals.len() == self.values.len()
    }

    pub fn current_level(&self) -> usize {
        self.level_starts.len()
    }

    /// Value of the literal under the current assignment.
    pub fn value(&self, literal: Literal) -> Option<bool> {
        literal.partial_value(&self.values)
    }

    pub fn variable_value(&self, variable: Variable) -> Option<bool> {
        self.values[variable.index()]
    }

    pub fn level(&self, variable: Variable) -> usize {
        self.levels[variable.index()]
    }

    pub fn antecedent(&self, variable: Variable) -> Option<ClauseIdx> {
        self.antecedents[variable.index()]
    }

    pub fn saved_phase(&self, variable: Variable) -> Option<bool> {
        self.saved_phases[variable.index()]
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// Literals assigned at the current decision level.
    pub fn current_level_literals(&self) -> &[Literal] {
        let start = self.level_starts.last().copied().unwrap_or(0);
        &self.literals[start..]
    }

    /// Opens a new decision level.
    pub fn new_decision_level(&mut self) {
        self.level_starts.push(self.literals.len());
    }

    /// Assigns a literal at the current decision level and queues it for propagation.
    /// The caller must make sure the variable is unassigned.
    pub fn assign(&mut self, literal: Literal, antecedent: Option<ClauseIdx>) -> Result<(), Error> {
        let index = literal.index();
        match self.value(literal) {
            Some(false) => return ConflictingAssignment { literal }.fail(),
            Some(true) => return AlreadyAssigned { literal }.fail(),
            None => (),
        }

        self.values[index] = Some(literal.positive());
        self.levels[index] = self.current_level();
        self.antecedents[index] = antecedent;
        self.literals.push(literal);

        Ok(())
    }

    /// Returns the next literal waiting for propagation.
    pub fn next_pending(&mut self) -> Option<Literal> {
        let literal = self.literals.get(self.propagate_head).copied()?;
        self.propagate_head += 1;
        Some(literal)
    }

    /// Drops the propagation queue.
    pub fn skip_pending(&mut self) {
        self.propagate_head = self.literals.len();
    }

    /// Undoes every assignment above `level`, latest first.
    /// `on_unassign` is notified of each variable that becomes unassigned.
    pub fn backtrack_to<F>(&mut self, level: usize, mut on_unassign: F)
    where
        F: FnMut(Variable),
    {
        if level >= self.current_level() {
            return;
        }

        let start = self.level_starts[level];
        while self.literals.len() > start {
            if let Some(literal) = self.literals.pop() {
                let index = literal.index();
                self.saved_phases[index] = Some(literal.positive());
                self.values[index] = None;
                self.antecedents[index] = None;
                self.levels[index] = 0;
                on_unassign(literal.variable());
            }
        }

        self.level_starts.truncate(level);
        self.propagate_head = self.propagate_head.min(start);
    }

    /// Snapshot of the assignment, `None` entries for unassigned variables.
    pub fn assignments(&self) -> &[Option<bool>] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: i64) -> Literal {
        Literal::from_dimacs(value).unwrap()
    }

    #[test]
    fn assign_records_level_and_antecedent() {
        let mut trail = Trail::new(3);
        trail.assign(lit(1), None).unwrap();
        trail.new_decision_level();
        trail.assign(lit(-2), None).unwrap();
        trail.assign(lit(3), Some(ClauseIdx::from(4))).unwrap();

        assert_eq!(trail.current_level(), 1);
        assert_eq!(trail.value(lit(1)), Some(true));
        assert_eq!(trail.value(lit(2)), Some(false));
        assert_eq!(trail.value(lit(-2)), Some(true));
        assert_eq!(trail.level(lit(1).variable()), 0);
        assert_eq!(trail.level(lit(3).variable()), 1);
        assert_eq!(trail.antecedent(lit(3).variable()), Some(ClauseIdx::from(4)));
        assert_eq!(trail.current_level_literals(), &[lit(-2), lit(3)]);
        assert!(trail.is_complete());
    }

    #[test]
    fn assign_rejects_double_assignment() {
        let mut trail = Trail::new(2);
        trail.assign(lit(1), None).unwrap();
        assert!(matches!(
            trail.assign(lit(-1), None),
            Err(Error::ConflictingAssignment { .. })
        ));
        assert!(matches!(
            trail.assign(lit(1), None),
            Err(Error::AlreadyAssigned { .. })
        ));
        assert_eq!(trail.num_assigned(), 1);
    }

    #[test]
    fn backtrack_undoes_higher_levels() {
        let mut trail = Trail::new(5);
        trail.assign(lit(1), None).unwrap();
        for value in 2..=5 {
            trail.new_decision_level();
            trail
                .assign(lit(value), Some(ClauseIdx::from(value as usize)))
                .unwrap();
        }
        assert_eq!(trail.current_level(), 4);

        let mut undone = Vec::new();
        trail.backtrack_to(2, |variable| undone.push(variable.id()));

        assert_eq!(trail.current_level(), 2);
        assert_eq!(undone, vec![5, 4]);
        for value in 1..=3 {
            assert_eq!(trail.value(lit(value)), Some(true));
        }
        for value in 4..=5 {
            let variable = lit(value).variable();
            assert_eq!(trail.variable_value(variable), None);
            assert_eq!(trail.antecedent(variable), None);
            assert_eq!(trail.saved_phase(variable), Some(true));
        }

        trail.backtrack_to(0, |_| ());
        assert_eq!(trail.current_level(), 0);
        assert_eq!(trail.literals(), &[lit(1)]);
    }

    #[test]
    fn pending_queue_follows_trail() {
        let mut trail = Trail::new(3);
        trail.assign(lit(1), None).unwrap();
        trail.new_decision_level();
        trail.assign(lit(2), None).unwrap();

        assert_eq!(trail.next_pending(), Some(lit(1)));
        assert_eq!(trail.next_pending(), Some(lit(2)));
        assert_eq!(trail.next_pending(), None);

        trail.backtrack_to(0, |_| ());
        trail.assign(lit(-3), None).unwrap();
        assert_eq!(trail.next_pending(), Some(lit(-3)));
    }
}
