/*!
A module to represent conjunctive normal form formula.
*/

use std::{convert::TryInto, fmt::Display, num::NonZeroU32, str::FromStr};

use crate::prelude::*;

#[derive(Debug, Snafu)]
pub enum VariableParseError {
    #[snafu(display("Failed to parse Variable ID"))]
    ParseIntError { source: std::num::ParseIntError },
    #[snafu(display(
        "Variable ID {} is out of range (must be within 1 to {})",
        num,
        Variable::MAX_VARIABLE_ID
    ))]
    RangeError { num: usize },
}

/// Newtype wrapper for variable ID.
/// Invariant: 0 < ID <= MAX_VARIABLE_ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(NonZeroU32);

impl Variable {
    pub const MAX_VARIABLE_ID: usize = std::u32::MAX as usize;
}

impl Variable {
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// DIMACS identifier of the variable, starting from 1.
    pub fn id(&self) -> u32 {
        self.0.get()
    }

    /// Creates a variable from a raw index.
    /// Returns `None` if the index is invalid.
    pub fn from_index(index: usize) -> Option<Self> {
        let id = index.checked_add(1)?;
        if id > Variable::MAX_VARIABLE_ID {
            return None;
        }
        Some(Variable(NonZeroU32::new(id.try_into().ok()?)?))
    }
}

impl FromStr for Variable {
    type Err = VariableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let num = s.parse::<usize>().context(ParseIntError)?;
        ensure!(num != 0, RangeError { num });
        Variable::from_index(num - 1).context(RangeError { num })
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    id: Variable,
    positive: bool,
}

impl Literal {
    pub fn new(id: Variable, positive: bool) -> Self {
        Literal { id, positive }
    }

    /// Converts a signed DIMACS literal. Returns `None` for `0`.
    pub fn from_dimacs(value: i64) -> Option<Self> {
        let magnitude: usize = value.unsigned_abs().try_into().ok()?;
        let id = Variable::from_index(magnitude.checked_sub(1)?)?;
        Some(Literal::new(id, value > 0))
    }

    pub fn to_dimacs(&self) -> i64 {
        let id = i64::from(self.id.id());
        if self.positive {
            id
        } else {
            -id
        }
    }

    pub fn variable(&self) -> Variable {
        self.id
    }

    pub fn positive(&self) -> bool {
        self.positive
    }

    pub fn index(&self) -> usize {
        self.id.index()
    }

    /// Evaluates the literal under a partial assignment indexed by variable.
    pub fn partial_value(&self, assignments: &[Option<bool>]) -> Option<bool> {
        assignments[self.index()].map(|value| value == self.positive)
    }
}

impl FromStr for Literal {
    type Err = VariableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (positive, id) = if let Some(rest) = s.strip_prefix('-') {
            (false, rest.parse()?)
        } else {
            (true, s.parse()?)
        };

        Ok(Literal { id, positive })
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", if self.positive { "" } else { "¬" }, self.id)
    }
}

impl std::ops::Not for Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        Literal {
            id: self.id,
            positive: !self.positive,
        }
    }
}

/// Disjunction of literals.
/// Invariant: no literal appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    /// Creates a clause, merging repeated literals while keeping the first occurrence order.
    pub fn new(literals: Vec<Literal>) -> Self {
        let mut deduplicated = Vec::with_capacity(literals.len());
        for literal in literals {
            if !deduplicated.contains(&literal) {
                deduplicated.push(literal);
            }
        }

        Self {
            literals: deduplicated,
        }
    }

    /// Builds a clause from signed DIMACS literals, skipping zeros.
    pub fn from_dimacs(values: &[i64]) -> Self {
        Clause::new(
            values
                .iter()
                .filter_map(|&value| Literal::from_dimacs(value))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn iter(&self) -> impl Iterator<Item = Literal> + '_ {
        self.literals.iter().copied()
    }

    /// Returns true if the clause contains both a literal and its negation.
    pub fn is_tautology(&self) -> bool {
        self.literals
            .iter()
            .any(|&literal| self.literals.contains(&!literal))
    }

    /// Returns true if some literal is satisfied by the total assignment.
    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        self.iter()
            .any(|literal| assignment[literal.index()] == literal.positive())
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;

        let mut iter = self.literals.iter();
        if let Some(first) = iter.next() {
            write!(f, "{}", first)?;
        }
        for variable in iter {
            write!(f, " ∨ {}", variable)?;
        }

        write!(f, ")")?;

        Ok(())
    }
}

/// Formula representation in Conjunctive Normal Form
#[derive(Debug, Clone)]
pub struct Cnf {
    num_variables: usize,
    clauses: Vec<Clause>,
    /// Empty clauses are counted, not stored.
    empty_clause_count: usize,
}

impl Cnf {
    pub fn new(num_variables: usize) -> Self {
        assert!(num_variables <= Variable::MAX_VARIABLE_ID);

        Cnf {
            num_variables,
            clauses: Vec::new(),
            empty_clause_count: 0,
        }
    }

    /// Builds a formula from signed DIMACS literals.
    /// Mostly useful for tests and embedding.
    ///
    /// # Panics
    ///
    /// Panics when a literal refers to a variable above `num_variables`.
    pub fn from_dimacs(num_variables: usize, clauses: &[&[i64]]) -> Self {
        let mut cnf = Cnf::new(num_variables);
        for values in clauses {
            cnf.add_clause(Clause::from_dimacs(values));
        }
        cnf
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn clauses(&self) -> &Vec<Clause> {
        &self.clauses
    }

    pub fn empty_clause_count(&self) -> usize {
        self.empty_clause_count
    }

    /// An empty clause certifies the formula unsatisfiable.
    pub fn has_empty_clause(&self) -> bool {
        self.empty_clause_count > 0
    }

    /// Adds a clause to the formula.
    ///
    /// # Panics
    ///
    /// Panics when the clause mentions a variable outside of the formula.
    pub fn add_clause(&mut self, clause: Clause) {
        assert!(clause
            .iter()
            .all(|literal| literal.index() < self.num_variables));

        if clause.is_empty() {
            self.empty_clause_count += 1;
        } else {
            self.clauses.push(clause);
        }
    }

    /// Number of occurrences of a variable in either polarity.
    pub fn variable_occurrences(&self) -> Vec<usize> {
        let mut occurrences = vec![0; self.num_variables];
        for clause in &self.clauses {
            for literal in clause.iter() {
                occurrences[literal.index()] += 1;
            }
        }
        occurrences
    }
}

impl Display for Cnf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CNF with {} variables (", self.num_variables)?;

        let mut iter = self.clauses.iter();
        if let Some(first) = iter.next() {
            write!(f, "{}", first)?;
        }
        for variable in iter {
            write!(f, " ∧ {}", variable)?;
        }

        write!(f, ")")?;

        Ok(())
    }
}

/// Represents a satisfying assignment for a formula.
#[derive(Debug)]
pub struct Model {
    formula: Cnf,
    assignment: Vec<bool>,
}

impl Model {
    /// Creates a new model from a formula and an assignment.
    ///
    /// # Panics
    ///
    /// Panics when the assignment length does not match the variable count.
    pub fn new(formula: Cnf, assignment: Vec<bool>) -> Self {
        assert!(assignment.len() == formula.num_variables());

        Model {
            formula,
            assignment,
        }
    }

    pub fn formula(&self) -> &Cnf {
        &self.formula
    }

    pub fn assignment(&self) -> &[bool] {
        &self.assignment
    }

    pub fn value(&self, variable: Variable) -> bool {
        self.assignment[variable.index()]
    }

    /// Returns the first original clause falsified by the model.
    pub fn unsatisfied_clause(&self) -> Option<&Clause> {
        self.formula
            .clauses()
            .iter()
            .find(|clause| !clause.is_satisfied_by(&self.assignment))
    }

    pub fn is_satisfying(&self) -> bool {
        !self.formula.has_empty_clause() && self.unsatisfied_clause().is_none()
    }

    /// Signed DIMACS literal for every variable, in variable order.
    pub fn dimacs_literals(&self) -> impl Iterator<Item = i64> + '_ {
        self.assignment.iter().enumerate().map(|(index, &value)| {
            let id = index as i64 + 1;
            if value {
                id
            } else {
                -id
            }
        })
    }
}

/// DIMACS value line, `v <lit1> ... <litN> 0`.
impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v")?;
        for literal in self.dimacs_literals() {
            write!(f, " {}", literal)?;
        }
        write!(f, " 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_dimacs_conversion() {
        let literal = Literal::from_dimacs(-3).unwrap();
        assert_eq!(literal.index(), 2);
        assert!(!literal.positive());
        assert_eq!(literal.to_dimacs(), -3);
        assert_eq!((!literal).to_dimacs(), 3);
        assert!(Literal::from_dimacs(0).is_none());
    }

    #[test]
    fn literal_from_str_rejects_zero() {
        assert!("0".parse::<Literal>().is_err());
        assert!("-0".parse::<Literal>().is_err());
        assert!("abc".parse::<Literal>().is_err());
        assert_eq!("-7".parse::<Literal>().unwrap().to_dimacs(), -7);
    }

    #[test]
    fn clause_merges_duplicates() {
        let clause = Clause::from_dimacs(&[1, 2, 1, -3, 2]);
        assert_eq!(clause.len(), 3);
        assert!(!clause.is_tautology());
        assert!(Clause::from_dimacs(&[1, -2, -1]).is_tautology());
    }

    #[test]
    fn model_checks_every_clause() {
        let cnf = Cnf::from_dimacs(3, &[&[1, -2], &[2, 3], &[-1, -3]]);
        let good = Model::new(cnf.clone(), vec![true, true, false]);
        assert!(good.is_satisfying());
        assert_eq!(good.to_string(), "v 1 2 -3 0");

        let bad = Model::new(cnf, vec![true, false, true]);
        assert_eq!(
            bad.unsatisfied_clause(),
            Some(&Clause::from_dimacs(&[-1, -3]))
        );
    }
}
