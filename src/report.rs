/*!
Solver output in the DIMACS result format, and the error report returned from
`main` printing the whole chain of causes.
*/

use std::{
    error::Error as StdError,
    fmt::{self, Debug, Formatter},
    time::Duration,
};

use crate::{formula::Cnf, solver::SolveResult};

/// Comment lines describing a parsed formula. Empty clauses are counted.
pub fn formula_summary(formula: &Cnf) -> String {
    format!(
        "c Variables: {}\nc Clauses: {}",
        formula.num_variables(),
        formula.clauses().len() + formula.empty_clause_count()
    )
}

pub fn status_line(result: &SolveResult) -> &'static str {
    match result {
        SolveResult::Sat(_) => "s SATISFIABLE",
        SolveResult::Unsat => "s UNSATISFIABLE",
        SolveResult::Indeterminate => "s UNKNOWN",
    }
}

/// Status line, the value line of a model and the solving time in milliseconds.
pub fn result_summary(result: &SolveResult, elapsed: Duration) -> String {
    let mut lines = vec![status_line(result).to_owned()];
    if let SolveResult::Sat(model) = result {
        lines.push(model.to_string());
    }
    lines.push(format!(
        "c Solving time: {:.2} ms",
        elapsed.as_secs_f64() * 1000.0
    ));

    lines.join("\n")
}

pub struct Report(Box<dyn StdError>);

impl Report {
    /// Iterates over the error and its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(Some(self.0.as_ref()), |&e| e.source())
    }
}

/// `main` prints the report through `Debug`, so this is the user-facing form.
impl Debug for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.0)?;

        let causes = self.chain().skip(1).collect::<Vec<_>>();
        if !causes.is_empty() {
            writeln!(f, "\nCaused by:")?;
            for (depth, cause) in causes.into_iter().enumerate() {
                writeln!(f, "{:>4}: {}", depth, cause)?;
            }
        }

        Ok(())
    }
}

impl<E: Into<Box<dyn StdError>>> From<E> for Report {
    fn from(e: E) -> Self {
        Report(e.into())
    }
}
