/*!
A conflict-driven clause learning SAT solver for DIMACS CNF formulas.

The [`solver::CdclSolver`] is the main engine. [`solver::DpllSolver`] is a plain
backtracking search, [`solver::DpSolver`] eliminates variables by resolution and
[`solver::ResolutionSolver`] saturates the clause set. They are kept for small
inputs and cross-checking.
*/

#[macro_use]
extern crate log;

pub mod formula;
pub mod parser;
pub mod prelude;
pub mod report;
pub mod solver;

#[cfg(test)]
mod tests;
