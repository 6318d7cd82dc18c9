use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;

use crate::formula::{Clause, Cnf, Literal, Variable, VariableParseError};
use crate::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("I/O error occurred while opening CNF file '{}'", path.display()))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("I/O error occurred while reading CNF input"))]
    ReadError { source: std::io::Error },
    #[snafu(display("Invalid literal '{}' on line {}", token, line))]
    MalformedVariable {
        token: String,
        line: usize,
        source: VariableParseError,
    },
    #[snafu(display(
        "Literal {} on line {} exceeds the declared number of variables ({})",
        literal,
        line,
        num_variables,
    ))]
    VariableOutOfRange {
        literal: i64,
        line: usize,
        num_variables: usize,
    },
    #[snafu(display("Problem line 'p cnf <num_variables> <num_clauses>' is not found"))]
    MalformedProblemDefinition,
    #[snafu(display(
        "The problem line declares {} variables, at most {} are supported",
        num_variables,
        Variable::MAX_VARIABLE_ID,
    ))]
    TooManyVariables { num_variables: usize },
    #[snafu(display("Line {} appears before the problem line", line))]
    ClauseBeforeProblemDefinition { line: usize },
    #[snafu(display("The last clause is not terminated by '0'"))]
    UnterminatedClause,
    #[snafu(display(
        "The number of clauses ({}) does not match the clauses number in the problem definition ({})",
        found,
        expected,
    ))]
    ClauseCountMismatch { expected: usize, found: usize },
}

/// Parses the problem line, returns `(num_variables, num_clauses)`.
fn parse_problem_line(line: &str) -> Result<(usize, usize), Error> {
    let splitted = line.split_whitespace().collect::<Vec<_>>();

    // We only support CNF DIMACS format
    ensure!(
        splitted.len() == 4 && splitted[0] == "p" && splitted[1] == "cnf",
        MalformedProblemDefinition
    );

    let (num_variables, num_clauses) =
        match (splitted[2].parse::<usize>(), splitted[3].parse::<usize>()) {
            (Ok(num_variables), Ok(num_clauses)) => (num_variables, num_clauses),
            _ => return MalformedProblemDefinition.fail(),
        };
    ensure!(
        num_variables <= Variable::MAX_VARIABLE_ID,
        TooManyVariables { num_variables }
    );

    Ok((num_variables, num_clauses))
}

/// Parses a single literal token and checks it against the declared variable count.
fn parse_literal(token: &str, line: usize, num_variables: usize) -> Result<Literal, Error> {
    let literal = token
        .parse::<Literal>()
        .with_context(|| MalformedVariable {
            token: token.to_owned(),
            line,
        })?;

    ensure!(
        literal.index() < num_variables,
        VariableOutOfRange {
            literal: literal.to_dimacs(),
            line,
            num_variables,
        }
    );

    Ok(literal)
}

/// Parses CNF formula in DIMACS format from a buffered reader.
///
/// Clauses may span several lines. Parsing stops at a line starting with `%`,
/// which terminates the clause section of SATLIB benchmark files.
/// A mismatch between the declared and the parsed number of clauses is an error.
pub fn parse_reader<R: BufRead>(reader: R) -> Result<Cnf, Error> {
    let mut header = None;
    let mut pending = Vec::new();
    let mut found = 0;
    let mut cnf = Cnf::new(0);

    for (line_index, line) in reader.lines().enumerate() {
        let line = line.context(ReadError)?;
        let line_number = line_index + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('c') {
            // empty line, comment
            continue;
        }

        let num_variables = match header {
            Some((num_variables, _)) => num_variables,
            None => {
                ensure!(
                    trimmed.starts_with('p'),
                    ClauseBeforeProblemDefinition { line: line_number }
                );
                let (num_variables, num_clauses) = parse_problem_line(trimmed)?;
                header = Some((num_variables, num_clauses));
                cnf = Cnf::new(num_variables);
                continue;
            }
        };

        if trimmed.starts_with('%') {
            break;
        }

        for token in trimmed.split_whitespace() {
            if token == "0" {
                cnf.add_clause(Clause::new(std::mem::take(&mut pending)));
                found += 1;
            } else {
                pending.push(parse_literal(token, line_number, num_variables)?);
            }
        }
    }

    let (num_variables, num_clauses) = header.context(MalformedProblemDefinition)?;
    ensure!(pending.is_empty(), UnterminatedClause);
    ensure!(
        found == num_clauses,
        ClauseCountMismatch {
            found,
            expected: num_clauses,
        }
    );

    debug!(
        "Parsed CNF with {} variables and {} clauses ({} empty)",
        num_variables,
        found,
        cnf.empty_clause_count()
    );

    Ok(cnf)
}

/// Parses CNF formula from a string.
pub fn parse_str(input: &str) -> Result<Cnf, Error> {
    parse_reader(input.as_bytes())
}

/// Parses CNF formula from a file.
/// Files with a `.gz` extension are decompressed on the fly.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Cnf, Error> {
    let path = path.as_ref();
    let file = File::open(path).context(IoError {
        path: path.to_owned(),
    })?;

    let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    parse_reader(BufReader::new(reader))
}
