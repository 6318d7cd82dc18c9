use crate::formula::Literal;
use crate::solver::Error;

use super::{
    clause_db::{ClauseDb, ClauseIdx, Watcher},
    trail::Trail,
};

/// What a single watched clause turned into after one of its watches was falsified.
enum Visit {
    /// Another literal satisfies the clause; keep watching with a new blocker.
    Satisfied(Literal),
    /// The clause moved its watch to `new_watch`.
    Moved { new_watch: Literal, blocker: Literal },
    /// Every literal but `first` is falsified.
    Unit(Literal),
    /// Every literal is falsified.
    Conflict(Literal),
}

/// Inspects a clause whose watched literal `false_literal` just became false.
/// Keeps the invariant that `literals[0]` and `literals[1]` are the watches.
fn visit(db: &mut ClauseDb, trail: &Trail, clause: ClauseIdx, false_literal: Literal) -> Visit {
    let literals = db.literals_mut(clause);
    if literals[0] == false_literal {
        literals.swap(0, 1);
    }

    let first = literals[0];
    if trail.value(first) == Some(true) {
        return Visit::Satisfied(first);
    }

    let replacement = literals
        .iter()
        .skip(2)
        .position(|&literal| trail.value(literal) != Some(false));

    match replacement {
        Some(offset) => {
            literals.swap(1, offset + 2);
            Visit::Moved {
                new_watch: literals[1],
                blocker: first,
            }
        }
        None if trail.value(first) == Some(false) => Visit::Conflict(first),
        None => Visit::Unit(first),
    }
}

/// Boolean constraint propagation over two watched literals.
///
/// Drains the propagation queue of the trail. Returns the falsified clause on conflict,
/// in which case the rest of the queue is dropped.
pub fn propagate(
    db: &mut ClauseDb,
    trail: &mut Trail,
    propagations: &mut u64,
) -> Result<Option<ClauseIdx>, Error> {
    while let Some(literal) = trail.next_pending() {
        *propagations += 1;

        let false_literal = !literal;
        let mut watchers = db.take_watchers(false_literal);
        let mut kept = 0;
        let mut conflict = None;

        let mut position = 0;
        while position < watchers.len() {
            let watcher = watchers[position];
            position += 1;

            if trail.value(watcher.blocker) == Some(true) {
                watchers[kept] = watcher;
                kept += 1;
                continue;
            }

            match visit(db, trail, watcher.clause, false_literal) {
                Visit::Satisfied(blocker) => {
                    watchers[kept] = Watcher {
                        clause: watcher.clause,
                        blocker,
                    };
                    kept += 1;
                }
                Visit::Moved { new_watch, blocker } => {
                    db.watch(
                        new_watch,
                        Watcher {
                            clause: watcher.clause,
                            blocker,
                        },
                    );
                }
                Visit::Unit(first) => {
                    watchers[kept] = Watcher {
                        clause: watcher.clause,
                        blocker: first,
                    };
                    kept += 1;
                    trace!("{} implied by clause {}", first, usize::from(watcher.clause));
                    trail.assign(first, Some(watcher.clause))?;
                }
                Visit::Conflict(first) => {
                    watchers[kept] = Watcher {
                        clause: watcher.clause,
                        blocker: first,
                    };
                    kept += 1;
                    conflict = Some(watcher.clause);
                    break;
                }
            }
        }

        // Keep the watchers that were not visited because of the conflict.
        while position < watchers.len() {
            watchers[kept] = watchers[position];
            kept += 1;
            position += 1;
        }
        watchers.truncate(kept);
        db.restore_watchers(false_literal, watchers);

        if conflict.is_some() {
            trail.skip_pending();
            return Ok(conflict);
        }
    }

    Ok(None)
}
