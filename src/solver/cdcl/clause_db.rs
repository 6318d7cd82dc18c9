use std::ops::{Index, IndexMut};

use typed_index_collections::TiVec;

use crate::formula::Literal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClauseIdx(usize);

impl From<usize> for ClauseIdx {
    fn from(index: usize) -> Self {
        ClauseIdx(index)
    }
}

impl From<ClauseIdx> for usize {
    fn from(index: ClauseIdx) -> Self {
        index.0
    }
}

/// An entry of a watch list. `blocker` is another literal of the clause;
/// when it is satisfied the clause can be skipped without being visited.
#[derive(Clone, Copy, Debug)]
pub struct Watcher {
    pub clause: ClauseIdx,
    pub blocker: Literal,
}

type WatchRow = Vec<Watcher>;

struct Watch {
    /// Clauses watching +x_i.
    positive: Vec<WatchRow>,
    /// Clauses watching -x_i.
    negative: Vec<WatchRow>,
}

impl Watch {
    fn new(num_variables: usize) -> Self {
        Watch {
            positive: vec![Vec::new(); num_variables],
            negative: vec![Vec::new(); num_variables],
        }
    }

    fn rows_mut(&mut self) -> impl Iterator<Item = &mut WatchRow> {
        self.positive.iter_mut().chain(self.negative.iter_mut())
    }
}

impl Index<Literal> for Watch {
    type Output = WatchRow;

    fn index(&self, literal: Literal) -> &Self::Output {
        if literal.positive() {
            &self.positive[literal.index()]
        } else {
            &self.negative[literal.index()]
        }
    }
}

impl IndexMut<Literal> for Watch {
    fn index_mut(&mut self, literal: Literal) -> &mut Self::Output {
        if literal.positive() {
            &mut self.positive[literal.index()]
        } else {
            &mut self.negative[literal.index()]
        }
    }
}

struct StoredClause {
    /// `literals[0]` and `literals[1]` are the watched literals.
    literals: Vec<Literal>,
    learned: bool,
    activity: f64,
}

/// Owns original and learned clauses of arity >= 2 together with their watch lists.
/// Units and the empty clause never enter the database.
pub struct ClauseDb {
    clauses: TiVec<ClauseIdx, Option<StoredClause>>,
    /// Slots of removed clauses, reused by later additions.
    free: Vec<ClauseIdx>,
    watch: Watch,
    num_original: usize,
    num_learned: usize,
    activity_inc: f64,
    activity_decay: f64,
}

impl ClauseDb {
    const RESCALE_THRESHOLD: f64 = 1e20;

    pub fn new(num_variables: usize, activity_decay: f64) -> Self {
        ClauseDb {
            clauses: TiVec::new(),
            free: Vec::new(),
            watch: Watch::new(num_variables),
            num_original: 0,
            num_learned: 0,
            activity_inc: 1.0,
            activity_decay,
        }
    }

    /// Stores a clause and watches its first two literals.
    ///
    /// # Panics
    ///
    /// Panics if the clause has fewer than two literals.
    pub fn add(&mut self, literals: Vec<Literal>, learned: bool) -> ClauseIdx {
        assert!(literals.len() >= 2, "units are not stored in the database");

        let (first, second) = (literals[0], literals[1]);
        let stored = StoredClause {
            literals,
            learned,
            activity: 0.0,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.clauses[idx] = Some(stored);
                idx
            }
            None => self.clauses.push_and_get_key(Some(stored)),
        };

        if learned {
            self.num_learned += 1;
        } else {
            self.num_original += 1;
        }

        self.watch[first].push(Watcher {
            clause: idx,
            blocker: second,
        });
        self.watch[second].push(Watcher {
            clause: idx,
            blocker: first,
        });

        idx
    }

    /// Clauses currently watching `literal`.
    pub fn watchers_of(&self, literal: Literal) -> &[Watcher] {
        &self.watch[literal]
    }

    /// Detaches the watch list of `literal` so it can be rewritten while clauses are edited.
    pub(super) fn take_watchers(&mut self, literal: Literal) -> Vec<Watcher> {
        std::mem::take(&mut self.watch[literal])
    }

    /// Reattaches a list obtained from `take_watchers`.
    pub(super) fn restore_watchers(&mut self, literal: Literal, mut watchers: Vec<Watcher>) {
        let row = &mut self.watch[literal];
        watchers.append(row);
        *row = watchers;
    }

    pub(super) fn watch(&mut self, literal: Literal, watcher: Watcher) {
        self.watch[literal].push(watcher);
    }

    fn stored(&self, idx: ClauseIdx) -> &StoredClause {
        self.clauses[idx]
            .as_ref()
            .unwrap_or_else(|| panic!("clause {} was removed", usize::from(idx)))
    }

    fn stored_mut(&mut self, idx: ClauseIdx) -> &mut StoredClause {
        self.clauses[idx]
            .as_mut()
            .unwrap_or_else(|| panic!("clause {} was removed", usize::from(idx)))
    }

    pub fn literals(&self, idx: ClauseIdx) -> &[Literal] {
        &self.stored(idx).literals
    }

    pub(super) fn literals_mut(&mut self, idx: ClauseIdx) -> &mut [Literal] {
        &mut self.stored_mut(idx).literals
    }

    pub fn contains(&self, idx: ClauseIdx) -> bool {
        self.clauses.get(idx).map_or(false, Option::is_some)
    }

    pub fn num_original(&self) -> usize {
        self.num_original
    }

    pub fn num_learned(&self) -> usize {
        self.num_learned
    }

    /// Iterates over the live clauses.
    pub fn iter(&self) -> impl Iterator<Item = (ClauseIdx, &[Literal])> + '_ {
        self.clauses
            .iter_enumerated()
            .filter_map(|(idx, stored)| stored.as_ref().map(|s| (idx, s.literals.as_slice())))
    }

    /// Removes a learned clause and its two watches.
    ///
    /// # Panics
    ///
    /// Panics if the clause is an original clause.
    pub fn remove(&mut self, idx: ClauseIdx) {
        let (first, second) = {
            let stored = self.stored(idx);
            assert!(stored.learned, "original clauses are never removed");
            (stored.literals[0], stored.literals[1])
        };

        self.watch[first].retain(|watcher| watcher.clause != idx);
        self.watch[second].retain(|watcher| watcher.clause != idx);
        self.release(idx);
    }

    fn release(&mut self, idx: ClauseIdx) {
        self.clauses[idx] = None;
        self.free.push(idx);
        self.num_learned -= 1;
    }

    pub fn bump_activity(&mut self, idx: ClauseIdx) {
        let inc = self.activity_inc;
        let stored = self.stored_mut(idx);
        if !stored.learned {
            return;
        }

        stored.activity += inc;
        if stored.activity > Self::RESCALE_THRESHOLD {
            for stored in self.clauses.iter_mut().flatten() {
                stored.activity /= Self::RESCALE_THRESHOLD;
            }
            self.activity_inc /= Self::RESCALE_THRESHOLD;
        }
    }

    pub fn decay_activity(&mut self) {
        self.activity_inc /= self.activity_decay;
    }

    /// Removes the less active half of the learned clauses.
    /// Binary clauses and clauses for which `is_locked` holds are kept.
    /// Returns the number of removed clauses.
    pub fn reduce<F>(&mut self, mut is_locked: F) -> usize
    where
        F: FnMut(ClauseIdx, &[Literal]) -> bool,
    {
        let mut candidates = self
            .clauses
            .iter_enumerated()
            .filter_map(|(idx, stored)| match stored {
                Some(stored) if stored.learned && stored.literals.len() > 2 => {
                    Some((idx, stored.activity))
                }
                _ => None,
            })
            .collect::<Vec<_>>();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let half = self.num_learned / 2;
        let extra_limit = self.activity_inc / self.num_learned.max(1) as f64;

        let mut removed = vec![false; self.clauses.len()];
        let mut count = 0;
        for (position, &(idx, activity)) in candidates.iter().enumerate() {
            if position >= half && activity >= extra_limit {
                continue;
            }
            if is_locked(idx, self.literals(idx)) {
                continue;
            }
            removed[usize::from(idx)] = true;
            count += 1;
        }

        if count == 0 {
            return 0;
        }

        for row in self.watch.rows_mut() {
            row.retain(|watcher| !removed[usize::from(watcher.clause)]);
        }
        for (index, &flag) in removed.iter().enumerate() {
            if flag {
                self.release(index.into());
            }
        }

        count
    }
}
