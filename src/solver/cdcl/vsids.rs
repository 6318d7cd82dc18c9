use std::{cmp::Ordering, collections::BTreeSet};

use rand::{rngs::StdRng, Rng};

use crate::formula::{Literal, Variable};

use super::trail::Trail;

#[derive(PartialEq, Clone, Copy)]
struct SetEntry {
    variable: Variable,
    score: f64,
}

impl Eq for SetEntry {}

impl PartialOrd for SetEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entries grow with the score; among equal scores the lower variable is greater,
/// so the last entry of the set is the next branching candidate.
impl Ord for SetEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.variable.cmp(&self.variable))
    }
}

/// Variable State Independent Decaying Sum (VSIDS) heuristic.
/// Based on MiniSAT implementation.
pub struct VsidsScoring {
    current_rate: f64,
    decay_rate: f64,
    scores: Vec<f64>,
    /// Candidate variables. Every unassigned variable is in the set;
    /// assigned ones are dropped lazily when they reach the top.
    btree: BTreeSet<SetEntry>,
}

impl VsidsScoring {
    const REBALANCE_THRESHOLD: f64 = 1e100;

    /// Starts every variable with the given initial score.
    pub fn new(initial_scores: &[f64], decay_rate: f64) -> Self {
        let scores = initial_scores.to_vec();
        let btree = scores
            .iter()
            .enumerate()
            .filter_map(|(index, &score)| {
                Variable::from_index(index).map(|variable| SetEntry { variable, score })
            })
            .collect();

        VsidsScoring {
            current_rate: 1.0,
            decay_rate,
            scores,
            btree,
        }
    }

    pub fn score(&self, variable: Variable) -> f64 {
        self.scores[variable.index()]
    }

    fn set_entry(&self, variable: Variable) -> SetEntry {
        SetEntry {
            variable,
            score: self.scores[variable.index()],
        }
    }

    pub fn bump_score(&mut self, variable: Variable) {
        let present = self.btree.remove(&self.set_entry(variable));

        self.scores[variable.index()] += self.current_rate;
        let new_score = self.scores[variable.index()];

        if present {
            self.btree.insert(self.set_entry(variable));
        }

        if new_score >= Self::REBALANCE_THRESHOLD {
            self.rebalance();
        }
    }

    fn rebalance(&mut self) {
        self.current_rate /= Self::REBALANCE_THRESHOLD;
        for score in &mut self.scores {
            *score /= Self::REBALANCE_THRESHOLD;
        }

        // Scaling keeps the relative order, but the entries carry the old scores.
        let members = self
            .btree
            .iter()
            .map(|entry| entry.variable)
            .collect::<Vec<_>>();
        self.btree = members
            .into_iter()
            .map(|variable| self.set_entry(variable))
            .collect();
    }

    pub fn insert(&mut self, variable: Variable) {
        self.btree.insert(self.set_entry(variable));
    }

    pub fn remove(&mut self, variable: Variable) {
        self.btree.remove(&self.set_entry(variable));
    }

    pub fn decay(&mut self) {
        self.current_rate /= self.decay_rate;
    }

    /// Bumps every variable that took part in a conflict.
    pub fn bump_all(&mut self, variables: &[Variable]) {
        for &variable in variables {
            self.bump_score(variable);
        }
    }

    /// Unassigned variable with the highest score, lowest index first on ties.
    /// The returned variable leaves the candidate set until it is unassigned again.
    pub fn top(&mut self, trail: &Trail) -> Option<Variable> {
        while let Some(&entry) = self.btree.iter().next_back() {
            self.btree.remove(&entry);
            if trail.variable_value(entry.variable).is_none() {
                return Some(entry.variable);
            }
        }

        None
    }

    /// Uniformly drawn unassigned variable, `None` if the draw hit an assigned one.
    pub fn random(&mut self, trail: &Trail, rng: &mut StdRng) -> Option<Variable> {
        if self.scores.is_empty() {
            return None;
        }

        let variable = Variable::from_index(rng.gen_range(0..self.scores.len()))?;
        if trail.variable_value(variable).is_none() {
            self.remove(variable);
            Some(variable)
        } else {
            None
        }
    }
}

/// Polarity policy: the last polarity a variable held, or `default` if it was never assigned.
pub fn choose_polarity(trail: &Trail, variable: Variable, phase_saving: bool, default: bool) -> Literal {
    let positive = if phase_saving {
        trail.saved_phase(variable).unwrap_or(default)
    } else {
        default
    };

    Literal::new(variable, positive)
}
