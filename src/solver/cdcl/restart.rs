use std::convert::TryFrom;

/// How often the search drops its decisions and starts over from level 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestartStrategy {
    /// Restart after `base * luby(i)` conflicts.
    Luby { base: u64 },
    /// Restart after `first * factor^i` conflicts.
    Geometric { first: u64, factor: f64 },
    /// Never restart.
    Never,
}

impl Default for RestartStrategy {
    fn default() -> Self {
        RestartStrategy::Luby { base: 100 }
    }
}

/// i-th element (from 0) of the Luby sequence 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, ...
pub fn luby(mut index: u64) -> u64 {
    // Find the finite subsequence that contains the index, and its size
    let mut size = 1;
    let mut seq = 0;
    while size < index + 1 {
        seq += 1;
        size = 2 * size + 1;
    }

    while size - 1 != index {
        size = (size - 1) >> 1;
        seq -= 1;
        index %= size;
    }

    1 << seq
}

/// Counts conflicts and tells the driver when the next restart is due.
pub struct RestartSchedule {
    strategy: RestartStrategy,
    restarts: u64,
    conflicts_since_restart: u64,
    limit: Option<u64>,
}

impl RestartSchedule {
    pub fn new(strategy: RestartStrategy) -> Self {
        RestartSchedule {
            strategy,
            restarts: 0,
            conflicts_since_restart: 0,
            limit: Self::interval(strategy, 0),
        }
    }

    fn interval(strategy: RestartStrategy, restarts: u64) -> Option<u64> {
        match strategy {
            RestartStrategy::Luby { base } => Some(base.saturating_mul(luby(restarts)).max(1)),
            RestartStrategy::Geometric { first, factor } => {
                let exponent = i32::try_from(restarts).unwrap_or(i32::MAX);
                Some(((first as f64) * factor.powi(exponent)).max(1.0) as u64)
            }
            RestartStrategy::Never => None,
        }
    }

    pub fn on_conflict(&mut self) {
        self.conflicts_since_restart += 1;
    }

    pub fn restart_due(&self) -> bool {
        self.limit
            .map_or(false, |limit| self.conflicts_since_restart >= limit)
    }

    /// Records a restart and moves to the next interval.
    pub fn restarted(&mut self) {
        self.restarts += 1;
        self.conflicts_since_restart = 0;
        self.limit = Self::interval(self.strategy, self.restarts);
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}
