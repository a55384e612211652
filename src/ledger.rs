//! Running tallies of accepted and stale blocks

use crate::{
    miner::MinerId,
    race::{Resolution, Settlement},
};

/// Block counts of a single miner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Blocks found, whether or not they have been settled yet.
    pub found: u64,
    /// Blocks which made it into the canonical chain.
    pub accepted: u64,
    /// Blocks which ended up on the losing side of a race.
    pub stale: u64,
}

impl Tally {
    /// Blocks which are no longer provisional.
    #[inline]
    pub fn settled(&self) -> u64 {
        self.accepted + self.stale
    }

    /// Fraction of settled blocks which went stale, or 0.0 if nothing has
    /// been settled.
    pub fn stale_rate(&self) -> f64 {
        ratio(self.stale, self.settled())
    }
}

/// Number of races by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaceStats {
    pub started: u64,
    pub abandoned: u64,
    pub heavy_won: u64,
    /// Heavy chain victories over a non-empty competing chain.
    pub contested_heavy_won: u64,
    pub competing_won: u64,
}

impl RaceStats {
    /// Races which have resolved.
    pub fn resolved(&self) -> u64 {
        self.abandoned + self.heavy_won + self.competing_won
    }
}

/// Per-miner results of a run. Counts only ever increase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    tallies: Vec<Tally>,
    races: RaceStats,
}

impl Ledger {
    pub fn new(num_miners: usize) -> Self {
        Self {
            tallies: vec![Tally::default(); num_miners],
            races: RaceStats::default(),
        }
    }

    pub fn record_found(&mut self, miner: MinerId, count: u64) {
        self.tallies[miner.index()].found += count;
    }

    pub fn record_accepted(&mut self, miner: MinerId, count: u64) {
        self.tallies[miner.index()].accepted += count;
    }

    pub fn record_stale(&mut self, miner: MinerId, count: u64) {
        self.tallies[miner.index()].stale += count;
    }

    /// Records every block and race outcome in `settlement`.
    pub fn apply(&mut self, settlement: &Settlement) {
        for &(miner, count) in &settlement.accepted {
            self.record_accepted(miner, count);
        }
        for &(miner, count) in &settlement.stale {
            self.record_stale(miner, count);
        }

        if settlement.started {
            self.races.started += 1;
        }
        match settlement.resolution {
            None => (),
            Some(Resolution::Abandoned) => self.races.abandoned += 1,
            Some(Resolution::HeavyWon { contested }) => {
                self.races.heavy_won += 1;
                if contested {
                    self.races.contested_heavy_won += 1;
                }
            }
            Some(Resolution::CompetingWon) => self.races.competing_won += 1,
        }
    }

    #[inline]
    pub fn tally(&self, miner: MinerId) -> Tally {
        self.tallies[miner.index()]
    }

    #[inline]
    pub fn tallies(&self) -> &[Tally] {
        &self.tallies
    }

    #[inline]
    pub fn races(&self) -> RaceStats {
        self.races
    }

    pub fn total_found(&self) -> u64 {
        self.tallies.iter().map(|t| t.found).sum()
    }

    pub fn total_accepted(&self) -> u64 {
        self.tallies.iter().map(|t| t.accepted).sum()
    }

    pub fn total_stale(&self) -> u64 {
        self.tallies.iter().map(|t| t.stale).sum()
    }

    /// Fraction of all settled blocks which went stale.
    pub fn stale_rate(&self) -> f64 {
        let stale = self.total_stale();
        ratio(stale, self.total_accepted() + stale)
    }

    /// Fraction of all accepted blocks which were found by `miner`.
    pub fn revenue_share(&self, miner: MinerId) -> f64 {
        ratio(self.tally(miner).accepted, self.total_accepted())
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
