//! Proof-of-work difficulty and the fixed target derived from it

use crate::miner::HashRate;

/// Configured difficulty of a simulation, resolved into a [`Target`] once the
/// total hash rate of all miners is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Difficulty {
    /// Expected number of trials needed to find a single block.
    HashesPerBlock(u64),
    /// Expected number of ticks between blocks across the whole network.
    BlockInterval(f64),
    /// Raw target: a trial succeeds when its 64-bit hash value is at most
    /// this threshold.
    Threshold(u64),
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::BlockInterval(600.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("hashes per block must be greater than 0")]
    ZeroHashesPerBlock,
    #[error("block interval {0} is not a positive, finite number of ticks")]
    BadBlockInterval(f64),
    #[error("block interval {0} requires more than one block per trial")]
    IntervalTooShort(f64),
    #[error("target threshold 0 can never be met")]
    ZeroThreshold,
    #[error("cannot derive a target for a total hash rate of 0")]
    ZeroHashRate,
}

impl Difficulty {
    /// Resolves this difficulty into a [`Target`] for a population with the
    /// given total hash rate.
    pub fn target(
        &self,
        total_hash_rate: HashRate,
    ) -> Result<Target, TargetError> {
        use TargetError::*;

        match *self {
            Self::HashesPerBlock(0) => Err(ZeroHashesPerBlock),
            Self::HashesPerBlock(n) => Ok(Target::from_hashes_per_block(n)),
            Self::BlockInterval(ticks) => {
                if !ticks.is_finite() || ticks <= 0.0 {
                    return Err(BadBlockInterval(ticks));
                }
                if total_hash_rate == 0 {
                    return Err(ZeroHashRate);
                }

                let hashes_per_block = ticks * total_hash_rate as f64;
                if hashes_per_block < 1.0 {
                    return Err(IntervalTooShort(ticks));
                }

                let threshold = (u64::MAX as f64 / hashes_per_block) as u64;
                Ok(Target { threshold })
            }
            Self::Threshold(0) => Err(ZeroThreshold),
            Self::Threshold(threshold) => Ok(Target { threshold }),
        }
    }
}

/// Fixed proof-of-work target. Constant for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    threshold: u64,
}

impl Target {
    /// Creates a target which is met, on average, once every `n` trials.
    ///
    /// ## Panics
    /// Panics if `n` is 0.
    pub fn from_hashes_per_block(n: u64) -> Self {
        assert_ne!(n, 0, "hashes per block must be greater than 0");
        Self { threshold: u64::MAX / n }
    }

    /// Returns the largest hash value which meets this target.
    #[inline]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Returns true iff a trial with the given hash value succeeds.
    #[inline]
    pub fn is_met_by(&self, value: u64) -> bool {
        value <= self.threshold
    }

    /// Probability that a single trial meets this target.
    pub fn probability(&self) -> f64 {
        (self.threshold as f64 + 1.0) / 2f64.powi(64)
    }

    /// Expected number of blocks found per tick by a population with the
    /// given total hash rate.
    pub fn expected_blocks_per_tick(&self, total_hash_rate: HashRate) -> f64 {
        self.probability() * total_hash_rate as f64
    }
}
