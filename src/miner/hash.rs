//! Proof-of-work trials backed by SHA-256.

use sha2::{Digest, Sha256};

use crate::target::Target;

use super::{HashRate, MinerId, Oracle, Tick};

/// Performs each trial by hashing `(seed, miner, tick, trial)` with SHA-256
/// and comparing the first 8 bytes of the digest against the [`Target`].
///
/// Every trial has its own preimage, so outcomes are independent across
/// miners, ticks and trials, and identical for identical seeds.
#[derive(Debug, Clone, Default)]
pub struct HashOracle {
    seed: u64,
}

impl HashOracle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the 64-bit hash value of a single trial.
    pub fn trial(&self, miner: MinerId, tick: Tick, trial: u64) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update((miner.get() as u64).to_le_bytes());
        hasher.update(tick.to_le_bytes());
        hasher.update(trial.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let mut value = [0u8; 8];
        value.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(value)
    }
}

impl Oracle for HashOracle {
    fn name(&self) -> String {
        "SHA-256".into()
    }

    fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn successes(
        &mut self,
        miner: MinerId,
        hash_rate: HashRate,
        tick: Tick,
        target: Target,
    ) -> u64 {
        (0..hash_rate)
            .filter(|&j| target.is_met_by(self.trial(miner, tick, j)))
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        miner::{MinerId, Oracle},
        target::Target,
    };

    use super::HashOracle;

    #[test]
    fn trials_are_reproducible() {
        let a = HashOracle::new(42);
        let b = HashOracle::new(42);
        let id = MinerId::from(1);

        assert_eq!(a.trial(id, 7, 3), b.trial(id, 7, 3));
        assert_ne!(a.trial(id, 7, 3), a.trial(id, 7, 4));
        assert_ne!(a.trial(id, 7, 3), a.trial(MinerId::from(2), 7, 3));
        assert_ne!(a.trial(id, 7, 3), HashOracle::new(43).trial(id, 7, 3));
    }

    #[test]
    fn target_of_12000_hashes_per_block() {
        // 250 blocks are expected over 3,000,000 trials.
        let mut oracle = HashOracle::new(0);
        let target = Target::from_hashes_per_block(12_000);
        let id = MinerId::from(1);

        let found: u64 =
            (0..3_000).map(|tick| oracle.successes(id, 1_000, tick, target)).sum();

        assert!((175..=325).contains(&found), "found {found} blocks");
    }

    #[test]
    fn successes_stack_within_a_tick() {
        let mut oracle = HashOracle::new(9);
        let always = Target::from_hashes_per_block(1);

        assert_eq!(oracle.successes(MinerId::from(4), 5, 0, always), 5);
        assert_eq!(oracle.successes(MinerId::from(4), 0, 0, always), 0);
    }
}
