/*!
Definitions for the miners taking part in a simulation

A [`Miner`] is a fixed participant with a hash rate: the number of independent
proof-of-work trials it performs in each tick. Whether those trials succeed is
decided by an [`Oracle`]. The default oracle is [`HashOracle`], which hashes
`(seed, miner, tick, trial)` and compares the digest against the run's
[`Target`].

# Examples
An oracle in which every miner finds exactly one block per tick.

```
use propagation_sim::prelude::*;

#[derive(Debug, Clone)]
struct Always;

impl Oracle for Always {
    fn name(&self) -> String {
        "Always".to_string()
    }

    fn reseed(&mut self, _seed: u64) {}

    fn successes(
        &mut self,
        _miner: MinerId,
        hash_rate: HashRate,
        _tick: Tick,
        _target: Target,
    ) -> u64 {
        u64::from(hash_rate > 0)
    }
}
```
*/

use std::fmt::Debug;

use crate::target::Target;

pub mod hash;
pub mod scripted;

pub use hash::HashOracle;
pub use scripted::Scripted;

/// Number of proof-of-work trials a miner performs per tick.
pub type HashRate = u64;

/// Index of a simulated tick (one second of network time).
pub type Tick = u64;

/// Unique identifier of a [`Miner`]. Corresponds to a 1-based [`usize`]
/// following the order in which miners were added to a
/// [`SimulationBuilder`](crate::simulation::SimulationBuilder).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerId(pub(crate) usize);

impl MinerId {
    /// Returns the [`usize`] corresponding to this [`MinerId`].
    pub fn get(&self) -> usize {
        self.0
    }

    /// Position of this miner in per-miner vectors.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0 - 1
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index + 1)
    }
}

impl From<usize> for MinerId {
    fn from(value: usize) -> Self {
        assert_ne!(value, 0, "newly made MinerId must be greater than 0");
        Self(value)
    }
}

impl Default for MinerId {
    fn default() -> Self {
        Self(1)
    }
}

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A miner's configuration. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Miner {
    pub id: MinerId,
    pub name: String,
    pub hash_rate: HashRate,
}

/// Decides how many proof-of-work trials succeed for a miner in a tick.
///
/// Implementations must be reproducible: the result may only depend on the
/// oracle's seed and the call arguments, never on the order of calls, so that
/// no two miners or ticks share random state.
pub trait Oracle: Debug + dyn_clone::DynClone + Send + Sync {
    /// Returns the name of this oracle.
    fn name(&self) -> String;

    /// Sets the seed used by subsequent calls to
    /// [`successes`](Oracle::successes). Called once before each run.
    fn reseed(&mut self, seed: u64);

    /// Returns the number of the `hash_rate` trials of `miner` in `tick`
    /// which meet `target`.
    fn successes(
        &mut self,
        miner: MinerId,
        hash_rate: HashRate,
        tick: Tick,
        target: Target,
    ) -> u64;

    /// Number of miners this oracle was built for, if fixed.
    fn miners(&self) -> Option<usize> {
        None
    }
}

dyn_clone::clone_trait_object!(Oracle);

#[cfg(test)]
mod tests {
    use super::MinerId;

    #[test]
    fn miner_id_index_roundtrip() {
        let id = MinerId::from(3);
        assert_eq!(id.index(), 2);
        assert_eq!(MinerId::from_index(id.index()), id);
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    #[should_panic]
    fn miner_id_zero_panics() {
        let _ = MinerId::from(0);
    }
}
