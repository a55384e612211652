//! Replays a fixed table of per-tick successes.

use std::sync::Arc;

use crate::target::Target;

use super::{HashRate, MinerId, Oracle, Tick};

/// Oracle which ignores hash rates and targets, and instead returns the
/// number of blocks given for each miner in each tick of a table. Ticks past
/// the end of the table, and miners past the end of a row, find nothing.
///
/// # Example
/// ```
/// use propagation_sim::prelude::*;
///
/// // Miner 1 finds a block in tick 0, miners 2 and 3 find one each in tick 2.
/// let script = Scripted::new([vec![1], vec![], vec![0, 1, 1]]);
/// assert_eq!(script.miners(), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    rows: Arc<Vec<Vec<u64>>>,
}

impl Scripted {
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<u64>>,
    {
        Self { rows: Arc::new(rows.into_iter().collect()) }
    }

    /// Number of ticks covered by the table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of blocks in the table.
    pub fn total(&self) -> u64 {
        self.rows.iter().flatten().sum()
    }
}

impl Oracle for Scripted {
    fn name(&self) -> String {
        "Scripted".into()
    }

    fn reseed(&mut self, _seed: u64) {}

    fn successes(
        &mut self,
        miner: MinerId,
        _hash_rate: HashRate,
        tick: Tick,
        _target: Target,
    ) -> u64 {
        usize::try_from(tick)
            .ok()
            .and_then(|tick| self.rows.get(tick))
            .and_then(|row| row.get(miner.index()))
            .copied()
            .unwrap_or(0)
    }

    fn miners(&self) -> Option<usize> {
        self.rows.iter().map(Vec::len).max()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        miner::{MinerId, Oracle},
        target::Target,
    };

    use super::Scripted;

    #[test]
    fn replays_table_then_nothing() {
        let mut script = Scripted::new([vec![2, 0], vec![0, 1]]);
        let target = Target::from_hashes_per_block(1);
        let (a, b) = (MinerId::from(1), MinerId::from(2));

        assert_eq!(script.successes(a, 0, 0, target), 2);
        assert_eq!(script.successes(b, 0, 1, target), 1);
        assert_eq!(script.successes(a, 0, 2, target), 0);
        assert_eq!(script.successes(MinerId::from(3), 0, 0, target), 0);
        assert_eq!(script.total(), 3);
    }
}
