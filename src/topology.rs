//! Describing how a heavy block propagates through the network

use std::fmt::Display;

use crate::miner::MinerId;

/// A set of miners which receive the heavy block `reached_at` ticks after it
/// was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub reached_at: u64,
    pub miners: Vec<MinerId>,
}

/// Static schedule of when each miner becomes aware of a heavy block.
///
/// Stages are cumulative: a miner listed in a stage stays aware for the rest
/// of the race. Miners listed in no stage never see the heavy block before
/// the race is resolved. Once the race has lasted `horizon` ticks the heavy
/// block is considered fully propagated.
///
/// # Example
/// ```
/// use propagation_sim::prelude::*;
///
/// let topology = PropagationTopology::new(82)
///     .stage(1, [2, 3])
///     .stage(41, [4, 5])
///     .stage(81, [6]);
///
/// assert!(topology.validate(6, MinerId::from(1)).is_ok());
/// assert_eq!(topology.first_contact(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationTopology {
    stages: Vec<Stage>,
    horizon: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("no miner can receive a heavy block in the tick it was found")]
    StageAtZero,
    #[error("stage at tick {0} contains no miners")]
    EmptyStage(u64),
    #[error("stage at tick {next} does not come after stage at tick {previous}")]
    NonMonotonic { previous: u64, next: u64 },
    #[error("horizon {horizon} comes before stage at tick {reached_at}")]
    HorizonBeforeStage { horizon: u64, reached_at: u64 },
    #[error("topology refers to unknown miner {0}")]
    UnknownMiner(MinerId),
    #[error("miner {0} appears in more than one stage")]
    DuplicateMiner(MinerId),
    #[error("heavy block producer {0} cannot be listed in a stage")]
    ProducerInStage(MinerId),
}

impl PropagationTopology {
    /// Creates a topology without any stages, fully propagated after
    /// `horizon` ticks.
    pub fn new(horizon: u64) -> Self {
        Self { stages: vec![], horizon }
    }

    /// Adds a stage in which `miners` receive the heavy block `reached_at`
    /// ticks after it was found. Miners are given by their 1-based
    /// [`MinerId`] value; a value of 0 is reported by [`validate`](Self::validate).
    pub fn stage<I>(mut self, reached_at: u64, miners: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.stages.push(Stage {
            reached_at,
            miners: miners.into_iter().map(MinerId).collect(),
        });

        self
    }

    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[inline]
    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    /// Returns the tick at which the first stage receives the heavy block.
    pub fn first_contact(&self) -> Option<u64> {
        self.stages.first().map(|stage| stage.reached_at)
    }

    /// Checks that this topology is a valid schedule for `num_miners` miners
    /// in which `producer` creates the heavy blocks.
    pub fn validate(
        &self,
        num_miners: usize,
        producer: MinerId,
    ) -> Result<(), TopologyError> {
        use TopologyError::*;

        let mut seen = vec![false; num_miners];
        let mut previous = None;
        for stage in &self.stages {
            let reached_at = stage.reached_at;
            if reached_at == 0 {
                return Err(StageAtZero);
            }
            if let Some(previous) = previous {
                if reached_at <= previous {
                    return Err(NonMonotonic { previous, next: reached_at });
                }
            }
            if reached_at > self.horizon {
                return Err(HorizonBeforeStage {
                    horizon: self.horizon,
                    reached_at,
                });
            }
            if stage.miners.is_empty() {
                return Err(EmptyStage(reached_at));
            }

            for &miner in &stage.miners {
                if miner == producer {
                    return Err(ProducerInStage(miner));
                }
                let slot = miner.get().checked_sub(1).and_then(|i| seen.get_mut(i));
                match slot {
                    None => return Err(UnknownMiner(miner)),
                    Some(true) => return Err(DuplicateMiner(miner)),
                    Some(flag) => *flag = true,
                }
            }

            previous = Some(reached_at);
        }

        Ok(())
    }

    /// Returns, for each of `num_miners` miners, the index of the stage it
    /// belongs to.
    pub fn stage_of(&self, num_miners: usize) -> Vec<Option<usize>> {
        let mut stage_of = vec![None; num_miners];
        for (i, stage) in self.stages.iter().enumerate() {
            for miner in &stage.miners {
                let slot = miner
                    .get()
                    .checked_sub(1)
                    .and_then(|i| stage_of.get_mut(i));
                if let Some(slot) = slot {
                    *slot = Some(i);
                }
            }
        }

        stage_of
    }
}

impl Display for PropagationTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for stage in &self.stages {
            let miners: Vec<_> =
                stage.miners.iter().map(|id| id.to_string()).collect();
            write!(f, "{}:[{}] ", stage.reached_at, miners.join(" "))?;
        }

        write!(f, "full:{}", self.horizon)
    }
}

#[cfg(test)]
mod tests {
    use crate::miner::MinerId;

    use super::{PropagationTopology, TopologyError};

    fn producer() -> MinerId {
        MinerId::from(1)
    }

    #[test]
    fn display() {
        let topology =
            PropagationTopology::new(82).stage(1, [2, 3]).stage(41, [4]);
        assert_eq!(topology.to_string(), "1:[2 3] 41:[4] full:82");
    }

    #[test]
    fn stage_lookup() {
        let topology = PropagationTopology::new(10).stage(1, [3]).stage(5, [2]);
        assert_eq!(topology.stage_of(4), vec![None, Some(1), Some(0), None]);
    }

    #[test]
    fn rejects_bad_schedules() {
        use TopologyError::*;

        let cases = [
            (PropagationTopology::new(5).stage(0, [2]), "zero"),
            (PropagationTopology::new(5).stage(2, [2]).stage(2, [3]), "order"),
            (PropagationTopology::new(5).stage(6, [2]), "horizon"),
            (PropagationTopology::new(5).stage(1, [7]), "unknown"),
            (PropagationTopology::new(5).stage(1, [0]), "unknown"),
            (PropagationTopology::new(5).stage(1, [2]).stage(2, [2]), "dup"),
            (PropagationTopology::new(5).stage(1, [1]), "producer"),
            (PropagationTopology::new(5).stage(1, Vec::<usize>::new()), "empty"),
        ];

        for (topology, case) in cases {
            let err = topology.validate(3, producer()).unwrap_err();
            let matched = match case {
                "zero" => matches!(err, StageAtZero),
                "order" => matches!(err, NonMonotonic { previous: 2, next: 2 }),
                "horizon" => matches!(err, HorizonBeforeStage { .. }),
                "unknown" => matches!(err, UnknownMiner(_)),
                "dup" => matches!(err, DuplicateMiner(_)),
                "producer" => matches!(err, ProducerInStage(_)),
                "empty" => matches!(err, EmptyStage(1)),
                _ => unreachable!(),
            };
            assert!(matched, "case {case} produced {err:?}");
        }
    }

    #[test]
    fn no_stages_is_valid() {
        assert!(PropagationTopology::new(0).validate(1, producer()).is_ok());
    }
}
