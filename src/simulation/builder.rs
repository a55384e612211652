use std::num::{NonZeroU64, NonZeroUsize};

use crate::{
    miner::{HashOracle, HashRate, Miner, MinerId, Oracle, Tick},
    race::{AllegiancePolicy, ChainRace},
    target::{Difficulty, TargetError},
    topology::{PropagationTopology, TopologyError},
    utils::WrappedFunc,
};

use super::{Progress, ProgressObserver, SimulationGroup};

/// Builds a [`SimulationGroup`].
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    allegiance: AllegiancePolicy,
    difficulty: Option<Difficulty>,
    miners: Vec<Miner>,
    oracle: Option<Box<dyn Oracle>>,
    producer: Option<MinerId>,
    progress: Option<(Tick, WrappedFunc<Progress, ()>)>,
    repeat_all: Option<usize>,
    seed: Option<u64>,
    ticks: Option<Tick>,
    topologies: Vec<PropagationTopology>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("no miners were added")]
    NoMinersGiven,
    #[error("total hash rate of all miners must be greater than 0")]
    ZeroHashRate,
    #[error("number of simulated ticks must be greater than 0")]
    ZeroTicks,
    #[error("cannot repeat simulations 0 times")]
    ZeroRepeats,
    #[error("progress observer interval must be greater than 0 ticks")]
    ZeroProgressInterval,
    #[error("no heavy block producer was given")]
    NoHeavyProducer,
    #[error("heavy block producer {0} is not one of the added miners")]
    UnknownHeavyProducer(MinerId),
    #[error("no propagation topology was given")]
    NoTopologyGiven,
    #[error("oracle produces results for {oracle} miners, but {miners} were added")]
    OracleMinerMismatch { oracle: usize, miners: usize },
    #[error(transparent)]
    TargetError(#[from] TargetError),
    #[error(transparent)]
    TopologyError(#[from] TopologyError),
}

impl SimulationBuilder {
    /// Creates a new [`SimulationBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a miner which performs `hash_rate` trials per tick. Miners
    /// receive the [`MinerId`]s 1, 2, 3, ... in the order they are added.
    pub fn add_miner<N>(mut self, name: N, hash_rate: HashRate) -> Self
    where
        N: Into<String>,
    {
        self.miners.push(Miner {
            id: MinerId::from(self.miners.len() + 1),
            name: name.into(),
            hash_rate,
        });

        self
    }

    /// Sets the policy followed by miners which built on the competing chain
    /// before receiving a heavy block (default
    /// [`AllegiancePolicy::FollowLeader`]).
    pub fn allegiance(mut self, policy: AllegiancePolicy) -> Self {
        self.allegiance = policy;

        self
    }

    /// Sets the proof-of-work difficulty (default
    /// [`Difficulty::BlockInterval`] of 600 ticks).
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);

        self
    }

    /// Sets the miner which produces heavy blocks.
    pub fn heavy_producer(mut self, miner: MinerId) -> Self {
        self.producer = Some(miner);

        self
    }

    /// Decides trial outcomes with `oracle` ([`HashOracle`] otherwise).
    pub fn oracle<O: Oracle + 'static>(mut self, oracle: O) -> Self {
        self.oracle = Some(Box::new(oracle));

        self
    }

    /// Calls `func` every `every` ticks of every run.
    pub fn on_progress<F>(mut self, every: Tick, func: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress = Some((every, WrappedFunc::new("progress", func)));

        self
    }

    /// Runs every topology `num` times, with seeds `seed`, `seed + 1`, ...
    pub fn repeat_all(mut self, num: usize) -> Self {
        self.repeat_all = Some(num);

        self
    }

    /// Sets the base seed of the group (random otherwise).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Sets the number of ticks each simulation lasts for (default 1).
    pub fn ticks(mut self, ticks: Tick) -> Self {
        self.ticks = Some(ticks);

        self
    }

    /// Adds a propagation topology. Each topology is simulated separately.
    pub fn topology(mut self, topology: PropagationTopology) -> Self {
        self.topologies.push(topology);

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            allegiance,
            difficulty,
            miners,
            oracle,
            producer,
            progress,
            repeat_all,
            seed,
            ticks,
            topologies,
        } = self;

        if miners.is_empty() {
            return Err(NoMinersGiven);
        }
        let total_hash_rate: HashRate =
            miners.iter().map(|m| m.hash_rate).sum();
        if total_hash_rate == 0 {
            return Err(ZeroHashRate);
        }

        let ticks = match ticks {
            Some(0) => return Err(ZeroTicks),
            Some(x) => x,
            None => 1,
        };
        let repeat_all = match repeat_all {
            None => NonZeroUsize::MIN,
            Some(x) => NonZeroUsize::new(x).ok_or(ZeroRepeats)?,
        };
        let progress = match progress {
            None => None,
            Some((every, func)) => Some(ProgressObserver {
                every: NonZeroU64::new(every).ok_or(ZeroProgressInterval)?,
                func,
            }),
        };

        let producer = producer.ok_or(NoHeavyProducer)?;
        if producer.index() >= miners.len() {
            return Err(UnknownHeavyProducer(producer));
        }
        if topologies.is_empty() {
            return Err(NoTopologyGiven);
        }

        let target = difficulty.unwrap_or_default().target(total_hash_rate)?;

        let races = topologies
            .into_iter()
            .map(|topology| {
                ChainRace::new(miners.len(), producer, topology, allegiance)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let oracle = oracle.unwrap_or_else(|| Box::new(HashOracle::default()));
        if let Some(n) = oracle.miners() {
            if n > miners.len() {
                return Err(OracleMinerMismatch {
                    oracle: n,
                    miners: miners.len(),
                });
            }
        }

        Ok(SimulationGroup {
            miners,
            target,
            races,
            oracle,
            progress,
            repeat_all,
            seed: seed.unwrap_or_else(rand::random),
            ticks,
        })
    }
}
