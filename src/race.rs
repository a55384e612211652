/*!
The race between a heavy block and the chain competing with it

A heavy block takes several ticks to reach the whole network. Until it does,
miners which have not received it keep extending the previous tip, building a
*competing* chain. [`ChainRace::step`] advances a [`RaceState`] by one tick:
it takes the number of blocks each miner found in that tick and returns the
next state together with a [`Settlement`] of the blocks which became final.

While [`RaceState::Idle`], every block is final as soon as it is found. While
[`RaceState::Racing`], every block is provisional until the race resolves,
at which point the winning chain's blocks are accepted and the losing chain's
blocks go stale.
*/

use log::debug;

use crate::{
    miner::MinerId,
    topology::{PropagationTopology, TopologyError},
};

/// Which chain a group of miners that already extended the competing chain
/// mines on after receiving the heavy block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AllegiancePolicy {
    /// Keep extending the competing chain until the heavy chain is strictly
    /// longer, then switch to the heavy chain for the rest of the race.
    ///
    /// The switch is only possible before the next stage receives the heavy
    /// block (before the horizon for the last stage). Past that point the
    /// stage stays on the competing chain like [`Sticky`](Self::Sticky).
    #[default]
    FollowLeader,
    /// Keep extending the competing chain until the race resolves, even if
    /// the heavy chain takes the lead.
    Sticky,
}

/// State of the chain race between two ticks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum RaceState {
    /// No heavy block is outstanding.
    #[default]
    Idle,
    /// A heavy block was found and the race has not resolved yet.
    Racing(Race),
}

impl RaceState {
    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Number of provisional blocks found by `miner`, on either chain.
    pub fn in_flight(&self, miner: MinerId) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Racing(race) => {
                race.heavy_blocks(miner) + race.competing_blocks(miner)
            }
        }
    }
}

/// Provisional state of an unresolved race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Race {
    progress: u64,
    heavy_depth: u64,
    competing_depth: u64,
    /// Provisional blocks on the heavy chain, by miner index.
    heavy: Vec<u64>,
    /// Provisional blocks on the competing chain, by miner index.
    competing: Vec<u64>,
    /// Whether each stage has committed to the competing chain.
    committed: Vec<bool>,
}

impl Race {
    fn new(num_miners: usize, num_stages: usize) -> Self {
        Self {
            progress: 0,
            heavy_depth: 0,
            competing_depth: 0,
            heavy: vec![0; num_miners],
            competing: vec![0; num_miners],
            committed: vec![false; num_stages],
        }
    }

    /// Ticks elapsed since the heavy block was found.
    #[inline]
    pub fn progress(&self) -> u64 {
        self.progress
    }

    #[inline]
    pub fn heavy_depth(&self) -> u64 {
        self.heavy_depth
    }

    #[inline]
    pub fn competing_depth(&self) -> u64 {
        self.competing_depth
    }

    pub fn heavy_blocks(&self, miner: MinerId) -> u64 {
        self.heavy.get(miner.index()).copied().unwrap_or(0)
    }

    pub fn competing_blocks(&self, miner: MinerId) -> u64 {
        self.competing.get(miner.index()).copied().unwrap_or(0)
    }

    /// Returns true if the stage with the given index is mining on the
    /// competing chain.
    pub fn is_committed(&self, stage: usize) -> bool {
        self.committed.get(stage).copied().unwrap_or(false)
    }

    fn extend_heavy(&mut self, miner: usize, blocks: u64) {
        self.heavy[miner] += blocks;
        self.heavy_depth += blocks;
    }

    fn extend_competing(&mut self, miner: usize, blocks: u64) {
        self.competing[miner] += blocks;
        self.competing_depth += blocks;
    }
}

/// Outcome of a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Another miner found a block before anyone received the heavy block.
    Abandoned,
    /// The heavy chain was still at least as long as the competing chain when
    /// the heavy block finished propagating. `contested` is true if the
    /// competing chain had any blocks.
    HeavyWon { contested: bool },
    /// The competing chain became longer than the heavy chain.
    CompetingWon,
}

/// Blocks which became final during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Blocks accepted into the canonical chain, by miner.
    pub accepted: Vec<(MinerId, u64)>,
    /// Blocks which ended up on the losing side of a race, by miner.
    pub stale: Vec<(MinerId, u64)>,
    /// True if a race started during this tick.
    pub started: bool,
    /// Set if a race resolved during this tick.
    pub resolution: Option<Resolution>,
}

impl Settlement {
    fn accept(&mut self, miner: usize, blocks: u64) {
        if blocks > 0 {
            self.accepted.push((MinerId::from_index(miner), blocks));
        }
    }

    fn reject(&mut self, miner: usize, blocks: u64) {
        if blocks > 0 {
            self.stale.push((MinerId::from_index(miner), blocks));
        }
    }

    /// Total number of blocks accepted.
    pub fn total_accepted(&self) -> u64 {
        self.accepted.iter().map(|(_, n)| n).sum()
    }

    /// Total number of blocks gone stale.
    pub fn total_stale(&self) -> u64 {
        self.stale.iter().map(|(_, n)| n).sum()
    }
}

/// Transition rules of the chain race for a fixed set of miners, heavy block
/// producer and propagation topology.
#[derive(Debug, Clone)]
pub struct ChainRace {
    num_miners: usize,
    producer: MinerId,
    topology: PropagationTopology,
    /// Stage index of each miner, if any.
    stage_of: Vec<Option<usize>>,
    policy: AllegiancePolicy,
}

impl ChainRace {
    /// Creates the rule set for `num_miners` miners, of which `producer`
    /// creates heavy blocks that propagate according to `topology`.
    pub fn new(
        num_miners: usize,
        producer: MinerId,
        topology: PropagationTopology,
        policy: AllegiancePolicy,
    ) -> Result<Self, TopologyError> {
        if producer.index() >= num_miners {
            return Err(TopologyError::UnknownMiner(producer));
        }
        topology.validate(num_miners, producer)?;

        Ok(Self {
            num_miners,
            producer,
            stage_of: topology.stage_of(num_miners),
            topology,
            policy,
        })
    }

    #[inline]
    pub fn producer(&self) -> MinerId {
        self.producer
    }

    #[inline]
    pub fn topology(&self) -> &PropagationTopology {
        &self.topology
    }

    #[inline]
    pub fn policy(&self) -> AllegiancePolicy {
        self.policy
    }

    /// Returns true if some miner other than the producer has received a
    /// heavy block after `progress` ticks.
    fn is_seen(&self, progress: u64) -> bool {
        self.topology
            .first_contact()
            .is_some_and(|reached_at| progress >= reached_at)
    }

    /// Advances `state` by one tick in which each miner found `found[i]`
    /// blocks (indexed by miner index).
    ///
    /// ## Panics
    /// Panics if `found` does not contain exactly one entry per miner.
    pub fn step(
        &self,
        state: RaceState,
        found: &[u64],
    ) -> (RaceState, Settlement) {
        assert_eq!(
            found.len(),
            self.num_miners,
            "expected one block count per miner"
        );

        let producer = self.producer.index();
        let mut settlement = Settlement::default();

        let mut race = match state {
            RaceState::Idle if found[producer] == 0 => {
                for (miner, &blocks) in found.iter().enumerate() {
                    settlement.accept(miner, blocks);
                }
                return (RaceState::Idle, settlement);
            }
            RaceState::Idle => {
                settlement.started = true;
                Race::new(self.num_miners, self.topology.stages().len())
            }
            RaceState::Racing(race) => race,
        };

        // The producer always builds on its own heavy block.
        race.extend_heavy(producer, found[producer]);

        if !self.is_seen(race.progress) {
            let others = found
                .iter()
                .enumerate()
                .any(|(miner, &blocks)| miner != producer && blocks > 0);

            if others {
                debug!(
                    "heavy block abandoned after {} ticks with depth {}",
                    race.progress, race.heavy_depth
                );
                for (miner, &blocks) in race.heavy.iter().enumerate() {
                    settlement.reject(miner, blocks);
                }
                for (miner, &blocks) in found.iter().enumerate() {
                    if miner != producer {
                        settlement.accept(miner, blocks);
                    }
                }
                settlement.resolution = Some(Resolution::Abandoned);

                return (RaceState::Idle, settlement);
            }
        } else {
            self.extend_chains(&mut race, found);
        }

        if race.competing_depth > race.heavy_depth {
            debug!(
                "competing chain ({}) defeated heavy chain ({}) after {} ticks",
                race.competing_depth, race.heavy_depth, race.progress
            );
            for (miner, &blocks) in race.heavy.iter().enumerate() {
                settlement.reject(miner, blocks);
            }
            for (miner, &blocks) in race.competing.iter().enumerate() {
                settlement.accept(miner, blocks);
            }
            settlement.resolution = Some(Resolution::CompetingWon);

            return (RaceState::Idle, settlement);
        }

        if race.progress < self.topology.horizon() {
            race.progress += 1;
            return (RaceState::Racing(race), settlement);
        }

        let contested = race.competing_depth > 0;
        if contested {
            debug!(
                "heavy chain ({}) defeated competing chain ({})",
                race.heavy_depth, race.competing_depth
            );
        }
        for (miner, &blocks) in race.heavy.iter().enumerate() {
            settlement.accept(miner, blocks);
        }
        for (miner, &blocks) in race.competing.iter().enumerate() {
            settlement.reject(miner, blocks);
        }
        settlement.resolution = Some(Resolution::HeavyWon { contested });

        (RaceState::Idle, settlement)
    }

    /// Attaches the blocks of every miner except the producer to the chain
    /// that miner is extending.
    fn extend_chains(&self, race: &mut Race, found: &[u64]) {
        let competing_before = race.competing_depth;

        let stages = self.topology.stages();
        for (s, stage) in stages.iter().enumerate() {
            // A committed stage may only rejoin the heavy chain before the
            // next stage receives the heavy block.
            let rejoin_until = stages
                .get(s + 1)
                .map_or(self.topology.horizon(), |next| next.reached_at);
            let on_heavy = race.progress >= stage.reached_at && {
                if race.committed[s]
                    && self.policy == AllegiancePolicy::FollowLeader
                    && race.progress < rejoin_until
                    && race.heavy_depth > race.competing_depth
                {
                    race.committed[s] = false;
                }
                !race.committed[s]
            };

            for miner in &stage.miners {
                let i = miner.index();
                if on_heavy {
                    race.extend_heavy(i, found[i]);
                } else {
                    race.extend_competing(i, found[i]);
                }
            }
        }

        for (i, stage) in self.stage_of.iter().enumerate() {
            if stage.is_none() && i != self.producer.index() {
                race.extend_competing(i, found[i]);
            }
        }

        // Stages which have not received the heavy block yet see the
        // competing chain as the longest chain.
        if race.competing_depth > competing_before {
            for (s, stage) in self.topology.stages().iter().enumerate() {
                if race.progress < stage.reached_at {
                    race.committed[s] = true;
                }
            }
        }
    }
}
