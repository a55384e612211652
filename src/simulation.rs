//! Building/running simulations and collecting their output

use std::num::{NonZeroU64, NonZeroUsize};

use log::info;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    ledger::Ledger,
    miner::{Miner, Oracle, Tick},
    race::{ChainRace, RaceState},
    results::ResultsBuilder,
    target::Target,
    topology::PropagationTopology,
    utils::WrappedFunc,
};

pub mod builder;

pub use builder::{SimulationBuildError, SimulationBuilder};

/// Snapshot passed to a progress observer registered with
/// [`SimulationBuilder::on_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Index of the run within its [`SimulationGroup`].
    pub run: usize,
    /// Number of completed ticks.
    pub tick: Tick,
    /// Number of ticks the run will last for.
    pub ticks: Tick,
}

impl Progress {
    /// Fraction of the run which has completed.
    pub fn fraction(&self) -> f64 {
        self.tick as f64 / self.ticks as f64
    }
}

/// Observer invoked every `every` completed ticks.
#[derive(Debug, Clone)]
pub(crate) struct ProgressObserver {
    pub every: NonZeroU64,
    pub func: WrappedFunc<Progress, ()>,
}

/// Container for a group of simulations which share the same set of miners.
/// One simulation is created for every combination of propagation topology
/// and repetition. Simulations should be run using this struct's `run_all`
/// method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    miners: Vec<Miner>,
    target: Target,
    races: Vec<ChainRace>,
    oracle: Box<dyn Oracle>,
    progress: Option<ProgressObserver>,
    repeat_all: NonZeroUsize,
    seed: u64,
    ticks: Tick,
}

impl SimulationGroup {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Base seed of this group. Repetition `r` of every topology is run with
    /// seed `seed + r`.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Creates every simulation in this group without running them, ordered
    /// by topology, then by repetition.
    pub fn simulations(&self) -> Vec<Simulation> {
        let mut sims = vec![];
        for race in &self.races {
            for r in 0..self.repeat_all.get() {
                let seed = self.seed.wrapping_add(r as u64);
                let mut oracle = self.oracle.clone();
                oracle.reseed(seed);

                sims.push(Simulation {
                    run: sims.len(),
                    seed,
                    miners: self.miners.clone(),
                    target: self.target,
                    race: race.clone(),
                    oracle,
                    progress: self.progress.clone(),
                    ticks: self.ticks,
                    tick: 0,
                    state: RaceState::Idle,
                    ledger: Ledger::new(self.miners.len()),
                    found: vec![0; self.miners.len()],
                });
            }
        }

        sims
    }

    /// Runs every simulation in this group, in parallel when the `rayon`
    /// feature is enabled.
    pub fn run_all(self) -> ResultsBuilder {
        let sims = self.simulations();
        info!(
            "running {} simulations of {} ticks (base seed {})",
            sims.len(),
            self.ticks,
            self.seed
        );

        #[cfg(feature = "rayon")]
        let outputs: Vec<_> =
            sims.into_par_iter().map(Simulation::run).collect();
        #[cfg(not(feature = "rayon"))]
        let outputs: Vec<_> = sims.into_iter().map(Simulation::run).collect();

        info!("finished {} simulations", outputs.len());
        ResultsBuilder::new(outputs, self.repeat_all)
    }
}

/// A single run of the chain race simulation.
///
/// A simulation may be advanced one tick at a time with [`Simulation::step`]
/// and inspected or stopped between any two ticks.
#[derive(Debug, Clone)]
pub struct Simulation {
    run: usize,
    seed: u64,
    miners: Vec<Miner>,
    target: Target,
    race: ChainRace,
    oracle: Box<dyn Oracle>,
    progress: Option<ProgressObserver>,
    ticks: Tick,
    tick: Tick,
    state: RaceState,
    ledger: Ledger,
    /// Blocks found by each miner in the current tick.
    found: Vec<u64>,
}

/// Contains the output data from a simulation.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub seed: u64,
    /// Number of ticks which were simulated.
    pub ticks: Tick,
    pub miners: Vec<Miner>,
    pub topology: PropagationTopology,
    pub ledger: Ledger,
    /// Blocks of each miner which were still provisional when the run
    /// stopped, by miner index.
    pub in_flight: Vec<u64>,
}

impl SimulationOutput {
    /// Total number of provisional blocks at the end of the run.
    pub fn total_in_flight(&self) -> u64 {
        self.in_flight.iter().sum()
    }
}

impl Simulation {
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed ticks.
    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.tick >= self.ticks
    }

    #[inline]
    pub fn state(&self) -> &RaceState {
        &self.state
    }

    #[inline]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Simulates a single tick. Returns false without doing anything if the
    /// simulation has already finished.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }

        for (found, miner) in self.found.iter_mut().zip(&self.miners) {
            *found = self.oracle.successes(
                miner.id,
                miner.hash_rate,
                self.tick,
                self.target,
            );
            self.ledger.record_found(miner.id, *found);
        }

        let state = std::mem::take(&mut self.state);
        let (state, settlement) = self.race.step(state, &self.found);
        self.ledger.apply(&settlement);
        self.state = state;
        self.tick += 1;

        if let Some(observer) = &self.progress {
            if self.tick % observer.every.get() == 0 {
                observer.func.call(&Progress {
                    run: self.run,
                    tick: self.tick,
                    ticks: self.ticks,
                });
            }
        }

        true
    }

    /// Runs the simulation until all of its ticks have been simulated.
    pub fn run(mut self) -> SimulationOutput {
        while self.step() {}

        self.into_output()
    }

    /// Stops the simulation, returning its output so far.
    pub fn into_output(self) -> SimulationOutput {
        let in_flight = self
            .miners
            .iter()
            .map(|miner| self.state.in_flight(miner.id))
            .collect();

        SimulationOutput {
            seed: self.seed,
            ticks: self.tick,
            topology: self.race.topology().clone(),
            miners: self.miners,
            ledger: self.ledger,
            in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use crate::{
        miner::{MinerId, Scripted},
        target::Difficulty,
        topology::PropagationTopology,
    };

    use super::{SimulationBuilder, SimulationOutput};

    /// Six miners with 25/25/25/10/10/5 percent of 20 trials per tick, one
    /// block every 600 ticks, heavy blocks from miner 1.
    fn six_miners() -> SimulationBuilder {
        SimulationBuilder::new()
            .add_miner("A", 5)
            .add_miner("B", 5)
            .add_miner("C", 5)
            .add_miner("D", 2)
            .add_miner("E", 2)
            .add_miner("F", 1)
            .heavy_producer(MinerId::from(1))
            .difficulty(Difficulty::HashesPerBlock(12_000))
            .topology(
                PropagationTopology::new(82)
                    .stage(1, [2, 3])
                    .stage(41, [4, 5])
                    .stage(81, [6]),
            )
    }

    fn conserved(output: &SimulationOutput) -> bool {
        output.ledger.total_accepted()
            + output.ledger.total_stale()
            + output.total_in_flight()
            == output.ledger.total_found()
    }

    #[test]
    fn identical_seeds_give_identical_results() {
        let run = || {
            six_miners()
                .difficulty(Difficulty::HashesPerBlock(200))
                .ticks(20_000)
                .seed(77)
                .build()
                .unwrap()
                .run_all()
                .data()
                .remove(0)
        };

        let (a, b) = (run(), run());
        assert_eq!(a.ledger, b.ledger);
        assert_eq!(a.in_flight, b.in_flight);
        assert!(a.ledger.races().started > 0);
    }

    #[test]
    fn different_seeds_give_different_results() {
        let outputs = six_miners()
            .difficulty(Difficulty::HashesPerBlock(200))
            .ticks(20_000)
            .repeat_all(2)
            .seed(5)
            .build()
            .unwrap()
            .run_all()
            .data();

        assert_ne!(outputs[0].ledger, outputs[1].ledger);
    }

    #[test]
    fn no_races_without_producer_hash_rate() {
        let output = SimulationBuilder::new()
            .add_miner("A", 0)
            .add_miner("B", 5)
            .add_miner("C", 3)
            .heavy_producer(MinerId::from(1))
            .difficulty(Difficulty::HashesPerBlock(50))
            .topology(PropagationTopology::new(10).stage(1, [2]))
            .ticks(10_000)
            .seed(1)
            .build()
            .unwrap()
            .run_all()
            .data()
            .remove(0);

        assert_eq!(output.ledger.races().started, 0);
        assert_eq!(output.ledger.total_stale(), 0);
        assert!(output.ledger.total_accepted() > 0);
        assert_eq!(output.ledger.total_accepted(), output.ledger.total_found());
    }

    #[test]
    fn blocks_are_conserved_between_ticks() {
        let mut sim = six_miners()
            .difficulty(Difficulty::HashesPerBlock(100))
            .ticks(5_000)
            .seed(3)
            .build()
            .unwrap()
            .simulations()
            .remove(0);

        while sim.step() {
            let ledger = sim.ledger();
            let in_flight: u64 = (1..=6)
                .map(|n| sim.state().in_flight(MinerId::from(n)))
                .sum();
            assert_eq!(
                ledger.total_accepted() + ledger.total_stale() + in_flight,
                ledger.total_found()
            );
        }

        assert_eq!(sim.tick(), 5_000);
        assert!(!sim.step());
        assert!(conserved(&sim.into_output()));
    }

    #[test]
    fn stopping_mid_race_keeps_blocks_in_flight() {
        let script = Scripted::new([vec![1, 0, 0], vec![0, 2, 1]]);
        let mut sim = SimulationBuilder::new()
            .add_miner("A", 1)
            .add_miner("B", 1)
            .add_miner("C", 1)
            .heavy_producer(MinerId::from(1))
            .topology(PropagationTopology::new(10).stage(1, [2]))
            .oracle(script)
            .ticks(100)
            .build()
            .unwrap()
            .simulations()
            .remove(0);

        assert!(sim.step() && sim.step());
        let output = sim.into_output();

        assert_eq!(output.ticks, 2);
        assert_eq!(output.in_flight, vec![1, 2, 1]);
        assert_eq!(output.ledger.total_accepted(), 0);
        assert!(conserved(&output));
    }

    #[test]
    fn scripted_abandon_is_recorded_as_stale() {
        let script = Scripted::new([vec![1, 0, 0], vec![0, 0, 1]]);
        let output = SimulationBuilder::new()
            .add_miner("A", 1)
            .add_miner("B", 1)
            .add_miner("C", 1)
            .heavy_producer(MinerId::from(1))
            .topology(PropagationTopology::new(10).stage(2, [2]))
            .oracle(script)
            .ticks(5)
            .build()
            .unwrap()
            .run_all()
            .data()
            .remove(0);

        let ledger = &output.ledger;
        assert_eq!(ledger.tally(MinerId::from(1)).stale, 1);
        assert_eq!(ledger.tally(MinerId::from(3)).accepted, 1);
        assert_eq!(ledger.races().abandoned, 1);
        assert!(conserved(&output));
    }

    #[test]
    fn progress_observer_runs_at_interval() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);

        six_miners()
            .ticks(1_000)
            .repeat_all(2)
            .seed(0)
            .on_progress(100, move |progress| {
                assert_eq!(progress.tick % 100, 0);
                assert!(progress.fraction() <= 1.0);
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .build()
            .unwrap()
            .run_all();

        assert_eq!(calls.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn six_miners_stale_rate_is_low() {
        let output = six_miners()
            .ticks(3_000_000)
            .seed(2016)
            .build()
            .unwrap()
            .run_all()
            .data()
            .remove(0);

        let ledger = &output.ledger;
        assert!(conserved(&output));
        assert!(ledger.total_found() > 4_000);
        assert!(
            ledger.stale_rate() < 0.01,
            "stale rate {}",
            ledger.stale_rate()
        );
    }

    #[test]
    #[ignore = "simulates 30,000,000 ticks"]
    fn six_miners_full_scale() {
        let output = six_miners()
            .ticks(30_000_000)
            .seed(2016)
            .build()
            .unwrap()
            .run_all()
            .data()
            .remove(0);

        let ledger = &output.ledger;
        let rate = |n: usize| ledger.tally(MinerId::from(n)).stale_rate();

        assert!(conserved(&output));
        assert!(ledger.stale_rate() < 0.01);
        assert!(rate(2) < 0.002 && rate(3) < 0.002);
        assert!(rate(6) > rate(4) && rate(6) > rate(5));
        assert!(rate(6) > rate(2) && rate(6) > rate(3));
    }

    #[test]
    fn resolutions_are_counted() {
        // Heavy block contested by miner 3, then tied and won at the horizon.
        let script = Scripted::new([vec![1, 0, 0], vec![0, 0, 1]]);
        let mut sim = SimulationBuilder::new()
            .add_miner("A", 1)
            .add_miner("B", 1)
            .add_miner("C", 1)
            .heavy_producer(MinerId::from(1))
            .topology(PropagationTopology::new(3).stage(1, [2]))
            .oracle(script)
            .ticks(4)
            .build()
            .unwrap()
            .simulations()
            .remove(0);

        while sim.step() {}
        let races = sim.ledger().races();
        assert_eq!(races.started, 1);
        assert_eq!(races.contested_heavy_won, 1);
        assert!(sim.state().is_idle());
    }
}
