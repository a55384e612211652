/*!
Re-export of common values and datatypes

Must be imported manually.

```
use propagation_sim::prelude::*;
```
*/

use crate::{ledger, miner, race, results, simulation, target, topology};

pub use ledger::{Ledger, RaceStats, Tally};

pub use miner::{
    HashOracle, HashRate, Miner, MinerId, Oracle, Scripted, Tick,
};

pub use race::{
    AllegiancePolicy, ChainRace, Race, RaceState, Resolution, Settlement,
};

pub use results::{Average, Format, ResultsBuilder, ResultsTable};

pub use simulation::{
    Progress, Simulation, SimulationBuildError, SimulationBuilder,
    SimulationGroup, SimulationOutput,
};

pub use target::{Difficulty, Target, TargetError};

pub use topology::{PropagationTopology, Stage, TopologyError};
