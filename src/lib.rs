/*!
Simulator for block propagation races under unlimited block sizes.

A single miner produces *heavy* blocks which take many ticks to reach the rest
of the network. Until a heavy block arrives, the miners which have not seen it
keep building a competing chain. Each simulation counts how many blocks of
every miner end up accepted or stale.

```
use propagation_sim::prelude::*;

let group = SimulationBuilder::new()
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
    .ticks(60_000)
    .seed(42)
    .build()
    .unwrap();

let output = group.run_all().data().remove(0);
let ledger = &output.ledger;

assert_eq!(
    ledger.total_accepted() + ledger.total_stale() + output.total_in_flight(),
    ledger.total_found()
);
```
*/

pub mod ledger;
pub mod miner;
pub mod prelude;
pub mod race;
pub mod results;
pub mod simulation;
pub mod target;
pub mod topology;

pub(crate) mod utils;
