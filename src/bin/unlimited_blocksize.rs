//! Six miners, one of which publishes blocks that take 82 seconds to reach
//! the whole network.
//!
//! Miners A, B and C have 25% of the hash rate each, D and E have 10% and F
//! has 5%. A's heavy blocks reach B and C after 1 second, D and E after 41
//! seconds and F after 81 seconds. The network finds a block every 600
//! seconds on average.
//!
//! Usage: `unlimited_blocksize [TICKS] [REPEATS] [--csv]`

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;
use propagation_sim::prelude::*;

#[derive(Parser)]
#[command(name = "unlimited_blocksize")]
#[command(about = "Simulate heavy block races in a six-miner network")]
struct Args {
    /// Number of one-second ticks to simulate per run
    #[arg(default_value_t = 600 * 50_000)]
    ticks: Tick,

    /// Number of runs, each with its own seed
    #[arg(default_value_t = 1)]
    repeats: usize,

    /// Print the results as CSV
    #[arg(long)]
    csv: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let format = if args.csv {
        Format::CSV
    } else {
        Format::PrettyPrint
    };
    let ticks = args.ticks;

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
        .ticks(ticks)
        .repeat_all(args.repeats)
        .on_progress((ticks / 100).max(1), |progress| {
            info!(
                "run {}: {:.0}% complete",
                progress.run,
                progress.fraction() * 100.0
            );
        })
        .build()?;

    let results = group
        .run_all()
        .average(Average::Mean)
        .all()
        .format(format)
        .build();

    println!("{}", results);
    println!("elapsed time: {:.4} secs", start.elapsed().as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["unlimited_blocksize"]).unwrap();
        assert_eq!(args.ticks, 30_000_000);
        assert_eq!(args.repeats, 1);
        assert!(!args.csv);
    }

    #[test]
    fn positional_arguments_and_csv_flag() {
        let args =
            Args::try_parse_from(["unlimited_blocksize", "6000", "4", "--csv"])
                .unwrap();
        assert_eq!(args.ticks, 6000);
        assert_eq!(args.repeats, 4);
        assert!(args.csv);

        assert!(Args::try_parse_from(["unlimited_blocksize", "many"]).is_err());
    }
}
