/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

Creating a [`ResultsTable`] after running a simulation group:

```
use propagation_sim::prelude::*;

let group = SimulationBuilder::new()
    .add_miner("A", 5)
    .add_miner("B", 5)
    .add_miner("C", 2)
    .heavy_producer(MinerId::from(1))
    .topology(PropagationTopology::new(10).stage(1, [2]))
    .difficulty(Difficulty::HashesPerBlock(120))
    .ticks(2_000)
    .repeat_all(3)
    .seed(1)
    .build()
    .unwrap();

let results = group
    .run_all()
    .average(Average::Mean) // Take the mean of repeated simulations' results
    .totals()               // Include total blocks and the overall stale rate
    .stale_rates()          // Include each miner's stale rate
    .format(Format::CSV)    // Output results as CSV
    .build();

println!("{}", results);
```
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

use crate::{
    miner::MinerId, simulation::SimulationOutput, utils::median_of_floats,
    utils::WrappedFunc,
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Typically produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<SimulationOutput>,
    format: Format,
    repeated: NonZeroUsize,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

impl ResultsBuilder {
    pub(crate) fn new(
        data: Vec<SimulationOutput>,
        repeated: NonZeroUsize,
    ) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    fn num_miners(&self) -> usize {
        self.data.first().map_or(0, |output| output.miners.len())
    }

    fn per_miner(mut self, column: fn(MinerId) -> Column) -> Self {
        for miner in 1..=self.num_miners() {
            self.columns.insert(column(MinerId::from(miner)));
        }

        self
    }

    /// Include every built-in column.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.names()
            .accepted()
            .stale()
            .stale_rates()
            .revenue()
            .totals()
            .races()
            .ticks()
            .seed()
    }

    /// Average the results of repeated simulations based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Include a "Miner `X` Name" column for each miner `X`.
    pub fn names(self) -> Self {
        self.per_miner(Column::MinerName)
    }

    /// Include a "Miner `X` Accepted" column for each miner `X`.
    pub fn accepted(self) -> Self {
        self.per_miner(Column::MinerAccepted)
    }

    /// Include a "Miner `X` Stale" column for each miner `X`.
    pub fn stale(self) -> Self {
        self.per_miner(Column::MinerStale)
    }

    /// Include a "Miner `X` Stale Rate" column for each miner `X`.
    pub fn stale_rates(self) -> Self {
        self.per_miner(Column::MinerStaleRate)
    }

    /// Include a "Miner `X` Revenue" column for each miner `X`, holding the
    /// miner's share of all accepted blocks.
    pub fn revenue(self) -> Self {
        self.per_miner(Column::MinerRevenue)
    }

    /// Include the "Total Blocks", "Total Stale" and "Stale Rate" columns.
    pub fn totals(mut self) -> Self {
        self.columns.insert(Column::TotalBlocks);
        self.columns.insert(Column::TotalStale);
        self.columns.insert(Column::StaleRate);

        self
    }

    /// Include one column per race outcome.
    pub fn races(mut self) -> Self {
        self.columns.insert(Column::RacesStarted);
        self.columns.insert(Column::Abandoned);
        self.columns.insert(Column::HeavyWins);
        self.columns.insert(Column::ContestedHeavyWins);
        self.columns.insert(Column::CompetingWins);

        self
    }

    /// Include the "Simulated Ticks" column.
    pub fn ticks(mut self) -> Self {
        self.columns.insert(Column::Ticks);

        self
    }

    /// Include the "Seed" column. When results are averaged, the seed of the
    /// first run in each group is shown.
    pub fn seed(mut self) -> Self {
        self.columns.insert(Column::Seed);

        self
    }

    /// Include a column with title `title` which only contains the given
    /// value.
    pub fn constant<T>(mut self, title: T, value: f64) -> Self
    where
        T: Into<String>,
    {
        let func = WrappedFunc::new(title, move |_: &SimulationOutput| value);
        self.columns.insert(Column::Function(func));

        self
    }

    /// Include a column with title `title` holding the result of `func` for
    /// each run (averaged like any other metric).
    pub fn output_func<T, F>(mut self, title: T, func: F) -> Self
    where
        T: Into<String>,
        F: Fn(&SimulationOutput) -> f64 + Send + Sync + 'static,
    {
        self.columns.insert(Column::Function(WrappedFunc::new(title, func)));

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Extract the raw [`SimulationOutput`] data from this [`ResultsBuilder`].
    ///
    /// # Ordering
    /// Outputs are grouped by topology, in the order the topologies were
    /// given to the builder, with repeated runs next to each other.
    pub fn data(self) -> Vec<SimulationOutput> {
        self.data
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let ResultsBuilder { average, mut columns, data, format, repeated } =
            self;

        columns.insert(Column::Topology);
        let num_miners = data.first().map_or(0, |output| output.miners.len());
        for miner in 1..=num_miners {
            columns.insert(Column::MinerHashRate(MinerId::from(miner)));
        }

        if average != Average::None {
            columns.insert(Column::AverageOf(average));
        }

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => data
                .iter()
                .map(|output| {
                    columns.iter().map(|col| col.get_value(output)).collect()
                })
                .collect(),
            _ => data
                .chunks(repeated.get())
                .map(|outputs| {
                    columns
                        .iter()
                        .map(|col| col.get_average_value(average, outputs))
                        .collect()
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
#[derive(Debug, Clone)]
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<Value>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// Column titles, in display order.
    pub fn titles(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.to_string()).collect()
    }

    /// Number of data rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the numeric value in the given row of the column with the
    /// given title, if both exist and the value is numeric.
    pub fn value(&self, row: usize, title: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c.to_string() == title)?;
        match self.rows.get(row)?.get(col)? {
            Value::Int(i) => Some(*i as f64),
            Value::Float(fl) => Some(*fl),
            Value::Text(_) => None,
        }
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles = self.titles();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        text_widths[i] = text_widths[i].max(val.to_string().len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
                    write!(
                        f,
                        " {:1$} {2}",
                        title,
                        text_widths[i],
                        Self::SEPARATOR_VERTICAL
                    )?;
                }
                writeln!(f)?;

                let total_width = text_widths.iter().map(|x| x + 3).sum();
                for _ in 0..total_width {
                    write!(f, "{}", Self::SEPARATOR_HORIZONTAL)?;
                }

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Methods of extracting an average/central value from a set of repeated
/// simulations.
///
/// In the process of creating an results table, the given averaging method is
/// only applied to the values of columns which change between runs.
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    Topology,
    MinerName(MinerId),
    MinerHashRate(MinerId),
    MinerAccepted(MinerId),
    MinerStale(MinerId),
    MinerStaleRate(MinerId),
    MinerRevenue(MinerId),
    Function(WrappedFunc<SimulationOutput, f64>),
    Ticks,
    Seed,
    AverageOf(Average),
    TotalBlocks,
    TotalStale,
    StaleRate,
    RacesStarted,
    Abandoned,
    HeavyWins,
    ContestedHeavyWins,
    CompetingWins,
}

/// Value held in a cell of a [`ResultsTable`].
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Int(u64),
    Float(f64),
}

impl Column {
    /// Numeric value of this column for a single run, if the column holds a
    /// metric which varies between runs.
    fn metric(&self, output: &SimulationOutput) -> Option<f64> {
        let ledger = &output.ledger;
        let races = ledger.races();

        let value = match &self {
            Self::MinerAccepted(id) => ledger.tally(*id).accepted as f64,
            Self::MinerStale(id) => ledger.tally(*id).stale as f64,
            Self::MinerStaleRate(id) => ledger.tally(*id).stale_rate(),
            Self::MinerRevenue(id) => ledger.revenue_share(*id),
            Self::Function(func) => func.call(output),
            Self::TotalBlocks => ledger.total_found() as f64,
            Self::TotalStale => ledger.total_stale() as f64,
            Self::StaleRate => ledger.stale_rate(),
            Self::RacesStarted => races.started as f64,
            Self::Abandoned => races.abandoned as f64,
            Self::HeavyWins => races.heavy_won as f64,
            Self::ContestedHeavyWins => races.contested_heavy_won as f64,
            Self::CompetingWins => races.competing_won as f64,
            Self::Topology
            | Self::MinerName(_)
            | Self::MinerHashRate(_)
            | Self::Ticks
            | Self::Seed
            | Self::AverageOf(_) => return None,
        };

        Some(value)
    }

    fn get_value(&self, output: &SimulationOutput) -> Value {
        let ledger = &output.ledger;
        let races = ledger.races();

        match &self {
            Self::Topology => Value::Text(output.topology.to_string()),
            Self::MinerName(id) => {
                Value::Text(output.miners[id.index()].name.clone())
            }
            Self::MinerHashRate(id) => {
                Value::Int(output.miners[id.index()].hash_rate)
            }
            Self::MinerAccepted(id) => Value::Int(ledger.tally(*id).accepted),
            Self::MinerStale(id) => Value::Int(ledger.tally(*id).stale),
            Self::Ticks => Value::Int(output.ticks),
            Self::Seed => Value::Int(output.seed),
            Self::TotalBlocks => Value::Int(ledger.total_found()),
            Self::TotalStale => Value::Int(ledger.total_stale()),
            Self::RacesStarted => Value::Int(races.started),
            Self::Abandoned => Value::Int(races.abandoned),
            Self::HeavyWins => Value::Int(races.heavy_won),
            Self::ContestedHeavyWins => Value::Int(races.contested_heavy_won),
            Self::CompetingWins => Value::Int(races.competing_won),
            Self::AverageOf(_) => unreachable!(
                "never need the single value of the average descriptor column"
            ),
            _ => Value::Float(self.metric(output).unwrap_or(f64::NAN)),
        }
    }

    fn get_average_value(
        &self,
        method: Average,
        data: &[SimulationOutput],
    ) -> Value {
        if let Self::AverageOf(_) = self {
            return Value::Int(data.len() as u64);
        }

        let values: Option<Vec<_>> =
            data.iter().map(|output| self.metric(output)).collect();
        let values = match values {
            Some(values) if !values.is_empty() => values,
            _ => return self.get_value(&data[0]),
        };

        let avg = match method {
            Average::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Average::Median => median_of_floats(values),
            Average::Max => values.into_iter().fold(f64::MIN, f64::max),
            Average::Min => values.into_iter().fold(f64::MAX, f64::min),
            Average::None => unreachable!(),
        };

        Value::Float(avg)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Topology => write!(f, "Topology"),
            Self::MinerName(id) => write!(f, "Miner {} Name", id),
            Self::MinerHashRate(id) => write!(f, "Miner {} Hash Rate", id),
            Self::MinerAccepted(id) => write!(f, "Miner {} Accepted", id),
            Self::MinerStale(id) => write!(f, "Miner {} Stale", id),
            Self::MinerStaleRate(id) => write!(f, "Miner {} Stale Rate", id),
            Self::MinerRevenue(id) => write!(f, "Miner {} Revenue", id),
            Self::Function(func) => write!(f, "{}", func.name()),
            Self::Ticks => write!(f, "Simulated Ticks"),
            Self::Seed => write!(f, "Seed"),
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => unreachable!(),
            },
            Self::TotalBlocks => write!(f, "Total Blocks"),
            Self::TotalStale => write!(f, "Total Stale"),
            Self::StaleRate => write!(f, "Stale Rate"),
            Self::RacesStarted => write!(f, "Races Started"),
            Self::Abandoned => write!(f, "Races Abandoned"),
            Self::HeavyWins => write!(f, "Heavy Chain Wins"),
            Self::ContestedHeavyWins => write!(f, "Contested Heavy Chain Wins"),
            Self::CompetingWins => write!(f, "Competing Chain Wins"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Text(text) => write!(f, "{}", text),
            Self::Int(int) => write!(f, "{}", int),
            Self::Float(fl) => write!(f, "{:.1$}", fl, FLOAT_PRECISION_DIGITS),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        miner::{MinerId, Scripted},
        simulation::SimulationBuilder,
        topology::PropagationTopology,
    };

    use super::{Average, Format, ResultsBuilder};

    // Miner 1's heavy block is contested by miner 3 in the second tick. With
    // miner 2 receiving the block after one tick the heavy chain wins the
    // tie; without any stages the heavy block is abandoned.
    fn results() -> ResultsBuilder {
        SimulationBuilder::new()
            .add_miner("A", 1)
            .add_miner("B", 1)
            .add_miner("C", 1)
            .heavy_producer(MinerId::from(1))
            .topology(PropagationTopology::new(3).stage(1, [2]))
            .topology(PropagationTopology::new(3))
            .oracle(Scripted::new([vec![1, 0, 0], vec![0, 0, 1]]))
            .ticks(4)
            .repeat_all(2)
            .seed(8)
            .build()
            .unwrap()
            .run_all()
    }

    #[test]
    fn averaged_rows_per_topology() {
        let table = results().average(Average::Mean).all().build();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.value(0, "Mean Of"), Some(2.0));
        assert_eq!(table.value(0, "Miner 1 Accepted"), Some(1.0));
        assert_eq!(table.value(0, "Miner 3 Stale"), Some(1.0));
        assert_eq!(table.value(0, "Contested Heavy Chain Wins"), Some(1.0));
        assert_eq!(table.value(1, "Miner 1 Stale"), Some(1.0));
        assert_eq!(table.value(1, "Miner 3 Revenue"), Some(1.0));
        assert_eq!(table.value(1, "Races Abandoned"), Some(1.0));
        assert_eq!(table.value(1, "Stale Rate"), Some(0.5));
        assert_eq!(table.value(0, "Seed"), Some(8.0));
        assert_eq!(table.value(0, "Topology"), None);
    }

    #[test]
    fn unaveraged_rows_per_run() {
        let table = results().totals().seed().build();

        assert_eq!(table.num_rows(), 4);
        assert_eq!(table.value(1, "Seed"), Some(9.0));
        assert_eq!(table.value(3, "Total Blocks"), Some(2.0));
        assert_eq!(table.value(0, "Mean Of"), None);
    }

    #[test]
    fn custom_columns() {
        let table = results()
            .average(Average::Max)
            .constant("Gamma", 0.5)
            .output_func("In Flight", |output| output.total_in_flight() as f64)
            .build();

        assert_eq!(table.value(0, "Gamma"), Some(0.5));
        assert_eq!(table.value(1, "In Flight"), Some(0.0));
        assert_eq!(table.value(0, "Max Of"), Some(2.0));
    }

    #[test]
    fn csv_format() {
        let table = results().names().format(Format::CSV).build();
        let text = table.to_string();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header
            .starts_with("Topology,Miner 1 Name,Miner 2 Name,Miner 3 Name"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn pretty_format() {
        let mut table = results().stale_rates().build();
        table.set_format(Format::PrettyPrint);
        let text = table.to_string();

        assert!(text.lines().next().unwrap().contains("| Miner 1 Hash Rate |"));
        assert!(text.contains("full:3"));
    }
}
