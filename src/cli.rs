use crate::dashboard::FilterState;
use crate::data_loader::Sampling;
use crate::record::Metric;
use crate::schema::{ExclusionMode, PipelineConfig, TimestampPolicy};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cross-tabulates traffic-accident records by weather, lighting and time against injury/fatality severity."
)]
pub struct Cli {
    /// The accident export to analyse (CSV, Parquet or NDJSON).
    #[arg(default_value = "data/nashville_accidents.csv")]
    pub input_path: PathBuf,

    /// Read an uploaded CSV from stdin when the input path does not exist.
    #[arg(long, default_value_t = false)]
    pub stdin: bool,

    /// File to write the dashboard tables to (JSON).
    /// Defaults to `<input_stem>.crosstab.json` next to the input file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON file overriding column names and category rules.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// JSON file with pipeline settings (top-K sizes, modes, threshold).
    /// Flags given on the command line take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Analyse a reproducible random subset of this many rows.
    #[arg(long)]
    pub sample: Option<usize>,

    /// Seed for --sample.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of weather categories offered by default [default: 8].
    #[arg(long)]
    pub top_weather: Option<usize>,

    /// Number of lighting categories offered by default [default: 6].
    #[arg(long)]
    pub top_lighting: Option<usize>,

    /// Number of collision types in the collision severity table [default: 8].
    #[arg(long)]
    pub top_collision: Option<usize>,

    /// Drop groups observed fewer times than this before building grids.
    #[arg(long)]
    pub min_group_total: Option<u64>,

    /// Keep rows whose weather or lighting is OTHER/UNKNOWN.
    #[arg(long, default_value_t = false)]
    pub keep_other_unknown: bool,

    /// Fail on the first malformed timestamp instead of dropping the row.
    #[arg(long, default_value_t = false)]
    pub strict_timestamps: bool,

    /// Comma-separated weather values to show. Defaults to the top categories.
    #[arg(long, value_delimiter = ',')]
    pub weather: Option<Vec<String>>,

    /// Comma-separated lighting values to show. Defaults to the top categories.
    #[arg(long, value_delimiter = ',')]
    pub lighting: Option<Vec<String>>,

    /// Numeric column summed in the heatmaps.
    #[arg(long, value_enum, default_value_t = MetricChoice::Injuries)]
    pub metric: MetricChoice,

    /// Print debug info about row counts and cache use
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricChoice {
    Injuries,
    Fatalities,
    Vehicles,
}

impl From<MetricChoice> for Metric {
    fn from(choice: MetricChoice) -> Self {
        match choice {
            MetricChoice::Injuries => Metric::Injuries,
            MetricChoice::Fatalities => Metric::Fatalities,
            MetricChoice::Vehicles => Metric::Vehicles,
        }
    }
}

impl Cli {
    /// Applies the flags that were given on top of `base` (defaults or a `--config` file).
    pub fn pipeline_config(&self, base: PipelineConfig) -> PipelineConfig {
        PipelineConfig {
            top_weather: self.top_weather.unwrap_or(base.top_weather),
            top_lighting: self.top_lighting.unwrap_or(base.top_lighting),
            top_collision: self.top_collision.unwrap_or(base.top_collision),
            exclusion: if self.keep_other_unknown {
                ExclusionMode::Keep
            } else {
                base.exclusion
            },
            timestamp_policy: if self.strict_timestamps {
                TimestampPolicy::Reject
            } else {
                base.timestamp_policy
            },
            min_group_total: self.min_group_total.or(base.min_group_total),
        }
    }

    /// An explicitly empty list (`--weather " "`) is an empty selection, not the default.
    pub fn filter_state(&self) -> FilterState {
        let clean = |values: &Option<Vec<String>>| {
            values.as_ref().map(|v| {
                v.iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<String>>()
            })
        };
        FilterState {
            weather: clean(&self.weather),
            lighting: clean(&self.lighting),
            metric: self.metric.into(),
        }
    }

    pub fn sampling(&self) -> Option<Sampling> {
        self.sample.map(|size| Sampling {
            size,
            seed: self.seed,
        })
    }
}
