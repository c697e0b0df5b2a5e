//! Column names and pipeline settings.
//!
//! Every stage reads column names from [`Schema`] and tuning knobs from
//! [`PipelineConfig`], so a renamed export or a different city is a config
//! edit. Both can be overridden from a JSON file; absent fields keep the
//! Nashville defaults.

use crate::error::AppError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Placeholder substituted for missing categorical values.
pub const UNKNOWN: &str = "UNKNOWN";

/// Exact column names of the accident export and the category rules applied to them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Schema {
    pub timestamp: String,
    /// `chrono` pattern for the timestamp column.
    pub timestamp_format: String,
    pub latitude: String,
    pub longitude: String,
    pub injuries: String,
    pub fatalities: String,
    pub vehicles: String,
    pub hit_and_run: String,
    pub accident_number: String,
    pub street_address: String,
    pub precinct: String,
    pub weather: String,
    pub illumination: String,
    pub collision_type: String,
    pub reporting_officer: String,
    pub harmful_descriptions: String,
    /// Weather labels folded into [`UNKNOWN`].
    pub weather_aliases: Vec<String>,
    /// Weather/lighting labels removed by [`ExclusionMode::Exclude`].
    pub excluded_categories: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            timestamp: "Date and Time".to_string(),
            timestamp_format: "%m/%d/%Y %I:%M:%S %p".to_string(),
            latitude: "Latitude".to_string(),
            longitude: "Longitude".to_string(),
            injuries: "Number of Injuries".to_string(),
            fatalities: "Number of Fatalities".to_string(),
            vehicles: "Number of Motor Vehicles".to_string(),
            hit_and_run: "Hit and Run".to_string(),
            accident_number: "Accident Number".to_string(),
            street_address: "Street Address".to_string(),
            precinct: "Precinct".to_string(),
            weather: "Weather Description".to_string(),
            illumination: "Illumination Description".to_string(),
            collision_type: "Collision Type Description".to_string(),
            reporting_officer: "Reporting Officer".to_string(),
            harmful_descriptions: "HarmfulDescriptions".to_string(),
            weather_aliases: vec!["OTHER (NARRATIVE)".to_string()],
            excluded_categories: vec!["OTHER".to_string(), UNKNOWN.to_string()],
        }
    }
}

impl Schema {
    /// Loads a schema from a JSON file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| AppError::InvalidSchemaFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Columns that must be present on a row for it to survive normalization.
    pub fn required_columns(&self) -> [&str; 10] {
        [
            self.timestamp.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.injuries.as_str(),
            self.fatalities.as_str(),
            self.vehicles.as_str(),
            self.hit_and_run.as_str(),
            self.accident_number.as_str(),
            self.street_address.as_str(),
            self.precinct.as_str(),
        ]
    }

    /// Categorical columns whose missing values become [`UNKNOWN`].
    pub fn soft_columns(&self) -> [&str; 5] {
        [
            self.weather.as_str(),
            self.illumination.as_str(),
            self.reporting_officer.as_str(),
            self.harmful_descriptions.as_str(),
            self.collision_type.as_str(),
        ]
    }

    pub fn is_excluded(&self, value: &str) -> bool {
        self.excluded_categories.iter().any(|c| c == value)
    }
}

/// Whether OTHER/UNKNOWN weather and lighting rows stay in the analysed population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionMode {
    #[default]
    Exclude,
    Keep,
}

/// What to do with a timestamp that does not match [`Schema::timestamp_format`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Drop the row and report the count.
    #[default]
    DropRows,
    /// Fail the whole normalization.
    Reject,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub top_weather: usize,
    pub top_lighting: usize,
    pub top_collision: usize,
    pub exclusion: ExclusionMode,
    pub timestamp_policy: TimestampPolicy,
    /// Groups observed fewer times than this are dropped before reindexing.
    pub min_group_total: Option<u64>,
}

impl PipelineConfig {
    /// Loads settings from a JSON file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| AppError::InvalidSchemaFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_weather: 8,
            top_lighting: 6,
            top_collision: 8,
            exclusion: ExclusionMode::Exclude,
            timestamp_policy: TimestampPolicy::DropRows,
            min_group_total: None,
        }
    }
}
