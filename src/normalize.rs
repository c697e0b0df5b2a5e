//! Turns a loaded DataFrame into typed [`AccidentRecord`]s.
//!
//! Steps, in order, per row:
//! 1. completeness gate: rows missing any required column are dropped;
//! 2. numeric and flag columns are parsed, unparseable or negative values drop the row;
//! 3. the timestamp is parsed per [`TimestampPolicy`]; typed `Datetime`/`Date`
//!    columns (Parquet, NDJSON) are taken as they are, only text goes through the pattern;
//! 4. soft categorical columns get [`UNKNOWN`] for missing values and the weather aliases fold;
//! 5. rows with OTHER/UNKNOWN weather or lighting are removed under [`ExclusionMode::Exclude`].
//!
//! The input frame is only read. Every dropped row is counted in the
//! [`NormalizeReport`] so the caller can show the population change.

use crate::error::{AppError, DataWarning};
use crate::record::{AccidentRecord, AccidentTable, TimeFields};
use crate::schema::{ExclusionMode, PipelineConfig, Schema, TimestampPolicy, UNKNOWN};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

/// Row counts before and after each normalization step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub missing_required: usize,
    pub invalid_number: usize,
    pub malformed_timestamp: usize,
    pub excluded: usize,
}

impl NormalizeReport {
    /// One warning per step that dropped rows.
    pub fn warnings(&self) -> Vec<DataWarning> {
        let mut warnings = Vec::new();
        if self.missing_required > 0 {
            warnings.push(DataWarning::MissingRequiredField {
                dropped: self.missing_required,
            });
        }
        if self.invalid_number > 0 {
            warnings.push(DataWarning::InvalidNumber {
                dropped: self.invalid_number,
            });
        }
        if self.malformed_timestamp > 0 {
            warnings.push(DataWarning::MalformedTimestamp {
                dropped: self.malformed_timestamp,
            });
        }
        if self.excluded > 0 {
            warnings.push(DataWarning::ExcludedCategory {
                dropped: self.excluded,
            });
        }
        warnings
    }
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: AccidentTable,
    pub report: NormalizeReport,
}

/// A timestamp cell as found in the source.
#[derive(Debug, Clone)]
enum RawTimestamp {
    Typed(NaiveDateTime),
    Text(String),
}

/// Text values of every column the pipeline reads, trimmed, with blanks as `None`.
struct TextColumns {
    timestamp: Vec<Option<RawTimestamp>>,
    latitude: Vec<Option<String>>,
    longitude: Vec<Option<String>>,
    injuries: Vec<Option<String>>,
    fatalities: Vec<Option<String>>,
    vehicles: Vec<Option<String>>,
    hit_and_run: Vec<Option<String>>,
    accident_number: Vec<Option<String>>,
    street_address: Vec<Option<String>>,
    precinct: Vec<Option<String>>,
    weather: Vec<Option<String>>,
    illumination: Vec<Option<String>>,
    collision_type: Vec<Option<String>>,
    reporting_officer: Vec<Option<String>>,
    harmful_descriptions: Vec<Option<String>>,
}

impl TextColumns {
    fn read(df: &DataFrame, schema: &Schema) -> Result<Self, AppError> {
        let missing: Vec<String> = schema
            .required_columns()
            .into_iter()
            .chain(schema.soft_columns())
            .filter(|name| df.get_column_index(name).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::SchemaMismatch { missing });
        }

        Ok(Self {
            timestamp: timestamp_column(df, &schema.timestamp)?,
            latitude: text_column(df, &schema.latitude)?,
            longitude: text_column(df, &schema.longitude)?,
            injuries: text_column(df, &schema.injuries)?,
            fatalities: text_column(df, &schema.fatalities)?,
            vehicles: text_column(df, &schema.vehicles)?,
            hit_and_run: text_column(df, &schema.hit_and_run)?,
            accident_number: text_column(df, &schema.accident_number)?,
            street_address: text_column(df, &schema.street_address)?,
            precinct: text_column(df, &schema.precinct)?,
            weather: text_column(df, &schema.weather)?,
            illumination: text_column(df, &schema.illumination)?,
            collision_type: text_column(df, &schema.collision_type)?,
            reporting_officer: text_column(df, &schema.reporting_officer)?,
            harmful_descriptions: text_column(df, &schema.harmful_descriptions)?,
        })
    }

    fn required_present(&self, i: usize) -> bool {
        self.timestamp[i].is_some()
            && [
                &self.latitude,
                &self.longitude,
                &self.injuries,
                &self.fatalities,
                &self.vehicles,
                &self.hit_and_run,
                &self.accident_number,
                &self.street_address,
                &self.precinct,
            ]
            .iter()
            .all(|col| col[i].is_some())
    }
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, AppError> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

/// Temporal columns are read as UTC wall-clock values; anything else is text
/// for [`Schema::timestamp_format`].
fn timestamp_column(df: &DataFrame, name: &str) -> Result<Vec<Option<RawTimestamp>>, AppError> {
    let series = df.column(name)?.as_materialized_series();
    let millis = match series.dtype() {
        DataType::Datetime(_, tz) => series.cast(&DataType::Datetime(TimeUnit::Milliseconds, tz.clone()))?,
        DataType::Date => series.cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        _ => {
            return Ok(text_column(df, name)?
                .into_iter()
                .map(|v| v.map(RawTimestamp::Text))
                .collect())
        }
    };
    let millis = millis.cast(&DataType::Int64)?;
    Ok(millis
        .i64()?
        .into_iter()
        .map(|v| {
            v.and_then(DateTime::from_timestamp_millis)
                .map(|dt| RawTimestamp::Typed(dt.naive_utc()))
        })
        .collect())
}

/// Normalizes a raw accident frame.
///
/// # Errors
///
/// [`AppError::SchemaMismatch`] if a configured column is absent, and
/// [`AppError::MalformedTimestamp`] for the first bad timestamp when the
/// policy is [`TimestampPolicy::Reject`]. The reported row is the zero-based
/// data row index.
pub fn normalize(df: &DataFrame, schema: &Schema, config: &PipelineConfig) -> Result<Normalized, AppError> {
    let cols = TextColumns::read(df, schema)?;
    let mut report = NormalizeReport {
        rows_in: df.height(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        if !cols.required_present(i) {
            report.missing_required += 1;
            continue;
        }

        let numbers = (
            parse_coordinate(cols.latitude[i].as_deref()),
            parse_coordinate(cols.longitude[i].as_deref()),
            parse_count(cols.injuries[i].as_deref()),
            parse_count(cols.fatalities[i].as_deref()),
            parse_count(cols.vehicles[i].as_deref()),
            parse_flag(cols.hit_and_run[i].as_deref()),
        );
        let (Some(latitude), Some(longitude), Some(injuries), Some(fatalities), Some(vehicles), Some(hit_and_run)) =
            numbers
        else {
            report.invalid_number += 1;
            continue;
        };

        let parsed = match &cols.timestamp[i] {
            Some(RawTimestamp::Typed(ts)) => Some(*ts),
            Some(RawTimestamp::Text(raw)) => NaiveDateTime::parse_from_str(raw, &schema.timestamp_format).ok(),
            None => None,
        };
        let timestamp = match parsed {
            Some(ts) => ts,
            None => match config.timestamp_policy {
                TimestampPolicy::DropRows => {
                    report.malformed_timestamp += 1;
                    continue;
                }
                TimestampPolicy::Reject => {
                    let value = match &cols.timestamp[i] {
                        Some(RawTimestamp::Text(raw)) => raw.clone(),
                        _ => String::new(),
                    };
                    return Err(AppError::MalformedTimestamp {
                        row: i,
                        value,
                        pattern: schema.timestamp_format.clone(),
                    })
                }
            },
        };

        let mut weather = soft_value(&cols.weather[i]);
        if schema.weather_aliases.iter().any(|alias| *alias == weather) {
            weather = UNKNOWN.to_string();
        }
        let illumination = soft_value(&cols.illumination[i]);

        if config.exclusion == ExclusionMode::Exclude
            && (schema.is_excluded(&weather) || schema.is_excluded(&illumination))
        {
            report.excluded += 1;
            continue;
        }

        records.push(AccidentRecord {
            accident_number: cols.accident_number[i].clone().unwrap_or_default(),
            timestamp,
            time: TimeFields::from_timestamp(&timestamp),
            latitude,
            longitude,
            injuries,
            fatalities,
            vehicles,
            hit_and_run,
            weather,
            illumination,
            collision_type: soft_value(&cols.collision_type[i]),
            reporting_officer: soft_value(&cols.reporting_officer[i]),
            harmful_descriptions: soft_value(&cols.harmful_descriptions[i]),
            street_address: cols.street_address[i].clone().unwrap_or_default(),
            precinct: cols.precinct[i].clone().unwrap_or_default(),
        });
    }

    report.rows_out = records.len();
    for warning in report.warnings() {
        warn!("{}", warning);
    }
    info!(rows_in = report.rows_in, rows_out = report.rows_out, "normalized accident table");

    Ok(Normalized {
        table: AccidentTable { records },
        report,
    })
}

fn soft_value(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value?.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Non-negative whole counts; exports sometimes write them as `2.0`.
fn parse_count(value: Option<&str>) -> Option<u32> {
    let v = value?.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) {
        Some(v as u32)
    } else {
        None
    }
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value?.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
