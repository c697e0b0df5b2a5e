//! This module turns a normalized accident table and the user's filter state
//! into the flat tables each dashboard chart consumes.
//!
//! The filter state is an explicit parameter: whatever owns the widgets keeps
//! a [`FilterState`] and calls [`build_dashboard`] again whenever it changes.

use crate::crosstab::{
    aggregate, filter_records, melt_severity, severity, GroupBy, MetricCell, Selection, SeverityPoint,
    SeverityRow,
};
use crate::error::DataWarning;
use crate::grid::{reindex_cells, reindex_grid, reindex_severity};
use crate::record::{AccidentRecord, AccidentTable, Dimension, Metric};
use crate::schema::PipelineConfig;
use crate::selector::top_k;
use serde::Serialize;
use tracing::{debug, warn};

/// Selections made in the UI. `None` means "use the top-K default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub weather: Option<Vec<String>>,
    pub lighting: Option<Vec<String>>,
    pub metric: Metric,
}

/// A single accident location for the map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub injuries: u32,
    pub fatalities: u32,
    pub weather: String,
    pub illumination: String,
}

impl From<&AccidentRecord> for MapPoint {
    fn from(record: &AccidentRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
            injuries: record.injuries,
            fatalities: record.fatalities,
            weather: record.weather.clone(),
            illumination: record.illumination.clone(),
        }
    }
}

/// Every table the dashboard draws, plus what the filters resolved to.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub metric: Metric,
    /// Top-K choices offered by the weather and lighting filters.
    pub weather_options: Vec<String>,
    pub lighting_options: Vec<String>,
    pub selected_weather: Vec<String>,
    pub selected_lighting: Vec<String>,
    /// Accident totals and injury/fatality shares per selected weather type.
    pub weather_severity: Vec<SeverityRow>,
    pub weather_severity_long: Vec<SeverityPoint>,
    /// Lighting × weather heatmap of the chosen metric.
    pub lighting_weather: Vec<MetricCell>,
    /// Day-of-week × hour heatmap of the chosen metric.
    pub weekday_hour: Vec<MetricCell>,
    pub hourly: Vec<MetricCell>,
    pub day_night: Vec<SeverityRow>,
    pub weekend: Vec<SeverityRow>,
    pub collision_severity: Vec<SeverityRow>,
    pub map_points: Vec<MapPoint>,
    pub warnings: Vec<DataWarning>,
}

impl Dashboard {
    /// True when no record matches the current selection, even if the dense
    /// tables hold zero-filled rows for the selected categories.
    pub fn is_empty(&self) -> bool {
        self.map_points.is_empty() && self.weather_severity.iter().all(|row| row.total == 0)
    }
}

/// Runs selector → filter → aggregator → reindexer for every chart.
pub fn build_dashboard(table: &AccidentTable, config: &PipelineConfig, filters: &FilterState) -> Dashboard {
    let records = table.records.as_slice();
    let metric = filters.metric;
    let min_total = config.min_group_total;
    let mut warnings = Vec::new();

    let weather_options = top_k(records, Dimension::Weather, config.top_weather);
    let lighting_options = top_k(records, Dimension::Illumination, config.top_lighting);
    let selected_weather = resolve(&filters.weather, &weather_options, Dimension::Weather, &mut warnings);
    let selected_lighting = resolve(&filters.lighting, &lighting_options, Dimension::Illumination, &mut warnings);

    let weather_only = filter_records(
        records,
        &[Selection {
            dimension: Dimension::Weather,
            values: selected_weather.clone(),
        }],
    );
    let weather_severity = reindex_severity(
        &severity(weather_only.iter().copied(), Dimension::Weather, min_total),
        &selected_weather,
    );

    let selected = filter_records(
        records,
        &[
            Selection {
                dimension: Dimension::Weather,
                values: selected_weather.clone(),
            },
            Selection {
                dimension: Dimension::Illumination,
                values: selected_lighting.clone(),
            },
        ],
    );
    debug!(rows = selected.len(), "records after weather and lighting filters");

    let lighting_weather = reindex_grid(
        &aggregate(
            selected.iter().copied(),
            GroupBy::Two(Dimension::Illumination, Dimension::Weather),
            metric,
            min_total,
        ),
        &selected_lighting,
        &selected_weather,
    );

    // Closed-domain axes stay dense even when nothing is selected.
    let weekday_hour = reindex_grid(
        &aggregate(
            selected.iter().copied(),
            GroupBy::Two(Dimension::DayOfWeek, Dimension::Hour),
            metric,
            min_total,
        ),
        &closed_domain(Dimension::DayOfWeek),
        &closed_domain(Dimension::Hour),
    );
    let hourly = reindex_cells(
        &aggregate(selected.iter().copied(), GroupBy::One(Dimension::Hour), metric, min_total),
        &closed_domain(Dimension::Hour),
    );

    let day_night = severity_over_domain(&selected, Dimension::Night, min_total);
    let weekend = severity_over_domain(&selected, Dimension::Weekend, min_total);

    let collision_types = top_k(selected.iter().copied(), Dimension::CollisionType, config.top_collision);
    let collision_severity = reindex_severity(
        &severity(selected.iter().copied(), Dimension::CollisionType, min_total),
        &collision_types,
    );

    let map_points = selected.iter().map(|r| MapPoint::from(*r)).collect();

    Dashboard {
        metric,
        weather_severity_long: melt_severity(&weather_severity),
        weather_options,
        lighting_options,
        selected_weather,
        selected_lighting,
        weather_severity,
        lighting_weather,
        weekday_hour,
        hourly,
        day_night,
        weekend,
        collision_severity,
        map_points,
        warnings,
    }
}

/// The user's selection, or the top-K default when nothing was chosen yet.
fn resolve(
    chosen: &Option<Vec<String>>,
    options: &[String],
    dimension: Dimension,
    warnings: &mut Vec<DataWarning>,
) -> Vec<String> {
    let values = chosen.clone().unwrap_or_else(|| options.to_vec());
    if values.is_empty() {
        let warning = DataWarning::EmptyFilterSelection {
            dimension: dimension.name().to_string(),
        };
        warn!("{}", warning);
        warnings.push(warning);
    }
    values
}

fn closed_domain(dimension: Dimension) -> Vec<String> {
    dimension.domain().unwrap_or_default()
}

fn severity_over_domain(records: &[&AccidentRecord], dimension: Dimension, min_total: Option<u64>) -> Vec<SeverityRow> {
    reindex_severity(
        &severity(records.iter().copied(), dimension, min_total),
        &closed_domain(dimension),
    )
}
