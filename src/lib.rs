//! The main library for the `crashtab` application.
//!
//! This crate turns a city's traffic-accident export into the cross-tabulated
//! tables a severity dashboard draws: accident totals and injury/fatality
//! shares by weather, lighting × weather and weekday × hour heatmaps, and
//! day/night and weekend comparisons.
//!
//! The library is structured into several modules:
//! - `cli`: Defines the command-line interface.
//! - `schema`: Column names and pipeline settings.
//! - `data_loader`: Reads CSV/Parquet/NDJSON sources into DataFrames, with sampling and caching.
//! - `normalize`: Cleans the raw frame into typed accident records.
//! - `record`: The record type and the dimensions/metrics it is grouped by.
//! - `selector`: Top-K category selection.
//! - `crosstab`: Group-by aggregation and severity percentages.
//! - `grid`: Dense-grid reindexing of sparse cross-tabs.
//! - `dashboard`: Assembles every chart table from the current filter state.
//! - `error`: Defines the application's error and warning types.

use anyhow::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod cli;
pub mod crosstab;
pub mod dashboard;
pub mod data_loader;
pub mod error;
pub mod grid;
pub mod normalize;
pub mod record;
pub mod schema;
pub mod selector;

#[cfg(test)]
mod tests;

use crate::cli::Cli;
use crate::dashboard::{build_dashboard, Dashboard, FilterState};
use crate::data_loader::{resolve_source, Sampling, Source, TableCache};
use crate::error::AppError;
use crate::normalize::{normalize, Normalized};
use crate::schema::{PipelineConfig, Schema};

/// Pipeline state that outlives a single request: the schema, the settings
/// and the table cache.
///
/// Each filter change calls [`Session::dashboard`] again; the source is only
/// read once per (source, sample size, seed).
#[derive(Debug, Default)]
pub struct Session {
    pub schema: Schema,
    pub config: PipelineConfig,
    cache: TableCache,
}

impl Session {
    pub fn new(schema: Schema, config: PipelineConfig) -> Self {
        Self {
            schema,
            config,
            cache: TableCache::new(),
        }
    }

    /// Loads (or reuses) the source and normalizes it.
    pub fn normalized(&mut self, source: &Source, sampling: Option<Sampling>) -> Result<Normalized, AppError> {
        let df = self.cache.get_or_load(source, sampling)?;
        normalize(&df, &self.schema, &self.config)
    }

    /// Builds every chart table for the given filters.
    ///
    /// Normalization warnings are prepended to the dashboard's own warnings.
    pub fn dashboard(
        &mut self,
        source: &Source,
        sampling: Option<Sampling>,
        filters: &FilterState,
    ) -> Result<Dashboard, AppError> {
        let normalized = self.normalized(source, sampling)?;
        let mut dashboard = build_dashboard(&normalized.table, &self.config, filters);
        let mut warnings = normalized.report.warnings();
        warnings.append(&mut dashboard.warnings);
        dashboard.warnings = warnings;
        Ok(dashboard)
    }

    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }
}

/// The main entry point for the application logic.
///
/// This function orchestrates the entire process:
/// 1.  It resolves the data source: the input path, or an upload read from stdin.
/// 2.  It loads, normalizes and aggregates the data for the selected filters.
/// 3.  It writes the resulting tables as JSON.
///
/// # Errors
///
/// Returns an error if no source is available, the data does not match the
/// schema, or the output cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    let schema = match &cli.schema {
        Some(path) => Schema::from_json_file(path)?,
        None => Schema::default(),
    };
    let base_config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    // 1. Resolve the source
    let upload = if cli.stdin && !cli.input_path.is_file() {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read uploaded CSV from stdin")?;
        Some(("stdin.csv".to_string(), bytes))
    } else {
        None
    };
    let source = resolve_source(&cli.input_path, upload)?;
    println!("Processing '{}'...", source.identity());

    // 2. Load, normalize and aggregate
    let mut session = Session::new(schema, cli.pipeline_config(base_config));
    let dashboard = session.dashboard(&source, cli.sampling(), &cli.filter_state())?;

    info!(
        weather = dashboard.selected_weather.len(),
        lighting = dashboard.selected_lighting.len(),
        points = dashboard.map_points.len(),
        "dashboard tables built"
    );
    if dashboard.is_empty() {
        println!("  -> No data for the current selection.");
    }

    // 3. Save the output
    let output_path = generate_output_path(&source, cli);
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(&dashboard).map_err(AppError::from)?;
    fs::write(&output_path, json)
        .with_context(|| format!("Failed to write output to {}", output_path.display()))?;

    println!("  -> Tables saved to '{}'", output_path.display());
    Ok(())
}

/// Determines the output path for the generated tables.
///
/// An explicit `--output` wins. Otherwise file inputs get
/// `<input_stem>.crosstab.json` next to them and uploads get
/// `crosstab.json` in the working directory.
fn generate_output_path(source: &Source, cli: &Cli) -> PathBuf {
    if let Some(output) = &cli.output {
        return output.clone();
    }
    match source {
        Source::Path(path) => {
            let stem = path.file_stem().unwrap_or_default().to_string_lossy();
            path.with_file_name(format!("{}.crosstab.json", stem))
        }
        Source::Upload { .. } => Path::new("crosstab.json").to_path_buf(),
    }
}
