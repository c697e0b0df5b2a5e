//! Expands sparse cross-tabs into dense grids.
//!
//! Heatmap and bar renderers expect one entry per selected category (or pair
//! of categories). Unobserved entries are synthesized with every metric at 0.

use crate::crosstab::{MetricCell, SeverityRow};
use std::collections::{HashMap, HashSet};

/// Drops repeated labels, keeping the first occurrence.
fn dedup(labels: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(String::as_str)
        .filter(|label| seen.insert(*label))
        .collect()
}

/// Returns exactly `|rows| × |columns|` cells in row-major order.
///
/// Observed cells keep their metrics; every other pair gets `count = 0`,
/// `metric_sum = 0` and `metric_avg = 0`. Cells whose labels are outside the
/// requested sets are dropped. Duplicate labels are collapsed first.
pub fn reindex_grid(cells: &[MetricCell], rows: &[String], columns: &[String]) -> Vec<MetricCell> {
    let observed: HashMap<(&str, &str), &MetricCell> = cells
        .iter()
        .filter_map(|c| c.column.as_deref().map(|col| ((c.row.as_str(), col), c)))
        .collect();

    let columns = dedup(columns);
    dedup(rows)
        .into_iter()
        .flat_map(|row| columns.iter().map(move |col| (row, *col)))
        .map(|(row, col)| match observed.get(&(row, col)) {
            Some(cell) => MetricCell::new(row.to_string(), Some(col.to_string()), cell.count, cell.metric_sum),
            None => MetricCell::new(row.to_string(), Some(col.to_string()), 0, 0),
        })
        .collect()
}

/// 1-D version of [`reindex_grid`]: one cell per category, in the given order.
pub fn reindex_cells(cells: &[MetricCell], categories: &[String]) -> Vec<MetricCell> {
    let observed: HashMap<&str, &MetricCell> = cells.iter().map(|c| (c.row.as_str(), c)).collect();

    dedup(categories)
        .into_iter()
        .map(|category| match observed.get(category) {
            Some(cell) => MetricCell::new(category.to_string(), None, cell.count, cell.metric_sum),
            None => MetricCell::new(category.to_string(), None, 0, 0),
        })
        .collect()
}

/// One severity row per category; unobserved categories get zero totals and 0 %.
pub fn reindex_severity(rows: &[SeverityRow], categories: &[String]) -> Vec<SeverityRow> {
    let observed: HashMap<&str, &SeverityRow> = rows.iter().map(|r| (r.category.as_str(), r)).collect();

    dedup(categories)
        .into_iter()
        .map(|category| match observed.get(category) {
            Some(row) => SeverityRow::new(category.to_string(), row.total, row.injury_count, row.fatality_count),
            None => SeverityRow::new(category.to_string(), 0, 0, 0),
        })
        .collect()
}
