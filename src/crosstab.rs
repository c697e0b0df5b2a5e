//! Group-by aggregation over one or two dimensions.
//!
//! Every cell produced here was observed at least once, so `count >= 1` and
//! averages/percentages never divide by zero. Zero-count cells only come from
//! the [`grid`](crate::grid) reindexer.

use crate::record::{AccidentRecord, Dimension, Metric};
use serde::Serialize;
use std::collections::HashMap;

pub const PCT_INJURY: &str = "% with Injury";
pub const PCT_FATALITY: &str = "% with Fatality";

/// The dimensions a cross-tab is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    One(Dimension),
    Two(Dimension, Dimension),
}

/// One aggregated cell of a 1-D or 2-D cross-tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCell {
    pub row: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub count: u64,
    pub metric_sum: u64,
    pub metric_avg: f64,
}

impl MetricCell {
    /// A cell with the given totals; the average is guarded against `count == 0`.
    pub fn new(row: String, column: Option<String>, count: u64, metric_sum: u64) -> Self {
        Self {
            row,
            column,
            count,
            metric_sum,
            metric_avg: ratio(metric_sum, count),
        }
    }
}

/// Severity percentages for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityRow {
    pub category: String,
    pub total: u64,
    pub injury_count: u64,
    pub fatality_count: u64,
    pub pct_injury: f64,
    pub pct_fatality: f64,
}

impl SeverityRow {
    pub fn new(category: String, total: u64, injury_count: u64, fatality_count: u64) -> Self {
        Self {
            category,
            total,
            injury_count,
            fatality_count,
            pct_injury: 100.0 * ratio(injury_count, total),
            pct_fatality: 100.0 * ratio(fatality_count, total),
        }
    }
}

/// Long-form severity value, one per (category, severity type).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityPoint {
    pub category: String,
    pub severity_type: &'static str,
    pub percentage: f64,
}

/// Records kept only if their label is among `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub dimension: Dimension,
    pub values: Vec<String>,
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Keeps the records matching every selection. An empty selection matches nothing.
pub fn filter_records<'a>(records: &'a [AccidentRecord], selections: &[Selection]) -> Vec<&'a AccidentRecord> {
    records
        .iter()
        .filter(|record| {
            selections
                .iter()
                .all(|s| s.values.contains(&s.dimension.label(record)))
        })
        .collect()
}

/// Counts records and sums `metric` per observed group, in first-seen order.
///
/// Groups with fewer than `min_count` records are dropped.
pub fn aggregate<'a, I>(records: I, group_by: GroupBy, metric: Metric, min_count: Option<u64>) -> Vec<MetricCell>
where
    I: IntoIterator<Item = &'a AccidentRecord>,
{
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();
    let mut groups: Vec<((String, Option<String>), u64, u64)> = Vec::new();

    for record in records {
        let key = match group_by {
            GroupBy::One(d) => (d.label(record), None),
            GroupBy::Two(d1, d2) => (d1.label(record), Some(d2.label(record))),
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, 0, 0));
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.1 += 1;
        group.2 += metric.value(record);
    }

    groups
        .into_iter()
        .filter(|(_, count, _)| *count >= min_count.unwrap_or(0))
        .map(|((row, column), count, sum)| MetricCell::new(row, column, count, sum))
        .collect()
}

/// Share of records with at least one injury / fatality per label of `dimension`.
///
/// Groups with a total below `min_total` are dropped.
pub fn severity<'a, I>(records: I, dimension: Dimension, min_total: Option<u64>) -> Vec<SeverityRow>
where
    I: IntoIterator<Item = &'a AccidentRecord>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, u64, u64, u64)> = Vec::new();

    for record in records {
        let label = dimension.label(record);
        let slot = *index.entry(label.clone()).or_insert_with(|| {
            groups.push((label, 0, 0, 0));
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.1 += 1;
        group.2 += u64::from(record.has_injury());
        group.3 += u64::from(record.has_fatality());
    }

    groups
        .into_iter()
        .filter(|(_, total, _, _)| *total >= min_total.unwrap_or(0))
        .map(|(category, total, inj, fat)| SeverityRow::new(category, total, inj, fat))
        .collect()
}

/// Reshapes severity rows into one injury and one fatality point per category.
pub fn melt_severity(rows: &[SeverityRow]) -> Vec<SeverityPoint> {
    rows.iter()
        .flat_map(|row| {
            [
                SeverityPoint {
                    category: row.category.clone(),
                    severity_type: PCT_INJURY,
                    percentage: row.pct_injury,
                },
                SeverityPoint {
                    category: row.category.clone(),
                    severity_type: PCT_FATALITY,
                    percentage: row.pct_fatality,
                },
            ]
        })
        .collect()
}
