use crate::crosstab::{aggregate, severity, GroupBy, MetricCell};
use crate::data_loader::{load_dataframe, subsample, Source};
use crate::grid::{reindex_grid, reindex_severity};
use crate::record::fixtures::record;
use crate::record::{AccidentRecord, Dimension, Metric};
use crate::selector::top_k;
use proptest::prelude::*;
use std::collections::HashSet;

const WEATHER: [&str; 5] = ["CLEAR", "RAIN", "CLOUDY", "FOG", "SNOW"];
const LIGHTING: [&str; 4] = ["DAYLIGHT", "DARK - LIGHTED", "DUSK", "DAWN"];

prop_compose! {
    /// A single record with categories drawn from small alphabets so groups collide
    fn arb_record()(
        weather in 0..WEATHER.len(),
        lighting in 0..LIGHTING.len(),
        day in 1u32..=28,
        hour in 0u32..24,
        injuries in 0u32..4,
        fatalities in prop::sample::select(vec![0u32, 0, 0, 1]),
    ) -> AccidentRecord {
        let ts = format!("2021-02-{:02} {:02}:30", day, hour);
        record(&ts, WEATHER[weather], LIGHTING[lighting], injuries, fatalities)
    }
}

fn arb_records() -> impl Strategy<Value = Vec<AccidentRecord>> {
    prop::collection::vec(arb_record(), 0..200)
}

fn arb_labels(alphabet: &'static [&'static str]) -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(alphabet.to_vec(), 1..=alphabet.len())
        .prop_map(|v| v.into_iter().map(str::to_string).collect())
}

proptest! {
    /// Property: the dense grid has exactly |D1| × |D2| cells, each pair once
    #[test]
    fn prop_reindex_completeness(
        records in arb_records(),
        rows in arb_labels(&LIGHTING),
        cols in arb_labels(&WEATHER),
    ) {
        let cells = aggregate(&records, GroupBy::Two(Dimension::Illumination, Dimension::Weather), Metric::Injuries, None);
        let dense = reindex_grid(&cells, &rows, &cols);

        prop_assert_eq!(dense.len(), rows.len() * cols.len());
        let pairs: HashSet<(String, String)> = dense
            .iter()
            .map(|c| (c.row.clone(), c.column.clone().unwrap_or_default()))
            .collect();
        prop_assert_eq!(pairs.len(), dense.len());
        for r in &rows {
            for c in &cols {
                prop_assert!(pairs.contains(&(r.clone(), c.clone())));
            }
        }
    }

    /// Property: synthesized cells are all zero and never NaN
    #[test]
    fn prop_zero_guard(
        records in arb_records(),
        rows in arb_labels(&LIGHTING),
        cols in arb_labels(&WEATHER),
    ) {
        let cells = aggregate(&records, GroupBy::Two(Dimension::Illumination, Dimension::Weather), Metric::Fatalities, None);
        let observed: HashSet<(String, Option<String>)> =
            cells.iter().map(|c| (c.row.clone(), c.column.clone())).collect();

        for cell in reindex_grid(&cells, &rows, &cols) {
            prop_assert!(!cell.metric_avg.is_nan());
            if !observed.contains(&(cell.row.clone(), cell.column.clone())) {
                prop_assert_eq!(cell.count, 0);
                prop_assert_eq!(cell.metric_sum, 0);
                prop_assert_eq!(cell.metric_avg, 0.0);
            }
        }
        for row in reindex_severity(&severity(&records, Dimension::Weather, None), &cols) {
            prop_assert!(!row.pct_injury.is_nan() && !row.pct_fatality.is_nan());
        }
    }

    /// Property: 1-D grouping neither loses nor duplicates rows
    #[test]
    fn prop_aggregation_conservation(records in arb_records()) {
        let cells: Vec<MetricCell> = aggregate(&records, GroupBy::One(Dimension::Weather), Metric::Injuries, None);
        let counted: u64 = cells.iter().map(|c| c.count).sum();
        prop_assert_eq!(counted as usize, records.len());
        prop_assert!(cells.iter().all(|c| c.count >= 1));

        let injuries: u64 = records.iter().map(|r| u64::from(r.injuries)).sum();
        prop_assert_eq!(cells.iter().map(|c| c.metric_sum).sum::<u64>(), injuries);

        let totals: u64 = severity(&records, Dimension::Illumination, None).iter().map(|r| r.total).sum();
        prop_assert_eq!(totals as usize, records.len());
    }

    /// Property: severity percentages stay within [0, 100]
    #[test]
    fn prop_percentage_bounds(records in arb_records()) {
        for row in severity(&records, Dimension::Weather, None) {
            prop_assert!((0.0..=100.0).contains(&row.pct_injury));
            prop_assert!((0.0..=100.0).contains(&row.pct_fatality));
            prop_assert!(row.injury_count <= row.total);
        }
    }

    /// Property: top-K is a pure function of the table
    #[test]
    fn prop_top_k_stability(records in arb_records(), k in 0usize..8) {
        let first = top_k(&records, Dimension::Weather, k);
        let second = top_k(&records, Dimension::Weather, k);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= k);

        let distinct: HashSet<&String> = first.iter().collect();
        prop_assert_eq!(distinct.len(), first.len());
    }

    /// Property: same source, size and seed give identical samples
    #[test]
    fn prop_sampling_determinism(rows in 1usize..60, n in 0usize..80, seed in any::<u64>()) {
        let mut csv = String::from("id,value\n");
        for i in 0..rows {
            csv.push_str(&format!("{},{}\n", i, i * 7));
        }
        let source = Source::Upload { name: "sample.csv".to_string(), bytes: csv.as_bytes().into() };
        let df = load_dataframe(&source).unwrap();

        let a = subsample(&df, n, seed).unwrap();
        let b = subsample(&df, n, seed).unwrap();
        prop_assert_eq!(a.height(), n.min(rows));
        prop_assert!(a.equals_missing(&b));
    }
}
