use crate::record::{AccidentRecord, Dimension};
use std::collections::HashMap;

/// Returns the `k` most frequent labels of `dimension`, most frequent first.
///
/// Labels with equal counts keep the order in which they first appear in
/// `records`, so the result is stable for a given table.
pub fn top_k<'a, I>(records: I, dimension: Dimension, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a AccidentRecord>,
{
    // label -> (first seen position, count)
    let mut counts: HashMap<String, (usize, u64)> = HashMap::new();
    for record in records {
        let next = counts.len();
        counts.entry(dimension.label(record)).or_insert((next, 0)).1 += 1;
    }

    let mut ranked: Vec<(String, usize, u64)> = counts
        .into_iter()
        .map(|(label, (first_seen, count))| (label, first_seen, count))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
    ranked.into_iter().take(k).map(|(label, _, _)| label).collect()
}
