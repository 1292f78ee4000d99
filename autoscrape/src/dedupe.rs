use std::collections::HashSet;

use crate::record::Record;

/// Drop records identical to an earlier one, keeping first occurrences in order.
///
/// Identity is the full sorted (field, value) sequence; an absent value is
/// distinct from an empty one.
pub fn dedupe(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}
