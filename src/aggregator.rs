use crate::models::{CanonicalRecord, Dataset};
use std::collections::HashSet;
use tracing::debug;

/// Estimated chance of acceptance in percent.
///
/// 100 when nobody has registered yet, otherwise quota per registrant
/// rounded to the nearest integer (ties to even) and capped at 100.
pub fn acceptance_likelihood(quota: u32, registered: u32) -> u8 {
    if registered == 0 {
        return 100;
    }
    let percent = (f64::from(quota) * 100.0 / f64::from(registered)).round_ties_even();
    percent.clamp(0.0, 100.0) as u8
}

/// Deduplicate by (title, institution) keeping the first occurrence, and
/// fill in each survivor's acceptance likelihood.
pub fn aggregate(records: Vec<CanonicalRecord>) -> Dataset {
    let total = records.len();
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(total);
    let mut unique = Vec::with_capacity(total);

    for record in records {
        let (title, institution) = record.dedup_key();
        if !seen.insert((title.to_string(), institution.to_string())) {
            continue;
        }
        let acceptance_likelihood = acceptance_likelihood(record.quota, record.registered);
        unique.push(CanonicalRecord {
            acceptance_likelihood,
            ..record
        });
    }

    let duplicates_removed = total - unique.len();
    if duplicates_removed > 0 {
        debug!(duplicates_removed, "removed duplicate vacancies");
    }

    Dataset { records: unique }
}
