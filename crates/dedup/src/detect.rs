use std::collections::HashMap;

use crate::model::{DetectionResult, DuplicateGroup, Record};
use crate::normalize::{normalize, NormalizationPolicy};

/// Group records by normalized key and keep the groups large enough to be
/// duplicates.
///
/// Records whose key is missing, or empty after normalization while
/// `ignore_empty` is set, are left out entirely: they count neither toward
/// `total_count` nor toward any group. Members keep input order and groups
/// are ordered by the first appearance of their key.
pub fn detect<R, I, F>(records: I, mut key_of: F, policy: &NormalizationPolicy) -> DetectionResult<R>
where
    I: IntoIterator<Item = R>,
    F: FnMut(&R) -> Option<String>,
{
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<R>)> = Vec::new();
    let mut total_count = 0;
    let mut excluded_count = 0;

    for record in records {
        let Some(raw) = key_of(&record) else {
            excluded_count += 1;
            continue;
        };
        let key = normalize(&raw, policy);
        if key.is_empty() && policy.ignore_empty {
            excluded_count += 1;
            continue;
        }
        total_count += 1;

        match slots.get(&key) {
            Some(&slot) => buckets[slot].1.push(record),
            None => {
                slots.insert(key.clone(), buckets.len());
                buckets.push((key, vec![record]));
            }
        }
    }

    let threshold = policy.group_threshold();
    let duplicates: Vec<DuplicateGroup<R>> = buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= threshold)
        .map(|(key, members)| DuplicateGroup { key, members })
        .collect();
    let duplicate_count = duplicates.iter().map(DuplicateGroup::count).sum();

    if excluded_count > 0 {
        log::debug!("duplicate scan skipped {excluded_count} record(s) without a usable key");
    }

    DetectionResult {
        duplicates,
        total_count,
        duplicate_count,
        excluded_count,
        diagnostic: None,
    }
}

/// Key extractor reading one named field of a [`Record`].
pub fn field_key(field: &str) -> impl FnMut(&Record) -> Option<String> + '_ {
    move |record: &Record| record.field(field).map(str::to_string)
}
