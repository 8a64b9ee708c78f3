use serde::{Deserialize, Serialize};

use crate::error::DedupError;

/// Smallest group size that counts as a duplicate set. Groups of one are
/// never duplicates, whatever the policy says.
pub const MIN_GROUP_SIZE: usize = 2;

/// How a raw key is reduced to a comparable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationPolicy {
    pub case_sensitive: bool,
    pub trim_whitespace: bool,
    /// Skip records whose key is empty after normalization.
    pub ignore_empty: bool,
    pub minimum_duplicate_count: usize,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            trim_whitespace: true,
            ignore_empty: true,
            minimum_duplicate_count: MIN_GROUP_SIZE,
        }
    }
}

impl NormalizationPolicy {
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.minimum_duplicate_count < MIN_GROUP_SIZE {
            return Err(DedupError::ConfigValidation(format!(
                "minimum_duplicate_count must be at least {MIN_GROUP_SIZE}, got {}",
                self.minimum_duplicate_count
            )));
        }
        Ok(())
    }

    /// Threshold actually applied by detection.
    pub(crate) fn group_threshold(&self) -> usize {
        self.minimum_duplicate_count.max(MIN_GROUP_SIZE)
    }
}

/// Trim (optional) then lowercase (optional). Internal whitespace,
/// punctuation and Unicode composition are left alone.
pub fn normalize(raw: &str, policy: &NormalizationPolicy) -> String {
    let trimmed = if policy.trim_whitespace { raw.trim() } else { raw };
    if policy.case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}
