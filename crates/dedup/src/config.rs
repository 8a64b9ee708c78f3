use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::DedupError;
use crate::model::Predicate;
use crate::normalize::NormalizationPolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Which record kinds to scan, and how.
///
/// ```toml
/// name = "Household cleanup"
///
/// [kinds.tag]
/// key_field = "name"
///
/// [kinds.product]
/// key_field = "name"
/// [kinds.product.filter]
/// field = "archived"
/// values = ["false"]
/// [kinds.product.policy]
/// case_sensitive = true
/// minimum_duplicate_count = 2
/// ```
#[derive(Debug, Deserialize)]
pub struct DedupConfig {
    pub name: String,
    pub kinds: BTreeMap<String, KindConfig>,
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Record field compared for duplication.
    pub key_field: String,
    #[serde(default)]
    pub filter: Option<Predicate>,
    #[serde(default)]
    pub policy: NormalizationPolicy,
}

impl KindConfig {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            filter: None,
            policy: NormalizationPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl DedupConfig {
    pub fn from_toml(input: &str) -> Result<Self, DedupError> {
        let config: DedupConfig =
            toml::from_str(input).map_err(|e| DedupError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DedupError> {
        if self.kinds.is_empty() {
            return Err(DedupError::ConfigValidation(
                "at least one kind is required".into(),
            ));
        }

        for (kind, kind_config) in &self.kinds {
            if kind.trim().is_empty() {
                return Err(DedupError::ConfigValidation("kind names must not be empty".into()));
            }
            if kind_config.key_field.trim().is_empty() {
                return Err(DedupError::ConfigValidation(format!(
                    "kind '{kind}': key_field must not be empty"
                )));
            }
            if let Some(ref filter) = kind_config.filter {
                if filter.values.is_empty() {
                    return Err(DedupError::ConfigValidation(format!(
                        "kind '{kind}': filter on '{}' lists no values",
                        filter.field
                    )));
                }
            }
            kind_config.policy.validate().map_err(|e| match e {
                DedupError::ConfigValidation(msg) => {
                    DedupError::ConfigValidation(format!("kind '{kind}': {msg}"))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    pub fn kind(&self, name: &str) -> Result<&KindConfig, DedupError> {
        self.kinds
            .get(name)
            .ok_or_else(|| DedupError::UnknownKind(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
