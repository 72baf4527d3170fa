//! Operator configuration.

use std::collections::HashSet;

use grpby_error::{GroupByError, Result};
use grpby_func::{AggregateOptions, AggregateSpec};
use grpby_spool::SpillConfig;
use serde::{Deserialize, Serialize};

/// Everything a [`GroupBy`](crate::GroupBy) needs besides its input
/// layout. Read-only for the lifetime of the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupByConfig {
    /// Group-key fields. Empty means the whole stream is one group.
    pub group_fields: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
    /// Decorate every input row with its group's aggregates instead of
    /// emitting one summary row per group.
    pub pass_all_rows: bool,
    /// Decorate mode only: name of an appended per-group line number.
    pub line_number_field: Option<String>,
    /// Summary mode only: emit one row even for an empty input.
    pub always_give_back_one_row: bool,
    pub spill: SpillConfig,
    pub options: AggregateOptions,
}

impl GroupByConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| GroupByError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GroupByError::internal(e.to_string()))
    }

    /// Line number field, if one is configured and applies.
    pub fn line_number_field(&self) -> Option<&str> {
        if !self.pass_all_rows {
            return None;
        }
        self.line_number_field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Checks that do not depend on the input layout.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for spec in &self.aggregates {
            if spec.name.trim().is_empty() {
                return Err(GroupByError::invalid_config(format!(
                    "{} aggregate without a result field name",
                    spec.kind
                )));
            }
            spec.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(GroupByError::invalid_config(format!(
                    "duplicate aggregate result field '{}'",
                    spec.name
                )));
            }
        }
        if let Some(line) = self.line_number_field() {
            if names.contains(line) {
                return Err(GroupByError::invalid_config(format!(
                    "line number field '{line}' clashes with an aggregate result field"
                )));
            }
        }
        if self.spill.prefix.is_empty() {
            return Err(GroupByError::invalid_config("empty spill file prefix"));
        }
        Ok(())
    }
}
