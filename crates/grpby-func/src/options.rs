//! Global aggregation policies.

use serde::{Deserialize, Serialize};

/// Environment variable read by [`AggregateOptions::from_env`] for
/// [`AggregateOptions::nulls_are_zero`].
pub const ENV_NULLS_ARE_ZERO: &str = "GRPBY_AGGREGATION_ALL_NULLS_ARE_ZERO";

/// Environment variable read by [`AggregateOptions::from_env`] for
/// [`AggregateOptions::min_null_is_valued`].
pub const ENV_MIN_NULL_IS_VALUED: &str = "GRPBY_AGGREGATION_MIN_NULL_IS_VALUED";

/// Policies that apply to every aggregate of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Replace a NULL aggregate result with the output type's zero.
    pub nulls_are_zero: bool,
    /// Let NULL subjects take part in MIN/MAX, ordered before every value.
    pub min_null_is_valued: bool,
}

impl AggregateOptions {
    /// Read both policies from the process environment. Unset or
    /// unrecognised values mean `false`.
    pub fn from_env() -> Self {
        Self {
            nulls_are_zero: env_flag(ENV_NULLS_ARE_ZERO),
            min_null_is_valued: env_flag(ENV_MIN_NULL_IS_VALUED),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| parse_flag(&v))
}

fn parse_flag(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1"
    )
}
