//! Aggregate kinds and their configured form.

use std::fmt;

use grpby_error::{GroupByError, Result};
use serde::{Deserialize, Serialize};

/// Percentile used by `MEDIAN`.
pub const MEDIAN_PERCENTILE: f64 = 50.0;

/// One aggregate kind, carrying its auxiliary argument where it has one.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateKind {
    Sum,
    Average,
    Median,
    /// Interpolated percentile, `0 < p <= 100`.
    Percentile(f64),
    /// Nearest-rank percentile, `0 <= p <= 100`.
    PercentileNearestRank(f64),
    Min,
    Max,
    /// Counts non-NULL subjects.
    CountAll,
    /// Counts rows.
    CountAny,
    CountDistinct,
    First,
    Last,
    FirstInclNull,
    LastInclNull,
    ConcatComma,
    ConcatString(String),
    CumulativeSum,
    CumulativeAverage,
    StdDevPopulation,
    StdDevSample,
}

impl AggregateKind {
    /// Textual code used in configuration files.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Average => "AVERAGE",
            Self::Median => "MEDIAN",
            Self::Percentile(_) => "PERCENTILE",
            Self::PercentileNearestRank(_) => "PERCENTILE_NEAREST_RANK",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::CountAll => "COUNT_ALL",
            Self::CountAny => "COUNT_ANY",
            Self::CountDistinct => "COUNT_DISTINCT",
            Self::First => "FIRST",
            Self::Last => "LAST",
            Self::FirstInclNull => "FIRST_INCL_NULL",
            Self::LastInclNull => "LAST_INCL_NULL",
            Self::ConcatComma => "CONCAT_COMMA",
            Self::ConcatString(_) => "CONCAT_STRING",
            Self::CumulativeSum => "CUM_SUM",
            Self::CumulativeAverage => "CUM_AVG",
            Self::StdDevPopulation => "STD_DEV",
            Self::StdDevSample => "STD_DEV_SAMPLE",
        }
    }

    /// Parse a configuration code plus its optional auxiliary value.
    ///
    /// Percentile values are parsed here but range-checked by
    /// [`AggregateSpec::new`], which knows the aggregate's name.
    pub fn parse(code: &str, aux: Option<&str>) -> Result<Self> {
        let aux = aux.map(str::trim).filter(|s| !s.is_empty());
        let percentile = |default: Option<f64>| -> Result<f64> {
            match aux {
                Some(text) => text.parse::<f64>().map_err(|_| GroupByError::InvalidPercentile {
                    aggregate: code.to_owned(),
                    value: text.to_owned(),
                }),
                None => default.ok_or_else(|| GroupByError::InvalidPercentile {
                    aggregate: code.to_owned(),
                    value: String::new(),
                }),
            }
        };
        let kind = match code.trim().to_ascii_uppercase().as_str() {
            "SUM" => Self::Sum,
            "AVERAGE" => Self::Average,
            "MEDIAN" => Self::Median,
            "PERCENTILE" => Self::Percentile(percentile(None)?),
            "PERCENTILE_NEAREST_RANK" => {
                Self::PercentileNearestRank(percentile(Some(MEDIAN_PERCENTILE))?)
            }
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "COUNT_ALL" => Self::CountAll,
            "COUNT_ANY" => Self::CountAny,
            "COUNT_DISTINCT" => Self::CountDistinct,
            "FIRST" => Self::First,
            "LAST" => Self::Last,
            "FIRST_INCL_NULL" => Self::FirstInclNull,
            "LAST_INCL_NULL" => Self::LastInclNull,
            "CONCAT_COMMA" => Self::ConcatComma,
            // The separator is taken verbatim, surrounding blanks included.
            "CONCAT_STRING" => Self::ConcatString(String::new()),
            "CUM_SUM" => Self::CumulativeSum,
            "CUM_AVG" => Self::CumulativeAverage,
            "STD_DEV" => Self::StdDevPopulation,
            "STD_DEV_SAMPLE" => Self::StdDevSample,
            other => {
                return Err(GroupByError::UnknownAggregateType {
                    code: other.to_owned(),
                });
            }
        };
        Ok(kind)
    }

    /// Auxiliary value in its configured text form.
    pub fn aux_value(&self) -> Option<String> {
        match self {
            Self::Percentile(p) | Self::PercentileNearestRank(p) => Some(p.to_string()),
            Self::ConcatString(sep) => Some(sep.clone()),
            _ => None,
        }
    }

    /// Only `COUNT_ANY` may run without a subject field.
    pub const fn requires_subject(&self) -> bool {
        !matches!(self, Self::CountAny)
    }

    /// Cumulative kinds are computed per emitted row, not per group.
    pub const fn is_cumulative(&self) -> bool {
        matches!(self, Self::CumulativeSum | Self::CumulativeAverage)
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One configured aggregate: which field to read, what to compute, and
/// what to call the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAggregateSpec", into = "RawAggregateSpec")]
pub struct AggregateSpec {
    /// Output field name.
    pub name: String,
    /// Subject field; `None` only for `COUNT_ANY`.
    pub subject: Option<String>,
    pub kind: AggregateKind,
}

impl AggregateSpec {
    /// Build and validate a spec.
    pub fn new(
        name: impl Into<String>,
        subject: Option<&str>,
        kind: AggregateKind,
    ) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            subject: subject
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            kind,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Subject and percentile checks. Fields are public, so a spec built
    /// as a literal is re-checked here before an operator binds it.
    pub fn validate(&self) -> Result<()> {
        let has_subject = self.subject.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has_subject && self.kind.requires_subject() {
            return Err(GroupByError::MissingSubject {
                aggregate: self.name.clone(),
            });
        }
        // NaN fails both range tests.
        let in_range = match &self.kind {
            AggregateKind::Percentile(p) => *p > 0.0 && *p <= 100.0,
            AggregateKind::PercentileNearestRank(p) => (0.0..=100.0).contains(p),
            _ => true,
        };
        if !in_range {
            return Err(GroupByError::InvalidPercentile {
                aggregate: self.name.clone(),
                value: self.kind.aux_value().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAggregateSpec {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(rename = "type")]
    aggregate_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl TryFrom<RawAggregateSpec> for AggregateSpec {
    type Error = GroupByError;

    fn try_from(raw: RawAggregateSpec) -> Result<Self> {
        let kind = match AggregateKind::parse(&raw.aggregate_type, raw.value.as_deref())? {
            AggregateKind::ConcatString(_) => {
                AggregateKind::ConcatString(raw.value.clone().unwrap_or_default())
            }
            other => other,
        };
        Self::new(raw.name, raw.subject.as_deref(), kind)
    }
}

impl From<AggregateSpec> for RawAggregateSpec {
    fn from(spec: AggregateSpec) -> Self {
        Self {
            value: spec.kind.aux_value(),
            aggregate_type: spec.kind.code().to_owned(),
            name: spec.name,
            subject: spec.subject,
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes() {
        assert_eq!(AggregateKind::parse("sum", None).unwrap(), AggregateKind::Sum);
        assert_eq!(
            AggregateKind::parse("PERCENTILE", Some("90")).unwrap(),
            AggregateKind::Percentile(90.0)
        );
        assert_eq!(
            AggregateKind::parse("PERCENTILE_NEAREST_RANK", None).unwrap(),
            AggregateKind::PercentileNearestRank(50.0)
        );
        assert!(matches!(
            AggregateKind::parse("MODE", None),
            Err(GroupByError::UnknownAggregateType { .. })
        ));
        assert!(matches!(
            AggregateKind::parse("PERCENTILE", Some("high")),
            Err(GroupByError::InvalidPercentile { .. })
        ));
    }

    #[test]
    fn codes_are_stable() {
        for kind in [
            AggregateKind::Sum,
            AggregateKind::CumulativeAverage,
            AggregateKind::StdDevSample,
            AggregateKind::CountAny,
        ] {
            assert_eq!(AggregateKind::parse(kind.code(), None).unwrap(), kind);
        }
    }

    #[test]
    fn subject_required_except_count_any() {
        assert!(AggregateSpec::new("rows", None, AggregateKind::CountAny).is_ok());
        let err = AggregateSpec::new("total", Some("  "), AggregateKind::Sum).unwrap_err();
        assert!(matches!(err, GroupByError::MissingSubject { aggregate } if aggregate == "total"));
    }

    #[test]
    fn percentile_range_checked() {
        assert!(AggregateSpec::new("p", Some("v"), AggregateKind::Percentile(0.0)).is_err());
        assert!(AggregateSpec::new("p", Some("v"), AggregateKind::Percentile(100.0)).is_ok());
        assert!(
            AggregateSpec::new("p", Some("v"), AggregateKind::PercentileNearestRank(0.0)).is_ok()
        );
        assert!(
            AggregateSpec::new("p", Some("v"), AggregateKind::PercentileNearestRank(101.0))
                .is_err()
        );
    }

    #[test]
    fn literal_specs_are_rechecked() {
        let nan = AggregateSpec {
            name: "p".to_owned(),
            subject: Some("v".to_owned()),
            kind: AggregateKind::Percentile(f64::NAN),
        };
        assert!(matches!(
            nan.validate(),
            Err(GroupByError::InvalidPercentile { aggregate, value })
                if aggregate == "p" && value == "NaN"
        ));
        let rank = AggregateSpec {
            kind: AggregateKind::PercentileNearestRank(f64::NAN),
            ..nan.clone()
        };
        assert!(rank.validate().is_err());
        let no_subject = AggregateSpec {
            subject: None,
            kind: AggregateKind::Max,
            ..nan
        };
        assert!(matches!(
            no_subject.validate(),
            Err(GroupByError::MissingSubject { .. })
        ));
    }

    #[test]
    fn json_form() {
        let json = r#"{"name": "names", "subject": "name", "type": "CONCAT_STRING", "value": " | "}"#;
        let spec: AggregateSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, AggregateKind::ConcatString(" | ".to_owned()));
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["type"], "CONCAT_STRING");
        assert_eq!(back["value"], " | ");

        let bad = r#"{"name": "t", "type": "SUM"}"#;
        assert!(serde_json::from_str::<AggregateSpec>(bad).is_err());
    }
}
