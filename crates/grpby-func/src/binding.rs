//! Resolution of aggregate specs against an input row layout.

use grpby_error::{GroupByError, Result};
use grpby_types::{RowMeta, ValueMeta, ValueType};

use crate::kind::{AggregateKind, AggregateSpec};

/// An [`AggregateSpec`] whose subject has been located in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAggregate {
    pub spec: AggregateSpec,
    /// Subject position in the input row; `None` for `COUNT_ANY` without
    /// a subject.
    pub subject_index: Option<usize>,
    pub subject_meta: Option<ValueMeta>,
    /// Layout of the value this aggregate produces.
    pub output_meta: ValueMeta,
}

impl BoundAggregate {
    pub fn kind(&self) -> &AggregateKind {
        &self.spec.kind
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Bind `spec` to `input`, failing if its subject is not a field of
/// `input`.
pub fn bind(spec: &AggregateSpec, input: &RowMeta) -> Result<BoundAggregate> {
    let subject_index = match &spec.subject {
        Some(subject) => Some(input.require(subject, || GroupByError::SubjectFieldNotFound {
            name: subject.clone(),
            aggregate: spec.name.clone(),
        })?),
        None if spec.kind.requires_subject() => {
            return Err(GroupByError::MissingSubject {
                aggregate: spec.name.clone(),
            });
        }
        None => None,
    };
    let subject_meta = subject_index.and_then(|i| input.get(i)).cloned();
    let output_meta = output_meta(spec, subject_meta.as_ref());
    Ok(BoundAggregate {
        spec: spec.clone(),
        subject_index,
        subject_meta,
        output_meta,
    })
}

/// Bind every spec in order.
pub fn bind_all(specs: &[AggregateSpec], input: &RowMeta) -> Result<Vec<BoundAggregate>> {
    specs.iter().map(|spec| bind(spec, input)).collect()
}

fn output_meta(spec: &AggregateSpec, subject: Option<&ValueMeta>) -> ValueMeta {
    let subject_type = subject.map(|m| m.value_type);
    let value_type = match spec.kind {
        AggregateKind::Sum | AggregateKind::CumulativeSum => match subject_type {
            Some(ValueType::Integer) => ValueType::Integer,
            _ => ValueType::Number,
        },
        AggregateKind::Average
        | AggregateKind::CumulativeAverage
        | AggregateKind::Median
        | AggregateKind::Percentile(_)
        | AggregateKind::PercentileNearestRank(_)
        | AggregateKind::StdDevPopulation
        | AggregateKind::StdDevSample => ValueType::Number,
        AggregateKind::CountAll | AggregateKind::CountAny | AggregateKind::CountDistinct => {
            ValueType::Integer
        }
        AggregateKind::ConcatComma | AggregateKind::ConcatString(_) => ValueType::String,
        AggregateKind::Min
        | AggregateKind::Max
        | AggregateKind::First
        | AggregateKind::Last
        | AggregateKind::FirstInclNull
        | AggregateKind::LastInclNull => {
            if let Some(meta) = subject {
                return meta.renamed(spec.name.clone());
            }
            ValueType::String
        }
    };
    ValueMeta::new(spec.name.clone(), value_type)
}
