//! Property tests: grouping by adjacency and order preservation.

use grpby_core::{
    AggregateKind, AggregateSpec, GroupBy, GroupByConfig, SpillConfig, VecSink, VecSource,
};
use grpby_types::{Cx, Row, RowMeta, Value, ValueMeta, ValueType};
use proptest::prelude::*;

fn meta() -> RowMeta {
    [
        ValueMeta::new("key", ValueType::String),
        ValueMeta::new("amount", ValueType::Integer),
    ]
    .into_iter()
    .collect()
}

fn aggregates() -> Vec<AggregateSpec> {
    vec![
        AggregateSpec::new("total", Some("amount"), AggregateKind::Sum).unwrap(),
        AggregateSpec::new("rows", None, AggregateKind::CountAny).unwrap(),
        AggregateSpec::new("low", Some("amount"), AggregateKind::Min).unwrap(),
    ]
}

/// Blocks of (key, amounts); adjacent blocks may share a key, in which
/// case they merge into one group.
fn blocks() -> impl Strategy<Value = Vec<(u8, Vec<i64>)>> {
    prop::collection::vec(
        (0u8..4, prop::collection::vec(-1000i64..1000, 1..12)),
        0..12,
    )
}

fn rows_of(blocks: &[(u8, Vec<i64>)]) -> Vec<Row> {
    blocks
        .iter()
        .flat_map(|(key, amounts)| {
            amounts
                .iter()
                .map(move |&a| vec![Value::Text(format!("k{key}")), Value::Integer(a)])
        })
        .collect()
}

/// Reference grouping: merge runs of equal keys.
fn expected_groups(blocks: &[(u8, Vec<i64>)]) -> Vec<(u8, Vec<i64>)> {
    let mut groups: Vec<(u8, Vec<i64>)> = Vec::new();
    for (key, amounts) in blocks {
        match groups.last_mut() {
            Some((last, values)) if last == key => values.extend(amounts),
            _ => groups.push((*key, amounts.clone())),
        }
    }
    groups
}

fn run(config: GroupByConfig, rows: Vec<Row>) -> Vec<Row> {
    let mut op = GroupBy::new(config, meta()).unwrap();
    let mut sink = VecSink::new();
    op.run(&mut VecSource::new(meta(), rows), &mut sink, &Cx::new())
        .unwrap();
    sink.into_rows()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn summary_emits_one_row_per_group(blocks in blocks()) {
        let config = GroupByConfig {
            group_fields: vec!["key".to_owned()],
            aggregates: aggregates(),
            ..GroupByConfig::default()
        };
        let out = run(config, rows_of(&blocks));
        let groups = expected_groups(&blocks);
        prop_assert_eq!(out.len(), groups.len());
        for (got, (key, values)) in out.iter().zip(&groups) {
            let expected = vec![
                Value::Text(format!("k{key}")),
                Value::Integer(values.iter().sum()),
                Value::Integer(i64::try_from(values.len()).unwrap()),
                Value::Integer(*values.iter().min().unwrap()),
            ];
            prop_assert_eq!(got, &expected);
        }
    }

    #[test]
    fn decorate_preserves_rows_and_order(blocks in blocks(), threshold in 1usize..6) {
        let dir = tempfile::tempdir().unwrap();
        let config = GroupByConfig {
            group_fields: vec!["key".to_owned()],
            aggregates: aggregates(),
            pass_all_rows: true,
            spill: SpillConfig {
                directory: dir.path().to_string_lossy().into_owned(),
                threshold,
                ..SpillConfig::default()
            },
            ..GroupByConfig::default()
        };
        let rows = rows_of(&blocks);
        let out = run(config, rows.clone());
        prop_assert_eq!(out.len(), rows.len());

        let mut offset = 0;
        for (_, values) in expected_groups(&blocks) {
            let total = Value::Integer(values.iter().sum());
            for got in &out[offset..offset + values.len()] {
                prop_assert_eq!(&got[..2], &rows[offset][..2]);
                prop_assert_eq!(&got[2], &total);
                offset += 1;
            }
        }
        prop_assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
