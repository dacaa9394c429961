//! Batch sizing across source lengths and batch limits

use ferry::core::import::{Batches, RecordSource};
use ferry::domain::{Batch, Record};
use serde_json::json;
use test_case::test_case;

fn records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| [("id", json!(i.to_string()))].into_iter().collect())
        .collect()
}

#[test_case(0, 100, 0 ; "empty source")]
#[test_case(1, 100, 1 ; "single record")]
#[test_case(100, 100, 1 ; "exactly one batch")]
#[test_case(101, 100, 2 ; "one over")]
#[test_case(250, 100, 3 ; "two and a half")]
#[test_case(7, 1, 7 ; "batch of one")]
#[test_case(1000, 25, 40 ; "store cap sized")]
fn test_batch_count_is_ceiling(len: usize, max: usize, expected: usize) {
    let batches: Vec<Batch> = Batches::new(records(len).into_iter(), max).unwrap().collect();

    assert_eq!(batches.len(), expected);
    assert_eq!(batches.len(), len.div_ceil(max));
    assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= max));
    assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), len);
}

#[test]
fn test_only_last_batch_is_short() {
    let batches: Vec<Batch> = Batches::new(records(23).into_iter(), 5).unwrap().collect();
    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![5, 5, 5, 5, 3]);
}

#[test]
fn test_source_rows_batch_in_order() {
    let source = RecordSource::delimited("id\n1\n2\n3\n4\n5\n", b',').unwrap();
    let batches: Vec<Batch> = Batches::new(source.map(|row| row.unwrap()), 2)
        .unwrap()
        .collect();

    let ids: Vec<&str> = batches
        .iter()
        .flat_map(|b| b.records())
        .map(|r| r.get("id").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}
