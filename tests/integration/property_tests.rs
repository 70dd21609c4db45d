#![allow(missing_docs)]

use std::collections::BTreeMap;

use bagdb::{Bucket, BucketOptions};
use proptest::prelude::*;

const SLOT: u32 = 32;
const MAX_PAYLOAD: usize = SLOT as usize - 4;

#[derive(Debug, Clone)]
enum Operation {
    Put { data: Vec<u8> },
    Delete { pick: usize },
    Update { pick: usize, data: Vec<u8> },
    Get { pick: usize },
    Reopen,
}

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=MAX_PAYLOAD)
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => arb_payload().prop_map(|data| Operation::Put { data }),
        3 => any::<usize>().prop_map(|pick| Operation::Delete { pick }),
        1 => (any::<usize>(), arb_payload())
            .prop_map(|(pick, data)| Operation::Update { pick, data }),
        1 => any::<usize>().prop_map(|pick| Operation::Get { pick }),
        1 => Just(Operation::Reopen),
    ]
}

fn nth_live(model: &BTreeMap<u64, Vec<u8>>, pick: usize) -> Option<u64> {
    if model.is_empty() {
        return None;
    }
    model.keys().nth(pick % model.len()).copied()
}

fn sorted_payloads(model: &BTreeMap<u64, Vec<u8>>) -> Vec<Vec<u8>> {
    let mut values: Vec<_> = model.values().cloned().collect();
    values.sort();
    values
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bucket_matches_model(ops in prop::collection::vec(arb_operation(), 1..120)) {
        let dir = tempfile::tempdir().unwrap();
        let opts = BucketOptions::new(SLOT).sync_on_close(false);
        let mut bucket = Bucket::open(dir.path(), opts.clone()).unwrap();
        let mut model: BTreeMap<u64, Vec<u8>> = BTreeMap::new();

        for op in ops {
            match op {
                Operation::Put { data } => {
                    let slot = bucket.put(&data).unwrap();
                    prop_assert!(!model.contains_key(&slot), "slot {} handed out twice", slot);
                    model.insert(slot, data);
                }
                Operation::Delete { pick } => {
                    if let Some(slot) = nth_live(&model, pick) {
                        bucket.delete(slot).unwrap();
                        model.remove(&slot);
                    }
                }
                Operation::Update { pick, data } => {
                    if let Some(slot) = nth_live(&model, pick) {
                        bucket.update(&data, slot).unwrap();
                        model.insert(slot, data);
                    }
                }
                Operation::Get { pick } => {
                    if let Some(slot) = nth_live(&model, pick) {
                        prop_assert_eq!(&bucket.get(slot).unwrap(), &model[&slot]);
                    }
                }
                Operation::Reopen => {
                    bucket.close().unwrap();
                    drop(bucket);
                    let mut reopened = BTreeMap::new();
                    bucket = Bucket::open_with(dir.path(), opts.clone(), |slot, data| {
                        reopened.insert(slot, data.to_vec());
                    }).unwrap();
                    prop_assert_eq!(sorted_payloads(&reopened), sorted_payloads(&model));
                    prop_assert_eq!(bucket.tail(), model.len() as u64);
                    model = reopened;
                }
            }

            let expected_tail = model.keys().next_back().map_or(0, |slot| slot + 1);
            prop_assert_eq!(bucket.tail(), expected_tail);
            prop_assert_eq!(bucket.gap_count() as u64, bucket.tail() - model.len() as u64);
        }

        let mut seen = BTreeMap::new();
        bucket.iterate(|slot, data| {
            seen.insert(slot, data.to_vec());
        }).unwrap();
        prop_assert_eq!(seen, model);
    }

    #[test]
    fn prop_reopen_is_dense(
        records in prop::collection::vec(arb_payload(), 1..60),
        deletes in prop::collection::vec(any::<bool>(), 60)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut kept = Vec::new();
        {
            let bucket = Bucket::open(dir.path(), BucketOptions::new(SLOT)).unwrap();
            let slots: Vec<u64> = records.iter().map(|r| bucket.put(r).unwrap()).collect();
            for (i, slot) in slots.iter().enumerate() {
                if deletes[i] {
                    bucket.delete(*slot).unwrap();
                } else {
                    kept.push(records[i].clone());
                }
            }
        }

        let mut visits = 0usize;
        let mut seen = Vec::new();
        let bucket = Bucket::open_with(dir.path(), BucketOptions::new(SLOT), |slot, data| {
            visits += 1;
            seen.push((slot, data.to_vec()));
        }).unwrap();

        prop_assert_eq!(visits, kept.len());
        prop_assert_eq!(bucket.tail(), kept.len() as u64);
        prop_assert_eq!(bucket.gap_count(), 0);
        let mut slots: Vec<u64> = seen.iter().map(|(slot, _)| *slot).collect();
        slots.sort_unstable();
        prop_assert_eq!(slots, (0..kept.len() as u64).collect::<Vec<_>>());
        let mut payloads: Vec<Vec<u8>> = seen.into_iter().map(|(_, data)| data).collect();
        payloads.sort();
        kept.sort();
        prop_assert_eq!(&payloads, &kept);
        let len = std::fs::metadata(bucket.path().unwrap()).unwrap().len();
        prop_assert_eq!(len, kept.len() as u64 * SLOT as u64);
    }
}
