#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

use bagdb::{BagError, Bucket, BucketOptions, Result};
use tempfile::tempdir;

const NUM_THREADS: usize = 8;
const OPERATIONS_PER_THREAD: usize = 100;

fn payload(thread_id: usize, i: usize) -> Vec<u8> {
    format!("t{thread_id:02}-op{i:04}").into_bytes()
}

#[test]
fn concurrent_puts_get_distinct_slots() -> Result<()> {
    let dir = tempdir()?;
    let bucket = Arc::new(Bucket::open(dir.path(), BucketOptions::new(32))?);
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let bucket = Arc::clone(&bucket);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<Vec<(u64, Vec<u8>)>> {
            barrier.wait();
            let mut stored = Vec::with_capacity(OPERATIONS_PER_THREAD);
            for i in 0..OPERATIONS_PER_THREAD {
                let data = payload(thread_id, i);
                let slot = bucket.put(&data)?;
                stored.push((slot, data));
            }
            Ok(stored)
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap()?);
    }

    let total = NUM_THREADS * OPERATIONS_PER_THREAD;
    let slots: BTreeSet<u64> = all.iter().map(|(slot, _)| *slot).collect();
    assert_eq!(slots.len(), total);
    assert_eq!(slots, (0..total as u64).collect());
    assert_eq!(bucket.tail(), total as u64);
    for (slot, data) in &all {
        assert_eq!(&bucket.get(*slot)?, data);
    }
    Ok(())
}

#[test]
fn concurrent_mixed_workload_keeps_records_intact() -> Result<()> {
    let dir = tempdir()?;
    let bucket = Arc::new(Bucket::open(dir.path(), BucketOptions::new(48))?);
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let bucket = Arc::clone(&bucket);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<Vec<(u64, Vec<u8>)>> {
            barrier.wait();
            let mut live: Vec<(u64, Vec<u8>)> = Vec::new();
            for i in 0..OPERATIONS_PER_THREAD {
                let data = payload(thread_id, i);
                let slot = bucket.put(&data)?;
                live.push((slot, data));
                match i % 4 {
                    1 => {
                        let (slot, _) = live.remove(0);
                        bucket.delete(slot)?;
                    }
                    2 => {
                        let (slot, data) = &mut live[0];
                        *data = format!("t{thread_id:02}-upd{i:04}").into_bytes();
                        bucket.update(data, *slot)?;
                    }
                    _ => {
                        for (slot, data) in &live {
                            assert_eq!(&bucket.get(*slot)?, data);
                        }
                    }
                }
            }
            Ok(live)
        }));
    }

    let mut live = Vec::new();
    for handle in handles {
        live.extend(handle.join().unwrap()?);
    }
    for (slot, data) in &live {
        assert_eq!(&bucket.get(*slot)?, data);
    }

    let mut seen = Vec::new();
    bucket.iterate(|slot, data| seen.push((slot, data.to_vec())))?;
    live.sort();
    assert_eq!(seen, live);
    assert_eq!(
        bucket.tail() as usize,
        live.len() + bucket.gap_count()
    );
    Ok(())
}

#[test]
fn close_while_operations_are_in_flight() -> Result<()> {
    let dir = tempdir()?;
    let bucket = Arc::new(Bucket::open(dir.path(), BucketOptions::new(32))?);
    for i in 0..64usize {
        bucket.put(&payload(0, i))?;
    }
    let barrier = Arc::new(Barrier::new(NUM_THREADS + 1));
    let mut handles = vec![];

    for thread_id in 0..NUM_THREADS {
        let bucket = Arc::clone(&bucket);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..OPERATIONS_PER_THREAD {
                let outcome = match i % 3 {
                    0 => bucket.put(&payload(thread_id, i)).map(drop),
                    1 => bucket.get((i % 64) as u64).map(drop),
                    _ => bucket.iterate(|_, _| {}),
                };
                match outcome {
                    Ok(()) | Err(BagError::Closed) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }));
    }

    barrier.wait();
    bucket.close()?;
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(bucket.is_closed());
    assert!(matches!(bucket.get(0), Err(BagError::Closed)));
    Ok(())
}

#[test]
fn records_written_concurrently_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let mut expected = Vec::new();
    {
        let bucket = Arc::new(Bucket::open(dir.path(), BucketOptions::new(32))?);
        let mut handles = vec![];
        for thread_id in 0..NUM_THREADS {
            let bucket = Arc::clone(&bucket);
            handles.push(thread::spawn(move || -> Result<Vec<Vec<u8>>> {
                let mut kept = Vec::new();
                for i in 0..OPERATIONS_PER_THREAD {
                    let data = payload(thread_id, i);
                    let slot = bucket.put(&data)?;
                    if i % 3 == 0 {
                        bucket.delete(slot)?;
                    } else {
                        kept.push(data);
                    }
                }
                Ok(kept)
            }));
        }
        for handle in handles {
            expected.extend(handle.join().unwrap()?);
        }
        bucket.close()?;
    }

    let mut seen = Vec::new();
    let bucket = Bucket::open_with(dir.path(), BucketOptions::new(32), |_, data| {
        seen.push(data.to_vec())
    })?;
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(bucket.tail() as usize, expected.len());
    assert_eq!(bucket.gap_count(), 0);
    Ok(())
}
