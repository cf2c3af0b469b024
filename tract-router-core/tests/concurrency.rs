use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tract_router_core::{Partition, Priority, RouteError, Router, RouterState, Target};

const PRODUCERS: usize = 4;
const PER_PRODUCER: u32 = 2_000;

fn payload(producer: usize, seq: u32) -> Vec<u8> {
    let mut bytes = vec![producer as u8];
    bytes.extend_from_slice(&seq.to_le_bytes());
    bytes
}

fn decode(bytes: &[u8]) -> (usize, u32) {
    let seq = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
    (bytes[0] as usize, seq)
}

fn priority_for(seq: u32) -> Priority {
    Priority::from_code((seq % 4) as i32).unwrap()
}

/// Producers retry on QueueFull until every message is accepted, while one
/// consumer per partition drains. Nothing may be lost or duplicated.
#[test]
fn test_concurrent_route_and_drain_lose_nothing() {
    let router = Arc::new(Router::create(64).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = Partition::ALL
        .iter()
        .map(|&partition| {
            let router = Arc::clone(&router);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    assert!(router.len(partition) <= router.capacity());
                    match router.drain(partition) {
                        Some(msg) => {
                            assert_eq!(msg.target(), Target::Partition(partition));
                            seen.push((msg.priority(), msg.sequence_tag(), msg.into_payload()));
                        }
                        None if done.load(Ordering::Acquire) && router.is_empty(partition) => {
                            break
                        }
                        None => thread::yield_now(),
                    }
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let partition = Partition::ALL[producer % 2];
                for seq in 0..PER_PRODUCER {
                    let mut bytes = payload(producer, seq);
                    loop {
                        match router.route(
                            bytes,
                            priority_for(seq),
                            Partition::ALL[(producer + 1) % 2],
                            partition.into(),
                        ) {
                            Ok(_) => break,
                            Err(rejected) => {
                                assert!(matches!(rejected.error, RouteError::QueueFull { .. }));
                                bytes = rejected.into_payload();
                                thread::yield_now();
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.join().unwrap());
    }

    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER as usize);

    let unique: HashSet<(usize, u32)> = all.iter().map(|(_, _, p)| decode(p)).collect();
    assert_eq!(unique.len(), all.len());

    let tags: HashSet<u64> = all.iter().map(|(_, tag, _)| *tag).collect();
    assert_eq!(tags.len(), all.len());

    // Within one producer and one priority, drain order follows send order
    let mut last: HashMap<(usize, Priority), u32> = HashMap::new();
    for (priority, _, bytes) in &all {
        let (producer, seq) = decode(bytes);
        if let Some(prev) = last.insert((producer, *priority), seq) {
            assert!(prev < seq, "producer {} reordered {} after {}", producer, seq, prev);
        }
    }

    let stats = router.stats();
    assert_eq!(stats.routed, all.len() as u64);
    assert_eq!(stats.drained, all.len() as u64);
    assert_eq!(stats.in_flight(), 0);
}

#[test]
fn test_length_never_exceeds_capacity_under_contention() {
    let router = Arc::new(Router::create(8).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let mut accepted = 0usize;
                for n in 0..100u32 {
                    if router
                        .route(
                            payload(i, n),
                            Priority::High,
                            Partition::Internal,
                            Partition::External.into(),
                        )
                        .is_ok()
                    {
                        accepted += 1;
                    }
                    assert!(router.len(Partition::External) <= 8);
                }
                accepted
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(accepted, 8);
    assert_eq!(router.len(Partition::External), 8);
    assert_eq!(router.stats().rejected, 8 * 100 - 8);
}

/// Drained order on a single partition matches a reference sort by
/// descending priority, then ascending sequence tag.
#[test]
fn test_drain_matches_reference_sort() {
    let router = Router::create(500).unwrap();
    let mut expected = Vec::new();

    for n in 0..500u32 {
        let priority = priority_for(n.wrapping_mul(7919) >> 3);
        let tag = router
            .route(
                n.to_le_bytes().to_vec(),
                priority,
                Partition::Internal,
                Partition::Internal.into(),
            )
            .unwrap()
            .sequence_tag()
            .unwrap();
        expected.push((priority, tag, n));
    }
    expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let drained: Vec<u32> = std::iter::from_fn(|| router.drain(Partition::Internal))
        .map(|m| u32::from_le_bytes(m.payload().try_into().unwrap()))
        .collect();
    let want: Vec<u32> = expected.into_iter().map(|(_, _, n)| n).collect();
    assert_eq!(drained, want);
}

/// Destroy racing with producers: every message is either rejected,
/// or discarded by destroy. Nothing is routed after destroy returns.
#[test]
fn test_destroy_during_routing_accounts_for_everything() {
    let router = Arc::new(Router::create(10_000).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|i| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let mut accepted = 0u64;
                let mut invalid = 0u64;
                for n in 0..1_000u32 {
                    match router.route(
                        payload(i, n),
                        Priority::Normal,
                        Partition::Internal,
                        Partition::ALL[n as usize % 2].into(),
                    ) {
                        Ok(_) => accepted += 1,
                        Err(rejected) => {
                            assert_eq!(rejected.error, RouteError::InvalidHandle);
                            invalid += 1;
                        }
                    }
                }
                (accepted, invalid)
            })
        })
        .collect();

    thread::yield_now();
    let report = router.destroy();
    assert_eq!(router.state(), RouterState::Destroyed);

    let (accepted, invalid) = producers
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |acc, (a, i)| (acc.0 + a, acc.1 + i));

    assert_eq!(accepted + invalid, 4_000);
    assert_eq!(report.discarded() as u64, accepted);
    assert!(router.drain(Partition::Internal).is_none());
    assert!(router.drain(Partition::External).is_none());
}

#[test]
fn test_independent_routers() {
    let a = Router::create(1).unwrap();
    let b = Router::create(1).unwrap();

    a.route(
        b"a".to_vec(),
        Priority::Low,
        Partition::Internal,
        Partition::External.into(),
    )
    .unwrap();
    b.destroy();

    assert_eq!(a.len(Partition::External), 1);
    assert!(a.is_active());
    assert!(!b.is_active());
    assert_eq!(a.drain(Partition::External).unwrap().payload(), b"a");
}
