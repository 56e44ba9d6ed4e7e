//! End-to-end scenarios from the specification's testable-properties
//! section: fresh-namespace zeros, read-your-writes, set_zero/set_error,
//! range checks, and concurrent lanes.

mod common;

use btt_core::{BttConfig, BttError, CheckResult};
use common::{block, MemoryNamespace, LBASIZE, SMALL_NAMESPACE};

fn open(ns: &MemoryNamespace) -> btt_core::Btt {
    let config = BttConfig::new(SMALL_NAMESPACE as u64, LBASIZE);
    btt_core::Btt::init(Box::new(ns.reopen()), config).expect("init should succeed")
}

#[test]
fn fresh_namespace_reads_as_zero() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    let mut buf = vec![0xFFu8; LBASIZE as usize];
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, block(0));
}

#[test]
fn write_then_read_round_trips() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    let a = block(0x11);
    btt.write(0, 0, &a).unwrap();
    let mut buf = vec![0u8; LBASIZE as usize];
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, a);

    let b = block(0x22);
    btt.write(0, 0, &b).unwrap();
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, b);
}

#[test]
fn set_zero_reverts_to_zero_block() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    btt.write(0, 0, &block(0x11)).unwrap();
    btt.set_zero(0, 0).unwrap();

    let mut buf = vec![0xFFu8; LBASIZE as usize];
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, block(0));
}

#[test]
fn set_error_poisons_only_the_targeted_lba() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    btt.write(0, 0, &block(0x11)).unwrap();
    btt.set_error(0, 1).unwrap();

    let mut buf = vec![0u8; LBASIZE as usize];
    assert!(matches!(btt.read(0, 1, &mut buf), Err(BttError::Poisoned { .. })));
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, block(0x11));
}

#[test]
fn out_of_range_lba_is_rejected() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    let nlba = btt.nlba();
    let mut buf = vec![0u8; LBASIZE as usize];
    assert!(matches!(
        btt.read(0, nlba, &mut buf),
        Err(BttError::InvalidArgument { .. })
    ));
    assert!(matches!(
        btt.write(0, nlba, &buf),
        Err(BttError::InvalidArgument { .. })
    ));
}

#[test]
fn two_lanes_write_distinct_lbas_concurrently() {
    use std::sync::Arc;
    use std::thread;

    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = Arc::new(open(&ns));
    assert!(btt.nlane() >= 2, "test needs at least 2 lanes");

    let btt_a = Arc::clone(&btt);
    let btt_b = Arc::clone(&btt);
    let a = thread::spawn(move || btt_a.write(0, 0, &block(0xAA)));
    let b = thread::spawn(move || btt_b.write(1, 1, &block(0xBB)));
    a.join().unwrap().unwrap();
    b.join().unwrap().unwrap();

    let mut buf = vec![0u8; LBASIZE as usize];
    btt.read(0, 0, &mut buf).unwrap();
    assert_eq!(buf, block(0xAA));
    btt.read(0, 1, &mut buf).unwrap();
    assert_eq!(buf, block(0xBB));
}

#[test]
fn fresh_layout_is_consistent() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);
    btt.write(0, 0, &block(0x42)).unwrap();
    btt.write(0, 1, &block(0x43)).unwrap();

    assert_eq!(btt.check().unwrap(), CheckResult::Consistent);
}

#[test]
fn reopen_without_writes_preserves_nlba_and_nlane() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let first = open(&ns);
    let nlba = first.nlba();
    let nlane = first.nlane();
    drop(first);

    let second = open(&ns);
    assert_eq!(second.nlba(), nlba);
    assert_eq!(second.nlane(), nlane);
}
