//! P8 (consistency after workload): black-box exercise of `check` over
//! the public API. Corruption-detection cases (P9) live next to the
//! checker's implementation in `src/ops/check.rs`, where the test can
//! reach arena-relative offsets directly.

mod common;

use btt_core::{BttConfig, CheckResult};
use common::{block, MemoryNamespace, LBASIZE, SMALL_NAMESPACE};

fn open(ns: &MemoryNamespace) -> btt_core::Btt {
    let config = BttConfig::new(SMALL_NAMESPACE as u64, LBASIZE);
    btt_core::Btt::init(Box::new(ns.reopen()), config).unwrap()
}

#[test]
fn mixed_workload_of_writes_and_flags_stays_consistent() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    for lba in 0..20u64 {
        btt.write(0, lba, &block((lba % 256) as u8)).unwrap();
    }
    btt.set_zero(0, 3).unwrap();
    btt.set_error(0, 7).unwrap();
    for lba in 0..20u64 {
        if lba != 7 {
            btt.write(0, lba, &block(0xAB)).unwrap();
        }
    }

    assert_eq!(btt.check().unwrap(), CheckResult::Consistent);
}

#[test]
fn repeated_writes_to_the_same_lba_stay_consistent() {
    let ns = MemoryNamespace::new(SMALL_NAMESPACE);
    let btt = open(&ns);

    for i in 0..50u8 {
        btt.write(0, 0, &block(i)).unwrap();
    }

    assert_eq!(btt.check().unwrap(), CheckResult::Consistent);
}
