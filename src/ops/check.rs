//! Consistency checker (§4.8). Exclusive: the caller is responsible for
//! quiescing every other lane before calling this.

use tracing::{instrument, warn};

use crate::error::{BttContext, BttError};
use crate::handle::{Btt, CheckResult};
use crate::map::MapEntry;

#[instrument(skip(btt), level = "info")]
pub(crate) fn check(btt: &Btt) -> Result<CheckResult, BttError> {
    let Some(arenas) = btt.arenas() else {
        return Ok(CheckResult::Consistent);
    };

    let mut worst = CheckResult::Consistent;

    for (arena_idx, arena) in arenas.iter().enumerate() {
        let ctx = || BttContext::new().with_arena(arena_idx);

        if arena.error {
            warn!(arena = arena_idx, "arena is flagged inconsistent from a prior recovery");
            worst = CheckResult::Error;
            continue;
        }

        let internal_nlba = arena.info.internal_nlba as usize;
        let mut seen = vec![false; internal_nlba];
        let mut inconsistent = false;

        for external_lba in 0..arena.external_nlba() {
            let mut bits = [0u8; 4];
            btt.ns()
                .read(0, arena.map_entry_off(external_lba), &mut bits)
                .map_err(|source| BttError::io(source, ctx()))?;
            let post_map_lba = MapEntry::from_bits(u32::from_le_bytes(bits)).post_map_lba() as usize;
            if seen[post_map_lba] {
                warn!(arena = arena_idx, post_map_lba, "duplicate reference to internal LBA in map");
                inconsistent = true;
            }
            seen[post_map_lba] = true;
        }

        for runtime in &arena.flog {
            let runtime = runtime
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let free_lba = runtime.free_block() as usize;
            if seen[free_lba] {
                warn!(arena = arena_idx, free_lba, "duplicate reference to internal LBA in flog");
                inconsistent = true;
            }
            seen[free_lba] = true;
        }

        if seen.iter().any(|&bit| !bit) {
            warn!(arena = arena_idx, "internal LBA unreferenced by map or flog");
            inconsistent = true;
        }

        if inconsistent && worst == CheckResult::Consistent {
            worst = CheckResult::Inconsistent;
        }
    }

    Ok(worst)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::error::NamespaceError;
    use crate::handle::{Btt, BttConfig};
    use crate::namespace::Namespace;

    use super::*;

    struct TestNs(Mutex<Vec<u8>>);

    impl TestNs {
        fn new(size: usize) -> Self {
            TestNs(Mutex::new(vec![0u8; size]))
        }
    }

    impl Namespace for TestNs {
        fn read(&self, _lane: usize, off: u64, buf: &mut [u8]) -> Result<(), NamespaceError> {
            let data = self.0.lock().unwrap();
            buf.copy_from_slice(&data[off as usize..off as usize + buf.len()]);
            Ok(())
        }
        fn write(&self, _lane: usize, off: u64, buf: &[u8]) -> Result<(), NamespaceError> {
            let mut data = self.0.lock().unwrap();
            data[off as usize..off as usize + buf.len()].copy_from_slice(buf);
            Ok(())
        }
        fn map(
            &self,
            _lane: usize,
            off: u64,
            max_len: usize,
            f: &mut dyn FnMut(&mut [u8]),
        ) -> Result<usize, NamespaceError> {
            let mut data = self.0.lock().unwrap();
            let len = max_len.min(data.len() - off as usize);
            f(&mut data[off as usize..off as usize + len]);
            Ok(len)
        }
        fn sync(&self, _lane: usize, _off: u64, _len: usize) -> Result<(), NamespaceError> {
            Ok(())
        }
    }

    fn open(size: usize) -> Btt {
        let config = BttConfig::new(size as u64, 512);
        Btt::init(Box::new(TestNs::new(size)), config).unwrap()
    }

    #[test]
    fn fresh_namespace_is_consistent() {
        let btt = open(256 * 1024);
        assert_eq!(check(&btt).unwrap(), CheckResult::Consistent);
    }

    #[test]
    fn workload_stays_consistent() {
        let btt = open(256 * 1024);
        btt.write(0, 0, &[0x11; 512]).unwrap();
        btt.write(0, 1, &[0x22; 512]).unwrap();
        btt.set_zero(0, 0).unwrap();
        assert_eq!(check(&btt).unwrap(), CheckResult::Consistent);
    }

    #[test]
    fn duplicate_post_map_lba_is_detected() {
        let btt = open(256 * 1024);
        btt.write(0, 0, &[0x11; 512]).unwrap();
        btt.write(0, 1, &[0x22; 512]).unwrap();

        let arenas = btt.arenas().unwrap();
        let arena = &arenas[0];
        let mut entry0 = [0u8; 4];
        btt.ns().read(0, arena.map_entry_off(0), &mut entry0).unwrap();
        // Point LBA 1's map entry at whatever LBA 0 points to as well.
        btt.ns().write(0, arena.map_entry_off(1), &entry0).unwrap();

        assert_eq!(check(&btt).unwrap(), CheckResult::Inconsistent);
    }
}
