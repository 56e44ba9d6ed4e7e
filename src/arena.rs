//! Runtime arena state: one `Arena` per on-media arena, holding the
//! decoded info block plus the live flog, map-lock, and RTT structures
//! built from it (§3).

use crate::flog::FlogRuntime;
use crate::layout::info::BttInfo;
use crate::map::MapLocks;
use crate::rtt::Rtt;
use std::sync::Mutex;

/// A single arena's runtime state, addressed by arena-relative offsets
/// (callers add the arena's namespace-absolute base before touching the
/// namespace).
pub(crate) struct Arena {
    pub base_off: u64,
    pub info: BttInfo,
    pub flog: Vec<Mutex<FlogRuntime>>,
    pub map_locks: MapLocks,
    pub rtt: Rtt,
    /// Set at load time if this arena's flog or map was found internally
    /// inconsistent; writes are refused, reads still served (§7).
    pub error: bool,
}

impl Arena {
    pub(crate) fn external_nlba(&self) -> u32 {
        self.info.external_nlba
    }

    pub(crate) fn nfree(&self) -> u32 {
        self.info.nfree
    }

    pub(crate) fn dataoff(&self) -> u64 {
        self.base_off + self.info.dataoff
    }

    pub(crate) fn mapoff(&self) -> u64 {
        self.base_off + self.info.mapoff
    }

    pub(crate) fn map_entry_off(&self, external_lba: u32) -> u64 {
        self.mapoff() + 4 * u64::from(external_lba)
    }

    pub(crate) fn internal_lbasize(&self) -> u32 {
        self.info.internal_lbasize
    }

    pub(crate) fn block_off(&self, post_map_lba: u32) -> u64 {
        self.dataoff() + u64::from(post_map_lba) * u64::from(self.internal_lbasize())
    }
}
