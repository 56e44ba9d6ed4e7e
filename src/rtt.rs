//! Read-tracking table (§4.4).
//!
//! Each lane publishes the post-map LBA it is currently reading into its
//! own cell. Writers scan every lane's cell before reusing a free block.
//! The ordering contract in §4.4/§9 requires a full fence between a
//! reader's publish and its re-read of the map, and between a writer's
//! fetch of its free block and its scan of the table — `SeqCst` on every
//! access gives us that without having to reason about acquire/release
//! pairing per call site.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::map::ERROR_FLAG;

/// Sentinel meaning "this lane is not currently reading anything". Chosen
/// as the `ERROR`-flagged pattern: real post-map LBAs are stored in the
/// RTT without flag bits set (§4.4), so this can never collide with a live
/// entry.
const IDLE: u32 = ERROR_FLAG;

pub(crate) struct Rtt {
    cells: Vec<AtomicU32>,
}

impl Rtt {
    pub(crate) fn new(nfree: usize) -> Self {
        let mut cells = Vec::with_capacity(nfree);
        cells.resize_with(nfree, || AtomicU32::new(IDLE));
        Rtt { cells }
    }

    /// Publish that `lane` is about to read `post_map_lba`. Must be
    /// followed by a re-read of the map entry (see `ops::read`) to detect
    /// a writer that raced ahead of the publish.
    pub(crate) fn publish(&self, lane: usize, post_map_lba: u32) {
        self.cells[lane].store(post_map_lba, Ordering::SeqCst);
    }

    /// Clear `lane`'s published entry once the read has completed.
    pub(crate) fn clear(&self, lane: usize) {
        self.cells[lane].store(IDLE, Ordering::SeqCst);
    }

    /// True if any lane currently has `post_map_lba` published. Writers
    /// spin on this before reusing a freed block (§4.6 step 4).
    pub(crate) fn any_lane_reading(&self, post_map_lba: u32) -> bool {
        self.cells
            .iter()
            .any(|cell| cell.load(Ordering::SeqCst) == post_map_lba)
    }

    /// Block until no lane is reading `post_map_lba`. Busy-waits: per §5,
    /// this is expected to be short since readers publish-then-read-then-
    /// clear in bounded time.
    pub(crate) fn drain(&self, post_map_lba: u32) {
        while self.any_lane_reading(post_map_lba) {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_by_default() {
        let rtt = Rtt::new(4);
        assert!(!rtt.any_lane_reading(0));
    }

    #[test]
    fn publish_and_clear_round_trip() {
        let rtt = Rtt::new(4);
        rtt.publish(2, 9);
        assert!(rtt.any_lane_reading(9));
        rtt.clear(2);
        assert!(!rtt.any_lane_reading(9));
    }

    #[test]
    fn idle_sentinel_never_matches_a_real_lba() {
        let rtt = Rtt::new(4);
        // A real post-map LBA is always within LBA_MASK and never has flag
        // bits set, so it can never equal the ERROR-flagged idle sentinel.
        assert!(!rtt.any_lane_reading(ERROR_FLAG));
    }
}
