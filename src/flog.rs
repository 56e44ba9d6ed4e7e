//! Flog entries, sequence numbers, and the per-lane free-block allocator
//! (§3, §4.2).
//!
//! A flog entry is `{lba, old_map, new_map, seq}`, each a little-endian
//! `u32`. Entries are stored as pairs; the "active" half of the pair is
//! the one with the higher sequence number under the cyclic order
//! `01 -> 10 -> 11 -> 01`, with `00` meaning "never written".

use std::sync::Mutex;

use tracing::{debug, instrument, trace, warn};

use crate::error::NamespaceError;
use crate::map::LBA_MASK;
use crate::namespace::Namespace;

pub(crate) const FLOG_ENTRY_SIZE: u64 = 16;
pub(crate) const FLOG_PAIR_SIZE: u64 = 2 * FLOG_ENTRY_SIZE;

/// Sequence-number successor table: `01 -> 10 -> 11 -> 01`. Index 0 (the
/// "never written" value) maps to itself; it should never be advanced in
/// practice since a never-written slot has no active content to advance
/// from.
const NSEQ: [u8; 4] = [0, 2, 3, 1];

#[must_use]
pub(crate) fn seq_succ(seq: u8) -> u8 {
    NSEQ[(seq & 3) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct FlogEntry {
    pub lba: u32,
    pub old_map: u32,
    pub new_map: u32,
    pub seq: u8,
}

impl FlogEntry {
    pub(crate) fn to_bytes(self) -> [u8; FLOG_ENTRY_SIZE as usize] {
        let mut buf = [0u8; FLOG_ENTRY_SIZE as usize];
        buf[0..4].copy_from_slice(&self.lba.to_le_bytes());
        buf[4..8].copy_from_slice(&self.old_map.to_le_bytes());
        buf[8..12].copy_from_slice(&self.new_map.to_le_bytes());
        buf[12..16].copy_from_slice(&u32::from(self.seq).to_le_bytes());
        buf
    }

    pub(crate) fn from_bytes(buf: &[u8]) -> Self {
        FlogEntry {
            lba: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            old_map: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            new_map: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            seq: u32::from_le_bytes(buf[12..16].try_into().unwrap()) as u8,
        }
    }

    #[must_use]
    pub(crate) fn free_block(self) -> u32 {
        self.old_map & LBA_MASK
    }
}

/// Which half of a flog pair is active, chosen per the table in spec §4.2.
enum PairOutcome {
    /// Neither slot has a valid (non-zero) sequence number, or both slots
    /// have the same sequence number: the arena's metadata is internally
    /// inconsistent.
    Error,
    Active { index: usize, entry: FlogEntry },
}

fn resolve_pair(e0: FlogEntry, e1: FlogEntry) -> PairOutcome {
    match (e0.seq, e1.seq) {
        (0, 0) => PairOutcome::Error,
        (0, v) if v > 0 => PairOutcome::Active { index: 1, entry: e1 },
        (v, 0) if v > 0 => PairOutcome::Active { index: 0, entry: e0 },
        (a, b) if a == b => PairOutcome::Error,
        (a, b) if seq_succ(a) == b => PairOutcome::Active { index: 1, entry: e1 },
        _ => PairOutcome::Active { index: 0, entry: e0 },
    }
}

/// Per-lane, per-arena runtime state: the last durably observed flog
/// entry, the on-media offsets of its pair's two slots, and which slot to
/// write next.
pub(crate) struct FlogRuntime {
    pub entry: FlogEntry,
    pub slot_offsets: [u64; 2],
    pub next: usize,
}

impl FlogRuntime {
    #[must_use]
    pub(crate) fn free_block(&self) -> u32 {
        self.entry.free_block()
    }
}

/// Outcome of loading every lane's flog pair for an arena.
pub(crate) struct LoadedFlogs {
    pub runtimes: Vec<Mutex<FlogRuntime>>,
    /// Set if any pair in the arena was found to be internally
    /// inconsistent (§4.2's "arena marked ERROR" cases).
    pub arena_error: bool,
}

/// Load and, where necessary, recover all `nfree` flog pairs for an arena.
///
/// `mapoff` is the arena-relative offset of the map; recovery reads and
/// possibly rewrites a single map entry per flog pair, exactly as spec
/// §4.2 describes.
#[instrument(skip(ns), level = "debug")]
pub(crate) fn load_arena_flogs(
    ns: &dyn Namespace,
    lane: usize,
    flogoff: u64,
    mapoff: u64,
    nfree: u32,
) -> Result<LoadedFlogs, NamespaceError> {
    let mut runtimes = Vec::with_capacity(nfree as usize);
    let mut arena_error = false;

    let mut pair_off = flogoff;
    for i in 0..nfree {
        let mut buf = [0u8; FLOG_PAIR_SIZE as usize];
        ns.read(lane, pair_off, &mut buf)?;
        let e0 = FlogEntry::from_bytes(&buf[0..FLOG_ENTRY_SIZE as usize]);
        let e1 = FlogEntry::from_bytes(&buf[FLOG_ENTRY_SIZE as usize..]);

        let slot_offsets = [pair_off, pair_off + FLOG_ENTRY_SIZE];

        match resolve_pair(e0, e1) {
            PairOutcome::Error => {
                warn!(flog_index = i, "flog pair has inconsistent sequence numbers");
                arena_error = true;
                runtimes.push(Mutex::new(FlogRuntime {
                    entry: FlogEntry::default(),
                    slot_offsets,
                    next: 0,
                }));
            }
            PairOutcome::Active { index, entry } => {
                let next = 1 - index;
                if entry.old_map != entry.new_map {
                    recover_if_needed(ns, lane, mapoff, &entry, i)?;
                } else {
                    trace!(flog_index = i, "flog entry is in initial state, no recovery needed");
                }
                runtimes.push(Mutex::new(FlogRuntime {
                    entry,
                    slot_offsets,
                    next,
                }));
            }
        }

        pair_off += FLOG_PAIR_SIZE;
    }

    Ok(LoadedFlogs {
        runtimes,
        arena_error,
    })
}

fn recover_if_needed(
    ns: &dyn Namespace,
    lane: usize,
    mapoff: u64,
    entry: &FlogEntry,
    flog_index: u32,
) -> Result<(), NamespaceError> {
    let map_entry_off = mapoff + 4 * u64::from(entry.lba);
    let mut buf = [0u8; 4];
    ns.read(lane, map_entry_off, &mut buf)?;
    let current = u32::from_le_bytes(buf);

    if current == entry.new_map {
        trace!(flog_index, "prior write already committed to the map");
    } else if current == entry.old_map {
        debug!(
            flog_index,
            lba = entry.lba,
            new_map = entry.new_map,
            "completing interrupted write: rewriting map entry"
        );
        ns.write(lane, map_entry_off, &entry.new_map.to_le_bytes())?;
    } else {
        warn!(
            flog_index,
            lba = entry.lba,
            "map entry matches neither old_map nor new_map; leaving for next allocation to repair"
        );
    }
    Ok(())
}

/// Write the inactive slot of `runtime`'s pair in the two-step durable
/// sequence described by §4.2/§9: first the `{lba, old_map, new_map}`
/// fields, then (once that is durable) the `seq` field, which is the
/// commit point. Updates `runtime` in place on success.
#[instrument(skip(ns, runtime), level = "debug")]
pub(crate) fn flog_update(
    ns: &dyn Namespace,
    lane: usize,
    runtime: &mut FlogRuntime,
    lba: u32,
    old_map: u32,
    new_map: u32,
) -> Result<(), NamespaceError> {
    let seq = seq_succ(runtime.entry.seq);
    let new_entry = FlogEntry {
        lba,
        old_map,
        new_map,
        seq,
    };
    let bytes = new_entry.to_bytes();
    let slot_off = runtime.slot_offsets[runtime.next];

    // Step 1: the first three fields, durable before step 2 begins. A
    // crash here leaves the slot's old (or garbage) seq in place, so it
    // stays inactive.
    ns.write(lane, slot_off, &bytes[0..12])?;

    // Step 2: the seq field. This is the linearization point — once this
    // returns, the new entry is active.
    ns.write(lane, slot_off + 12, &bytes[12..16])?;

    trace!(lane, lba, old_map, new_map, seq, "flog entry committed");

    runtime.next = 1 - runtime.next;
    runtime.entry = new_entry;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_cycles_as_specified() {
        assert_eq!(seq_succ(1), 2);
        assert_eq!(seq_succ(2), 3);
        assert_eq!(seq_succ(3), 1);
    }

    #[test]
    fn singleton_seq_wins() {
        let e0 = FlogEntry { seq: 0, ..Default::default() };
        let e1 = FlogEntry { seq: 1, lba: 5, ..Default::default() };
        match resolve_pair(e0, e1) {
            PairOutcome::Active { index, entry } => {
                assert_eq!(index, 1);
                assert_eq!(entry.lba, 5);
            }
            PairOutcome::Error => panic!("expected active pair"),
        }
    }

    #[test]
    fn successor_seq_wins() {
        let e0 = FlogEntry { seq: 1, lba: 1, ..Default::default() };
        let e1 = FlogEntry { seq: 2, lba: 2, ..Default::default() };
        match resolve_pair(e0, e1) {
            PairOutcome::Active { index, entry } => {
                assert_eq!(index, 1);
                assert_eq!(entry.lba, 2);
            }
            PairOutcome::Error => panic!("expected active pair"),
        }

        let e0 = FlogEntry { seq: 3, lba: 3, ..Default::default() };
        let e1 = FlogEntry { seq: 1, lba: 4, ..Default::default() };
        match resolve_pair(e0, e1) {
            PairOutcome::Active { index, entry } => {
                assert_eq!(index, 0);
                assert_eq!(entry.lba, 3);
            }
            PairOutcome::Error => panic!("expected active pair"),
        }
    }

    #[test]
    fn identical_or_zero_seqs_are_errors() {
        let e0 = FlogEntry { seq: 0, ..Default::default() };
        let e1 = FlogEntry { seq: 0, ..Default::default() };
        assert!(matches!(resolve_pair(e0, e1), PairOutcome::Error));

        let e0 = FlogEntry { seq: 2, ..Default::default() };
        let e1 = FlogEntry { seq: 2, ..Default::default() };
        assert!(matches!(resolve_pair(e0, e1), PairOutcome::Error));
    }

    #[test]
    fn entry_round_trips_through_bytes() {
        let e = FlogEntry {
            lba: 0xAABB_CCDD,
            old_map: 0x1111_2222,
            new_map: 0x3333_4444,
            seq: 3,
        };
        let bytes = e.to_bytes();
        assert_eq!(FlogEntry::from_bytes(&bytes), e);
    }
}
