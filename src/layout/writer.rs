//! `write_layout`: lay out a brand-new BTT across a namespace (§4.1).

use tracing::{info, instrument};

use crate::arena::Arena;
use crate::error::{LayoutError, NamespaceError};
use crate::flog::{FlogEntry, FlogRuntime, FLOG_ENTRY_SIZE, FLOG_PAIR_SIZE};
use crate::layout::geometry::{self, partition_arenas};
use crate::layout::info::{BttInfo, INFO_SIZE, MAJOR_VERSION, MINOR_VERSION};
use crate::layout::BTT_DEFAULT_NFREE;
use crate::map::MapEntry;
use crate::namespace::Namespace;
use crate::rtt::Rtt;
use crate::map::MapLocks;
use std::sync::Mutex;

/// Partition `rawsize` into arenas and write a fresh layout: identity map,
/// initial flog pairs, and two copies of the info block, for every arena.
/// Returns the constructed runtime arenas, ready for use without a further
/// load pass (a fresh layout has nothing to recover).
#[instrument(skip(ns), level = "info")]
pub(crate) fn write_layout(
    ns: &dyn Namespace,
    lane: usize,
    rawsize: u64,
    external_lbasize: u32,
    parent_uuid: [u8; 16],
) -> Result<Vec<Arena>, LayoutError> {
    let sizes = partition_arenas(rawsize);
    if sizes.is_empty() {
        return Err(LayoutError::RawsizeTooSmall {
            rawsize,
            min_size: crate::layout::BTT_MIN_SIZE,
        });
    }

    let mut arenas = Vec::with_capacity(sizes.len());
    let mut base_off = 0u64;
    let narena = sizes.len();

    for (idx, arena_rawsize) in sizes.iter().copied().enumerate() {
        let geom = geometry::compute(arena_rawsize, external_lbasize, BTT_DEFAULT_NFREE)?;
        let nextoff = if idx + 1 < narena { arena_rawsize } else { 0 };

        write_identity_map(ns, lane, base_off + geom.mapoff, geom.external_nlba)?;
        let flog_entries = write_initial_flog(
            ns,
            lane,
            base_off + geom.flogoff,
            geom.external_nlba,
            BTT_DEFAULT_NFREE,
        )?;

        let info = BttInfo {
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            parent_uuid,
            flags: 0,
            external_lbasize,
            external_nlba: geom.external_nlba,
            internal_lbasize: geom.internal_lbasize,
            internal_nlba: geom.internal_nlba,
            nfree: BTT_DEFAULT_NFREE,
            infosize: INFO_SIZE as u32,
            nextoff,
            dataoff: geom.dataoff,
            mapoff: geom.mapoff,
            flogoff: geom.flogoff,
            infooff: geom.infooff,
        };
        let bytes = info.to_bytes();
        ns.write(lane, base_off, &bytes)?;
        ns.write(lane, base_off + geom.infooff, &bytes)?;

        info!(arena = idx, external_nlba = geom.external_nlba, "wrote fresh arena layout");

        let flog = flog_entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let pair_off = base_off + geom.flogoff + i as u64 * FLOG_PAIR_SIZE;
                Mutex::new(FlogRuntime {
                    entry,
                    slot_offsets: [pair_off, pair_off + FLOG_ENTRY_SIZE],
                    next: 1,
                })
            })
            .collect();

        arenas.push(Arena {
            base_off,
            info,
            flog,
            map_locks: MapLocks::new(BTT_DEFAULT_NFREE as usize),
            rtt: Rtt::new(BTT_DEFAULT_NFREE as usize),
            error: false,
        });

        base_off += arena_rawsize;
    }

    Ok(arenas)
}

fn write_identity_map(
    ns: &dyn Namespace,
    lane: usize,
    mapoff: u64,
    external_nlba: u32,
) -> Result<(), NamespaceError> {
    for i in 0..external_nlba {
        let entry = MapEntry::identity(i);
        ns.write(lane, mapoff + 4 * u64::from(i), &entry.to_bits().to_le_bytes())?;
    }
    Ok(())
}

fn write_initial_flog(
    ns: &dyn Namespace,
    lane: usize,
    flogoff: u64,
    external_nlba: u32,
    nfree: u32,
) -> Result<Vec<FlogEntry>, NamespaceError> {
    let mut entries = Vec::with_capacity(nfree as usize);
    let mut pair_off = flogoff;
    let mut next_free_lba = external_nlba;

    for _ in 0..nfree {
        let entry = FlogEntry {
            lba: 0,
            old_map: MapEntry::identity(next_free_lba).to_bits(),
            new_map: MapEntry::identity(next_free_lba).to_bits(),
            seq: 1,
        };
        ns.write(lane, pair_off, &entry.to_bytes())?;
        ns.write(lane, pair_off + FLOG_ENTRY_SIZE, &[0u8; FLOG_ENTRY_SIZE as usize])?;
        entries.push(entry);
        pair_off += FLOG_PAIR_SIZE;
        next_free_lba += 1;
    }

    Ok(entries)
}
