//! `read_layout`: discover an existing BTT, or size one that doesn't exist
//! yet, and recover any interrupted writes found along the way (§4.1,
//! §4.2).

use tracing::{debug, instrument, warn};

use crate::arena::Arena;
use crate::error::LayoutError;
use crate::flog::load_arena_flogs;
use crate::layout::geometry::{self, partition_arenas};
use crate::layout::info::{BttInfo, INFO_SIZE};
use crate::layout::BTT_DEFAULT_NFREE;
use crate::map::MapLocks;
use crate::namespace::Namespace;
use crate::rtt::Rtt;

/// Outcome of probing a namespace for an existing layout.
pub(crate) enum ReadLayout {
    /// A complete, valid layout was found and loaded (recovering any
    /// interrupted writes along the way).
    Found(Vec<Arena>),
    /// No layout exists yet. The namespace hasn't been touched (or wasn't
    /// touched past arena 0's info block); callers should call
    /// `write_layout` to create one. The geometry here is what
    /// `write_layout` *would* produce, so `nlba()`/`nlane()` can answer
    /// correctly even before anything is written (§4.1).
    NotLaidOut { total_external_nlba: u64, nfree: u32 },
}

#[instrument(skip(ns), level = "info")]
pub(crate) fn read_layout(
    ns: &dyn Namespace,
    lane: usize,
    rawsize: u64,
    external_lbasize: u32,
) -> Result<ReadLayout, LayoutError> {
    let mut buf = [0u8; INFO_SIZE as usize];
    ns.read(lane, 0, &mut buf)?;

    let first = match BttInfo::from_bytes(&buf) {
        Ok(info) => info,
        Err(LayoutError::BadSignature) => {
            debug!("no BTT signature found at arena 0, reporting as-if-written geometry");
            return Ok(size_as_if_written(rawsize, external_lbasize)?);
        }
        Err(other) => return Err(other),
    };

    let mut arenas = Vec::new();
    let mut arena_off = 0u64;
    let mut remaining = rawsize;
    let mut smallest_nfree = u32::MAX;
    let mut info = first;
    let mut idx = 0usize;

    loop {
        if idx > 0 {
            if info.external_lbasize != arenas[0].info.external_lbasize {
                return Err(LayoutError::ArenaMismatch {
                    arena: idx,
                    field: "external_lbasize",
                    expected: u64::from(arenas[0].info.external_lbasize),
                    found: u64::from(info.external_lbasize),
                });
            }
            let arena0_uuid = u128::from_le_bytes(arenas[0].info.parent_uuid);
            let this_uuid = u128::from_le_bytes(info.parent_uuid);
            if arena0_uuid != this_uuid {
                return Err(LayoutError::ArenaMismatch {
                    arena: idx,
                    field: "parent_uuid",
                    expected: arena0_uuid as u64,
                    found: this_uuid as u64,
                });
            }
        }

        smallest_nfree = smallest_nfree.min(info.nfree);

        let loaded = load_arena_flogs(ns, lane, arena_off + info.flogoff, arena_off + info.mapoff, info.nfree)?;
        if loaded.arena_error {
            warn!(arena = idx, "arena flagged inconsistent during recovery");
        }

        arenas.push(Arena {
            base_off: arena_off,
            info,
            flog: loaded.runtimes,
            map_locks: MapLocks::new(info.nfree as usize),
            rtt: Rtt::new(info.nfree as usize),
            error: loaded.arena_error || info.flags & crate::layout::info::ARENA_FLAG_ERROR != 0,
        });

        if info.nextoff == 0 {
            break;
        }
        remaining = remaining.saturating_sub(info.nextoff);
        if remaining < crate::layout::BTT_MIN_SIZE {
            return Err(LayoutError::ChainOverrun {
                remaining,
                min_size: crate::layout::BTT_MIN_SIZE,
            });
        }
        arena_off += info.nextoff;
        idx += 1;

        ns.read(lane, arena_off, &mut buf)?;
        info = BttInfo::from_bytes(&buf)?;
    }

    if smallest_nfree < BTT_DEFAULT_NFREE {
        debug!(smallest_nfree, "narrowing nfree to the smallest value found across arenas");
    }

    Ok(ReadLayout::Found(arenas))
}

fn size_as_if_written(rawsize: u64, external_lbasize: u32) -> Result<ReadLayout, LayoutError> {
    let sizes = partition_arenas(rawsize);
    if sizes.is_empty() {
        return Err(LayoutError::RawsizeTooSmall {
            rawsize,
            min_size: crate::layout::BTT_MIN_SIZE,
        });
    }

    let mut total_external_nlba = 0u64;
    for arena_rawsize in sizes {
        let geom = geometry::compute(arena_rawsize, external_lbasize, BTT_DEFAULT_NFREE)?;
        total_external_nlba += u64::from(geom.external_nlba);
    }

    Ok(ReadLayout::NotLaidOut {
        total_external_nlba,
        nfree: BTT_DEFAULT_NFREE,
    })
}
