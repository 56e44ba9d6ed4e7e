//! Arena size partitioning and per-arena geometry (§4.1 `write_layout`).
//!
//! These computations are pure and shared between `write_layout` (which
//! lays metadata out using them) and `read_layout`'s no-layout-yet path
//! (which needs the same numbers to answer `nlba()`/`nlane()` before
//! anything has been written, per spec §4.1).

use crate::error::LayoutError;
use crate::flog::FLOG_PAIR_SIZE;
use crate::layout::info::INFO_SIZE;
use crate::layout::{
    BTT_ALIGNMENT, BTT_FLOG_PAIR_ALIGN, BTT_INTERNAL_LBA_ALIGNMENT, BTT_MAP_ENTRY_SIZE,
    BTT_MAX_ARENA, BTT_MIN_LBA, BTT_MIN_SIZE,
};

fn roundup(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Split `rawsize` into the raw size of each arena that will be laid out:
/// as many `BTT_MAX_ARENA`-sized arenas as fit, plus a final shorter arena
/// if the remainder is still at least `BTT_MIN_SIZE`.
pub(crate) fn partition_arenas(rawsize: u64) -> Vec<u64> {
    let mut sizes = Vec::new();
    let mut remaining = rawsize;
    while remaining >= BTT_MIN_SIZE {
        let arena_rawsize = remaining.min(BTT_MAX_ARENA);
        sizes.push(arena_rawsize);
        remaining -= arena_rawsize;
    }
    sizes
}

/// Fully computed geometry for a single arena, all offsets arena-relative
/// except where noted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArenaGeometry {
    pub arena_rawsize: u64,
    pub internal_lbasize: u32,
    pub internal_nlba: u32,
    pub external_nlba: u32,
    pub flog_size: u64,
    pub mapsize: u64,
    pub dataoff: u64,
    pub mapoff: u64,
    pub flogoff: u64,
    pub infooff: u64,
}

/// Compute the geometry for one arena of `arena_rawsize` bytes, holding
/// external blocks of `lbasize` bytes and `nfree` free-block slots.
pub(crate) fn compute(
    arena_rawsize: u64,
    lbasize: u32,
    nfree: u32,
) -> Result<ArenaGeometry, LayoutError> {
    let flog_size = roundup(u64::from(nfree) * roundup(FLOG_PAIR_SIZE, BTT_FLOG_PAIR_ALIGN), BTT_ALIGNMENT);

    let internal_lbasize = roundup(
        u64::from(lbasize.max(BTT_MIN_LBA)),
        BTT_INTERNAL_LBA_ALIGNMENT,
    ) as u32;

    let header_overhead = 2 * INFO_SIZE + flog_size;
    let arena_datasize = arena_rawsize
        .checked_sub(header_overhead)
        .ok_or(LayoutError::LbasizeUnusable { lbasize })?;

    let internal_nlba = arena_datasize
        .checked_sub(BTT_ALIGNMENT)
        .ok_or(LayoutError::LbasizeUnusable { lbasize })?
        / (u64::from(internal_lbasize) + BTT_MAP_ENTRY_SIZE);

    let internal_nlba = u32::try_from(internal_nlba).unwrap_or(u32::MAX);
    let external_nlba = internal_nlba
        .checked_sub(nfree)
        .ok_or(LayoutError::LbasizeUnusable { lbasize })?;
    if external_nlba == 0 {
        return Err(LayoutError::LbasizeUnusable { lbasize });
    }

    let mapsize = roundup(u64::from(external_nlba) * BTT_MAP_ENTRY_SIZE, BTT_ALIGNMENT);

    let infooff = arena_rawsize - INFO_SIZE;
    let flogoff = infooff - flog_size;
    let mapoff = flogoff - mapsize;
    let dataoff = INFO_SIZE;

    debug_assert!(dataoff < mapoff);
    debug_assert!(mapoff < flogoff);
    debug_assert!(flogoff < infooff);

    Ok(ArenaGeometry {
        arena_rawsize,
        internal_lbasize,
        internal_nlba,
        external_nlba,
        flog_size,
        mapsize,
        dataoff,
        mapoff,
        flogoff,
        infooff,
    })
}
