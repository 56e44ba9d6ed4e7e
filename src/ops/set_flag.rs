//! Set-flag path: `set_zero` and `set_error` share one preamble and one
//! map-entry rewrite, with no flog activity (§4.7).

use tracing::instrument;

use crate::error::{BttContext, BttError};
use crate::handle::Btt;
use crate::map::{MapEntry, ERROR_FLAG, ZERO_FLAG};

#[instrument(skip(btt), fields(lane, lba), level = "debug")]
pub(crate) fn set_zero(btt: &Btt, lane: usize, lba: u64) -> Result<(), BttError> {
    btt.check_lane(lane)?;
    btt.check_lba(lba)?;

    if !btt.is_laidout() {
        // Every block already reads as zero before anything is written.
        return Ok(());
    }

    set_flag(btt, lane, lba, ZERO_FLAG)
}

#[instrument(skip(btt), fields(lane, lba), level = "debug")]
pub(crate) fn set_error(btt: &Btt, lane: usize, lba: u64) -> Result<(), BttError> {
    btt.check_lane(lane)?;
    btt.check_lba(lba)?;

    // Unlike set_zero, marking a block poisoned is meaningful even before
    // any data has been written, so this triggers layout creation.
    btt.ensure_laidout()?;
    set_flag(btt, lane, lba, ERROR_FLAG)
}

fn set_flag(btt: &Btt, lane: usize, lba: u64, flag: u32) -> Result<(), BttError> {
    let arenas = btt.ensure_laidout()?;
    let (arena_idx, premap_lba) = btt.lba_to_arena_lba(arenas, lba);
    let arena = &arenas[arena_idx];
    let ctx = || BttContext::new().with_arena(arena_idx).with_lane(lane).with_lba(lba);

    if arena.error {
        return Err(BttError::arena_error(ctx()));
    }

    let map_off = arena.map_entry_off(premap_lba);
    let _guard = arena.map_locks.lock(premap_lba);

    let mut bits = [0u8; 4];
    btt.ns()
        .read(lane, map_off, &mut bits)
        .map_err(|source| BttError::io(source, ctx()))?;
    let entry = MapEntry::from_bits(u32::from_le_bytes(bits));

    if flag == ZERO_FLAG && entry.is_zero() {
        return Ok(());
    }

    let updated = entry.with_flag(flag);
    btt.ns()
        .write(lane, map_off, &updated.to_bits().to_le_bytes())
        .map_err(|source| BttError::io(source, ctx()))
}
