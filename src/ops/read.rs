//! Read path (§4.5).

use tracing::{instrument, trace};

use crate::error::{BttContext, BttError};
use crate::handle::Btt;
use crate::map::MapEntry;

#[instrument(skip(btt, buf), fields(lane, lba), level = "trace")]
pub(crate) fn read(btt: &Btt, lane: usize, lba: u64, buf: &mut [u8]) -> Result<(), BttError> {
    btt.check_lane(lane)?;
    btt.check_lba(lba)?;
    if buf.len() != btt.lbasize() as usize {
        return Err(BttError::invalid_argument(
            BttContext::new().with_lane(lane).with_lba(lba),
        ));
    }

    let Some(arenas) = btt.arenas() else {
        buf.fill(0);
        return Ok(());
    };

    let (arena_idx, premap_lba) = btt.lba_to_arena_lba(arenas, lba);
    let arena = &arenas[arena_idx];
    let ctx = || BttContext::new().with_arena(arena_idx).with_lane(lane).with_lba(lba);

    let mut entry = read_map_entry(btt, lane, arena.map_entry_off(premap_lba), ctx)?;

    loop {
        if entry.is_error() {
            return Err(BttError::poisoned(ctx()));
        }
        if entry.is_zero() {
            buf.fill(0);
            return Ok(());
        }

        let post_map_lba = entry.post_map_lba();
        arena.rtt.publish(lane, post_map_lba);

        let reread = read_map_entry(btt, lane, arena.map_entry_off(premap_lba), ctx)?;
        if reread == entry {
            break;
        }
        trace!(arena = arena_idx, premap_lba, "map entry changed under us, retrying");
        arena.rtt.clear(lane);
        entry = reread;
    }

    let post_map_lba = entry.post_map_lba();
    let block_off = arena.block_off(post_map_lba);
    let read_result = btt
        .ns()
        .read(lane, block_off, buf)
        .map_err(|source| BttError::io(source, ctx()));

    arena.rtt.clear(lane);
    read_result
}

fn read_map_entry(
    btt: &Btt,
    lane: usize,
    off: u64,
    ctx: impl Fn() -> BttContext,
) -> Result<MapEntry, BttError> {
    let mut bits = [0u8; 4];
    btt.ns()
        .read(lane, off, &mut bits)
        .map_err(|source| BttError::io(source, ctx()))?;
    Ok(MapEntry::from_bits(u32::from_le_bytes(bits)))
}
