//! Write path (§4.6).

use tracing::{instrument, warn};

use crate::error::{BttContext, BttError};
use crate::flog::flog_update;
use crate::handle::Btt;
use crate::map::MapEntry;

#[instrument(skip(btt, buf), fields(lane, lba), level = "trace")]
pub(crate) fn write(btt: &Btt, lane: usize, lba: u64, buf: &[u8]) -> Result<(), BttError> {
    btt.check_lane(lane)?;
    btt.check_lba(lba)?;
    if buf.len() != btt.lbasize() as usize {
        return Err(BttError::invalid_argument(
            BttContext::new().with_lane(lane).with_lba(lba),
        ));
    }

    let arenas = btt.ensure_laidout()?;
    let (arena_idx, premap_lba) = btt.lba_to_arena_lba(arenas, lba);
    let arena = &arenas[arena_idx];
    let ctx = || BttContext::new().with_arena(arena_idx).with_lane(lane).with_lba(lba);

    if arena.error {
        return Err(BttError::arena_error(ctx()));
    }

    let mut runtime = arena.flog[lane]
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let free_entry = runtime.free_block();

    arena.rtt.drain(free_entry);

    let block_off = arena.block_off(free_entry);
    btt.ns()
        .write(lane, block_off, buf)
        .map_err(|source| BttError::io(source, ctx()))?;

    let map_off = arena.map_entry_off(premap_lba);
    let _map_guard = arena.map_locks.lock(premap_lba);

    let mut old_bits = [0u8; 4];
    btt.ns()
        .read(lane, map_off, &mut old_bits)
        .map_err(|source| BttError::io(source, ctx()))?;
    let old_entry = MapEntry::from_bits(u32::from_le_bytes(old_bits));

    flog_update(
        btt.ns(),
        lane,
        &mut runtime,
        premap_lba,
        old_entry.to_bits(),
        free_entry,
    )
    .map_err(|source| BttError::io(source, ctx()))?;

    let new_bits = MapEntry::plain(free_entry).to_bits();
    btt.ns()
        .write(lane, map_off, &new_bits.to_le_bytes())
        .map_err(|source| {
            // The flog commit above is already the linearization point: the
            // write is durable on media and recovery will replay the map
            // update the next time this namespace is opened. The failure
            // is still surfaced to this caller, though — that's a policy
            // choice, not a bug: the map write genuinely didn't happen yet.
            warn!(
                arena = arena_idx,
                premap_lba,
                error = %source,
                "map entry write failed after flog commit; next open will recover it"
            );
            BttError::io(source, ctx())
        })
}
