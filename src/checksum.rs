//! Info block checksum.
//!
//! The on-media info block is self-checksummed: the checksum field itself
//! is treated as zero while computing the checksum, then the resulting
//! value is stored in that field (see spec §6). This is a lightweight
//! Fletcher-64 style running sum over the block's 32-bit little-endian
//! words, in the same spirit as the reference implementation's
//! `util_checksum` (not itself part of the distilled spec, so reconstructed
//! from the algorithm description rather than copied).

/// Compute the Fletcher-64 checksum of `bytes`, treating the 8 bytes at
/// `checksum_field_offset` as zero for the purposes of the computation.
///
/// `bytes.len()` must be a multiple of 4; `checksum_field_offset` must be
/// 8-byte aligned and fall within `bytes`.
pub(crate) fn fletcher64(bytes: &[u8], checksum_field_offset: usize) -> u64 {
    debug_assert_eq!(bytes.len() % 4, 0);
    debug_assert!(checksum_field_offset + 8 <= bytes.len());

    let mut lo32: u32 = 0;
    let mut hi32: u32 = 0;

    for (i, chunk) in bytes.chunks_exact(4).enumerate() {
        let word_offset = i * 4;
        let word = if word_offset >= checksum_field_offset && word_offset < checksum_field_offset + 8
        {
            0
        } else {
            u32::from_le_bytes(chunk.try_into().expect("chunk is exactly 4 bytes"))
        };
        lo32 = lo32.wrapping_add(word);
        hi32 = hi32.wrapping_add(lo32);
    }

    (u64::from(hi32) << 32) | u64::from(lo32)
}
