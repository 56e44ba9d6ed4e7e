//! On-media layout: info blocks, geometry, and the read/write entry points
//! that build or recover run-time arena state (§4.1).

pub(crate) mod geometry;
pub(crate) mod info;
pub(crate) mod reader;
pub(crate) mod writer;

/// Every offset in an arena (mapoff, flogoff, dataoff, ...) is rounded up
/// to this boundary. Chosen for deterministic, fast-to-construct test
/// namespaces; the spec names this constant without mandating a value.
pub(crate) const BTT_ALIGNMENT: u64 = 4096;

/// Internal LBAs are rounded up to a multiple of this, matching the
/// reference implementation's cacheline-oriented padding.
pub(crate) const BTT_INTERNAL_LBA_ALIGNMENT: u64 = 64;

/// Flog entry pairs are rounded up to a multiple of this so consecutive
/// pairs never straddle the alignment the namespace cares about.
pub(crate) const BTT_FLOG_PAIR_ALIGN: u64 = 64;

/// Minimum usable internal LBA size.
pub(crate) const BTT_MIN_LBA: u32 = 512;

/// Below this size, a (partial, trailing) arena isn't worth laying out.
pub(crate) const BTT_MIN_SIZE: u64 = 64 * 1024;

/// No single arena grows past this size; `rawsize` is chopped into
/// `BTT_MAX_ARENA`-sized arenas with a final short arena if the remainder
/// is still >= `BTT_MIN_SIZE` (§4.1).
pub(crate) const BTT_MAX_ARENA: u64 = 1 << 30;

/// `nfree` used for every arena this crate lays out. The specification's
/// own worked examples (§8) assume `nfree = 4`; matching that exactly
/// makes those scenarios directly reproducible as integration tests,
/// which is why it was chosen over a larger production-sized free pool.
pub(crate) const BTT_DEFAULT_NFREE: u32 = 4;

pub(crate) const BTT_MAP_ENTRY_SIZE: u64 = 4;
