//! The external interface the core consumes for all namespace I/O.
//!
//! Everything in this module is a contract, not an implementation: the BTT
//! core never opens a file, never calls `mmap`, and never computes a
//! checksum of caller data. The embedder supplies a [`Namespace`] and the
//! core drives it. This mirrors §6 of the specification this crate
//! implements: `nsread`, `nswrite`, `nsmap`, `nssync`.

use crate::error::NamespaceError;

/// Positional, direct-mapped, and flush access to the byte-addressable
/// namespace backing a BTT (e.g. a file on persistent memory).
///
/// Every method takes a `lane` index, unique among the callers currently
/// active inside the BTT core (see [`crate::Btt::nlane`]), so an
/// implementation backed by per-lane file descriptors or per-lane I/O
/// queues can use it to avoid cross-lane contention. Implementations that
/// don't need per-lane routing can simply ignore the argument.
///
/// All methods take `&self`: the namespace is shared across every lane for
/// the lifetime of a [`crate::Btt`], so interior mutability (a `Mutex`, an
/// `RwLock`, or a file descriptor that supports concurrent positional I/O)
/// is the implementation's responsibility.
pub trait Namespace: Send + Sync {
    /// Read `buf.len()` bytes from namespace offset `off` into `buf`.
    fn read(&self, lane: usize, off: u64, buf: &mut [u8]) -> Result<(), NamespaceError>;

    /// Write `buf` to namespace offset `off`. Durable on return: a crash
    /// immediately after this call returns must not lose the write.
    fn write(&self, lane: usize, off: u64, buf: &[u8]) -> Result<(), NamespaceError>;

    /// Obtain direct access to up to `max_len` bytes starting at `off` and
    /// run `f` against that window in place, returning the number of bytes
    /// actually made available (which may be less than `max_len`; the
    /// caller must be prepared to call `map` again for the remainder).
    ///
    /// Mutations made through `f` are *not* guaranteed durable until
    /// [`Namespace::sync`] is called on the same range.
    fn map(
        &self,
        lane: usize,
        off: u64,
        max_len: usize,
        f: &mut dyn FnMut(&mut [u8]),
    ) -> Result<usize, NamespaceError>;

    /// Flush a range previously mutated through [`Namespace::map`] so it is
    /// durable.
    fn sync(&self, lane: usize, off: u64, len: usize) -> Result<(), NamespaceError>;
}
