//! In-memory [`Namespace`] used across the integration test suite.
//!
//! Backed by a shared `Vec<u8>` so a test can `reopen()` a fresh handle
//! over the same bytes to simulate closing and reopening a namespace, and
//! `poke()` to simulate a crash that left a write torn mid-flight.

use std::sync::{Arc, Mutex};

use btt_core::{Namespace, NamespaceError};

pub struct MemoryNamespace {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemoryNamespace {
    pub fn new(size: usize) -> Self {
        MemoryNamespace {
            data: Arc::new(Mutex::new(vec![0u8; size])),
        }
    }

    /// A fresh handle over the same backing bytes, as if the namespace had
    /// been closed and reopened.
    pub fn reopen(&self) -> Self {
        MemoryNamespace {
            data: Arc::clone(&self.data),
        }
    }

    /// Write bytes directly into the backing store, bypassing
    /// `Namespace::write`, to simulate a crash mid-write.
    pub fn poke(&self, off: u64, bytes: &[u8]) {
        let mut data = self.data.lock().unwrap();
        let off = off as usize;
        data[off..off + bytes.len()].copy_from_slice(bytes);
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Namespace for MemoryNamespace {
    fn read(&self, _lane: usize, off: u64, buf: &mut [u8]) -> Result<(), NamespaceError> {
        let data = self.data.lock().unwrap_or_else(|p| p.into_inner());
        let off = off as usize;
        if off + buf.len() > data.len() {
            return Err(NamespaceError::new(off as u64, "read past end of namespace"));
        }
        buf.copy_from_slice(&data[off..off + buf.len()]);
        Ok(())
    }

    fn write(&self, _lane: usize, off: u64, buf: &[u8]) -> Result<(), NamespaceError> {
        let mut data = self.data.lock().unwrap_or_else(|p| p.into_inner());
        let off = off as usize;
        if off + buf.len() > data.len() {
            return Err(NamespaceError::new(off as u64, "write past end of namespace"));
        }
        data[off..off + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn map(
        &self,
        _lane: usize,
        off: u64,
        max_len: usize,
        f: &mut dyn FnMut(&mut [u8]),
    ) -> Result<usize, NamespaceError> {
        let mut data = self.data.lock().unwrap_or_else(|p| p.into_inner());
        let off = off as usize;
        if off > data.len() {
            return Err(NamespaceError::new(off as u64, "map past end of namespace"));
        }
        let len = max_len.min(data.len() - off);
        f(&mut data[off..off + len]);
        Ok(len)
    }

    fn sync(&self, _lane: usize, _off: u64, _len: usize) -> Result<(), NamespaceError> {
        Ok(())
    }
}

pub const LBASIZE: u32 = 512;
/// Large enough for a single arena at `LBASIZE` with headroom for a few
/// hundred external LBAs.
pub const SMALL_NAMESPACE: usize = 256 * 1024;

pub fn block(fill: u8) -> Vec<u8> {
    vec![fill; LBASIZE as usize]
}

/// Wraps a [`MemoryNamespace`], letting only the first `n` `write` calls
/// reach the backing store. Every call after that still returns `Ok` (a
/// real crash never hands the caller an error), but the bytes never land
/// — modeling a process kill between two durable `nswrite` calls, which is
/// the granularity the two-step flog commit protocol is meant to survive.
pub struct CrashAfterN {
    inner: MemoryNamespace,
    remaining: std::sync::atomic::AtomicUsize,
}

impl CrashAfterN {
    pub fn new(inner: MemoryNamespace, allowed_writes: usize) -> Self {
        CrashAfterN {
            inner,
            remaining: std::sync::atomic::AtomicUsize::new(allowed_writes),
        }
    }
}

impl Namespace for CrashAfterN {
    fn read(&self, lane: usize, off: u64, buf: &mut [u8]) -> Result<(), NamespaceError> {
        self.inner.read(lane, off, buf)
    }

    fn write(&self, lane: usize, off: u64, buf: &[u8]) -> Result<(), NamespaceError> {
        use std::sync::atomic::Ordering;
        let still_allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_allowed {
            self.inner.write(lane, off, buf)
        } else {
            Ok(())
        }
    }

    fn map(
        &self,
        lane: usize,
        off: u64,
        max_len: usize,
        f: &mut dyn FnMut(&mut [u8]),
    ) -> Result<usize, NamespaceError> {
        self.inner.map(lane, off, max_len, f)
    }

    fn sync(&self, lane: usize, off: u64, len: usize) -> Result<(), NamespaceError> {
        self.inner.sync(lane, off, len)
    }
}
