//! Block translation table: single-block power-fail write atomicity over a
//! byte-addressable persistent namespace.
//!
//! This crate implements the core of a BTT (see the NVDIMM Namespace
//! Specification): callers see a fixed-size array of logical blocks, and
//! any write either completes fully or not at all across crashes, and any
//! read observes a whole pre-write or post-write value, never a torn mix.
//!
//! The namespace itself — positional read/write, direct mapping, and flush
//! — is supplied by the embedder through the [`Namespace`] trait. This
//! crate never performs its own filesystem or memory-mapping I/O; it only
//! knows how to lay out and interpret the BTT metadata (arenas, map, flog,
//! read-tracking table) on top of whatever the embedder gives it.
//!
//! See [`Btt`] for the entry point.

mod arena;
mod checksum;
pub mod error;
mod flog;
mod handle;
mod layout;
mod map;
pub mod namespace;
mod ops;
mod rtt;

pub use error::{BttContext, BttError, LayoutError, NamespaceError};
pub use handle::{Btt, BttConfig, CheckResult};
pub use namespace::Namespace;
