//! Error types for the BTT core.
//!
//! Follows the same shape as the teacher crate's error modules: a small
//! `*Context` struct carrying debugging information, and a `thiserror`
//! enum per failure domain with `#[from]` conversions where one wraps
//! cleanly into another.

use std::fmt;

use thiserror::Error;

/// Debugging context attached to a [`BttError`]: which arena, lane, and
/// external LBA the failing operation was acting on.
#[derive(Debug, Clone, Default)]
pub struct BttContext {
    pub arena: Option<usize>,
    pub lane: Option<usize>,
    pub lba: Option<u64>,
}

impl BttContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_arena(mut self, arena: usize) -> Self {
        self.arena = Some(arena);
        self
    }

    #[must_use]
    pub fn with_lane(mut self, lane: usize) -> Self {
        self.lane = Some(lane);
        self
    }

    #[must_use]
    pub fn with_lba(mut self, lba: u64) -> Self {
        self.lba = Some(lba);
        self
    }
}

impl fmt::Display for BttContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(lba) = self.lba {
            parts.push(format!("lba {lba}"));
        }
        if let Some(arena) = self.arena {
            parts.push(format!("arena {arena}"));
        }
        if let Some(lane) = self.lane {
            parts.push(format!("lane {lane}"));
        }
        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Error returned by a [`crate::Namespace`] implementation.
///
/// The core treats every namespace failure as opaque media I/O trouble; it
/// never interprets the embedder's own error kind, only propagates it.
#[derive(Error, Debug)]
#[error("namespace I/O error at offset {offset}: {message}")]
pub struct NamespaceError {
    pub offset: u64,
    pub message: String,
}

impl NamespaceError {
    #[must_use]
    pub fn new(offset: u64, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Failures interpreting or constructing the on-media layout (info blocks,
/// arena geometry, arena chaining).
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("arena info block signature mismatch")]
    BadSignature,

    #[error("arena info block has invalid major version (0)")]
    InvalidMajorVersion,

    #[error("arena info block checksum mismatch")]
    BadChecksum,

    #[error(
        "arena {arena} disagrees with arena 0 on {field} (expected {expected}, found {found})"
    )]
    ArenaMismatch {
        arena: usize,
        field: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("rawsize {rawsize} is smaller than the minimum BTT size {min_size}")]
    RawsizeTooSmall { rawsize: u64, min_size: u64 },

    #[error("lbasize {lbasize} is not large enough to form a usable arena")]
    LbasizeUnusable { lbasize: u32 },

    #[error("no arena fit within the remaining namespace space")]
    NoArenasFit,

    #[error(
        "arena chain continues past the end of the namespace (remaining {remaining} < minimum arena size {min_size})"
    )]
    ChainOverrun { remaining: u64, min_size: u64 },

    #[error(transparent)]
    Namespace(#[from] NamespaceError),
}

/// Top-level error returned by every [`crate::Btt`] public operation.
///
/// This enumerates the error kinds from §7 of the specification: invalid
/// argument, media I/O, poisoned block, arena error, and
/// layout-unwritable.
#[derive(Error, Debug)]
pub enum BttError {
    #[error("invalid argument: lba out of range ({context})")]
    InvalidArgument { context: BttContext },

    #[error("media I/O error ({context}): {source}")]
    Io {
        #[source]
        source: NamespaceError,
        context: BttContext,
    },

    #[error("block is poisoned ({context})")]
    Poisoned { context: BttContext },

    #[error("arena is in an error state and cannot accept writes ({context})")]
    ArenaError { context: BttContext },

    #[error("failed to write initial BTT layout: {source}")]
    LayoutUnwritable {
        #[source]
        source: LayoutError,
    },

    #[error("failed to read existing BTT layout: {source}")]
    LayoutInvalid {
        #[source]
        source: LayoutError,
    },
}

impl BttError {
    #[must_use]
    pub fn invalid_argument(context: BttContext) -> Self {
        BttError::InvalidArgument { context }
    }

    #[must_use]
    pub fn io(source: NamespaceError, context: BttContext) -> Self {
        BttError::Io { source, context }
    }

    #[must_use]
    pub fn poisoned(context: BttContext) -> Self {
        BttError::Poisoned { context }
    }

    #[must_use]
    pub fn arena_error(context: BttContext) -> Self {
        BttError::ArenaError { context }
    }
}
