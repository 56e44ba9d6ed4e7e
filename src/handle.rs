//! The public [`Btt`] handle: configuration, lifecycle, and lane/LBA
//! bookkeeping shared by every operation in [`crate::ops`] (§3, §4.1).

use std::sync::{Mutex, OnceLock};

use tracing::{info, instrument};
use uuid::Uuid;

use crate::arena::Arena;
use crate::error::{BttContext, BttError};
use crate::layout::reader::{read_layout, ReadLayout};
use crate::layout::writer::write_layout;
use crate::layout::BTT_MIN_SIZE;
use crate::namespace::Namespace;
use crate::ops;

/// Configuration for a [`Btt::init`] call: the fixed parameters that
/// describe a namespace's geometry and this handle's concurrency budget.
#[derive(Debug, Clone)]
pub struct BttConfig {
    pub rawsize: u64,
    pub external_lbasize: u32,
    pub parent_uuid: [u8; 16],
    pub maxlane: usize,
}

impl BttConfig {
    /// A new configuration with a random parent UUID and no lane cap
    /// (`nlane` ends up bounded only by `nfree`).
    #[must_use]
    pub fn new(rawsize: u64, external_lbasize: u32) -> Self {
        BttConfig {
            rawsize,
            external_lbasize,
            parent_uuid: *Uuid::new_v4().as_bytes(),
            maxlane: usize::MAX,
        }
    }

    #[must_use]
    pub fn with_parent_uuid(mut self, parent_uuid: [u8; 16]) -> Self {
        self.parent_uuid = parent_uuid;
        self
    }

    #[must_use]
    pub fn with_maxlane(mut self, maxlane: usize) -> Self {
        self.maxlane = maxlane;
        self
    }

    fn validate(&self) -> Result<(), BttError> {
        if self.rawsize < BTT_MIN_SIZE {
            return Err(BttError::invalid_argument(BttContext::new()));
        }
        if self.external_lbasize == 0 {
            return Err(BttError::invalid_argument(BttContext::new()));
        }
        if self.maxlane == 0 {
            return Err(BttError::invalid_argument(BttContext::new()));
        }
        Ok(())
    }
}

/// Result of [`Btt::check`] (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Consistent,
    Inconsistent,
    Error,
}

/// A live BTT handle over a namespace. Survives until dropped; no
/// structural mutation after [`Btt::init`] except the one-shot
/// not-laid-out -> laid-out transition (§3).
pub struct Btt {
    ns: Box<dyn Namespace>,
    rawsize: u64,
    external_lbasize: u32,
    parent_uuid: [u8; 16],
    nlba: u64,
    nlane: usize,
    arenas: OnceLock<Vec<Arena>>,
    layout_init: Mutex<()>,
}

impl Btt {
    /// Open (or, on first write, create) a BTT over `ns`. Always succeeds
    /// as a read-only handle even over an unwritten namespace: `nlba()`
    /// and `nlane()` report the geometry that a write would create, per
    /// §4.1.
    #[instrument(skip(ns, config), fields(rawsize = config.rawsize, lbasize = config.external_lbasize))]
    pub fn init(ns: Box<dyn Namespace>, config: BttConfig) -> Result<Self, BttError> {
        config.validate()?;

        let layout = read_layout(ns.as_ref(), 0, config.rawsize, config.external_lbasize)
            .map_err(|source| BttError::LayoutInvalid { source })?;

        let (nlba, nfree, arenas) = match layout {
            ReadLayout::Found(arenas) => {
                let nlba = arenas.iter().map(|a| u64::from(a.external_nlba())).sum();
                let nfree = arenas.iter().map(Arena::nfree).min().unwrap_or(0);
                (nlba, nfree, Some(arenas))
            }
            ReadLayout::NotLaidOut {
                total_external_nlba,
                nfree,
            } => (total_external_nlba, nfree, None),
        };

        let nlane = (nfree as usize).min(config.maxlane).max(1);

        let arena_cell = OnceLock::new();
        if let Some(arenas) = arenas {
            info!(narena = arenas.len(), nlba, nlane, "opened existing BTT layout");
            let _ = arena_cell.set(arenas);
        } else {
            info!(nlba, nlane, "namespace has no BTT layout yet");
        }

        Ok(Btt {
            ns,
            rawsize: config.rawsize,
            external_lbasize: config.external_lbasize,
            parent_uuid: config.parent_uuid,
            nlba,
            nlane,
            arenas: arena_cell,
            layout_init: Mutex::new(()),
        })
    }

    /// Number of lanes available: `min(nfree, maxlane)`, never zero.
    #[must_use]
    pub fn nlane(&self) -> usize {
        self.nlane
    }

    /// Total number of addressable external LBAs across all arenas.
    #[must_use]
    pub fn nlba(&self) -> u64 {
        self.nlba
    }

    /// Size, in bytes, of one external logical block.
    #[must_use]
    pub fn lbasize(&self) -> u32 {
        self.external_lbasize
    }

    #[must_use]
    pub(crate) fn is_laidout(&self) -> bool {
        self.arenas.get().is_some()
    }

    pub(crate) fn ns(&self) -> &dyn Namespace {
        self.ns.as_ref()
    }

    /// The laid-out arenas, if a layout already exists. Never creates one
    /// — the read path must not trigger layout creation (§4.5 step 2).
    pub(crate) fn arenas(&self) -> Option<&[Arena]> {
        self.arenas.get().map(Vec::as_slice)
    }

    /// Return the laid-out arenas, writing a fresh layout under a one-shot
    /// mutex if none exists yet (§4.6 step 1, §3's "one-shot mutex").
    pub(crate) fn ensure_laidout(&self) -> Result<&[Arena], BttError> {
        if let Some(arenas) = self.arenas.get() {
            return Ok(arenas);
        }

        let _guard = self
            .layout_init
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(arenas) = self.arenas.get() {
            return Ok(arenas);
        }

        let arenas = write_layout(
            self.ns.as_ref(),
            0,
            self.rawsize,
            self.external_lbasize,
            self.parent_uuid,
        )
        .map_err(|source| BttError::LayoutUnwritable { source })?;

        let _ = self.arenas.set(arenas);
        Ok(self.arenas.get().expect("just initialized"))
    }

    pub(crate) fn check_lane(&self, lane: usize) -> Result<(), BttError> {
        if lane >= self.nlane {
            return Err(BttError::invalid_argument(BttContext::new().with_lane(lane)));
        }
        Ok(())
    }

    pub(crate) fn check_lba(&self, lba: u64) -> Result<(), BttError> {
        if lba >= self.nlba {
            return Err(BttError::invalid_argument(BttContext::new().with_lba(lba)));
        }
        Ok(())
    }

    /// Map an external LBA to its arena and arena-relative (pre-map) LBA,
    /// by subtracting each arena's `external_nlba` in order (§4.1's
    /// `lba_to_arena_lba`).
    pub(crate) fn lba_to_arena_lba(&self, arenas: &[Arena], lba: u64) -> (usize, u32) {
        let mut remaining = lba;
        for (idx, arena) in arenas.iter().enumerate() {
            let n = u64::from(arena.external_nlba());
            if remaining < n {
                return (idx, remaining as u32);
            }
            remaining -= n;
        }
        unreachable!("lba already range-checked against nlba()")
    }

    /// Read `buf.len()` bytes (must equal `lbasize()`) from `lba` (§4.5).
    pub fn read(&self, lane: usize, lba: u64, buf: &mut [u8]) -> Result<(), BttError> {
        ops::read::read(self, lane, lba, buf)
    }

    /// Write `buf.len()` bytes (must equal `lbasize()`) to `lba` (§4.6).
    pub fn write(&self, lane: usize, lba: u64, buf: &[u8]) -> Result<(), BttError> {
        ops::write::write(self, lane, lba, buf)
    }

    /// Mark `lba` as reading-as-zero (§4.7).
    pub fn set_zero(&self, lane: usize, lba: u64) -> Result<(), BttError> {
        ops::set_flag::set_zero(self, lane, lba)
    }

    /// Mark `lba` as poisoned; subsequent reads fail until overwritten
    /// (§4.7).
    pub fn set_error(&self, lane: usize, lba: u64) -> Result<(), BttError> {
        ops::set_flag::set_error(self, lane, lba)
    }

    /// Run the offline consistency checker (§4.8). The caller is
    /// responsible for quiescing all other lanes first.
    pub fn check(&self) -> Result<CheckResult, BttError> {
        ops::check::check(self)
    }
}
