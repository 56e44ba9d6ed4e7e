//! The arena info block: the self-describing header duplicated at the
//! start and end of every arena (§4.1, §6).

use crate::checksum::fletcher64;
use crate::error::LayoutError;

/// `"BTT_ARENA_INFO"` plus two trailing NULs, for 16 bytes total (the
/// declaration contributes one NUL, the array padding the other — see
/// the reference implementation's comment on `Sig`).
pub(crate) const SIGNATURE: [u8; 16] = *b"BTT_ARENA_INFO\0\0";

pub(crate) const MAJOR_VERSION: u16 = 1;
pub(crate) const MINOR_VERSION: u16 = 0;

/// Arena flag bit: the arena's flog or map was found to be internally
/// inconsistent at open time (§4.2). Writes into such an arena fail;
/// reads may still succeed (§7).
pub(crate) const ARENA_FLAG_ERROR: u32 = 1 << 0;

pub(crate) const INFO_SIZE: u64 = 112;
const CHECKSUM_FIELD_OFFSET: usize = (INFO_SIZE - 8) as usize;

/// The on-media arena info block, decoded into host-native integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BttInfo {
    pub major: u16,
    pub minor: u16,
    pub parent_uuid: [u8; 16],
    pub flags: u32,
    pub external_lbasize: u32,
    pub external_nlba: u32,
    pub internal_lbasize: u32,
    pub internal_nlba: u32,
    pub nfree: u32,
    pub infosize: u32,
    pub nextoff: u64,
    pub dataoff: u64,
    pub mapoff: u64,
    pub flogoff: u64,
    pub infooff: u64,
}

impl BttInfo {
    /// Serialize to the on-media 112-byte little-endian layout, computing
    /// and embedding the checksum (the checksum field is treated as zero
    /// during its own computation, per §6).
    pub(crate) fn to_bytes(&self) -> [u8; INFO_SIZE as usize] {
        let mut buf = [0u8; INFO_SIZE as usize];
        let mut off = 0;

        macro_rules! put {
            ($bytes:expr) => {{
                let bytes = $bytes;
                buf[off..off + bytes.len()].copy_from_slice(&bytes);
                off += bytes.len();
            }};
        }

        put!(SIGNATURE);
        put!(self.major.to_le_bytes());
        put!(self.minor.to_le_bytes());
        put!(self.parent_uuid);
        put!(self.flags.to_le_bytes());
        put!(self.external_lbasize.to_le_bytes());
        put!(self.external_nlba.to_le_bytes());
        put!(self.internal_lbasize.to_le_bytes());
        put!(self.internal_nlba.to_le_bytes());
        put!(self.nfree.to_le_bytes());
        put!(self.infosize.to_le_bytes());
        put!(self.nextoff.to_le_bytes());
        put!(self.dataoff.to_le_bytes());
        put!(self.mapoff.to_le_bytes());
        put!(self.flogoff.to_le_bytes());
        put!(self.infooff.to_le_bytes());
        debug_assert_eq!(off, CHECKSUM_FIELD_OFFSET);

        let checksum = fletcher64(&buf, CHECKSUM_FIELD_OFFSET);
        buf[CHECKSUM_FIELD_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Parse and validate an info block: signature, non-zero major
    /// version, and checksum (§4.1's `read_info`). Returns the decoded
    /// struct on success; the on-media bytes are left uninterpreted
    /// (not partially applied) on failure.
    pub(crate) fn from_bytes(buf: &[u8; INFO_SIZE as usize]) -> Result<Self, LayoutError> {
        if buf[0..16] != SIGNATURE {
            return Err(LayoutError::BadSignature);
        }

        let stored_checksum = u64::from_le_bytes(buf[CHECKSUM_FIELD_OFFSET..].try_into().unwrap());
        let computed = fletcher64(buf, CHECKSUM_FIELD_OFFSET);
        if stored_checksum != computed {
            return Err(LayoutError::BadChecksum);
        }

        let major = u16::from_le_bytes(buf[16..18].try_into().unwrap());
        if major == 0 {
            return Err(LayoutError::InvalidMajorVersion);
        }
        let minor = u16::from_le_bytes(buf[18..20].try_into().unwrap());
        let mut parent_uuid = [0u8; 16];
        parent_uuid.copy_from_slice(&buf[20..36]);
        let flags = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let external_lbasize = u32::from_le_bytes(buf[40..44].try_into().unwrap());
        let external_nlba = u32::from_le_bytes(buf[44..48].try_into().unwrap());
        let internal_lbasize = u32::from_le_bytes(buf[48..52].try_into().unwrap());
        let internal_nlba = u32::from_le_bytes(buf[52..56].try_into().unwrap());
        let nfree = u32::from_le_bytes(buf[56..60].try_into().unwrap());
        let infosize = u32::from_le_bytes(buf[60..64].try_into().unwrap());
        let nextoff = u64::from_le_bytes(buf[64..72].try_into().unwrap());
        let dataoff = u64::from_le_bytes(buf[72..80].try_into().unwrap());
        let mapoff = u64::from_le_bytes(buf[80..88].try_into().unwrap());
        let flogoff = u64::from_le_bytes(buf[88..96].try_into().unwrap());
        let infooff = u64::from_le_bytes(buf[96..104].try_into().unwrap());

        Ok(BttInfo {
            major,
            minor,
            parent_uuid,
            flags,
            external_lbasize,
            external_nlba,
            internal_lbasize,
            internal_nlba,
            nfree,
            infosize,
            nextoff,
            dataoff,
            mapoff,
            flogoff,
            infooff,
        })
    }
}
