//! TLV firmware containers (ROME 1.1).
//!
//! ```text
//! +------+---------------+---------------------------------+
//! | type | length (24LE) | body                            |
//! +------+---------------+---------------------------------+
//! ```
//!
//! A patch container (type 1) starts its body with a 16-byte
//! [`TlvPatchHeader`]. An NVM container (type 2) holds back-to-back entries,
//! each a 12-byte header followed by `tag_len` data bytes, up to `length`
//! bytes in total. The whole file, header included, is sent in 243-byte
//! TLV_SEGMENT commands.

use alloc::vec::Vec;

use crate::error::Error;
use crate::firmware::{self, FileError, FirmwareImage, FirmwareSource};
use crate::fmt::Bytes;
use crate::hci::status::ChipVersion;
use crate::hci::{HciCommand, HciLink, MAX_SIZE_PER_TLV_SEGMENT};
use crate::segment::SegmentPlan;
use crate::transport::HciUart;
use crate::utils::{read_u16_le, read_u24_le, read_u32_le, BdAddrDisplay};

/// Container header: type byte plus 24-bit length.
pub const TLV_HDR_LEN: usize = 4;
/// Patch container body header.
pub const TLV_PATCH_HDR_LEN: usize = 16;
/// NVM entry header: tag id, tag length, tag pointer, extended flags.
pub const TLV_NVM_ENTRY_HDR_LEN: usize = 12;
/// NVM tag holding the device address.
pub const TAG_ID_BD_ADDR: u16 = 2;

/// Container type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TlvType {
    Patch,
    Nvm,
    Unknown(u8),
}

impl TlvType {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Patch,
            2 => Self::Nvm,
            other => Self::Unknown(other),
        }
    }
}

/// Body header of a patch container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TlvPatchHeader {
    pub sign_version: u8,
    pub sign_algorithm: u8,
    pub reserved1: u16,
    pub product_id: u16,
    pub build_version: u16,
    pub patch_version: u16,
    pub reserved2: u16,
    pub entry_address: u32,
}

impl TlvPatchHeader {
    /// Decode from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TLV_PATCH_HDR_LEN {
            return None;
        }
        Some(Self {
            sign_version: bytes[0],
            sign_algorithm: bytes[1],
            reserved1: read_u16_le(bytes, 2)?,
            product_id: read_u16_le(bytes, 4)?,
            build_version: read_u16_le(bytes, 6)?,
            patch_version: read_u16_le(bytes, 8)?,
            reserved2: read_u16_le(bytes, 10)?,
            entry_address: read_u32_le(bytes, 12)?,
        })
    }
}

/// One NVM entry, borrowed from its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TlvNvmEntry<'a> {
    pub tag_id: u16,
    pub tag_len: u16,
    pub tag_ptr: u32,
    pub tag_ex_flag: u32,
    /// Offset of the entry header within the file.
    pub offset: usize,
    pub data: &'a [u8],
}

/// Iterator over the entries of an NVM container.
///
/// Stops at the declared length; an entry that overruns it is an error and
/// ends iteration.
pub struct NvmEntries<'a> {
    body: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> NvmEntries<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self {
            body,
            pos: 0,
            failed: false,
        }
    }

    fn fail(&mut self) -> Option<Result<TlvNvmEntry<'a>, FileError>> {
        self.failed = true;
        Some(Err(FileError::Malformed {
            offset: TLV_HDR_LEN + self.pos,
        }))
    }
}

impl<'a> Iterator for NvmEntries<'a> {
    type Item = Result<TlvNvmEntry<'a>, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.body.len() {
            return None;
        }
        let body = self.body;
        let start = self.pos;
        let data_start = start + TLV_NVM_ENTRY_HDR_LEN;
        let Some(hdr) = body.get(start..data_start) else {
            return self.fail();
        };
        let (Some(tag_id), Some(tag_len), Some(tag_ptr), Some(tag_ex_flag)) = (
            read_u16_le(hdr, 0),
            read_u16_le(hdr, 2),
            read_u32_le(hdr, 4),
            read_u32_le(hdr, 8),
        ) else {
            return self.fail();
        };
        let data_end = data_start + tag_len as usize;
        let Some(data) = body.get(data_start..data_end) else {
            return self.fail();
        };
        self.pos = data_end;
        Some(Ok(TlvNvmEntry {
            tag_id,
            tag_len,
            tag_ptr,
            tag_ex_flag,
            offset: TLV_HDR_LEN + start,
            data,
        }))
    }
}

/// A TLV image held whole in memory, ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvImage {
    bytes: Vec<u8>,
}

impl TlvImage {
    /// Validate the container header and body layout.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, FileError> {
        if bytes.len() < TLV_HDR_LEN {
            return Err(FileError::TooShort {
                len: bytes.len(),
                needed: TLV_HDR_LEN,
            });
        }
        let image = Self { bytes };
        match image.kind() {
            TlvType::Patch => {
                if image.bytes.len() < TLV_HDR_LEN + TLV_PATCH_HDR_LEN {
                    return Err(FileError::TooShort {
                        len: image.bytes.len(),
                        needed: TLV_HDR_LEN + TLV_PATCH_HDR_LEN,
                    });
                }
            }
            TlvType::Nvm => {
                let declared = image.declared_length() as usize;
                let available = image.bytes.len() - TLV_HDR_LEN;
                if declared > available {
                    return Err(FileError::Truncated { declared, available });
                }
                for entry in image.nvm_entries() {
                    entry?;
                }
            }
            TlvType::Unknown(_) => {}
        }
        Ok(image)
    }

    pub fn kind(&self) -> TlvType {
        TlvType::from_u8(self.bytes[0])
    }

    /// Body length from the container header.
    pub fn declared_length(&self) -> u32 {
        read_u24_le(&self.bytes, 1).unwrap_or(0)
    }

    /// The whole file, as sent to the controller.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Patch header, for patch containers.
    pub fn patch_header(&self) -> Option<TlvPatchHeader> {
        match self.kind() {
            TlvType::Patch => TlvPatchHeader::decode(&self.bytes[TLV_HDR_LEN..]),
            _ => None,
        }
    }

    /// Entries of an NVM container; empty for other types.
    pub fn nvm_entries(&self) -> NvmEntries<'_> {
        let body = match self.kind() {
            TlvType::Nvm => {
                let end = (TLV_HDR_LEN + self.declared_length() as usize).min(self.bytes.len());
                &self.bytes[TLV_HDR_LEN..end]
            }
            _ => &[],
        };
        NvmEntries::new(body)
    }

    /// Overwrite the first six data bytes of every BD address entry.
    ///
    /// Returns the number of entries patched.
    pub fn patch_bd_addr(&mut self, bd_addr: &[u8; 6]) -> Result<usize, FileError> {
        let mut offsets = Vec::new();
        for entry in self.nvm_entries() {
            let entry = entry?;
            if entry.tag_id == TAG_ID_BD_ADDR {
                if entry.data.len() < bd_addr.len() {
                    return Err(FileError::Malformed { offset: entry.offset });
                }
                offsets.push(entry.offset + TLV_NVM_ENTRY_HDR_LEN);
            }
        }
        for &off in &offsets {
            self.bytes[off..off + bd_addr.len()].copy_from_slice(bd_addr);
        }
        Ok(offsets.len())
    }

    /// Segments the file goes out in.
    pub fn segments(&self) -> SegmentPlan {
        SegmentPlan::new(self.bytes.len(), MAX_SIZE_PER_TLV_SEGMENT)
    }

    fn log(&self) {
        info!("TLV type\t\t: {}", self.kind());
        info!("Length\t\t\t: {} bytes", self.declared_length());
        match self.kind() {
            TlvType::Patch => {
                if let Some(h) = self.patch_header() {
                    info!("Signature Version\t: 0x{:02x}", h.sign_version);
                    info!("Signature Algorithm\t: 0x{:02x}", h.sign_algorithm);
                    info!("Product ID\t\t: 0x{:04x}", h.product_id);
                    info!("Rom Build Version\t: 0x{:04x}", h.build_version);
                    info!("Patch Version\t\t: 0x{:04x}", h.patch_version);
                    info!("Patch Entry Address\t: 0x{:08x}", h.entry_address);
                }
            }
            TlvType::Nvm => {
                for entry in self.nvm_entries().flatten() {
                    debug!(
                        "NVM tag {} ({} bytes, ptr 0x{:08x}, flags 0x{:08x}): {}",
                        entry.tag_id,
                        entry.tag_len,
                        entry.tag_ptr,
                        entry.tag_ex_flag,
                        Bytes(entry.data)
                    );
                }
            }
            TlvType::Unknown(t) => warn!("unknown TLV type {}, sending as-is", t),
        }
    }
}

impl core::fmt::Display for TlvType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Patch => f.write_str("patch"),
            Self::Nvm => f.write_str("NVM"),
            Self::Unknown(t) => write!(f, "unknown ({})", t),
        }
    }
}

/// Fetch and parse a TLV image, patching the device address into NVM entries.
pub fn load_tlv<S: FirmwareSource + ?Sized>(
    source: &mut S,
    image: FirmwareImage,
    bd_addr: &[u8; 6],
) -> Result<TlvImage, Error> {
    let bytes = firmware::read_image(source, image)?;
    let mut tlv = TlvImage::parse(bytes)?;
    if tlv.kind() == TlvType::Nvm {
        let patched = tlv.patch_bd_addr(bd_addr)?;
        debug!("BD address {} written to {} NVM entries", BdAddrDisplay(bd_addr), patched);
    }
    tlv.log();
    Ok(tlv)
}

/// Whether the command complete event follows `segment`.
///
/// A ROME 1.1 controller does not send one after the last segment of a patch container.
pub fn waits_for_cmd_complete(chip: ChipVersion, kind: TlvType, is_last: bool) -> bool {
    !(is_last && chip == ChipVersion::V1_1 && kind == TlvType::Patch)
}

/// Download the whole file, stopping at the first failure.
pub fn download<U: HciUart + ?Sized>(
    link: &mut HciLink<'_, U>,
    tlv: &TlvImage,
    chip: ChipVersion,
) -> Result<(), Error> {
    let plan = tlv.segments();
    debug!(
        "TLV {}: {} bytes, {} full segments, remainder {} bytes",
        tlv.kind(),
        tlv.len(),
        plan.full_segments(),
        plan.remainder()
    );

    let kind = tlv.kind();
    for seg in plan {
        trace!("TLV segment {}: {} bytes at offset {}", seg.index, seg.size, seg.offset);
        let cmd = HciCommand::tlv_segment(seg.index, seg.size, tlv.as_bytes())?;
        let result = if waits_for_cmd_complete(chip, kind, seg.is_last) {
            link.send_vs_cmd_and_wait(&cmd)
        } else {
            debug!("final patch segment: not waiting for command complete");
            link.send_vs_cmd(&cmd)
        };
        result.inspect_err(|_| error!("TLV segment {} failed", seg.index))?;
    }

    debug!("TLV {} download complete", kind);
    Ok(())
}
