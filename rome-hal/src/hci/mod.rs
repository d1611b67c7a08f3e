//! HCI H4 command framing for the ROME vendor command set.
//!
//! Every download step is an HCI command packet:
//!
//! ```text
//! +------+-----------+------+---------------------+
//! | 0x01 | opcode LE | plen | parameters (plen)   |
//! +------+-----------+------+---------------------+
//! ```
//!
//! The "EDL" (extended download) commands all share opcode `0xFC00`
//! (OGF 0x3F, OCF 0x00) and carry their subcommand in the first parameter byte.

pub mod event;
mod link;
pub mod status;

pub use link::HciLink;

use core::fmt;

use crate::transport::BaudRate;

//=============================================================================
// Constants
//=============================================================================

/// H4 packet indicator for commands.
pub const HCI_COMMAND_PKT: u8 = 0x01;
/// H4 packet indicator for events.
pub const HCI_EVENT_PKT: u8 = 0x04;

/// Vendor-specific event code.
pub const EVT_VENDOR: u8 = 0xFF;
/// Command Complete event code.
pub const EVT_CMD_COMPLETE: u8 = 0x0E;

/// Largest command packet, indicator included.
pub const HCI_MAX_CMD_SIZE: usize = 260;
/// Largest event packet, indicator included.
pub const HCI_MAX_EVENT_SIZE: usize = 260;
/// Indicator, opcode and parameter length.
pub const HCI_COMMAND_HDR_SIZE: usize = 4;

/// Vendor command group.
pub const OGF_VENDOR: u8 = 0x3F;
/// OCF of the EDL patch command.
pub const EDL_PATCH_CMD_OCF: u16 = 0x00;
/// OCF of the NVM access command.
pub const NVM_ACCESS_CMD_OCF: u16 = 0x0B;
/// OCF of the vendor baud-rate command.
pub const SET_BAUDRATE_CMD_OCF: u16 = 0x48;
/// `HCI_Reset` opcode (OGF 0x03, OCF 0x03).
pub const HCI_RESET_OPCODE: u16 = 0x0C03;

/// NVM_ACCESS_SET subcommand of the NVM access command.
pub const NVM_ACCESS_SET: u8 = 0x01;

/// Legacy rampatch payload bytes per DOWNLOAD_SEGMENT.
pub const MAX_DATA_PER_SEGMENT: usize = 239;
/// TLV bytes per TLV_SEGMENT.
pub const MAX_SIZE_PER_TLV_SEGMENT: usize = 243;
/// Size of the legacy rampatch header sent with SET_PATCH_HEADER.
pub const PATCH_HDR_LEN: usize = 28;

/// Build an opcode from its group and command fields.
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x03FF)
}

/// EDL patch command opcode (`0xFC00`).
pub const EDL_PATCH_OPCODE: u16 = opcode(OGF_VENDOR, EDL_PATCH_CMD_OCF);
/// NVM access opcode (`0xFC0B`).
pub const NVM_ACCESS_OPCODE: u16 = opcode(OGF_VENDOR, NVM_ACCESS_CMD_OCF);
/// Vendor baud-rate opcode (`0xFC48`).
pub const SET_BAUDRATE_OPCODE: u16 = opcode(OGF_VENDOR, SET_BAUDRATE_CMD_OCF);

/// EDL subcommands, carried in the first parameter byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EdlCommand {
    /// Legacy rampatch segment.
    DownloadSegment = 0x01,
    /// Reset the controller into the freshly attached patch.
    Reset = 0x05,
    /// Legacy rampatch header.
    SetPatchHeader = 0x16,
    /// Attach the downloaded rampatch.
    Attach = 0x17,
    /// Patch/app version request.
    VersionRequest = 0x19,
    /// TLV segment.
    TlvSegment = 0x1E,
}

//=============================================================================
// Errors
//=============================================================================

/// A command could not be framed. Nothing is sent when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// DOWNLOAD_SEGMENT indices start at 1.
    ZeroSegmentIndex,
    /// Segment larger than the per-command maximum.
    SegmentTooLarge {
        /// Requested size.
        size: usize,
        /// Maximum for this command.
        max: usize,
    },
    /// Segment lies (partly) outside the payload.
    SegmentOutOfRange {
        /// Segment start.
        offset: usize,
        /// Segment size.
        size: usize,
        /// Payload length.
        len: usize,
    },
    /// Parameters do not fit one command packet.
    ParamsTooLong {
        /// Parameter length requested.
        len: usize,
    },
    /// NVM tag value too short for the data patched into it.
    NvmValueTooShort {
        /// Tag number.
        tag: u8,
        /// Value length.
        len: usize,
        /// Bytes needed.
        needed: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSegmentIndex => f.write_str("segment index 0"),
            Self::SegmentTooLarge { size, max } => {
                write!(f, "segment of {} bytes exceeds {}", size, max)
            }
            Self::SegmentOutOfRange { offset, size, len } => write!(
                f,
                "segment {}..{} outside payload of {} bytes",
                offset,
                offset + size,
                len
            ),
            Self::ParamsTooLong { len } => write!(f, "{} parameter bytes do not fit a command", len),
            Self::NvmValueTooShort { tag, len, needed } => {
                write!(f, "NVM tag {} holds {} bytes, {} needed", tag, len, needed)
            }
        }
    }
}

//=============================================================================
// Command packet
//=============================================================================

/// A complete, ready-to-transmit HCI command packet.
#[derive(Clone, PartialEq, Eq)]
pub struct HciCommand {
    buf: [u8; HCI_MAX_CMD_SIZE],
    len: usize,
}

impl HciCommand {
    /// Zeroed packet with header filled in.
    fn with_header(opcode: u16, plen: usize) -> Result<Self, FrameError> {
        if plen > u8::MAX as usize || HCI_COMMAND_HDR_SIZE + plen > HCI_MAX_CMD_SIZE {
            return Err(FrameError::ParamsTooLong { len: plen });
        }
        let mut buf = [0u8; HCI_MAX_CMD_SIZE];
        buf[0] = HCI_COMMAND_PKT;
        buf[1..3].copy_from_slice(&opcode.to_le_bytes());
        buf[3] = plen as u8;
        Ok(Self {
            buf,
            len: HCI_COMMAND_HDR_SIZE + plen,
        })
    }

    fn params_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HCI_COMMAND_HDR_SIZE..self.len]
    }

    /// Parameter-less EDL command (`ATTACH`, `RESET`, `VERSION_REQUEST`).
    ///
    /// Commands that carry data have their own constructors; passing one of
    /// them here frames just the subcommand byte.
    pub fn edl(cmd: EdlCommand) -> Self {
        let mut pkt = Self {
            buf: [0u8; HCI_MAX_CMD_SIZE],
            len: HCI_COMMAND_HDR_SIZE + 1,
        };
        pkt.buf[0] = HCI_COMMAND_PKT;
        pkt.buf[1..3].copy_from_slice(&EDL_PATCH_OPCODE.to_le_bytes());
        pkt.buf[3] = 1;
        pkt.buf[4] = cmd as u8;
        pkt
    }

    /// `SET_PATCH_HEADER` carrying the 28-byte legacy header verbatim.
    pub fn patch_header(header: &[u8; PATCH_HDR_LEN]) -> Self {
        let mut pkt = Self::edl(EdlCommand::SetPatchHeader);
        pkt.buf[3] = (PATCH_HDR_LEN + 1) as u8;
        pkt.buf[5..5 + PATCH_HDR_LEN].copy_from_slice(header);
        pkt.len = HCI_COMMAND_HDR_SIZE + 1 + PATCH_HDR_LEN;
        pkt
    }

    /// `DOWNLOAD_SEGMENT` for 1-based segment `index` of a legacy rampatch payload.
    ///
    /// The segment covers `payload[(index - 1) * 239..][..size]` and is loaded
    /// by the controller at `base_address` plus the same offset.
    pub fn download_segment(
        base_address: u32,
        index: usize,
        size: usize,
        payload: &[u8],
    ) -> Result<Self, FrameError> {
        if index == 0 {
            return Err(FrameError::ZeroSegmentIndex);
        }
        let offset = (index - 1) * MAX_DATA_PER_SEGMENT;
        let data = segment_slice(payload, offset, size, MAX_DATA_PER_SEGMENT)?;

        let mut pkt = Self::with_header(EDL_PATCH_OPCODE, size + 6)?;
        let params = pkt.params_mut();
        params[0] = EdlCommand::DownloadSegment as u8;
        params[1] = (size + 4) as u8;
        let addr = base_address.wrapping_add(offset as u32);
        params[2..6].copy_from_slice(&addr.to_le_bytes());
        params[6..6 + size].copy_from_slice(data);
        Ok(pkt)
    }

    /// `TLV_SEGMENT` for 0-based segment `index` of a TLV image.
    pub fn tlv_segment(index: usize, size: usize, image: &[u8]) -> Result<Self, FrameError> {
        let offset = index * MAX_SIZE_PER_TLV_SEGMENT;
        let data = segment_slice(image, offset, size, MAX_SIZE_PER_TLV_SEGMENT)?;

        let mut pkt = Self::with_header(EDL_PATCH_OPCODE, size + 2)?;
        let params = pkt.params_mut();
        params[0] = EdlCommand::TlvSegment as u8;
        params[1] = size as u8;
        params[2..2 + size].copy_from_slice(data);
        Ok(pkt)
    }

    /// Vendor SET_BAUDRATE.
    pub fn set_baudrate(rate: BaudRate) -> Self {
        let mut pkt = Self {
            buf: [0u8; HCI_MAX_CMD_SIZE],
            len: HCI_COMMAND_HDR_SIZE + 1,
        };
        pkt.buf[0] = HCI_COMMAND_PKT;
        pkt.buf[1..3].copy_from_slice(&SET_BAUDRATE_OPCODE.to_le_bytes());
        pkt.buf[3] = 1;
        pkt.buf[4] = rate.code();
        pkt
    }

    /// Standard `HCI_Reset`.
    pub fn reset() -> Self {
        let mut pkt = Self {
            buf: [0u8; HCI_MAX_CMD_SIZE],
            len: HCI_COMMAND_HDR_SIZE,
        };
        pkt.buf[0] = HCI_COMMAND_PKT;
        pkt.buf[1..3].copy_from_slice(&HCI_RESET_OPCODE.to_le_bytes());
        pkt
    }

    /// Vendor NVM access (set) for one tag.
    pub fn nvm_set(tag: u8, value: &[u8]) -> Result<Self, FrameError> {
        if value.len() > u8::MAX as usize {
            return Err(FrameError::ParamsTooLong { len: value.len() + 3 });
        }
        let mut pkt = Self::with_header(NVM_ACCESS_OPCODE, value.len() + 3)?;
        let params = pkt.params_mut();
        params[0] = NVM_ACCESS_SET;
        params[1] = tag;
        params[2] = value.len() as u8;
        params[3..].copy_from_slice(value);
        Ok(pkt)
    }

    /// Opcode field.
    pub fn opcode(&self) -> u16 {
        u16::from_le_bytes([self.buf[1], self.buf[2]])
    }

    /// Parameter bytes.
    pub fn params(&self) -> &[u8] {
        &self.buf[HCI_COMMAND_HDR_SIZE..self.len]
    }

    /// Wire bytes, indicator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Mutable wire bytes, for patching pre-built commands in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Packet length, indicator included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for packets built by the constructors, which carry at least the header.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for HciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HciCommand")
            .field("opcode", &format_args!("0x{:04x}", self.opcode()))
            .field("params", &self.params())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HciCommand {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "HciCommand {{ opcode: {=u16:#06x}, params: {=[u8]:02x} }}", self.opcode(), self.params())
    }
}

fn segment_slice(payload: &[u8], offset: usize, size: usize, max: usize) -> Result<&[u8], FrameError> {
    if size > max {
        return Err(FrameError::SegmentTooLarge { size, max });
    }
    offset
        .checked_add(size)
        .and_then(|end| payload.get(offset..end))
        .ok_or(FrameError::SegmentOutOfRange {
            offset,
            size,
            len: payload.len(),
        })
}
