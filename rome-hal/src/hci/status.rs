//! Interpretation of vendor-specific events.
//!
//! Frame offsets below count from the H4 indicator:
//!
//! | offset | field                                   |
//! |--------|-----------------------------------------|
//! | 3      | command response (`0x00`, `0x0B`, `0x92`) |
//! | 4      | response type / baud-rate result        |
//! | 5      | status                                  |

use core::fmt;

use crate::error::{Error, ResponseError};
use crate::utils::{read_u16_le, read_u32_le};

use super::event::HciEvent;

const CMD_RSP_OFFSET: usize = 3;
const RSP_TYPE_OFFSET: usize = 4;
const CMD_STATUS_OFFSET: usize = 5;
const BAUDRATE_RSP_STATUS_OFFSET: usize = 4;

const PRODUCT_ID_OFFSET: usize = 5;
const PATCH_VER_OFFSET: usize = 9;
const CHIP_VER_OFFSET: usize = 11;
const VERSION_RSP_LEN: usize = 13;

/// Command response code for EDL requests.
pub const EDL_CMD_REQ_RES_EVT: u8 = 0x00;
/// Command response code for NVM access.
pub const EDL_NVM_ACCESS_CODE_EVT: u8 = 0x0B;
/// Command response code for a baud rate change.
pub const EDL_SET_BAUDRATE_RSP_EVT: u8 = 0x92;

// Response types under `EDL_CMD_REQ_RES_EVT`.
/// Download or command execution status.
pub const EDL_CMD_EXE_STATUS_EVT: u8 = 0x00;
/// Application version response.
pub const EDL_APP_VER_RES_EVT: u8 = 0x02;
/// TLV segment download status.
pub const EDL_TVL_DNLD_RES_EVT: u8 = 0x04;
/// Patch version response.
pub const EDL_PATCH_VER_RES_EVT: u8 = 0x19;

const BAUDRATE_CHANGE_SUCCESS: u8 = 1;

//=============================================================================
// Types
//=============================================================================

/// ROME chipset version reported by the version response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVersion {
    /// Not yet queried, or a value this host does not support.
    #[default]
    Unknown,
    /// ROME 1.0: legacy rampatch + NVM tag table.
    V1_0,
    /// ROME 1.1: TLV rampatch + TLV NVM.
    V1_1,
}

impl ChipVersion {
    /// Raw chipset version of ROME 1.0.
    pub const ROME_VER_1_0: u16 = 0x0100;
    /// Raw chipset version of ROME 1.1.
    pub const ROME_VER_1_1: u16 = 0x0101;

    /// Map the raw chipset version field.
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            Self::ROME_VER_1_0 => Self::V1_0,
            Self::ROME_VER_1_1 => Self::V1_1,
            _ => Self::Unknown,
        }
    }
}

/// Fields of a patch/app version response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VersionInfo {
    /// Product identifier.
    pub product_id: u32,
    /// Version of the patch currently applied.
    pub patch_version: u16,
    /// Raw chipset version; see [`ChipVersion::from_raw`].
    pub chip_version: u16,
}

impl VersionInfo {
    /// Chipset version this response identifies.
    pub fn chip(&self) -> ChipVersion {
        ChipVersion::from_raw(self.chip_version)
    }
}

/// Download failure reported in a status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatchStatus {
    /// `0x01`
    LengthError,
    /// `0x02`
    VersionError,
    /// `0x03`
    CrcError,
    /// `0x04`
    NotFound,
    /// `0x10`
    TlvTypeError,
    /// Any other non-zero status.
    Unknown(u8),
}

impl PatchStatus {
    /// `None` for success (`0x00`).
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => None,
            0x01 => Some(Self::LengthError),
            0x02 => Some(Self::VersionError),
            0x03 => Some(Self::CrcError),
            0x04 => Some(Self::NotFound),
            0x10 => Some(Self::TlvTypeError),
            other => Some(Self::Unknown(other)),
        }
    }
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthError => f.write_str("patch length error"),
            Self::VersionError => f.write_str("patch version error"),
            Self::CrcError => f.write_str("patch CRC error"),
            Self::NotFound => f.write_str("patch not found"),
            Self::TlvTypeError => f.write_str("TLV type error"),
            Self::Unknown(code) => write!(f, "unknown status 0x{:02x}", code),
        }
    }
}

/// A vendor event the host accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VendorResponse {
    /// Patch/app version response.
    Version(VersionInfo),
    /// Download or execute status reported success.
    Success,
    /// Other response type under the request/response code.
    Acknowledged { rsp_type: u8 },
    /// NVM access acknowledgement.
    NvmAccess,
    /// Baud-rate change accepted.
    BaudRateChanged,
}

//=============================================================================
// Interpretation
//=============================================================================

/// Classify a vendor event. Any non-success outcome is an error.
pub fn interpret(event: &HciEvent<'_>) -> Result<VendorResponse, Error> {
    let frame = event.as_bytes();
    let cmd_rsp = byte_at(frame, CMD_RSP_OFFSET)?;

    match cmd_rsp {
        EDL_CMD_REQ_RES_EVT => {
            let rsp_type = byte_at(frame, RSP_TYPE_OFFSET)?;
            match rsp_type {
                EDL_PATCH_VER_RES_EVT | EDL_APP_VER_RES_EVT => {
                    let info = version_info(frame)?;
                    info!("Product ID\t\t: 0x{:08x}", info.product_id);
                    info!("Patch Version\t\t: 0x{:04x}", info.patch_version);
                    info!("Chipset Version\t: 0x{:04x}", info.chip_version);
                    Ok(VendorResponse::Version(info))
                }
                EDL_TVL_DNLD_RES_EVT | EDL_CMD_EXE_STATUS_EVT => {
                    let status = byte_at(frame, CMD_STATUS_OFFSET)?;
                    match PatchStatus::from_code(status) {
                        None => {
                            trace!("download status: success");
                            Ok(VendorResponse::Success)
                        }
                        Some(err) => {
                            error!("download status 0x{:02x}: {}", status, err);
                            Err(err.into())
                        }
                    }
                }
                other => {
                    debug!("acknowledged vendor response type 0x{:02x}", other);
                    Ok(VendorResponse::Acknowledged { rsp_type: other })
                }
            }
        }
        EDL_NVM_ACCESS_CODE_EVT => {
            trace!("NVM access code received");
            Ok(VendorResponse::NvmAccess)
        }
        EDL_SET_BAUDRATE_RSP_EVT => {
            let result = byte_at(frame, BAUDRATE_RSP_STATUS_OFFSET)?;
            if result == BAUDRATE_CHANGE_SUCCESS {
                debug!("baud rate changed");
                return Ok(VendorResponse::BaudRateChanged);
            }
            // ROME 1.1 answers with a nonconforming result byte but an HCI success status.
            match frame.get(CMD_STATUS_OFFSET).copied() {
                Some(0x00) => {
                    warn!("nonconforming baud rate response (0x{:02x}), accepted", result);
                    Ok(VendorResponse::BaudRateChanged)
                }
                status => {
                    let status = status.unwrap_or(result);
                    error!("baud rate change rejected: 0x{:02x}", status);
                    Err(ResponseError::BaudRateRejected { status }.into())
                }
            }
        }
        other => {
            error!("unrecognized vendor response 0x{:02x}", other);
            Err(ResponseError::Unrecognized { cmd_rsp: other }.into())
        }
    }
}

fn byte_at(frame: &[u8], offset: usize) -> Result<u8, Error> {
    frame.get(offset).copied().ok_or_else(|| {
        ResponseError::TooShort {
            len: frame.len(),
            needed: offset + 1,
        }
        .into()
    })
}

fn version_info(frame: &[u8]) -> Result<VersionInfo, Error> {
    let too_short = || -> Error {
        ResponseError::TooShort {
            len: frame.len(),
            needed: VERSION_RSP_LEN,
        }
        .into()
    };
    Ok(VersionInfo {
        product_id: read_u32_le(frame, PRODUCT_ID_OFFSET).ok_or_else(too_short)?,
        patch_version: read_u16_le(frame, PATCH_VER_OFFSET).ok_or_else(too_short)?,
        chip_version: read_u16_le(frame, CHIP_VER_OFFSET).ok_or_else(too_short)?,
    })
}
