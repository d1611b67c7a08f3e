//! Error types for controller bring-up.

use core::fmt;

use embedded_io::ErrorKind;

use crate::firmware::FileError;
use crate::hci::status::PatchStatus;
use crate::hci::FrameError;

//=============================================================================
// Transport
//=============================================================================

/// UART level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Fewer bytes were accepted than the packet holds.
    ShortWrite {
        /// Packet length.
        expected: usize,
        /// Bytes actually written.
        written: usize,
    },
    /// The UART reported a write error.
    Write(ErrorKind),
    /// The UART reported a read error (including timeouts).
    Read(ErrorKind),
    /// A read returned no data: the link is closed.
    Closed,
    /// Toggling hardware flow control failed.
    FlowControl(ErrorKind),
    /// Changing the host UART speed failed.
    Baudrate(ErrorKind),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortWrite { expected, written } => {
                write!(f, "short write: {} of {} bytes", written, expected)
            }
            Self::Write(kind) => write!(f, "UART write failed: {:?}", kind),
            Self::Read(kind) => write!(f, "UART read failed: {:?}", kind),
            Self::Closed => f.write_str("UART closed"),
            Self::FlowControl(kind) => write!(f, "flow control change failed: {:?}", kind),
            Self::Baudrate(kind) => write!(f, "UART baud rate change failed: {:?}", kind),
        }
    }
}

//=============================================================================
// Event framing
//=============================================================================

/// The byte stream did not carry a well-formed event where one was expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingError {
    /// Event code other than the vendor-specific 0xFF.
    NotVendorEvent {
        /// Code that was received.
        code: u8,
    },
    /// No event indicator within the configured number of bytes.
    SyncLost {
        /// Bytes discarded before giving up.
        discarded: usize,
    },
    /// Event buffer cannot hold even the 3-byte event header.
    BufferTooSmall {
        /// Buffer size.
        capacity: usize,
    },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotVendorEvent { code } => {
                write!(f, "expected vendor event 0xff, got 0x{:02x}", code)
            }
            Self::SyncLost { discarded } => {
                write!(f, "no event indicator after {} bytes", discarded)
            }
            Self::BufferTooSmall { capacity } => {
                write!(f, "event buffer of {} bytes is too small", capacity)
            }
        }
    }
}

//=============================================================================
// Vendor responses
//=============================================================================

/// A vendor event that could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseError {
    /// Command response code the host does not know.
    Unrecognized {
        /// Byte at the command-response offset.
        cmd_rsp: u8,
    },
    /// The controller refused the baud-rate change.
    BaudRateRejected {
        /// Status byte reported by the controller.
        status: u8,
    },
    /// Event too short for the response it claims to be.
    TooShort {
        /// Frame length.
        len: usize,
        /// Length required.
        needed: usize,
    },
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized { cmd_rsp } => {
                write!(f, "unrecognized vendor response 0x{:02x}", cmd_rsp)
            }
            Self::BaudRateRejected { status } => {
                write!(f, "baud rate change rejected (status 0x{:02x})", status)
            }
            Self::TooShort { len, needed } => {
                write!(f, "vendor event of {} bytes, {} needed", len, needed)
            }
        }
    }
}

//=============================================================================
// Top level
//=============================================================================

/// Controller bring-up error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// UART failure.
    Transport(TransportError),
    /// Malformed or unexpected event stream.
    Framing(FramingError),
    /// A command could not be built.
    Frame(FrameError),
    /// The controller reported a download failure.
    Status(PatchStatus),
    /// The controller sent a response the host could not accept.
    Response(ResponseError),
    /// Firmware or NVM file problem.
    File(FileError),
    /// Chipset version is neither ROME 1.0 nor ROME 1.1.
    UnsupportedVersion(u16),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {}", e),
            Self::Framing(e) => write!(f, "framing: {}", e),
            Self::Frame(e) => write!(f, "command: {}", e),
            Self::Status(e) => write!(f, "controller: {}", e),
            Self::Response(e) => write!(f, "response: {}", e),
            Self::File(e) => write!(f, "firmware: {}", e),
            Self::UnsupportedVersion(v) => write!(f, "unsupported chipset version 0x{:04x}", v),
        }
    }
}

impl core::error::Error for Error {}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

impl From<FramingError> for Error {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl From<PatchStatus> for Error {
    fn from(err: PatchStatus) -> Self {
        Self::Status(err)
    }
}

impl From<ResponseError> for Error {
    fn from(err: ResponseError) -> Self {
        Self::Response(err)
    }
}

impl From<FileError> for Error {
    fn from(err: FileError) -> Self {
        Self::File(err)
    }
}
