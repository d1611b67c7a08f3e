//! Reading HCI events off the UART.
//!
//! The controller may emit line noise or stale bytes before an event, so the
//! reader first hunts for the `0x04` event indicator, then reads the event
//! code and parameter length, then the parameters. Short reads are
//! accumulated until the requested amount has arrived.

use crate::error::{Error, FramingError};
use crate::fmt::Bytes;
use crate::transport::{self, HciUart};

use super::status::{self, VendorResponse};
use super::{EVT_CMD_COMPLETE, EVT_VENDOR, HCI_EVENT_PKT};

/// Indicator, event code and parameter length.
pub const HCI_EVENT_HDR_SIZE: usize = 3;

/// A complete event frame as read from the wire, indicator included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HciEvent<'a> {
    frame: &'a [u8],
}

impl<'a> HciEvent<'a> {
    /// Wrap an already framed event. `frame` must hold at least the 3-byte header.
    pub fn from_frame(frame: &'a [u8]) -> Option<Self> {
        (frame.len() >= HCI_EVENT_HDR_SIZE && frame[0] == HCI_EVENT_PKT).then_some(Self { frame })
    }

    /// Event code (`0xFF` vendor specific, `0x0E` command complete).
    pub fn code(&self) -> u8 {
        self.frame[1]
    }

    /// Parameter length declared by the controller.
    pub fn param_len(&self) -> u8 {
        self.frame[2]
    }

    /// Parameters actually read; shorter than [`Self::param_len`] if the buffer was.
    pub fn params(&self) -> &'a [u8] {
        &self.frame[HCI_EVENT_HDR_SIZE..]
    }

    /// Whole frame, indicator and header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.frame
    }
}

/// Event read settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Give up after discarding this many bytes while hunting for the indicator.
    /// `None` hunts forever.
    pub sync_limit: Option<usize>,
}

/// Read one event of any code into `buf`.
///
/// At most `buf.len() - 3` parameter bytes are read; a longer event is
/// truncated to the buffer and the remainder is left on the wire.
pub fn read_event<'b, U: HciUart + ?Sized>(
    uart: &mut U,
    buf: &'b mut [u8],
    opts: ReadOptions,
) -> Result<HciEvent<'b>, Error> {
    read_frame(uart, buf, opts, |_| Ok(()))
}

/// Read one vendor-specific event into `buf` without interpreting it.
///
/// Any event code other than `0xFF` is rejected as soon as it is seen.
pub fn read_vs_frame<'b, U: HciUart + ?Sized>(
    uart: &mut U,
    buf: &'b mut [u8],
    opts: ReadOptions,
) -> Result<HciEvent<'b>, Error> {
    read_frame(uart, buf, opts, |code| {
        if code == EVT_VENDOR {
            Ok(())
        } else {
            error!("wrong event code: 0x{:02x}", code);
            Err(FramingError::NotVendorEvent { code })
        }
    })
}

/// Read one vendor-specific event and interpret its status.
pub fn read_vs_event<U: HciUart + ?Sized>(
    uart: &mut U,
    buf: &mut [u8],
    opts: ReadOptions,
) -> Result<VendorResponse, Error> {
    let event = read_vs_frame(uart, buf, opts)?;
    status::interpret(&event)
}

/// Read the generic event that follows most vendor commands.
///
/// The status is not examined; an event other than Command Complete is only logged.
pub fn read_cmd_complete<U: HciUart + ?Sized>(
    uart: &mut U,
    buf: &mut [u8],
    opts: ReadOptions,
) -> Result<(), Error> {
    let event = read_event(uart, buf, opts)?;
    if event.code() != EVT_CMD_COMPLETE {
        warn!("expected command complete, got event 0x{:02x}", event.code());
    }
    Ok(())
}

fn read_frame<'b, U, F>(
    uart: &mut U,
    buf: &'b mut [u8],
    opts: ReadOptions,
    check_code: F,
) -> Result<HciEvent<'b>, Error>
where
    U: HciUart + ?Sized,
    F: FnOnce(u8) -> Result<(), FramingError>,
{
    let capacity = buf.len();
    if capacity < HCI_EVENT_HDR_SIZE {
        return Err(FramingError::BufferTooSmall { capacity }.into());
    }

    let mut discarded = 0usize;
    loop {
        transport::read_exact(uart, &mut buf[..1])?;
        if buf[0] == HCI_EVENT_PKT {
            break;
        }
        discarded += 1;
        if let Some(limit) = opts.sync_limit {
            if discarded > limit {
                error!("no event indicator after {} bytes", discarded);
                return Err(FramingError::SyncLost { discarded }.into());
            }
        }
    }
    if discarded > 0 {
        debug!("discarded {} bytes before event", discarded);
    }

    transport::read_exact(uart, &mut buf[1..HCI_EVENT_HDR_SIZE])?;
    check_code(buf[1])?;

    let declared = buf[2] as usize;
    let to_read = declared.min(capacity - HCI_EVENT_HDR_SIZE);
    if to_read < declared {
        warn!("event 0x{:02x} truncated: {} of {} parameter bytes", buf[1], to_read, declared);
    }
    let end = HCI_EVENT_HDR_SIZE + to_read;
    transport::read_exact(uart, &mut buf[HCI_EVENT_HDR_SIZE..end])?;

    let frame = &buf[..end];
    trace!("event: {}", Bytes(frame));
    Ok(HciEvent { frame })
}
