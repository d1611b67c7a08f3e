use embedded_io::Error as _;

use crate::error::{Error, TransportError};
use crate::fmt::Bytes;
use crate::transport::{self, HciUart};

use super::event::{self, ReadOptions};
use super::status::VendorResponse;
use super::{HciCommand, HCI_MAX_EVENT_SIZE};

/// Command/response exchange over an exclusively borrowed UART.
pub struct HciLink<'u, U: HciUart + ?Sized> {
    uart: &'u mut U,
    event_buf: [u8; HCI_MAX_EVENT_SIZE],
    event_capacity: usize,
    opts: ReadOptions,
}

impl<'u, U: HciUart + ?Sized> HciLink<'u, U> {
    /// `event_capacity` is clamped to `3..=260`.
    pub fn new(uart: &'u mut U, event_capacity: usize, opts: ReadOptions) -> Self {
        Self {
            uart,
            event_buf: [0u8; HCI_MAX_EVENT_SIZE],
            event_capacity: event_capacity.clamp(event::HCI_EVENT_HDR_SIZE, HCI_MAX_EVENT_SIZE),
            opts,
        }
    }

    /// Write a command without waiting for any reply.
    pub fn send(&mut self, cmd: &HciCommand) -> Result<(), Error> {
        trace!("cmd: {}", Bytes(cmd.as_bytes()));
        transport::write_packet(&mut *self.uart, cmd.as_bytes())?;
        Ok(())
    }

    /// Write a vendor command and read back its vendor-specific event.
    pub fn send_vs_cmd(&mut self, cmd: &HciCommand) -> Result<VendorResponse, Error> {
        self.send(cmd)?;
        self.read_vs_event()
    }

    /// [`Self::send_vs_cmd`] followed by the command complete event.
    pub fn send_vs_cmd_and_wait(&mut self, cmd: &HciCommand) -> Result<VendorResponse, Error> {
        let rsp = self.send_vs_cmd(cmd)?;
        self.read_cmd_complete()?;
        Ok(rsp)
    }

    /// Read and interpret one vendor-specific event without sending anything.
    pub fn read_vs_event(&mut self) -> Result<VendorResponse, Error> {
        event::read_vs_event(&mut *self.uart, &mut self.event_buf[..self.event_capacity], self.opts)
    }

    /// Read and discard the command complete event.
    pub fn read_cmd_complete(&mut self) -> Result<(), Error> {
        event::read_cmd_complete(&mut *self.uart, &mut self.event_buf[..self.event_capacity], self.opts)
    }

    /// Switch hardware flow control on the host UART.
    pub fn set_flow_control(&mut self, enabled: bool) -> Result<(), Error> {
        trace!("flow control {}", if enabled { "on" } else { "off" });
        self.uart
            .set_flow_control(enabled)
            .map_err(|e| TransportError::FlowControl(e.kind()).into())
    }

    /// Reconfigure the host UART's baud rate.
    pub fn set_local_baudrate(&mut self, bps: u32) -> Result<(), Error> {
        debug!("host UART -> {} bps", bps);
        self.uart
            .set_baudrate(bps)
            .map_err(|e| TransportError::Baudrate(e.kind()).into())
    }
}
