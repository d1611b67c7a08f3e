//! HCI UART transport seam.
//!
//! The bring-up logic only needs a blocking byte pipe plus two line controls:
//! hardware flow control and the local baud rate. Everything else about the
//! serial port (opening it, framing, parity) is the caller's business.

use embedded_io::{Error as _, Read, Write};

use crate::error::TransportError;

/// Blocking H4 UART link to the controller.
pub trait HciUart: Read + Write {
    /// Enable or disable RTS/CTS flow control.
    fn set_flow_control(&mut self, enabled: bool) -> Result<(), Self::Error>;

    /// Change the host side UART speed, in bits per second.
    fn set_baudrate(&mut self, bps: u32) -> Result<(), Self::Error>;
}

impl<T: HciUart + ?Sized> HciUart for &mut T {
    fn set_flow_control(&mut self, enabled: bool) -> Result<(), Self::Error> {
        T::set_flow_control(self, enabled)
    }

    fn set_baudrate(&mut self, bps: u32) -> Result<(), Self::Error> {
        T::set_baudrate(self, bps)
    }
}

/// Write the whole packet and check that every byte went out.
pub(crate) fn write_packet<U: HciUart + ?Sized>(uart: &mut U, packet: &[u8]) -> Result<(), TransportError> {
    let mut written = 0;
    while written < packet.len() {
        match uart.write(&packet[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) => return Err(TransportError::Write(e.kind())),
        }
    }
    if written != packet.len() {
        return Err(TransportError::ShortWrite {
            expected: packet.len(),
            written,
        });
    }
    uart.flush().map_err(|e| TransportError::Write(e.kind()))
}

/// Fill `buf` completely, accumulating across short reads.
pub(crate) fn read_exact<U: HciUart + ?Sized>(uart: &mut U, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match uart.read(&mut buf[filled..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => filled += n,
            Err(e) => return Err(TransportError::Read(e.kind())),
        }
    }
    Ok(())
}

//=============================================================================
// Baud rates
//=============================================================================

/// Controller baud-rate codes accepted by the vendor SET_BAUDRATE command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BaudRate {
    B115200 = 0x00,
    B57600 = 0x01,
    B38400 = 0x02,
    B19200 = 0x03,
    B9600 = 0x04,
    B230400 = 0x05,
    B250000 = 0x06,
    B460800 = 0x07,
    B500000 = 0x08,
    B720000 = 0x09,
    B921600 = 0x0A,
    B1000000 = 0x0B,
    B1250000 = 0x0C,
    B2000000 = 0x0D,
    #[default]
    B3000000 = 0x0E,
    B4000000 = 0x0F,
    B1600000 = 0x10,
    B3200000 = 0x11,
    B3500000 = 0x12,
}

impl BaudRate {
    /// Code reserved for controller-side auto detection. Never sent by the host.
    pub const AUTO_CODE: u8 = 0xFE;

    const ALL: [BaudRate; 19] = [
        Self::B115200,
        Self::B57600,
        Self::B38400,
        Self::B19200,
        Self::B9600,
        Self::B230400,
        Self::B250000,
        Self::B460800,
        Self::B500000,
        Self::B720000,
        Self::B921600,
        Self::B1000000,
        Self::B1250000,
        Self::B2000000,
        Self::B3000000,
        Self::B4000000,
        Self::B1600000,
        Self::B3200000,
        Self::B3500000,
    ];

    /// Wire code for the SET_BAUDRATE parameter.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Speed in bits per second.
    pub const fn bps(self) -> u32 {
        match self {
            Self::B115200 => 115_200,
            Self::B57600 => 57_600,
            Self::B38400 => 38_400,
            Self::B19200 => 19_200,
            Self::B9600 => 9_600,
            Self::B230400 => 230_400,
            Self::B250000 => 250_000,
            Self::B460800 => 460_800,
            Self::B500000 => 500_000,
            Self::B720000 => 720_000,
            Self::B921600 => 921_600,
            Self::B1000000 => 1_000_000,
            Self::B1250000 => 1_250_000,
            Self::B2000000 => 2_000_000,
            Self::B3000000 => 3_000_000,
            Self::B4000000 => 4_000_000,
            Self::B1600000 => 1_600_000,
            Self::B3200000 => 3_200_000,
            Self::B3500000 => 3_500_000,
        }
    }

    /// Look up the code for a speed in bits per second.
    pub fn from_bps(bps: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.bps() == bps)
    }

    /// Look up a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }
}
