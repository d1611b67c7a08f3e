//! Simulated ROME controller for dry runs.
//!
//! Every host packet is recorded and answered with the events a healthy
//! controller sends. Unread events are dropped when the next packet arrives,
//! the way a real controller's answer to an unacknowledged segment is
//! overtaken by the next exchange.

use std::collections::VecDeque;

use embedded_io::{ErrorKind, ErrorType, Read, Write};
use rome_hal::hci::status::{
    EDL_CMD_EXE_STATUS_EVT, EDL_CMD_REQ_RES_EVT, EDL_NVM_ACCESS_CODE_EVT, EDL_PATCH_VER_RES_EVT,
    EDL_SET_BAUDRATE_RSP_EVT, EDL_TVL_DNLD_RES_EVT,
};
use rome_hal::hci::{
    EdlCommand, EDL_PATCH_OPCODE, EVT_CMD_COMPLETE, EVT_VENDOR, HCI_COMMAND_PKT, HCI_EVENT_PKT, HCI_RESET_OPCODE,
    NVM_ACCESS_OPCODE, SET_BAUDRATE_OPCODE,
};
use rome_hal::HciUart;

const SIM_PRODUCT_ID: u32 = 0x0000_0008;
const SIM_PATCH_VERSION: u16 = 0x0001;

/// Something the host did to the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Packet(Vec<u8>),
    FlowControl(bool),
    Baudrate(u32),
}

#[derive(Debug)]
pub struct SimController {
    chip_version: u16,
    rx: VecDeque<u8>,
    pub ops: Vec<HostOp>,
}

impl SimController {
    /// A controller reporting the raw chipset version `chip_version`.
    pub fn new(chip_version: u16) -> Self {
        Self {
            chip_version,
            rx: VecDeque::new(),
            ops: Vec::new(),
        }
    }

    pub fn packets(&self) -> impl Iterator<Item = &[u8]> {
        self.ops.iter().filter_map(|op| match op {
            HostOp::Packet(p) => Some(p.as_slice()),
            _ => None,
        })
    }

    fn event(&mut self, code: u8, params: &[u8]) {
        self.rx.push_back(HCI_EVENT_PKT);
        self.rx.push_back(code);
        self.rx.push_back(params.len() as u8);
        self.rx.extend(params.iter().copied());
    }

    fn cmd_complete(&mut self, opcode: u16) {
        let op = opcode.to_le_bytes();
        self.event(EVT_CMD_COMPLETE, &[0x01, op[0], op[1], 0x00]);
    }

    fn respond(&mut self, packet: &[u8]) {
        if packet.len() < 4 || packet[0] != HCI_COMMAND_PKT {
            log::warn!("sim: ignoring non-command packet");
            return;
        }
        let opcode = u16::from_le_bytes([packet[1], packet[2]]);
        let params = &packet[4..];

        match opcode {
            EDL_PATCH_OPCODE => match params.first().copied() {
                Some(sub) if sub == EdlCommand::VersionRequest as u8 => {
                    let mut rsp = vec![EDL_CMD_REQ_RES_EVT, EDL_PATCH_VER_RES_EVT];
                    rsp.extend_from_slice(&SIM_PRODUCT_ID.to_le_bytes());
                    rsp.extend_from_slice(&SIM_PATCH_VERSION.to_le_bytes());
                    rsp.extend_from_slice(&self.chip_version.to_le_bytes());
                    self.event(EVT_VENDOR, &rsp);
                    self.cmd_complete(opcode);
                }
                // The controller restarts without answering.
                Some(sub) if sub == EdlCommand::Reset as u8 => {}
                Some(sub) if sub == EdlCommand::TlvSegment as u8 => {
                    self.event(EVT_VENDOR, &[EDL_CMD_REQ_RES_EVT, EDL_TVL_DNLD_RES_EVT, 0x00]);
                    self.cmd_complete(opcode);
                }
                _ => {
                    self.event(EVT_VENDOR, &[EDL_CMD_REQ_RES_EVT, EDL_CMD_EXE_STATUS_EVT, 0x00]);
                    self.cmd_complete(opcode);
                }
            },
            NVM_ACCESS_OPCODE => {
                self.event(EVT_VENDOR, &[EDL_NVM_ACCESS_CODE_EVT, 0x01, 0x00]);
                self.cmd_complete(opcode);
            }
            SET_BAUDRATE_OPCODE => {
                self.event(EVT_VENDOR, &[EDL_SET_BAUDRATE_RSP_EVT, 0x01, 0x00]);
                self.cmd_complete(opcode);
            }
            HCI_RESET_OPCODE => self.cmd_complete(opcode),
            other => {
                log::debug!("sim: unhandled opcode 0x{:04x}", other);
                self.cmd_complete(opcode);
            }
        }
    }
}

impl ErrorType for SimController {
    type Error = ErrorKind;
}

impl Read for SimController {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.rx.is_empty() {
            // What a real UART read timeout looks like to the host.
            return Err(ErrorKind::TimedOut);
        }
        let n = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for SimController {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.rx.clear();
        self.ops.push(HostOp::Packet(buf.to_vec()));
        self.respond(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl HciUart for SimController {
    fn set_flow_control(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.ops.push(HostOp::FlowControl(enabled));
        Ok(())
    }

    fn set_baudrate(&mut self, bps: u32) -> Result<(), Self::Error> {
        self.ops.push(HostOp::Baudrate(bps));
        Ok(())
    }
}

/// Short human-readable name for a host packet.
pub fn describe(packet: &[u8]) -> String {
    if packet.len() < 4 || packet[0] != HCI_COMMAND_PKT {
        return "?".into();
    }
    let opcode = u16::from_le_bytes([packet[1], packet[2]]);
    let params = &packet[4..];
    match (opcode, params.first().copied()) {
        (EDL_PATCH_OPCODE, Some(0x19)) => "EDL VERSION_REQUEST".into(),
        (EDL_PATCH_OPCODE, Some(0x16)) => "EDL SET_PATCH_HEADER".into(),
        (EDL_PATCH_OPCODE, Some(0x01)) => match params.get(2..6) {
            Some(a) => format!(
                "EDL DOWNLOAD_SEGMENT @0x{:08x}",
                u32::from_le_bytes([a[0], a[1], a[2], a[3]])
            ),
            None => "EDL DOWNLOAD_SEGMENT".into(),
        },
        (EDL_PATCH_OPCODE, Some(0x17)) => "EDL ATTACH".into(),
        (EDL_PATCH_OPCODE, Some(0x05)) => "EDL RESET".into(),
        (EDL_PATCH_OPCODE, Some(0x1E)) => format!("EDL TLV_SEGMENT ({} bytes)", params.get(1).copied().unwrap_or(0)),
        (NVM_ACCESS_OPCODE, _) => format!("NVM_SET tag {}", params.get(1).copied().unwrap_or(0)),
        (SET_BAUDRATE_OPCODE, Some(code)) => match rome_hal::BaudRate::from_code(code) {
            Some(b) => format!("SET_BAUDRATE {}", b.bps()),
            None => format!("SET_BAUDRATE code 0x{:02x}", code),
        },
        (HCI_RESET_OPCODE, _) => "HCI_RESET".into(),
        (op, _) => format!("opcode 0x{:04x}", op),
    }
}
