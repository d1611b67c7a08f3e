//! Scripted UART and canned controller events for unit tests.

use std::collections::VecDeque;

use embedded_io::{ErrorKind, ErrorType, Read, Write};

use crate::transport::HciUart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Write(Vec<u8>),
    Flow(bool),
    Baud(u32),
}

/// Replays queued bytes on read and records everything the host does.
#[derive(Debug, Default)]
pub(crate) struct ScriptedUart {
    rx: VecDeque<u8>,
    pub ops: Vec<Op>,
    /// Largest read returned at once; 0 means unlimited.
    chunk: usize,
    /// Fail reads with this error once the queue is empty, instead of returning 0.
    pub starve_error: Option<ErrorKind>,
}

impl ScriptedUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `chunk` bytes per read.
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            chunk,
            ..Self::default()
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().copied());
        self
    }

    pub fn unread(&self) -> usize {
        self.rx.len()
    }

    pub fn writes(&self) -> Vec<&[u8]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(w) => Some(w.as_slice()),
                _ => None,
            })
            .collect()
    }
}

impl ErrorType for ScriptedUart {
    type Error = ErrorKind;
}

impl Read for ScriptedUart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.rx.is_empty() {
            return match self.starve_error {
                Some(kind) => Err(kind),
                None => Ok(0),
            };
        }
        let mut n = buf.len().min(self.rx.len());
        if self.chunk != 0 {
            n = n.min(self.chunk);
        }
        for b in buf.iter_mut().take(n) {
            *b = self.rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for ScriptedUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.ops.push(Op::Write(buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl HciUart for ScriptedUart {
    fn set_flow_control(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.ops.push(Op::Flow(enabled));
        Ok(())
    }

    fn set_baudrate(&mut self, bps: u32) -> Result<(), Self::Error> {
        self.ops.push(Op::Baud(bps));
        Ok(())
    }
}

/// Accumulates requested delays.
#[derive(Debug, Default)]
pub(crate) struct RecordingDelay {
    pub total_ns: u64,
}

impl embedded_hal_1::delay::DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

//=============================================================================
// Canned events
//=============================================================================

/// Vendor event under the request/response code with the given type and status.
pub(crate) fn vs_status(rsp_type: u8, status: u8) -> Vec<u8> {
    vec![0x04, 0xFF, 0x03, 0x00, rsp_type, status]
}

/// Successful download/execute status.
pub(crate) fn vs_ok() -> Vec<u8> {
    vs_status(0x00, 0x00)
}

/// Successful TLV download status.
pub(crate) fn vs_tlv_ok() -> Vec<u8> {
    vs_status(0x04, 0x00)
}

pub(crate) fn cmd_complete(opcode: u16) -> Vec<u8> {
    let op = opcode.to_le_bytes();
    vec![0x04, 0x0E, 0x04, 0x01, op[0], op[1], 0x00]
}

pub(crate) fn version_rsp(product_id: u32, patch_version: u16, chip_version: u16) -> Vec<u8> {
    let mut ev = vec![0x04, 0xFF, 0x0A, 0x00, 0x19];
    ev.extend_from_slice(&product_id.to_le_bytes());
    ev.extend_from_slice(&patch_version.to_le_bytes());
    ev.extend_from_slice(&chip_version.to_le_bytes());
    ev
}

pub(crate) fn nvm_ack() -> Vec<u8> {
    vec![0x04, 0xFF, 0x03, 0x0B, 0x01, 0x00]
}

pub(crate) fn baud_rsp(result: u8, status: u8) -> Vec<u8> {
    vec![0x04, 0xFF, 0x03, 0x92, result, status]
}
