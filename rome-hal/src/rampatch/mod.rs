//! Legacy rampatch images (ROME 1.0).
//!
//! The image starts with a 28-byte little-endian header followed by the
//! patch payload:
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | patch id         |
//! | 4      | 2    | ROM version      |
//! | 6      | 2    | build version    |
//! | 8      | 4    | base address     |
//! | 12     | 4    | entry address    |
//! | 16     | 4    | payload length   |
//! | 20     | 4    | CRC              |
//! | 24     | 2    | control          |
//! | 26     | 2    | padding          |
//!
//! The header is sent verbatim with SET_PATCH_HEADER, then the payload in
//! 239-byte DOWNLOAD_SEGMENT commands loaded at `base address + offset`.

use alloc::vec::Vec;

use crate::error::Error;
use crate::firmware::{self, FileError, FirmwareImage, FirmwareSource};
use crate::hci::{HciCommand, HciLink, MAX_DATA_PER_SEGMENT, PATCH_HDR_LEN};
use crate::segment::SegmentPlan;
use crate::transport::HciUart;
use crate::utils::{read_u16_le, read_u32_le};

/// Decoded legacy rampatch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatchHeader {
    pub patch_id: u32,
    pub rom_version: u16,
    pub build_version: u16,
    pub base_address: u32,
    /// Always equal to `base_address`; the stored entry field is not used.
    pub entry_address: u32,
    pub length: u32,
    pub crc: i32,
    pub control: u16,
    raw: [u8; PATCH_HDR_LEN],
}

impl PatchHeader {
    /// Decode the header from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FileError> {
        let too_short = FileError::TooShort {
            len: bytes.len(),
            needed: PATCH_HDR_LEN,
        };
        let raw: [u8; PATCH_HDR_LEN] = bytes
            .get(..PATCH_HDR_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(too_short)?;

        let u16_at = |off| read_u16_le(&raw, off).ok_or(too_short);
        let u32_at = |off| read_u32_le(&raw, off).ok_or(too_short);

        let base_address = u32_at(8)?;
        Ok(Self {
            patch_id: u32_at(0)?,
            rom_version: u16_at(4)?,
            build_version: u16_at(6)?,
            base_address,
            entry_address: base_address,
            length: u32_at(16)?,
            crc: u32_at(20)? as i32,
            control: u16_at(24)?,
            raw,
        })
    }

    /// The header as it appeared in the image, for SET_PATCH_HEADER.
    pub fn as_bytes(&self) -> &[u8; PATCH_HDR_LEN] {
        &self.raw
    }

    fn log(&self) {
        info!("Rampatch header:");
        info!("  Patch ID\t: 0x{:08x}", self.patch_id);
        info!("  ROM Version\t: 0x{:04x}", self.rom_version);
        info!("  Build Version\t: 0x{:04x}", self.build_version);
        info!("  Patch Length\t: {}", self.length);
        info!("  Patch CRC\t: 0x{:08x}", self.crc);
        info!("  Patch Control\t: 0x{:04x}", self.control);
        info!("  Base Address\t: 0x{:08x}", self.base_address);
    }
}

/// A legacy rampatch: header plus exactly `header.length` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rampatch {
    pub header: PatchHeader,
    payload: Vec<u8>,
}

impl Rampatch {
    /// Split an image into header and payload.
    ///
    /// Bytes after the declared payload are ignored.
    pub fn parse(mut image: Vec<u8>) -> Result<Self, FileError> {
        let header = PatchHeader::decode(&image)?;
        let declared = header.length as usize;
        let available = image.len() - PATCH_HDR_LEN;

        if available < declared {
            error!("rampatch payload truncated: {} of {} bytes", available, declared);
            return Err(FileError::Truncated { declared, available });
        }
        if available > declared {
            warn!("ignoring {} bytes after rampatch payload", available - declared);
        }

        image.truncate(PATCH_HDR_LEN + declared);
        image.drain(..PATCH_HDR_LEN);
        Ok(Self { header, payload: image })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Segments the payload goes out in.
    pub fn segments(&self) -> SegmentPlan {
        SegmentPlan::new(self.payload.len(), MAX_DATA_PER_SEGMENT)
    }

    /// Command for 0-based `segment` of [`Self::segments`].
    pub fn segment_command(&self, segment: usize, size: usize) -> Result<HciCommand, Error> {
        Ok(HciCommand::download_segment(
            self.header.base_address,
            segment + 1,
            size,
            &self.payload,
        )?)
    }
}

/// Fetch and parse the legacy rampatch.
pub fn load_rampatch<S: FirmwareSource + ?Sized>(source: &mut S) -> Result<Rampatch, Error> {
    let image = firmware::read_image(source, FirmwareImage::Rampatch)?;
    let patch = Rampatch::parse(image)?;
    patch.header.log();
    Ok(patch)
}

/// Send SET_PATCH_HEADER.
pub fn send_header<U: HciUart + ?Sized>(link: &mut HciLink<'_, U>, patch: &Rampatch) -> Result<(), Error> {
    debug!("sending rampatch header");
    link.send_vs_cmd_and_wait(&HciCommand::patch_header(patch.header.as_bytes()))?;
    Ok(())
}

/// Download the payload segment by segment, stopping at the first failure.
pub fn download<U: HciUart + ?Sized>(link: &mut HciLink<'_, U>, patch: &Rampatch) -> Result<(), Error> {
    let plan = patch.segments();
    debug!(
        "rampatch: {} full segments, remainder {} bytes",
        plan.full_segments(),
        plan.remainder()
    );

    for seg in plan {
        trace!("segment {}: {} bytes at offset {}", seg.index + 1, seg.size, seg.offset);
        let cmd = patch.segment_command(seg.index, seg.size)?;
        link.send_vs_cmd_and_wait(&cmd).inspect_err(|_| {
            error!("rampatch segment {} failed", seg.index + 1);
        })?;
    }

    debug!("rampatch download complete");
    Ok(())
}

#[cfg(test)]
mod tests;
