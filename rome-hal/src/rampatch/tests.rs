use super::{load_rampatch, PatchHeader, Rampatch};
use crate::error::Error;
use crate::firmware::{FileError, FirmwareBlobs};
use crate::hci::event::ReadOptions;
use crate::hci::status::PatchStatus;
use crate::hci::{HciLink, EDL_PATCH_OPCODE, PATCH_HDR_LEN};
use crate::testutil::{cmd_complete, vs_ok, vs_status, ScriptedUart};

fn header_bytes(length: u32) -> [u8; PATCH_HDR_LEN] {
    let mut h = [0u8; PATCH_HDR_LEN];
    h[0..4].copy_from_slice(&0x1122_3344u32.to_le_bytes());
    h[4..6].copy_from_slice(&0x0100u16.to_le_bytes());
    h[6..8].copy_from_slice(&0x0305u16.to_le_bytes());
    h[8..12].copy_from_slice(&0x0019_0000u32.to_le_bytes());
    h[12..16].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    h[16..20].copy_from_slice(&length.to_le_bytes());
    h[20..24].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
    h[24..26].copy_from_slice(&0x00A5u16.to_le_bytes());
    h[26] = 0x5A;
    h
}

fn image(length: u32, payload_len: usize) -> Vec<u8> {
    let mut img = header_bytes(length).to_vec();
    img.extend((0..payload_len).map(|i| i as u8));
    img
}

#[test]
fn header_decodes_little_endian_fields() {
    let h = PatchHeader::decode(&header_bytes(500)).unwrap();
    assert_eq!(h.patch_id, 0x1122_3344);
    assert_eq!(h.rom_version, 0x0100);
    assert_eq!(h.build_version, 0x0305);
    assert_eq!(h.base_address, 0x0019_0000);
    assert_eq!(h.length, 500);
    assert_eq!(h.crc, -2);
    assert_eq!(h.control, 0x00A5);
}

#[test]
fn entry_address_is_base_address() {
    let h = PatchHeader::decode(&header_bytes(1)).unwrap();
    assert_eq!(h.entry_address, h.base_address);
    assert_ne!(h.entry_address, 0xDEAD_BEEF);
}

#[test]
fn header_keeps_wire_bytes() {
    let raw = header_bytes(77);
    let h = PatchHeader::decode(&raw).unwrap();
    assert_eq!(h.as_bytes(), &raw);
}

fn encode_fields(h: &PatchHeader) -> [u8; PATCH_HDR_LEN] {
    let mut out = [0u8; PATCH_HDR_LEN];
    out[0..4].copy_from_slice(&h.patch_id.to_le_bytes());
    out[4..6].copy_from_slice(&h.rom_version.to_le_bytes());
    out[6..8].copy_from_slice(&h.build_version.to_le_bytes());
    out[8..12].copy_from_slice(&h.base_address.to_le_bytes());
    out[12..16].copy_from_slice(&h.entry_address.to_le_bytes());
    out[16..20].copy_from_slice(&h.length.to_le_bytes());
    out[20..24].copy_from_slice(&h.crc.to_le_bytes());
    out[24..26].copy_from_slice(&h.control.to_le_bytes());
    out
}

#[test]
fn fields_reencode_to_original_bytes() {
    // Entry address equal to the base and no trailing reserved bytes.
    let mut raw = [0u8; PATCH_HDR_LEN];
    for (i, b) in raw.iter_mut().enumerate().take(26) {
        *b = 0x10 + i as u8;
    }
    raw.copy_within(8..12, 12);

    let h = PatchHeader::decode(&raw).unwrap();
    assert_eq!(h.length, u32::from_le_bytes([0x20, 0x21, 0x22, 0x23]));
    assert_eq!(h.crc, i32::from_le_bytes([0x24, 0x25, 0x26, 0x27]));
    assert_eq!(h.control, u16::from_le_bytes([0x28, 0x29]));
    assert_eq!(encode_fields(&h), raw);
    assert_eq!(h.as_bytes(), &raw);

    // A differing entry address on disk decodes to the base address.
    let h = PatchHeader::decode(&header_bytes(500)).unwrap();
    let mut expected = header_bytes(500);
    expected[12..16].copy_from_slice(&0x0019_0000u32.to_le_bytes());
    expected[26] = 0;
    assert_eq!(encode_fields(&h), expected);
}

#[test]
fn short_image_is_rejected() {
    assert_eq!(
        PatchHeader::decode(&[0u8; 27]),
        Err(FileError::TooShort { len: 27, needed: 28 })
    );
}

#[test]
fn payload_exact_length() {
    let patch = Rampatch::parse(image(500, 500)).unwrap();
    assert_eq!(patch.payload().len(), 500);
    assert_eq!(patch.payload()[0], 0);
    assert_eq!(patch.payload()[499], (499 % 256) as u8);
}

#[test]
fn payload_trailing_bytes_ignored() {
    let patch = Rampatch::parse(image(300, 316)).unwrap();
    assert_eq!(patch.payload().len(), 300);
}

#[test]
fn payload_shorter_than_declared() {
    assert_eq!(
        Rampatch::parse(image(500, 499)),
        Err(FileError::Truncated { declared: 500, available: 499 })
    );
}

#[test]
fn load_rampatch_reads_from_source() {
    let img = image(10, 10);
    let mut blobs = FirmwareBlobs::new().rampatch(&img);
    let patch = load_rampatch(&mut blobs).unwrap();
    assert_eq!(patch.header.length, 10);

    let mut empty = FirmwareBlobs::new();
    assert!(matches!(load_rampatch(&mut empty), Err(Error::File(FileError::NotFound(_)))));
}

#[test]
fn download_500_bytes_in_three_segments() {
    let patch = Rampatch::parse(image(500, 500)).unwrap();

    let mut uart = ScriptedUart::new();
    for _ in 0..3 {
        uart.push(&vs_ok()).push(&cmd_complete(EDL_PATCH_OPCODE));
    }
    {
        let mut link = HciLink::new(&mut uart, 260, ReadOptions::default());
        super::download(&mut link, &patch).unwrap();
    }
    assert_eq!(uart.unread(), 0);

    let writes = uart.writes();
    assert_eq!(writes.len(), 3);

    let expected = [(239usize, 0usize), (239, 239), (22, 478)];
    for (w, (size, offset)) in writes.iter().zip(expected) {
        assert_eq!(w[0], 0x01);
        assert_eq!(&w[1..3], &[0x00, 0xFC]);
        assert_eq!(w[3] as usize, size + 6);
        assert_eq!(w[4], 0x01);
        assert_eq!(w[5] as usize, size + 4);
        let addr = u32::from_le_bytes([w[6], w[7], w[8], w[9]]);
        assert_eq!(addr, 0x0019_0000 + offset as u32);
        assert_eq!(&w[10..], &patch.payload()[offset..offset + size]);
    }
}

#[test]
fn download_stops_at_first_failed_segment() {
    let patch = Rampatch::parse(image(500, 500)).unwrap();

    let mut uart = ScriptedUart::new();
    uart.push(&vs_ok())
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&vs_status(0x00, 0x03));
    let result = {
        let mut link = HciLink::new(&mut uart, 260, ReadOptions::default());
        super::download(&mut link, &patch)
    };
    assert_eq!(result, Err(Error::Status(PatchStatus::CrcError)));
    assert_eq!(uart.writes().len(), 2);
}

#[test]
fn header_command_carries_raw_header() {
    let raw = header_bytes(0);
    let patch = Rampatch::parse(raw.to_vec()).unwrap();

    let mut uart = ScriptedUart::new();
    uart.push(&vs_ok()).push(&cmd_complete(EDL_PATCH_OPCODE));
    {
        let mut link = HciLink::new(&mut uart, 260, ReadOptions::default());
        super::send_header(&mut link, &patch).unwrap();
    }
    let w = uart.writes()[0].to_vec();
    assert_eq!(&w[..5], &[0x01, 0x00, 0xFC, 29, 0x16]);
    assert_eq!(&w[5..], &raw);
    // Empty payload: no segments at all.
    assert_eq!(patch.segments().count(), 0);
}
