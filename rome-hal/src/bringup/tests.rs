use super::{soc_init, BringupSession, BringupState};
use crate::config::BringupConfig;
use crate::error::{Error, ResponseError};
use crate::firmware::{FileError, FirmwareBlobs, FirmwareImage};
use crate::hci::status::ChipVersion;
use crate::hci::{EDL_PATCH_OPCODE, HCI_RESET_OPCODE, NVM_ACCESS_OPCODE, SET_BAUDRATE_OPCODE};
use crate::nvm::NvmRevision;
use crate::testutil::{
    baud_rsp, cmd_complete, nvm_ack, version_rsp, vs_ok, vs_tlv_ok, Op, RecordingDelay, ScriptedUart,
};
use crate::tlv::TlvType;
use crate::transport::BaudRate;

const BD_ADDR: [u8; 6] = [0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6];

fn rampatch_image(length: usize) -> Vec<u8> {
    let mut img = vec![0u8; 28];
    img[8..12].copy_from_slice(&0x0019_0000u32.to_le_bytes());
    img[16..20].copy_from_slice(&(length as u32).to_le_bytes());
    img.extend((0..length).map(|i| (i * 7) as u8));
    img
}

fn tlv_patch_image(total: usize) -> Vec<u8> {
    let body_len = (total - 4) as u32;
    let mut img = vec![1u8, body_len as u8, (body_len >> 8) as u8, (body_len >> 16) as u8];
    img.resize(total, 0x3C);
    img
}

fn tlv_nvm_image() -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend_from_slice(&2u16.to_le_bytes());
    entry.extend_from_slice(&6u16.to_le_bytes());
    entry.extend_from_slice(&[0u8; 8]);
    entry.extend_from_slice(&[0u8; 6]);
    let mut img = vec![2u8, entry.len() as u8, 0, 0];
    img.extend(entry);
    img
}

fn config() -> BringupConfig {
    BringupConfig::new().bd_addr(BD_ADDR).nvm_revision(NvmRevision::Rome10_100019)
}

#[test]
fn rome_1_0_full_sequence() {
    let rampatch = rampatch_image(500);
    let mut firmware = FirmwareBlobs::new().rampatch(&rampatch);

    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0x0000_0008, 0x0002, 0x0100))
        .push(&cmd_complete(EDL_PATCH_OPCODE));
    // header, three segments, attach
    for _ in 0..5 {
        uart.push(&vs_ok()).push(&cmd_complete(EDL_PATCH_OPCODE));
    }
    let tags = NvmRevision::Rome10_100019.tags().count();
    for _ in 0..tags {
        uart.push(&nvm_ack()).push(&cmd_complete(NVM_ACCESS_OPCODE));
    }
    uart.push(&cmd_complete(HCI_RESET_OPCODE));

    let mut delay = RecordingDelay::default();
    let chip = soc_init(&mut uart, &mut delay, &mut firmware, config()).unwrap();

    assert_eq!(chip, ChipVersion::V1_0);
    assert_eq!(uart.unread(), 0);
    assert_eq!(delay.total_ns, 100_000_000);

    let writes = uart.writes();
    assert_eq!(writes.len(), 1 + 1 + 3 + 1 + 1 + tags + 1);
    assert_eq!(writes[0], &[0x01, 0x00, 0xFC, 0x01, 0x19]);
    assert_eq!(writes[1][4], 0x16);
    let seg_sizes: Vec<usize> = writes[2..5].iter().map(|w| w[5] as usize - 4).collect();
    assert_eq!(seg_sizes, [239, 239, 22]);
    assert_eq!(writes[5], &[0x01, 0x00, 0xFC, 0x01, 0x17]);
    assert_eq!(writes[6], &[0x01, 0x00, 0xFC, 0x01, 0x05]);
    assert_eq!(&writes[7][7..13], &BD_ADDR);
    assert_eq!(*writes.last().unwrap(), &[0x01, 0x03, 0x0C, 0x00]);

    // Reset goes out with flow control off, then the host switches speed.
    let tail: Vec<&Op> = uart.ops.iter().rev().take(4).collect();
    assert_eq!(
        tail,
        [
            &Op::Flow(true),
            &Op::Baud(3_000_000),
            &Op::Write(vec![0x01, 0x03, 0x0C, 0x00]),
            &Op::Flow(false),
        ]
    );
}

#[test]
fn rome_1_1_full_sequence() {
    let patch = tlv_patch_image(500);
    let nvm = tlv_nvm_image();
    let mut firmware = FirmwareBlobs::new().rampatch_tlv(&patch).nvm_tlv(&nvm);

    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0x0000_0008, 0x0011, 0x0101))
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&baud_rsp(0x01, 0x00))
        .push(&cmd_complete(SET_BAUDRATE_OPCODE));
    // TLV patch: 243, 243, 14; no command complete after the last one.
    uart.push(&vs_tlv_ok())
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&vs_tlv_ok())
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&vs_tlv_ok());
    // TLV NVM: one segment, waited for.
    uart.push(&vs_tlv_ok()).push(&cmd_complete(EDL_PATCH_OPCODE));

    let mut delay = RecordingDelay::default();
    let mut session = BringupSession::new(&mut uart, &mut delay, &mut firmware, config());
    assert_eq!(session.state(), BringupState::Init);
    assert_eq!(session.run(), Ok(ChipVersion::V1_1));
    assert_eq!(session.state(), BringupState::Done);
    assert_eq!(session.tlv_type(), Some(TlvType::Nvm));
    assert_eq!(session.version().map(|v| v.patch_version), Some(0x0011));
    drop(session);

    assert_eq!(uart.unread(), 0);
    assert_eq!(delay.total_ns, 0);

    assert_eq!(
        &uart.ops[1..5],
        &[
            Op::Flow(false),
            Op::Write(vec![0x01, 0x48, 0xFC, 0x01, BaudRate::B3000000.code()]),
            Op::Baud(3_000_000),
            Op::Flow(true),
        ]
    );

    let writes = uart.writes();
    assert_eq!(writes.len(), 1 + 1 + 3 + 1);
    let sizes: Vec<usize> = writes[2..].iter().map(|w| w[5] as usize).collect();
    assert_eq!(sizes, [243, 243, 14, nvm.len()]);
    // BD address patched into the NVM entry before sending.
    assert_eq!(&writes[5][6 + 16..6 + 22], &BD_ADDR);
}

#[test]
fn unknown_version_is_rejected() {
    let mut firmware = FirmwareBlobs::new();
    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0x0000_0008, 0x0001, 0x0200))
        .push(&cmd_complete(EDL_PATCH_OPCODE));

    let mut delay = RecordingDelay::default();
    let mut session = BringupSession::new(&mut uart, &mut delay, &mut firmware, config());
    assert_eq!(session.run(), Err(Error::UnsupportedVersion(0x0200)));
    assert_eq!(session.state(), BringupState::Error);
    assert_eq!(session.chip_version(), ChipVersion::Unknown);
}

#[test]
fn missing_rampatch_aborts_before_download() {
    let mut firmware = FirmwareBlobs::new();
    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0x0000_0008, 0x0001, 0x0100))
        .push(&cmd_complete(EDL_PATCH_OPCODE));

    let mut delay = RecordingDelay::default();
    let result = soc_init(&mut uart, &mut delay, &mut firmware, config());
    assert_eq!(result, Err(Error::File(FileError::NotFound(FirmwareImage::Rampatch))));
    assert_eq!(uart.writes().len(), 1);
}

#[test]
fn nonconforming_baud_response_is_accepted() {
    let patch = tlv_patch_image(20);
    let nvm = tlv_nvm_image();
    let mut firmware = FirmwareBlobs::new().rampatch_tlv(&patch).nvm_tlv(&nvm);

    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0, 0, 0x0101))
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&baud_rsp(0x00, 0x00))
        .push(&cmd_complete(SET_BAUDRATE_OPCODE))
        .push(&vs_tlv_ok())
        .push(&vs_tlv_ok())
        .push(&cmd_complete(EDL_PATCH_OPCODE));

    let mut delay = RecordingDelay::default();
    assert_eq!(soc_init(&mut uart, &mut delay, &mut firmware, config()), Ok(ChipVersion::V1_1));
}

#[test]
fn rejected_baud_change_aborts() {
    let mut firmware = FirmwareBlobs::new();
    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0, 0, 0x0101))
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&baud_rsp(0x00, 0x0C));

    let mut delay = RecordingDelay::default();
    assert_eq!(
        soc_init(&mut uart, &mut delay, &mut firmware, config()),
        Err(Error::Response(ResponseError::BaudRateRejected { status: 0x0C }))
    );
}

#[test]
fn custom_target_baud_is_used() {
    let mut firmware = FirmwareBlobs::new();
    let mut uart = ScriptedUart::new();
    uart.push(&version_rsp(0, 0, 0x0101))
        .push(&cmd_complete(EDL_PATCH_OPCODE))
        .push(&baud_rsp(0x01, 0x00))
        .push(&cmd_complete(SET_BAUDRATE_OPCODE));

    let mut delay = RecordingDelay::default();
    let cfg = config().target_baud(BaudRate::B921600);
    // Stops at the missing TLV rampatch, after the baud switch.
    let result = soc_init(&mut uart, &mut delay, &mut firmware, cfg);
    assert_eq!(result, Err(Error::File(FileError::NotFound(FirmwareImage::RampatchTlv))));
    assert!(uart.ops.contains(&Op::Baud(921_600)));
    assert_eq!(uart.writes()[1], &[0x01, 0x48, 0xFC, 0x01, 0x0A]);
}
