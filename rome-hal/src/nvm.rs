//! NVM tag tables for ROME 1.0.
//!
//! After the legacy rampatch is attached, the controller is configured with
//! a fixed list of NVM_SET commands, one per tag. The list depends on the
//! controller firmware build and is chosen at runtime from [`NvmRevision`].
//! Tables are generated at build time from `data/nvm/*.yaml`.
//!
//! Each command is laid out as:
//!
//! ```text
//! 01 0B FC <len+3> 01 <tag> <len> <value...>
//! ```
//!
//! Tag 2 is the device address and has its value replaced (offset 7) before
//! sending.

use crate::error::Error;
use crate::hci::{FrameError, HciCommand, HciLink};
use crate::transport::HciUart;
use crate::utils::BdAddrDisplay;

/// End-of-table marker.
pub const TAG_END: u8 = 0xFF;
/// Table capacity, end marker included.
pub const MAX_TAG_CMD: usize = 30;
/// Offset of the tag number within an NVM_SET packet.
pub const TAG_NUM_OFFSET: usize = 5;
/// Offset of the tag value within an NVM_SET packet.
pub const TAG_VALUE_OFFSET: usize = 7;
/// Tag carrying the device address.
pub const TAG_NUM_BD_ADDR: u8 = 2;

/// One NVM tag record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NvmTag {
    pub tag: u8,
    pub value: &'static [u8],
}

impl NvmTag {
    /// Table terminator.
    pub const END: Self = Self {
        tag: TAG_END,
        value: &[],
    };
}

mod generated {
    use super::NvmTag;

    include!(concat!(env!("OUT_DIR"), "/nvm_tables_generated.rs"));
}

/// Controller firmware builds with a known NVM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmRevision {
    /// `ROME_1_0_100019`
    Rome10_100019,
    /// `ROME_1_0_100022_1`
    #[default]
    Rome10_100022_1,
    /// `ROME_1_0_6002`
    Rome10_6002,
}

impl NvmRevision {
    pub const ALL: [NvmRevision; 3] = [Self::Rome10_100019, Self::Rome10_100022_1, Self::Rome10_6002];

    /// Tag records, terminated by [`NvmTag::END`].
    pub fn table(self) -> &'static [NvmTag] {
        match self {
            // Builds 100019 and later share a table.
            Self::Rome10_100019 | Self::Rome10_100022_1 => generated::NVM_TABLE_ROME_1_0_100019,
            Self::Rome10_6002 => generated::NVM_TABLE_ROME_1_0_6002,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Rome10_100019 => "ROME_1_0_100019",
            Self::Rome10_100022_1 => "ROME_1_0_100022_1",
            Self::Rome10_6002 => "ROME_1_0_6002",
        }
    }

    /// Case-insensitive lookup by [`Self::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name().eq_ignore_ascii_case(name))
    }

    /// Tags before the end marker.
    pub fn tags(self) -> impl Iterator<Item = &'static NvmTag> {
        self.table().iter().take(MAX_TAG_CMD).take_while(|t| t.tag != TAG_END)
    }
}

/// Build the NVM_SET command for `tag`, substituting `bd_addr` into tag 2.
///
/// A tag 2 value shorter than the address is rejected rather than sent unpatched.
pub fn tag_command(tag: &NvmTag, bd_addr: &[u8; 6]) -> Result<HciCommand, Error> {
    let mut cmd = HciCommand::nvm_set(tag.tag, tag.value)?;
    if cmd.as_bytes()[TAG_NUM_OFFSET] == TAG_NUM_BD_ADDR {
        if tag.value.len() < bd_addr.len() {
            error!("NVM tag {} is {} bytes, too short for the BD address", tag.tag, tag.value.len());
            return Err(FrameError::NvmValueTooShort {
                tag: tag.tag,
                len: tag.value.len(),
                needed: bd_addr.len(),
            }
            .into());
        }
        cmd.as_bytes_mut()[TAG_VALUE_OFFSET..TAG_VALUE_OFFSET + bd_addr.len()].copy_from_slice(bd_addr);
    }
    Ok(cmd)
}

/// Send every tag of `revision`, stopping at the first failure.
pub fn download<U: HciUart + ?Sized>(
    link: &mut HciLink<'_, U>,
    revision: NvmRevision,
    bd_addr: &[u8; 6],
) -> Result<(), Error> {
    debug!("NVM table {}, BD address {}", revision.name(), BdAddrDisplay(bd_addr));

    for tag in revision.tags() {
        let cmd = tag_command(tag, bd_addr)?;
        trace!("NVM tag {} ({} bytes)", tag.tag, tag.value.len());
        link.send_vs_cmd_and_wait(&cmd).inspect_err(|_| {
            error!("NVM tag {} failed", tag.tag);
        })?;
    }

    debug!("NVM table sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hci::event::ReadOptions;
    use crate::hci::NVM_ACCESS_OPCODE;
    use crate::testutil::{cmd_complete, nvm_ack, ScriptedUart};

    const BD_ADDR: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

    #[test]
    fn tables_are_terminated_and_bounded() {
        for rev in NvmRevision::ALL {
            let table = rev.table();
            assert!(table.len() <= MAX_TAG_CMD);
            assert_eq!(table.last(), Some(&NvmTag::END));
            assert_eq!(rev.tags().count(), table.len() - 1);
            assert_eq!(rev.tags().next().map(|t| t.tag), Some(TAG_NUM_BD_ADDR));
            for tag in rev.tags() {
                assert!(tag_command(tag, &BD_ADDR).is_ok(), "{} tag {}", rev.name(), tag.tag);
            }
        }
    }

    #[test]
    fn revisions_share_tables() {
        assert_eq!(NvmRevision::Rome10_100019.table(), NvmRevision::Rome10_100022_1.table());
        assert_ne!(NvmRevision::Rome10_100019.table(), NvmRevision::Rome10_6002.table());
        assert_eq!(NvmRevision::default(), NvmRevision::Rome10_100022_1);

        let tags: Vec<u8> = NvmRevision::Rome10_100019.tags().map(|t| t.tag).collect();
        assert_eq!(tags, [2, 6, 17, 35, 36, 39, 41, 42, 84, 85]);
        let tags: Vec<u8> = NvmRevision::Rome10_6002.tags().map(|t| t.tag).collect();
        assert_eq!(tags, [2, 6, 17, 36, 39, 41, 44]);
    }

    #[test]
    fn tag_command_layout() {
        let tag = NvmTag {
            tag: 39,
            value: &[0x12, 0x00, 0x00, 0x00],
        };
        let cmd = tag_command(&tag, &BD_ADDR).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x01, 0x0B, 0xFC, 0x07, 0x01, 39, 0x04, 0x12, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn bd_addr_replaces_tag_2_value() {
        let tag = NvmRevision::default().tags().next().unwrap();
        let cmd = tag_command(tag, &BD_ADDR).unwrap();
        assert_eq!(&cmd.as_bytes()[..TAG_VALUE_OFFSET], &[0x01, 0x0B, 0xFC, 0x09, 0x01, 0x02, 0x06]);
        assert_eq!(&cmd.as_bytes()[TAG_VALUE_OFFSET..], &BD_ADDR);
    }

    #[test]
    fn short_bd_addr_tag_is_rejected() {
        let tag = NvmTag {
            tag: TAG_NUM_BD_ADDR,
            value: &[0xAA, 0xBB, 0xCC],
        };
        assert_eq!(
            tag_command(&tag, &BD_ADDR),
            Err(Error::Frame(FrameError::NvmValueTooShort {
                tag: 2,
                len: 3,
                needed: 6
            }))
        );

        // Longer values keep their tail.
        let tag = NvmTag {
            tag: TAG_NUM_BD_ADDR,
            value: &[0u8; 8],
        };
        let cmd = tag_command(&tag, &BD_ADDR).unwrap();
        assert_eq!(&cmd.as_bytes()[TAG_VALUE_OFFSET..], &[1, 2, 3, 4, 5, 6, 0, 0]);
    }

    #[test]
    fn download_sends_every_tag() {
        let rev = NvmRevision::Rome10_6002;
        let mut uart = ScriptedUart::new();
        for _ in rev.tags() {
            uart.push(&nvm_ack()).push(&cmd_complete(NVM_ACCESS_OPCODE));
        }
        {
            let mut link = HciLink::new(&mut uart, 260, ReadOptions::default());
            download(&mut link, rev, &BD_ADDR).unwrap();
        }
        assert_eq!(uart.unread(), 0);

        let writes = uart.writes();
        assert_eq!(writes.len(), 7);
        assert_eq!(&writes[0][TAG_VALUE_OFFSET..], &BD_ADDR);
        // Tag 41 of the 6002 table is 196 bytes.
        assert_eq!(writes[5][TAG_NUM_OFFSET], 41);
        assert_eq!(writes[5][6], 196);
        assert_eq!(writes[5].len(), 7 + 196);
    }
}
