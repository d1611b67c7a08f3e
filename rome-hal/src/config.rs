//! Bring-up configuration.

use crate::hci::HCI_MAX_EVENT_SIZE;
use crate::nvm::NvmRevision;
use crate::transport::BaudRate;

/// Placeholder address carried by the stock NVM tables (22:56:01:23:78:77).
pub const DEFAULT_BD_ADDR: [u8; 6] = [0x77, 0x78, 0x23, 0x01, 0x56, 0x22];

/// Controller bring-up configuration.
///
/// ```
/// use rome_hal::{BaudRate, BringupConfig, NvmRevision};
///
/// const CFG: BringupConfig = BringupConfig::new()
///     .bd_addr([0x66, 0x55, 0x44, 0x33, 0x22, 0x11])
///     .nvm_revision(NvmRevision::Rome10_6002)
///     .target_baud(BaudRate::B3000000);
/// # let _ = CFG;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BringupConfig {
    /// Device address, least significant byte first (wire order).
    pub bd_addr: [u8; 6],

    /// NVM table for ROME 1.0 controllers.
    pub nvm_revision: NvmRevision,

    /// Operating baud rate after download.
    pub target_baud: BaudRate,

    /// Bytes to discard while looking for an event before failing.
    /// `None` waits indefinitely; the UART's own read timeout then applies.
    pub sync_limit: Option<usize>,

    /// Event read buffer size (3 to 260 bytes). Longer events are truncated.
    pub event_capacity: usize,
}

impl BringupConfig {
    pub const fn new() -> Self {
        Self {
            bd_addr: DEFAULT_BD_ADDR,
            nvm_revision: NvmRevision::Rome10_100022_1,
            target_baud: BaudRate::B3000000,
            sync_limit: None,
            event_capacity: HCI_MAX_EVENT_SIZE,
        }
    }

    /// Set the device address (wire order).
    pub const fn bd_addr(mut self, addr: [u8; 6]) -> Self {
        self.bd_addr = addr;
        self
    }

    /// Select the ROME 1.0 NVM table.
    pub const fn nvm_revision(mut self, rev: NvmRevision) -> Self {
        self.nvm_revision = rev;
        self
    }

    /// Set the operating baud rate.
    pub const fn target_baud(mut self, baud: BaudRate) -> Self {
        self.target_baud = baud;
        self
    }

    /// Bound the event indicator search.
    pub const fn sync_limit(mut self, limit: usize) -> Self {
        self.sync_limit = Some(limit);
        self
    }

    /// Set the event read buffer size.
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self::new()
    }
}
