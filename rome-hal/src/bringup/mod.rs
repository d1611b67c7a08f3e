//! ROME SoC bring-up.
//!
//! ```text
//! Init -> VersionQuery -+-> LegacyDownload (1.0) ----------------------> Done
//!                       +-> BaudSwitch -> TlvDownload (1.1) -----------> Done
//!            any failure -> Error
//! ```
//!
//! ROME 1.0: legacy rampatch (header, segments), ATTACH, RESET and a fixed
//! 100 ms wait, the NVM tag table, then an HCI reset that moves the link to
//! the operating baud rate.
//!
//! ROME 1.1: baud-rate switch, then the TLV rampatch and TLV NVM images. The
//! final HCI reset is left to the host stack.
//!
//! ```no_run
//! use rome_hal::{soc_init, BringupConfig, FsFirmware};
//! # fn example<U: rome_hal::HciUart, D: embedded_hal_1::delay::DelayNs>(uart: &mut U, delay: &mut D)
//! #     -> Result<(), rome_hal::Error> {
//! let mut firmware = FsFirmware::new();
//! let chip = soc_init(uart, delay, &mut firmware, BringupConfig::new())?;
//! # let _ = chip;
//! # Ok(()) }
//! ```

use embedded_hal_1::delay::DelayNs;

use crate::config::BringupConfig;
use crate::error::Error;
use crate::firmware::{FirmwareImage, FirmwareSource};
use crate::hci::event::ReadOptions;
use crate::hci::status::{ChipVersion, VendorResponse, VersionInfo};
use crate::hci::{EdlCommand, HciCommand, HciLink};
use crate::nvm;
use crate::rampatch;
use crate::tlv::{self, TlvType};
use crate::transport::HciUart;

/// Wait after EDL RESET before the controller accepts commands again.
pub const RESET_SETTLE_MS: u32 = 100;

/// Bring-up progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringupState {
    Init,
    VersionQuery,
    /// ROME 1.0 rampatch and NVM table.
    LegacyDownload,
    /// ROME 1.1 baud-rate change.
    BaudSwitch,
    /// ROME 1.1 TLV images.
    TlvDownload,
    Done,
    Error,
}

/// One bring-up run over an exclusively borrowed UART.
pub struct BringupSession<'a, U, D, F>
where
    U: HciUart + ?Sized,
    D: DelayNs + ?Sized,
    F: FirmwareSource + ?Sized,
{
    link: HciLink<'a, U>,
    delay: &'a mut D,
    firmware: &'a mut F,
    config: BringupConfig,
    chip: ChipVersion,
    version: Option<VersionInfo>,
    tlv_type: Option<TlvType>,
    state: BringupState,
}

impl<'a, U, D, F> BringupSession<'a, U, D, F>
where
    U: HciUart + ?Sized,
    D: DelayNs + ?Sized,
    F: FirmwareSource + ?Sized,
{
    pub fn new(uart: &'a mut U, delay: &'a mut D, firmware: &'a mut F, config: BringupConfig) -> Self {
        let opts = ReadOptions {
            sync_limit: config.sync_limit,
        };
        Self {
            link: HciLink::new(uart, config.event_capacity, opts),
            delay,
            firmware,
            config,
            chip: ChipVersion::Unknown,
            version: None,
            tlv_type: None,
            state: BringupState::Init,
        }
    }

    pub fn state(&self) -> BringupState {
        self.state
    }

    /// Chipset version detected by the version query.
    pub fn chip_version(&self) -> ChipVersion {
        self.chip
    }

    /// Full version response, once received.
    pub fn version(&self) -> Option<VersionInfo> {
        self.version
    }

    /// Type of the TLV image most recently downloaded.
    pub fn tlv_type(&self) -> Option<TlvType> {
        self.tlv_type
    }

    fn enter(&mut self, state: BringupState) {
        debug!("bring-up: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Run the whole bring-up. Returns the detected chipset version.
    pub fn run(&mut self) -> Result<ChipVersion, Error> {
        match self.run_steps() {
            Ok(chip) => {
                self.enter(BringupState::Done);
                info!("ROME bring-up complete ({:?})", chip);
                Ok(chip)
            }
            Err(e) => {
                error!("ROME bring-up failed in {:?}: {}", self.state, e);
                self.enter(BringupState::Error);
                Err(e)
            }
        }
    }

    fn run_steps(&mut self) -> Result<ChipVersion, Error> {
        self.enter(BringupState::VersionQuery);
        let raw = self.version_request()?;

        match self.chip {
            ChipVersion::V1_0 => {
                info!("ROME 1.0 detected");
                self.enter(BringupState::LegacyDownload);
                self.legacy_download()?;
            }
            ChipVersion::V1_1 => {
                info!("ROME 1.1 detected");
                self.enter(BringupState::BaudSwitch);
                self.set_baudrate_request()?;
                self.enter(BringupState::TlvDownload);
                self.tlv_download()?;
            }
            ChipVersion::Unknown => {
                error!("unsupported chipset version 0x{:04x}", raw);
                return Err(Error::UnsupportedVersion(raw));
            }
        }
        Ok(self.chip)
    }

    /// Query the patch version and record the chipset version.
    ///
    /// Returns the raw chipset version, 0 if the controller did not answer with a version.
    pub fn version_request(&mut self) -> Result<u16, Error> {
        debug!("Step 1: version request");
        let rsp = self.link.send_vs_cmd(&HciCommand::edl(EdlCommand::VersionRequest))?;
        self.link.read_cmd_complete()?;

        let raw = match rsp {
            VendorResponse::Version(info) => {
                self.version = Some(info);
                info.chip_version
            }
            other => {
                warn!("version request answered with {:?}", other);
                0
            }
        };
        self.chip = ChipVersion::from_raw(raw);
        Ok(raw)
    }

    fn legacy_download(&mut self) -> Result<(), Error> {
        debug!("Step 2: load rampatch");
        let patch = rampatch::load_rampatch(&mut *self.firmware)?;

        debug!("Step 3: send rampatch header");
        rampatch::send_header(&mut self.link, &patch)?;

        debug!("Step 4: download rampatch");
        rampatch::download(&mut self.link, &patch)?;
        drop(patch);

        debug!("Step 5: attach rampatch");
        self.link.send_vs_cmd_and_wait(&HciCommand::edl(EdlCommand::Attach))?;

        debug!("Step 6: reset controller");
        self.reset_controller()?;

        debug!("Step 7: NVM tag table");
        nvm::download(&mut self.link, self.config.nvm_revision, &self.config.bd_addr)?;

        debug!("Step 8: HCI reset at {} bps", self.config.target_baud.bps());
        self.hci_reset_request()
    }

    fn tlv_download(&mut self) -> Result<(), Error> {
        for (step, image) in [(3, FirmwareImage::RampatchTlv), (4, FirmwareImage::NvmTlv)] {
            debug!("Step {}: {} download", step, image);
            let tlv = tlv::load_tlv(&mut *self.firmware, image, &self.config.bd_addr)?;
            self.tlv_type = Some(tlv.kind());
            tlv::download(&mut self.link, &tlv, self.chip)?;
        }
        Ok(())
    }

    /// EDL RESET. The controller does not answer; wait for it to come back.
    fn reset_controller(&mut self) -> Result<(), Error> {
        self.link.send(&HciCommand::edl(EdlCommand::Reset))?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Vendor baud-rate change (ROME 1.1).
    fn set_baudrate_request(&mut self) -> Result<(), Error> {
        let baud = self.config.target_baud;
        debug!("Step 2: baud rate -> {} bps", baud.bps());

        self.link.set_flow_control(false)?;
        self.link.send(&HciCommand::set_baudrate(baud))?;
        self.link.set_local_baudrate(baud.bps())?;
        self.link.set_flow_control(true)?;

        self.link.read_vs_event()?;
        self.link.read_cmd_complete()
    }

    /// HCI reset with the link moving to the operating baud rate (ROME 1.0).
    fn hci_reset_request(&mut self) -> Result<(), Error> {
        self.link.set_flow_control(false)?;
        self.link.send(&HciCommand::reset())?;
        self.link.set_local_baudrate(self.config.target_baud.bps())?;
        self.link.set_flow_control(true)?;
        self.link.read_cmd_complete()
    }
}

/// Bring up the controller on `uart`. Returns the detected chipset version.
pub fn soc_init<U, D, F>(uart: &mut U, delay: &mut D, firmware: &mut F, config: BringupConfig) -> Result<ChipVersion, Error>
where
    U: HciUart + ?Sized,
    D: DelayNs + ?Sized,
    F: FirmwareSource + ?Sized,
{
    BringupSession::new(uart, delay, firmware, config).run()
}

#[cfg(test)]
mod tests;
