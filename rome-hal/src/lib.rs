#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod utils;

pub mod bringup;
pub mod config;
pub mod error;
pub mod firmware;
pub mod hci;
pub mod nvm;
pub mod rampatch;
pub mod segment;
pub mod tlv;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

// Reexports
pub use bringup::{soc_init, BringupSession, BringupState};
pub use config::BringupConfig;
pub use error::Error;
#[cfg(feature = "std")]
pub use firmware::FsFirmware;
pub use firmware::{FirmwareBlobs, FirmwareImage, FirmwareSource};
pub use hci::status::{ChipVersion, VersionInfo};
pub use nvm::NvmRevision;
pub use transport::{BaudRate, HciUart};
