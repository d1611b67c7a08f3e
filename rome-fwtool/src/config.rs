//! YAML tool configuration.
//!
//! ```yaml
//! firmware_dir: ./firmware
//! nvm_tlv: ./firmware/nvm_tlv_3.2.bin
//! bd_addr: "22:56:01:23:78:77"
//! nvm_revision: ROME_1_0_100022_1
//! baud: 3000000
//! sync_limit: 64
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use rome_hal::{BaudRate, BringupConfig, FsFirmware, NvmRevision};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Directory holding `rampatch.img`, `rampatch_tlv.img` and `nvm_tlv.bin`.
    pub firmware_dir: Option<PathBuf>,
    pub rampatch: Option<PathBuf>,
    pub rampatch_tlv: Option<PathBuf>,
    pub nvm_tlv: Option<PathBuf>,
    /// Printed form, most significant byte first.
    pub bd_addr: Option<String>,
    pub nvm_revision: Option<String>,
    pub baud: Option<u32>,
    pub sync_limit: Option<usize>,
}

impl ToolConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Bring-up settings, library defaults for anything unset.
    pub fn bringup(&self) -> Result<BringupConfig> {
        let mut cfg = BringupConfig::new();
        if let Some(addr) = &self.bd_addr {
            cfg = cfg.bd_addr(parse_bd_addr(addr)?);
        }
        if let Some(name) = &self.nvm_revision {
            cfg = cfg.nvm_revision(parse_revision(name)?);
        }
        if let Some(bps) = self.baud {
            let baud = BaudRate::from_bps(bps).ok_or_else(|| anyhow!("unsupported baud rate {}", bps))?;
            cfg = cfg.target_baud(baud);
        }
        if let Some(limit) = self.sync_limit {
            cfg = cfg.sync_limit(limit);
        }
        Ok(cfg)
    }

    pub fn firmware(&self) -> FsFirmware {
        let mut fw = match &self.firmware_dir {
            Some(dir) => FsFirmware::in_dir(dir),
            None => FsFirmware::new(),
        };
        if let Some(p) = &self.rampatch {
            fw = fw.rampatch(p);
        }
        if let Some(p) = &self.rampatch_tlv {
            fw = fw.rampatch_tlv(p);
        }
        if let Some(p) = &self.nvm_tlv {
            fw = fw.nvm_tlv(p);
        }
        fw
    }
}

/// Parse `XX:XX:XX:XX:XX:XX` (most significant byte first) into wire order.
pub fn parse_bd_addr(s: &str) -> Result<[u8; 6]> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        bail!("BD address {:?}: expected six colon-separated bytes", s);
    }
    let mut addr = [0u8; 6];
    for (dst, part) in addr.iter_mut().rev().zip(&parts) {
        *dst = u8::from_str_radix(part, 16).with_context(|| format!("BD address {:?}: bad byte {:?}", s, part))?;
    }
    Ok(addr)
}

/// Printed form of a wire-order address.
pub fn format_bd_addr(addr: &[u8; 6]) -> String {
    addr.iter().rev().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(":")
}

pub fn parse_revision(name: &str) -> Result<NvmRevision> {
    NvmRevision::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = NvmRevision::ALL.iter().map(|r| r.name()).collect();
        anyhow!("unknown NVM revision {:?} (known: {})", name, known.join(", "))
    })
}
