//! Inspect ROME rampatch/NVM images and rehearse a bring-up against a
//! simulated controller.

mod config;
mod logger;
mod sim;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rome_hal::nvm;
use rome_hal::rampatch::Rampatch;
use rome_hal::tlv::{TlvImage, TlvType};
use rome_hal::{soc_init, ChipVersion, NvmRevision};

use crate::config::{format_bd_addr, parse_bd_addr, parse_revision, ToolConfig};
use crate::sim::{describe, HostOp, SimController};

#[derive(Parser, Debug)]
#[command(author, version, about = "Qualcomm ROME rampatch and NVM tool")]
struct Args {
    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a legacy (ROME 1.0) rampatch and show its segment plan
    InspectRampatch {
        file: PathBuf,
    },
    /// Decode a TLV rampatch or NVM image (ROME 1.1)
    InspectTlv {
        file: PathBuf,
        /// Patch this address (XX:XX:XX:XX:XX:XX) into the BD address entry
        #[arg(long)]
        bd_addr: Option<String>,
    },
    /// Print the NVM_SET commands of a built-in ROME 1.0 table
    NvmTable {
        /// Table name, e.g. ROME_1_0_100019; all tables when omitted
        #[arg(long)]
        revision: Option<String>,
        #[arg(long)]
        bd_addr: Option<String>,
    },
    /// Run the bring-up against a simulated controller and print every packet
    DryRun {
        /// YAML tool configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Chipset the simulated controller reports
        #[arg(long, value_enum, default_value_t = Chip::V1_1)]
        chip: Chip,
        /// Directory with the firmware images
        #[arg(long)]
        firmware_dir: Option<PathBuf>,
        #[arg(long)]
        bd_addr: Option<String>,
        #[arg(long)]
        nvm_revision: Option<String>,
        /// Operating baud rate
        #[arg(long)]
        baud: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Chip {
    #[value(name = "1.0")]
    V1_0,
    #[value(name = "1.1")]
    V1_1,
}

impl Chip {
    fn raw(self) -> u16 {
        match self {
            Self::V1_0 => ChipVersion::ROME_VER_1_0,
            Self::V1_1 => ChipVersion::ROME_VER_1_1,
        }
    }
}

/// Sleeps for real, so a dry run keeps the bring-up timing.
struct StdDelay;

impl embedded_hal_1::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    match args.command {
        Command::InspectRampatch { file } => inspect_rampatch(file),
        Command::InspectTlv { file, bd_addr } => inspect_tlv(file, bd_addr),
        Command::NvmTable { revision, bd_addr } => nvm_table(revision, bd_addr),
        Command::DryRun {
            config,
            chip,
            firmware_dir,
            bd_addr,
            nvm_revision,
            baud,
        } => {
            let mut cfg = match config {
                Some(path) => ToolConfig::load(&path)?,
                None => ToolConfig::default(),
            };
            cfg.firmware_dir = firmware_dir.or(cfg.firmware_dir);
            cfg.bd_addr = bd_addr.or(cfg.bd_addr);
            cfg.nvm_revision = nvm_revision.or(cfg.nvm_revision);
            cfg.baud = baud.or(cfg.baud);
            dry_run(&cfg, chip)
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

fn inspect_rampatch(file: PathBuf) -> Result<()> {
    let image = fs::read(&file).with_context(|| format!("read {}", file.display()))?;
    let size = image.len();
    let patch = Rampatch::parse(image)
        .map_err(rome_hal::Error::from)
        .with_context(|| format!("parse {}", file.display()))?;
    let h = &patch.header;

    println!("{} ({} bytes)", file.display(), size);
    println!("  patch id       : 0x{:08x}", h.patch_id);
    println!("  rom version    : 0x{:04x}", h.rom_version);
    println!("  build version  : 0x{:04x}", h.build_version);
    println!("  base address   : 0x{:08x}", h.base_address);
    println!("  entry address  : 0x{:08x}", h.entry_address);
    println!("  length         : {}", h.length);
    println!("  crc            : 0x{:08x}", h.crc);
    println!("  control        : 0x{:04x}", h.control);

    let plan = patch.segments();
    println!(
        "  segments       : {} ({} full, remainder {} bytes)",
        plan.segment_count(),
        plan.full_segments(),
        plan.remainder()
    );
    for seg in plan {
        println!(
            "    #{:<3} offset {:>6}  {:>3} bytes  -> 0x{:08x}",
            seg.index + 1,
            seg.offset,
            seg.size,
            h.base_address.wrapping_add(seg.offset as u32)
        );
    }
    Ok(())
}

fn inspect_tlv(file: PathBuf, bd_addr: Option<String>) -> Result<()> {
    let bytes = fs::read(&file).with_context(|| format!("read {}", file.display()))?;
    let mut tlv = TlvImage::parse(bytes)
        .map_err(rome_hal::Error::from)
        .with_context(|| format!("parse {}", file.display()))?;

    if let Some(addr) = bd_addr {
        let addr = parse_bd_addr(&addr)?;
        let patched = tlv.patch_bd_addr(&addr).map_err(rome_hal::Error::from)?;
        println!("BD address {} written to {} entries", format_bd_addr(&addr), patched);
    }

    println!("{} ({} bytes)", file.display(), tlv.len());
    println!("  type           : {}", tlv.kind());
    println!("  length         : {}", tlv.declared_length());

    match tlv.kind() {
        TlvType::Patch => {
            if let Some(h) = tlv.patch_header() {
                println!("  sign version   : 0x{:02x}", h.sign_version);
                println!("  sign algorithm : 0x{:02x}", h.sign_algorithm);
                println!("  product id     : 0x{:04x}", h.product_id);
                println!("  build version  : 0x{:04x}", h.build_version);
                println!("  patch version  : 0x{:04x}", h.patch_version);
                println!("  entry address  : 0x{:08x}", h.entry_address);
            }
        }
        TlvType::Nvm => {
            for entry in tlv.nvm_entries() {
                let entry = entry.map_err(rome_hal::Error::from)?;
                println!(
                    "  tag {:>3}  len {:>3}  ptr 0x{:08x}  flags 0x{:08x}  {}",
                    entry.tag_id,
                    entry.tag_len,
                    entry.tag_ptr,
                    entry.tag_ex_flag,
                    hex(entry.data)
                );
            }
        }
        TlvType::Unknown(t) => println!("  unknown container type {}, body not decoded", t),
    }

    let plan = tlv.segments();
    println!(
        "  segments       : {} ({} full, remainder {} bytes)",
        plan.segment_count(),
        plan.full_segments(),
        plan.remainder()
    );
    Ok(())
}

fn nvm_table(revision: Option<String>, bd_addr: Option<String>) -> Result<()> {
    let revisions = match revision {
        Some(name) => vec![parse_revision(&name)?],
        None => NvmRevision::ALL.to_vec(),
    };
    let addr = match bd_addr {
        Some(a) => parse_bd_addr(&a)?,
        None => rome_hal::config::DEFAULT_BD_ADDR,
    };

    for rev in revisions {
        println!("{} (BD address {})", rev.name(), format_bd_addr(&addr));
        for tag in rev.tags() {
            let cmd = nvm::tag_command(tag, &addr)?;
            println!("  tag {:>3}: {}", tag.tag, hex(cmd.as_bytes()));
        }
    }
    Ok(())
}

fn dry_run(cfg: &ToolConfig, chip: Chip) -> Result<()> {
    let config = cfg.bringup()?;
    let mut firmware = cfg.firmware();
    let mut sim = SimController::new(chip.raw());

    let result = soc_init(&mut sim, &mut StdDelay, &mut firmware, config);

    for (i, op) in sim.ops.iter().enumerate() {
        match op {
            HostOp::Packet(p) => println!("{:>4}  {:<32} {}", i, describe(p), hex(p)),
            HostOp::FlowControl(on) => println!("{:>4}  flow control {}", i, if *on { "on" } else { "off" }),
            HostOp::Baudrate(bps) => println!("{:>4}  host baud rate {}", i, bps),
        }
    }

    match result {
        Ok(detected) => {
            println!("bring-up complete: {}", chip_name(detected));
            Ok(())
        }
        Err(e) => bail!("bring-up failed: {}", e),
    }
}

fn chip_name(chip: ChipVersion) -> &'static str {
    match chip {
        ChipVersion::V1_0 => "ROME 1.0",
        ChipVersion::V1_1 => "ROME 1.1",
        ChipVersion::Unknown => "unknown",
    }
}
