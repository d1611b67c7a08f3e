//! Firmware and NVM image retrieval.
//!
//! Images are read whole into memory before download. A source reports the
//! image size first; the read must return exactly that many bytes.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use embedded_io::ErrorKind;

/// Images the bring-up may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareImage {
    /// Legacy rampatch (ROME 1.0).
    Rampatch,
    /// TLV rampatch (ROME 1.1).
    RampatchTlv,
    /// TLV NVM configuration (ROME 1.1).
    NvmTlv,
}

impl FirmwareImage {
    /// Conventional on-device location.
    pub const fn default_path(self) -> &'static str {
        match self {
            Self::Rampatch => "/system/etc/firmware/rampatch.img",
            Self::RampatchTlv => "/system/etc/firmware/rampatch_tlv.img",
            Self::NvmTlv => "/system/etc/firmware/nvm_tlv.bin",
        }
    }
}

impl fmt::Display for FirmwareImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rampatch => "rampatch",
            Self::RampatchTlv => "TLV rampatch",
            Self::NvmTlv => "TLV NVM",
        })
    }
}

/// Firmware file problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FileError {
    /// The source has no such image.
    NotFound(FirmwareImage),
    /// The source failed while reading.
    Io(FirmwareImage, ErrorKind),
    /// Fewer or more bytes were read than the source reported.
    SizeMismatch {
        /// Reported size.
        expected: usize,
        /// Bytes read.
        actual: usize,
    },
    /// Image shorter than its fixed header.
    TooShort {
        /// Image length.
        len: usize,
        /// Header length.
        needed: usize,
    },
    /// Header declares more payload than the image holds.
    Truncated {
        /// Declared payload length.
        declared: usize,
        /// Bytes present.
        available: usize,
    },
    /// Record overruns its container.
    Malformed {
        /// Offset of the offending record.
        offset: usize,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(image) => write!(f, "{} image not found", image),
            Self::Io(image, kind) => write!(f, "failed to read {} image: {:?}", image, kind),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "read {} bytes, expected {}", actual, expected)
            }
            Self::TooShort { len, needed } => {
                write!(f, "image of {} bytes is shorter than its {}-byte header", len, needed)
            }
            Self::Truncated { declared, available } => {
                write!(f, "header declares {} bytes, {} present", declared, available)
            }
            Self::Malformed { offset } => write!(f, "malformed record at offset {}", offset),
        }
    }
}

/// Supplier of firmware images.
pub trait FirmwareSource {
    /// Size of `image` in bytes.
    fn size(&mut self, image: FirmwareImage) -> Result<usize, FileError>;

    /// Read `image` into `buf`, returning the number of bytes read.
    fn read(&mut self, image: FirmwareImage, buf: &mut [u8]) -> Result<usize, FileError>;
}

impl<T: FirmwareSource + ?Sized> FirmwareSource for &mut T {
    fn size(&mut self, image: FirmwareImage) -> Result<usize, FileError> {
        T::size(self, image)
    }

    fn read(&mut self, image: FirmwareImage, buf: &mut [u8]) -> Result<usize, FileError> {
        T::read(self, image, buf)
    }
}

/// Read a whole image, checking the byte count against the reported size.
pub fn read_image<S: FirmwareSource + ?Sized>(source: &mut S, image: FirmwareImage) -> Result<Vec<u8>, FileError> {
    let size = source.size(image)?;
    debug!("{} image: {} bytes", image, size);

    let mut buf = vec![0u8; size];
    let actual = source.read(image, &mut buf)?;
    if actual != size {
        error!("{} image: read {} of {} bytes", image, actual, size);
        return Err(FileError::SizeMismatch { expected: size, actual });
    }
    Ok(buf)
}

//=============================================================================
// In-memory images
//=============================================================================

/// Images held in memory, e.g. linked into the binary with `include_bytes!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirmwareBlobs<'a> {
    pub rampatch: Option<&'a [u8]>,
    pub rampatch_tlv: Option<&'a [u8]>,
    pub nvm_tlv: Option<&'a [u8]>,
}

impl<'a> FirmwareBlobs<'a> {
    /// No images.
    pub const fn new() -> Self {
        Self {
            rampatch: None,
            rampatch_tlv: None,
            nvm_tlv: None,
        }
    }

    /// Set the legacy rampatch.
    pub const fn rampatch(mut self, bytes: &'a [u8]) -> Self {
        self.rampatch = Some(bytes);
        self
    }

    /// Set the TLV rampatch.
    pub const fn rampatch_tlv(mut self, bytes: &'a [u8]) -> Self {
        self.rampatch_tlv = Some(bytes);
        self
    }

    /// Set the TLV NVM image.
    pub const fn nvm_tlv(mut self, bytes: &'a [u8]) -> Self {
        self.nvm_tlv = Some(bytes);
        self
    }

    fn get(&self, image: FirmwareImage) -> Result<&'a [u8], FileError> {
        match image {
            FirmwareImage::Rampatch => self.rampatch,
            FirmwareImage::RampatchTlv => self.rampatch_tlv,
            FirmwareImage::NvmTlv => self.nvm_tlv,
        }
        .ok_or(FileError::NotFound(image))
    }
}

impl FirmwareSource for FirmwareBlobs<'_> {
    fn size(&mut self, image: FirmwareImage) -> Result<usize, FileError> {
        Ok(self.get(image)?.len())
    }

    fn read(&mut self, image: FirmwareImage, buf: &mut [u8]) -> Result<usize, FileError> {
        let bytes = self.get(image)?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}

//=============================================================================
// Filesystem images
//=============================================================================

#[cfg(feature = "std")]
pub use fs::FsFirmware;

#[cfg(feature = "std")]
mod fs {
    use std::io::Read;
    use std::path::{Path, PathBuf};

    use embedded_io::ErrorKind;

    use super::{FileError, FirmwareImage, FirmwareSource};

    /// Images read from the filesystem.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FsFirmware {
        rampatch: PathBuf,
        rampatch_tlv: PathBuf,
        nvm_tlv: PathBuf,
    }

    impl Default for FsFirmware {
        fn default() -> Self {
            Self {
                rampatch: PathBuf::from(FirmwareImage::Rampatch.default_path()),
                rampatch_tlv: PathBuf::from(FirmwareImage::RampatchTlv.default_path()),
                nvm_tlv: PathBuf::from(FirmwareImage::NvmTlv.default_path()),
            }
        }
    }

    impl FsFirmware {
        /// Default on-device paths.
        pub fn new() -> Self {
            Self::default()
        }

        /// Look for all three images by file name under `dir`.
        pub fn in_dir(dir: impl AsRef<Path>) -> Self {
            let dir = dir.as_ref();
            let join = |image: FirmwareImage| {
                let default = Path::new(image.default_path());
                dir.join(default.file_name().unwrap_or(default.as_os_str()))
            };
            Self {
                rampatch: join(FirmwareImage::Rampatch),
                rampatch_tlv: join(FirmwareImage::RampatchTlv),
                nvm_tlv: join(FirmwareImage::NvmTlv),
            }
        }

        pub fn rampatch(mut self, path: impl Into<PathBuf>) -> Self {
            self.rampatch = path.into();
            self
        }

        pub fn rampatch_tlv(mut self, path: impl Into<PathBuf>) -> Self {
            self.rampatch_tlv = path.into();
            self
        }

        pub fn nvm_tlv(mut self, path: impl Into<PathBuf>) -> Self {
            self.nvm_tlv = path.into();
            self
        }

        /// Path used for `image`.
        pub fn path(&self, image: FirmwareImage) -> &Path {
            match image {
                FirmwareImage::Rampatch => &self.rampatch,
                FirmwareImage::RampatchTlv => &self.rampatch_tlv,
                FirmwareImage::NvmTlv => &self.nvm_tlv,
            }
        }

        fn io_error(&self, image: FirmwareImage, err: std::io::Error) -> FileError {
            error!("{}: {}", self.path(image).display(), err);
            match err.kind() {
                std::io::ErrorKind::NotFound => FileError::NotFound(image),
                kind => FileError::Io(image, io_kind(kind)),
            }
        }
    }

    pub(super) fn io_kind(kind: std::io::ErrorKind) -> ErrorKind {
        use std::io::ErrorKind as Std;
        match kind {
            Std::NotFound => ErrorKind::NotFound,
            Std::PermissionDenied => ErrorKind::PermissionDenied,
            Std::InvalidInput => ErrorKind::InvalidInput,
            Std::InvalidData => ErrorKind::InvalidData,
            Std::TimedOut => ErrorKind::TimedOut,
            Std::Interrupted => ErrorKind::Interrupted,
            Std::Unsupported => ErrorKind::Unsupported,
            Std::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Other,
        }
    }

    impl FirmwareSource for FsFirmware {
        fn size(&mut self, image: FirmwareImage) -> Result<usize, FileError> {
            let meta = std::fs::metadata(self.path(image)).map_err(|e| self.io_error(image, e))?;
            usize::try_from(meta.len()).map_err(|_| FileError::Io(image, ErrorKind::OutOfMemory))
        }

        fn read(&mut self, image: FirmwareImage, buf: &mut [u8]) -> Result<usize, FileError> {
            let mut file = std::fs::File::open(self.path(image)).map_err(|e| self.io_error(image, e))?;
            let mut filled = 0;
            while filled < buf.len() {
                match file.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(self.io_error(image, e)),
                }
            }
            Ok(filled)
        }
    }
}
