//! bsg device handles
//!
//! Resolves a bsg control path (for example `/sys/class/bsg/0:0:0:0`) to an
//! open read-write handle. When the path names a sysfs entry, the device
//! numbers are read from its `dev` attribute, a temporary character special
//! file is created for them, opened, and unlinked again. Paths that already
//! are character devices (`/dev/bsg/...`) are opened directly.
//!
//! The handle also carries the synchronous request path used by the one-shot
//! commands (capacity, inquiry, copy): either a blocking write/read pair on
//! the device or the `SG_IO` ioctl.

use bsgbench_core::cdb;
use bsgbench_core::descriptor::{self, DataBuffer, DescriptorOptions};
use bsgbench_core::sys::{SgIoV4, BSG_DEV_DIR, BSG_SYSFS_CLASS, SENSE_BUFFER_LEN, SG_IO, SG_IO_V4_LEN};
use bsgbench_core::{CompletionStatus, Direction, SenseData};
use nix::libc;
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

nix::ioctl_readwrite_bad!(sg_io_ioctl, SG_IO, SgIoV4);

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{path}: no such bsg device")]
    NotFound { path: String },

    #[error("{path}: permission denied")]
    PermissionDenied { path: String },

    #[error("{path}: malformed device number {value:?}")]
    BadDevNumber { path: String, value: String },

    #[error("{path}: {op} failed: {source}")]
    Io {
        path: String,
        op: &'static str,
        source: io::Error,
    },

    #[error("{path}: short {op}: {got} of {expected} bytes")]
    ShortTransfer {
        path: String,
        op: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("{path}: command failed: {status}{}", sense_suffix(.sense))]
    Command {
        path: String,
        status: CompletionStatus,
        sense: Option<SenseData>,
    },

    #[error("{path}: {source}")]
    Encode {
        path: String,
        source: bsgbench_core::Error,
    },
}

impl DeviceError {
    /// Classify an I/O error on `path`, folding missing and forbidden
    /// entries into their own variants.
    pub fn from_io(path: &str, op: &'static str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path: path.to_string() },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path.to_string() },
            _ => Self::Io { path: path.to_string(), op, source },
        }
    }

    /// Convert to negative errno for POSIX compatibility.
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::NotFound { .. } => -libc::ENOENT,
            Self::PermissionDenied { .. } => -libc::EACCES,
            Self::BadDevNumber { .. } | Self::Encode { .. } => -libc::EINVAL,
            Self::Io { source, .. } => -source.raw_os_error().unwrap_or(libc::EIO),
            Self::ShortTransfer { .. } | Self::Command { .. } => -libc::EIO,
        }
    }
}

fn sense_suffix(sense: &Option<SenseData>) -> String {
    sense.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// How one-shot commands reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// `write(2)` the descriptor, then `read(2)` it back.
    #[default]
    ReadWrite,
    /// Single `SG_IO` ioctl.
    Ioctl,
}

/// Resolves control paths to open device handles.
#[derive(Debug, Clone)]
pub struct DeviceProvider {
    sysfs_class: PathBuf,
    node_dir: PathBuf,
}

impl Default for DeviceProvider {
    fn default() -> Self {
        Self {
            sysfs_class: PathBuf::from(BSG_SYSFS_CLASS),
            node_dir: std::env::temp_dir(),
        }
    }
}

impl DeviceProvider {
    pub fn new(sysfs_class: impl Into<PathBuf>, node_dir: impl Into<PathBuf>) -> Self {
        Self { sysfs_class: sysfs_class.into(), node_dir: node_dir.into() }
    }

    /// Open `path` read-write.
    pub fn open(&self, path: &str) -> Result<BsgDevice, DeviceError> {
        let is_char_dev = std::fs::metadata(path)
            .map(|m| m.file_type().is_char_device())
            .unwrap_or(false);
        if is_char_dev {
            let fd = open_rw(Path::new(path)).map_err(|e| DeviceError::from_io(path, "open", e))?;
            debug!(path, "opened character device directly");
            return Ok(BsgDevice { path: path.to_string(), fd });
        }

        let name = bsg_name(path).ok_or_else(|| DeviceError::NotFound { path: path.to_string() })?;
        let (major, minor) = self.dev_numbers(path, name)?;

        let node = self.node_dir.join(format!(".bsg-bench-{}-{name}", std::process::id()));
        mknod(
            node.as_path(),
            SFlag::S_IFCHR,
            Mode::S_IRUSR | Mode::S_IWUSR,
            makedev(major, minor),
        )
        .map_err(|e| DeviceError::from_io(path, "mknod", io::Error::from(e)))?;

        let opened = open_rw(&node);
        // The node is only needed until the open resolves it.
        if let Err(e) = nix::unistd::unlink(node.as_path()) {
            debug!(node = %node.display(), error = %e, "failed to remove temporary node");
        }
        let fd = opened.map_err(|e| DeviceError::from_io(path, "open", e))?;

        debug!(path, major, minor, "opened bsg device via temporary node");
        Ok(BsgDevice { path: path.to_string(), fd })
    }

    /// Read `major:minor` from the sysfs `dev` attribute of `name`.
    pub fn dev_numbers(&self, path: &str, name: &str) -> Result<(u64, u64), DeviceError> {
        let attr = self.sysfs_class.join(name).join("dev");
        let text = std::fs::read_to_string(&attr)
            .map_err(|e| DeviceError::from_io(path, "read sysfs dev", e))?;
        parse_dev_numbers(text.trim()).ok_or_else(|| DeviceError::BadDevNumber {
            path: path.to_string(),
            value: text.trim().to_string(),
        })
    }
}

/// Open a device with the default provider.
pub fn open(path: &str) -> Result<BsgDevice, DeviceError> {
    DeviceProvider::default().open(path)
}

/// Check if `path` refers to a bsg device rather than a regular file.
pub fn is_bsg_path(path: &str) -> bool {
    path.starts_with(BSG_SYSFS_CLASS) || path.starts_with(BSG_DEV_DIR)
}

fn bsg_name(path: &str) -> Option<&str> {
    path.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

fn parse_dev_numbers(text: &str) -> Option<(u64, u64)> {
    let (major, minor) = text.split_once(':')?;
    Some((major.trim().parse().ok()?, minor.trim().parse().ok()?))
}

fn open_rw(path: &Path) -> io::Result<OwnedFd> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(OwnedFd::from(file))
}

/// Open bsg device handle.
#[derive(Debug)]
pub struct BsgDevice {
    path: String,
    fd: OwnedFd,
}

impl BsgDevice {
    #[cfg(test)]
    pub(crate) fn from_fd(path: &str, fd: OwnedFd) -> Self {
        Self { path: path.into(), fd }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Switch the handle to non-blocking mode.
    pub fn set_nonblocking(&self) -> io::Result<()> {
        let raw = self.fd.as_raw_fd();
        let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(raw, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Write one descriptor to the device queue.
    pub fn write_descriptor(&self, hdr: &SgIoV4) -> io::Result<()> {
        let bytes = hdr.as_bytes();
        let n = unsafe {
            libc::write(self.fd.as_raw_fd(), bytes.as_ptr().cast::<libc::c_void>(), bytes.len())
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if n as usize != SG_IO_V4_LEN {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("descriptor write accepted {n} of {SG_IO_V4_LEN} bytes"),
            ));
        }
        Ok(())
    }

    /// Read as many completed descriptors as fit in `hdrs`.
    ///
    /// Returns the number of whole descriptors read. A read that ends inside
    /// a descriptor is reported as `InvalidData`.
    pub fn read_descriptors(&self, hdrs: &mut [SgIoV4]) -> io::Result<usize> {
        let bytes = SgIoV4::slice_as_bytes_mut(hdrs);
        let n = unsafe {
            libc::read(self.fd.as_raw_fd(), bytes.as_mut_ptr().cast::<libc::c_void>(), bytes.len())
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        let n = n as usize;
        if n % SG_IO_V4_LEN != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("read ended inside a descriptor ({n} bytes)"),
            ));
        }
        Ok(n / SG_IO_V4_LEN)
    }

    /// Run one command synchronously and check its completion status.
    ///
    /// The handle must be in blocking mode. A short data phase is not an
    /// error here; the residual is left in the returned descriptor.
    pub fn execute(
        &self,
        cdb: &[u8],
        data: DataBuffer<'_>,
        mode: SyncMode,
        options: DescriptorOptions,
    ) -> Result<SgIoV4, DeviceError> {
        let direction = match data {
            DataBuffer::Out(_) => Direction::Write,
            _ => Direction::Read,
        };
        let mut sense = [0u8; SENSE_BUFFER_LEN];
        let mut hdr = descriptor::build(cdb, &mut sense, data, options, 0);

        match mode {
            SyncMode::ReadWrite => {
                self.write_descriptor(&hdr).map_err(|e| self.io_err("write descriptor", e))?;
                let got = self
                    .read_descriptors(std::slice::from_mut(&mut hdr))
                    .map_err(|e| self.io_err("read descriptor", e))?;
                if got != 1 {
                    return Err(DeviceError::ShortTransfer {
                        path: self.path.clone(),
                        op: "read descriptor",
                        got: got * SG_IO_V4_LEN,
                        expected: SG_IO_V4_LEN,
                    });
                }
            }
            SyncMode::Ioctl => {
                unsafe { sg_io_ioctl(self.fd.as_raw_fd(), &mut hdr) }
                    .map_err(|e| self.io_err("SG_IO", io::Error::from(e)))?;
            }
        }

        let status = CompletionStatus::from_wire(&hdr, direction);
        if !status.status_ok() {
            let len = (hdr.response_len as usize).min(SENSE_BUFFER_LEN);
            return Err(DeviceError::Command {
                path: self.path.clone(),
                status,
                sense: SenseData::parse(&sense[..len]),
            });
        }
        Ok(hdr)
    }

    /// Synchronous READ(10) filling `buf` from byte `offset`.
    pub fn read_at(
        &self,
        buf: &mut [u8],
        offset: u64,
        mode: SyncMode,
        options: DescriptorOptions,
    ) -> Result<(), DeviceError> {
        let expected = buf.len();
        let cdb = self.rw_cdb(Direction::Read, expected, offset)?;
        let hdr = self.execute(&cdb, DataBuffer::In(buf), mode, options)?;
        self.check_full(Direction::Read, &hdr, expected)
    }

    /// Synchronous WRITE(10) of `buf` at byte `offset`.
    pub fn write_at(
        &self,
        buf: &[u8],
        offset: u64,
        mode: SyncMode,
        options: DescriptorOptions,
    ) -> Result<(), DeviceError> {
        let cdb = self.rw_cdb(Direction::Write, buf.len(), offset)?;
        let hdr = self.execute(&cdb, DataBuffer::Out(buf), mode, options)?;
        self.check_full(Direction::Write, &hdr, buf.len())
    }

    fn rw_cdb(&self, direction: Direction, len: usize, offset: u64) -> Result<[u8; 10], DeviceError> {
        cdb::encode_rw10(direction, len as u64, offset)
            .map_err(|source| DeviceError::Encode { path: self.path.clone(), source })
    }

    fn check_full(&self, direction: Direction, hdr: &SgIoV4, expected: usize) -> Result<(), DeviceError> {
        let resid = CompletionStatus::from_wire(hdr, direction).residual;
        if resid != 0 {
            return Err(DeviceError::ShortTransfer {
                path: self.path.clone(),
                op: if direction.is_write() { "write" } else { "read" },
                got: expected.saturating_sub(usize::try_from(resid.max(0)).unwrap_or(0)),
                expected,
            });
        }
        Ok(())
    }

    fn io_err(&self, op: &'static str, source: io::Error) -> DeviceError {
        DeviceError::Io { path: self.path.clone(), op, source }
    }
}

impl AsFd for BsgDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
