//! POSIX shared-memory object wrapper
//!
//! Thin ownership layer around `shm_open` + `mmap`. Creation is always
//! exclusive: losing the creation race is reported as `None`, never as an
//! error, because concurrent processes bootstrapping the same topic is the
//! expected pattern.

use std::fs::File;

use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::error::{BusError, Result};

fn os_err(errno: nix::Error, context: &str) -> BusError {
    BusError::from_io(std::io::Error::from_raw_os_error(errno as i32), context)
}

/// An open, mapped shared-memory object
#[derive(Debug)]
pub struct ShmObject {
    /// Shared-memory path, e.g. "/shmbus-imu"
    path: String,
    /// Memory mapping of the whole object
    mmap: MmapMut,
    /// Backing file handle; kept so the mapping source stays open
    _file: File,
}

impl ShmObject {
    /// Create a fresh object of exactly `size` bytes and map it
    ///
    /// Returns `Ok(None)` when the object already exists at `path`.
    pub fn create_exclusive(path: &str, size: u64) -> Result<Option<Self>> {
        let fd = match shm_open(
            path,
            OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_EXCL,
            Mode::from_bits_truncate(0o666),
        ) {
            Ok(fd) => fd,
            Err(Errno::EEXIST) => return Ok(None),
            Err(e) => return Err(os_err(e, "shm_open failed")),
        };

        if let Err(e) = ftruncate(&fd, size as i64) {
            // Object exists but is unusable for layout; remove it so a
            // retry does not observe a zero-length region.
            let _ = shm_unlink(path);
            return Err(os_err(e, "ftruncate failed"));
        }

        let file = File::from(fd);
        let mmap = unsafe {
            MmapOptions::new()
                .len(size as usize)
                .map_mut(&file)
                .map_err(|e| BusError::from_io(e, "mmap failed"))?
        };

        Ok(Some(Self {
            path: path.to_string(),
            mmap,
            _file: file,
        }))
    }

    /// Open an existing object and map its full extent
    ///
    /// The object size comes from the OS, not from the caller; a region's
    /// header records the size it was built with, and attachers must see
    /// all of it.
    pub fn open(path: &str) -> Result<Self> {
        let fd = shm_open(path, OFlag::O_RDWR, Mode::empty())
            .map_err(|e| os_err(e, "shm_open failed"))?;
        let file = File::from(fd);

        let len = file
            .metadata()
            .map_err(|e| BusError::from_io(e, "fstat failed"))?
            .len();
        if len == 0 {
            return Err(BusError::io(format!("shm object {} has zero size", path)));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(&file)
                .map_err(|e| BusError::from_io(e, "mmap failed"))?
        };

        Ok(Self {
            path: path.to_string(),
            mmap,
            _file: file,
        })
    }

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the mapping is empty (never true for a live object)
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }

    /// Shared-memory path this object was opened under
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base pointer of the mapping
    ///
    /// # Safety
    /// The caller must keep all writes inside the mapped length and go
    /// through atomics for any field concurrently accessed by other
    /// processes.
    pub(crate) unsafe fn base_ptr(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }
}

// The mapping is shared process-wide state accessed through atomics; the
// handle itself carries no thread affinity.
unsafe impl Send for ShmObject {}
unsafe impl Sync for ShmObject {}

/// Remove a shared-memory object by path
///
/// Teardown is out-of-band: existing mappings stay valid until the last
/// process unmaps, but new attachers will no longer find the object.
pub fn unlink(path: &str) -> Result<()> {
    shm_unlink(path).map_err(|e| os_err(e, "shm_unlink failed"))
}
