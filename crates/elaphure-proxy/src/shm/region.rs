//! File-backed shared region.

#![allow(unsafe_code)]

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::{Path, PathBuf},
    ptr::NonNull,
    sync::{Mutex, PoisonError},
};

use elaphure_core::{
    SharedMemory, SharedRegion,
    region::REGION_SIZE,
};
use tracing::{debug, warn};

/// The transport region, mapped from a file.
///
/// The file is created with permissions 0600 if it does not exist yet and
/// grown to the region size if it is shorter. A file this process created
/// is removed on drop.
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
    // Keeps the mapping's file open for the region's lifetime.
    _file: File,
    path: PathBuf,
    owns_file: bool,
    lock: Mutex<()>,
}

impl MappedRegion {
    /// Map the region at `path`, creating the file if needed.
    pub fn open_or_create(path: &Path) -> io::Result<Self> {
        let (file, owns_file) = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
        {
            Ok(file) => (file, true),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                (OpenOptions::new().read(true).write(true).open(path)?, false)
            },
            Err(err) => return Err(err),
        };

        let len = REGION_SIZE;
        if file.metadata()?.len() < len as u64 {
            file.set_len(len as u64)?;
        }

        // SAFETY: a fresh shared mapping of an open descriptor; the kernel
        // picks the address.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;

        debug!(path = %path.display(), len, created = owns_file, "mapped shared region");
        Ok(Self { ptr, len, _file: file, path: path.to_path_buf(), owns_file, lock: Mutex::new(()) })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SharedRegion for MappedRegion {
    fn with_memory<T>(&self, f: impl FnOnce(&mut SharedMemory) -> T) -> T {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: the mapping is page aligned, exactly `size_of::<SharedMemory>()`
        // bytes long and lives as long as `self`. Every bit pattern is a valid
        // `SharedMemory`. The lock keeps threads of this process from aliasing
        // the reference; the other process only touches a page after the
        // signal hand-off gives it up.
        let memory = unsafe { &mut *self.ptr.as_ptr().cast::<SharedMemory>() };
        f(memory)
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr` and `len` describe the mapping created in
        // `open_or_create`, and no reference into it outlives `with_memory`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len);
        }

        if self.owns_file {
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %err, "failed to remove shared region");
            }
        }
    }
}

// SAFETY: the mapping is valid for the lifetime of the region and all access
// from this process goes through the mutex in `with_memory`.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}
