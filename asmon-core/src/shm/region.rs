//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Create-or-attach semantics: the first process to open a name creates and
//! zero-fills the object, later processes map the same pages. All unsafe
//! operations are encapsulated here.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::StoreError;

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and will unmap it on drop. The process that
/// created the object also unlinks the name on drop.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object (without leading slash).
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// Whether this instance created the SHM (and should unlink on drop).
    is_owner: bool,
}

// SAFETY: SharedMemoryRegion owns its mapping; moving it between threads
// moves nothing but the pointer.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: The region hands out raw pointers only. Callers access the pages
// through atomic types, which are sound under concurrent access.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Open the named region, creating it if it does not exist yet.
    ///
    /// # Errors
    /// Returns `StoreError::StoreUnavailable` if the object cannot be
    /// created, sized or mapped, or if an existing object is smaller than
    /// `size`.
    pub fn open_or_create(name: &str, size: usize) -> Result<Self, StoreError> {
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            return Err(unavailable(name, "Name cannot be empty".to_string()));
        }
        if size == 0 {
            return Err(unavailable(name, "Size cannot be zero".to_string()));
        }

        let c_name = CString::new(format!("/{}", name))
            .map_err(|e| unavailable(name, format!("Invalid name: {}", e)))?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let mut fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o666,
            )
        };
        let created = fd >= 0;

        if created {
            // Producers may run as a different user than the server; the
            // mode passed to shm_open is filtered by the umask.
            // SAFETY: fd is a valid file descriptor
            unsafe { libc::fchmod(fd, 0o666) };
        } else {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() != Some(libc::EEXIST) {
                return Err(unavailable(name, format!("shm_open failed: {}", errno)));
            }
            // SAFETY: c_name is a valid CString
            fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
            if fd < 0 {
                return Err(unavailable(
                    name,
                    format!("shm_open failed: {}", std::io::Error::last_os_error()),
                ));
            }
        }

        let cleanup = |fd: i32| {
            // SAFETY: fd is open and owned by this function
            unsafe { libc::close(fd) };
            if created {
                // SAFETY: c_name is a valid CString
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
            }
        };

        // SAFETY: all-zero is a valid bit pattern for libc::stat
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is valid and stat is writable
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let errno = std::io::Error::last_os_error();
            cleanup(fd);
            return Err(unavailable(name, format!("fstat failed: {}", errno)));
        }

        let current = stat.st_size as usize;
        if current != 0 && current < size {
            cleanup(fd);
            return Err(unavailable(
                name,
                format!("Existing object is {} bytes, need {}", current, size),
            ));
        }
        if current == 0 {
            // A zero size also covers an attacher racing the creator.
            // SAFETY: fd is a valid file descriptor
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } < 0 {
                let errno = std::io::Error::last_os_error();
                cleanup(fd);
                return Err(unavailable(name, format!("ftruncate failed: {}", errno)));
            }
        }

        // SAFETY: fd is valid, size is non-zero, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            cleanup(fd);
            return Err(unavailable(name, format!("mmap failed: {}", errno)));
        }

        let Some(ptr) = NonNull::new(ptr as *mut u8) else {
            cleanup(fd);
            return Err(unavailable(name, "mmap returned null".to_string()));
        };

        if created {
            // SAFETY: ptr is valid for size bytes and nobody else has
            // attached to a name we only just created
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, size) };
            tracing::info!(name = %name, size = size, "Shared memory initialized");
        } else {
            tracing::debug!(name = %name, size = size, "Attached to existing shared memory");
        }

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
            is_owner: created,
        })
    }

    /// OS page size, the stride of one slot.
    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this process created the object.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Get a raw pointer to the shared memory.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };

        if self.is_owner {
            if let Ok(c_name) = CString::new(format!("/{}", self.name)) {
                // SAFETY: c_name is a valid CString
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                tracing::debug!(name = %self.name, "Unlinked shared memory region");
            }
        }
    }
}

fn unavailable(name: &str, reason: String) -> StoreError {
    StoreError::StoreUnavailable {
        name: name.to_string(),
        reason,
    }
}
