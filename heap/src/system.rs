//! Anonymous page mappings for the semispaces.
//!
//! The collector wants large, page-aligned, zero-filled regions whose
//! lifetime it controls, which is exactly what anonymous `mmap` gives.
//! The two syscalls are declared directly so the crate stays
//! dependency-free.

use std::ptr::NonNull;

pub const OS_PAGE_SIZE: usize = 4096;

#[cfg(unix)]
mod sys {
    use core::ffi::c_void;

    const PROT_READ: i32 = 0x1;
    const PROT_WRITE: i32 = 0x2;
    const MAP_PRIVATE: i32 = 0x02;
    #[cfg(target_os = "linux")]
    const MAP_ANON: i32 = 0x20;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    const MAP_ANON: i32 = 0x1000;

    extern "C" {
        fn mmap(
            addr: *mut c_void,
            length: usize,
            prot: i32,
            flags: i32,
            fd: i32,
            offset: isize,
        ) -> *mut c_void;

        fn munmap(addr: *mut c_void, length: usize) -> i32;
    }

    /// Map `size` bytes of private, anonymous, read-write memory.
    pub fn reserve(size: usize) -> Option<*mut u8> {
        // SAFETY: anonymous private mapping with no fd and no fixed
        // address; the kernel picks the placement.
        let page = unsafe {
            mmap(
                core::ptr::null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANON,
                -1,
                0,
            )
        };
        if page as isize == -1 {
            None
        } else {
            Some(page as *mut u8)
        }
    }

    /// # Safety
    ///
    /// `ptr` and `size` must describe a mapping returned by [`reserve`].
    pub unsafe fn release(ptr: *mut u8, size: usize) {
        let _ = munmap(ptr.cast(), size);
    }
}

/// Map a semispace-sized region. `size` must be a page multiple.
#[must_use]
pub fn map_memory(size: usize) -> Option<NonNull<u8>> {
    debug_assert!(size % OS_PAGE_SIZE == 0);
    sys::reserve(size).and_then(NonNull::new)
}

/// Return a region to the OS.
pub fn unmap_memory(ptr: NonNull<u8>, size: usize) {
    // SAFETY: the heap only hands back regions it mapped itself.
    unsafe { sys::release(ptr.as_ptr(), size) };
}
