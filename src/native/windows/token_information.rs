use core::mem::size_of;
use core::ptr;

use windows_sys::Win32::{
    Foundation::{GetLastError, HANDLE},
    Security::{GetTokenInformation, TOKEN_INFORMATION_CLASS},
};

use crate::NativeError;
use crate::error::codes::ERROR_INSUFFICIENT_BUFFER;

/// `GetTokenInformation` output, stored in pointer-aligned memory so the
/// structures it holds (`TOKEN_USER`, `TOKEN_GROUPS`) can be read in place.
pub(super) struct TokenInformation {
    buffer: Vec<usize>,
}

impl TokenInformation {
    /// Queries `class` for `token` with the usual size-probe-then-fill pattern.
    pub(super) fn query(token: HANDLE, class: TOKEN_INFORMATION_CLASS) -> Result<Self, NativeError> {
        let mut size: u32 = 0;
        // SAFETY: Standard size-query pattern with null buffer and 0 length.
        let first_ok =
            unsafe { GetTokenInformation(token, class, ptr::null_mut(), 0, &raw mut size) };
        if first_ok != 0 {
            // Nothing to read: the probe cannot succeed for variable-size classes.
            return Err(NativeError::InvalidParameter);
        }
        // SAFETY: GetLastError can be called immediately after a failing FFI call.
        let err = unsafe { GetLastError() };
        if err != ERROR_INSUFFICIENT_BUFFER {
            return Err(err.into());
        }

        let words = (size as usize).div_ceil(size_of::<usize>());
        let mut buffer = vec![0usize; words];
        // SAFETY: Buffer pointer/length are consistent with the allocation; size was set by the API.
        let second_ok = unsafe {
            GetTokenInformation(
                token,
                class,
                buffer.as_mut_ptr().cast(),
                size,
                &raw mut size,
            )
        };
        if second_ok == 0 {
            // SAFETY: GetLastError can be called immediately after a failing FFI call.
            return Err(unsafe { GetLastError() }.into());
        }
        Ok(Self { buffer })
    }

    /// Start of the buffer as a `T` pointer, valid for the whole buffer.
    pub(super) fn as_ptr<T>(&self) -> *const T {
        self.buffer.as_ptr().cast::<T>()
    }

    /// Views the buffer as `T`.
    ///
    /// # Safety
    /// `T` must be the structure matching the queried class.
    pub(super) unsafe fn as_ref<T>(&self) -> &T {
        // SAFETY: pointer-aligned buffer filled by the API with a `T` header (caller contract).
        unsafe { &*self.as_ptr::<T>() }
    }
}
