use core::ffi::c_void;
use core::ptr::{null, null_mut};
use core::slice;

use smallvec::{SmallVec, smallvec};
use widestring::U16CStr;
use windows_sys::Win32::{
    Foundation::{GetLastError, LocalFree},
    Security::{Authorization::ConvertSidToStringSidW, GetLengthSid, LookupAccountSidW, PSID},
};

use crate::error::codes::ERROR_INSUFFICIENT_BUFFER;
use crate::{Account, DomainAndName, NativeError};

/// Builds the [`Account`] of a SID owned by a token information buffer.
///
/// SIDs the system cannot map to a name (`ERROR_NONE_MAPPED`) are reported
/// under their textual SID when `unmapped_as_sid` is set.
pub(super) fn account_from_sid(sid: PSID, unmapped_as_sid: bool) -> Result<Account, NativeError> {
    let sid_bytes = sid_bytes(sid);
    let sid_string = sid_string(sid)?;
    let fqn = match lookup_fqn(sid) {
        Ok(fqn) => fqn,
        Err(NativeError::NoneMapped) if unmapped_as_sid => sid_string.clone(),
        Err(err) => return Err(err),
    };
    Ok(Account::new(fqn, sid_bytes, sid_string))
}

fn sid_bytes(sid: PSID) -> Vec<u8> {
    // SAFETY: `sid` points to a valid SID provided by GetTokenInformation.
    let len = unsafe { GetLengthSid(sid) } as usize;
    // SAFETY: a valid SID spans exactly `GetLengthSid` bytes.
    unsafe { slice::from_raw_parts(sid.cast::<u8>().cast_const(), len) }.to_vec()
}

fn sid_string(sid: PSID) -> Result<String, NativeError> {
    let mut wide: *mut u16 = null_mut();
    // SAFETY: `sid` is valid and `wide` is a valid out-parameter; on success it
    // receives a NUL-terminated buffer allocated with LocalAlloc.
    let ok = unsafe { ConvertSidToStringSidW(sid, &raw mut wide) };
    if ok == 0 {
        // SAFETY: GetLastError can be called immediately after a failing FFI call.
        return Err(unsafe { GetLastError() }.into());
    }
    // SAFETY: success guarantees a valid NUL-terminated UTF-16 string.
    let text = unsafe { U16CStr::from_ptr_str(wide) }.to_string_lossy();
    // SAFETY: the buffer was allocated by the system, freed exactly once here.
    unsafe {
        LocalFree(wide.cast::<c_void>());
    }
    Ok(text)
}

/// `LookupAccountSidW` on the local machine, growing the buffers until they fit.
fn lookup_fqn(sid: PSID) -> Result<String, NativeError> {
    let mut name_len = 0u32;
    let mut domain_len = 0u32;
    let mut sid_type_raw = 0i32;
    loop {
        let mut name_buffer: SmallVec<[u16; 256]> = smallvec![0; name_len as usize];
        let mut domain_buffer: SmallVec<[u16; 256]> = smallvec![0; domain_len as usize];
        // SAFETY: buffers hold `name_len`/`domain_len` code units as announced to the API.
        let result = unsafe {
            LookupAccountSidW(
                null(),
                sid,
                if name_len == 0 { null_mut() } else { name_buffer.as_mut_ptr() },
                &raw mut name_len,
                if domain_len == 0 { null_mut() } else { domain_buffer.as_mut_ptr() },
                &raw mut domain_len,
                &raw mut sid_type_raw,
            )
        };
        if result != 0 {
            // On success the lengths exclude the terminating NUL.
            name_buffer.truncate(name_len as usize);
            domain_buffer.truncate(domain_len as usize);
            let name = String::from_utf16_lossy(&name_buffer);
            let domain = String::from_utf16_lossy(&domain_buffer);
            return Ok(DomainAndName::new(domain, name).to_string());
        }
        // SAFETY: GetLastError can be called immediately after a failing FFI call.
        let err = unsafe { GetLastError() };
        if err != ERROR_INSUFFICIENT_BUFFER {
            return Err(err.into());
        }
    }
}
