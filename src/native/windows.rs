//! [`SecurityApi`] backed by the Win32 security functions.

mod account_lookup;
mod token_information;

use core::ffi::c_void;
use core::mem::MaybeUninit;
use core::{ptr, slice};

use parsing::{MAX_BINARY_SIZE, SidComponents};
use windows_sys::Win32::{
    Foundation::{CloseHandle, GetLastError, HANDLE},
    Security::{
        DuplicateToken, ImpersonateLoggedOnUser, IsWellKnownSid, RevertToSelf,
        SECURITY_IMPERSONATION_LEVEL, SID_AND_ATTRIBUTES, TOKEN_GROUPS, TOKEN_USER, TokenGroups, TokenUser,
    },
};

use self::account_lookup::account_from_sid;
use self::token_information::TokenInformation;
use super::{ImpersonationLevel, RawToken, SecurityApi};
use crate::{Account, NativeError, WellKnownSid};

/// The Win32 security subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Win32;

impl From<HANDLE> for RawToken {
    #[inline]
    fn from(handle: HANDLE) -> Self {
        Self::new(handle.expose_provenance())
    }
}

impl From<RawToken> for HANDLE {
    #[inline]
    fn from(token: RawToken) -> Self {
        ptr::with_exposed_provenance_mut::<c_void>(token.value())
    }
}

fn check(ok: i32) -> Result<(), NativeError> {
    if ok == 0 {
        // SAFETY: GetLastError can be called immediately after a failing FFI call.
        Err(unsafe { GetLastError() }.into())
    } else {
        Ok(())
    }
}

impl SecurityApi for Win32 {
    fn resolve_account(&self, token: RawToken) -> Result<Account, NativeError> {
        let info = TokenInformation::query(token.into(), TokenUser)?;
        // SAFETY: the buffer was filled for the `TokenUser` class.
        let user = unsafe { info.as_ref::<TOKEN_USER>() };
        account_from_sid(user.User.Sid, false)
    }

    fn resolve_groups(&self, token: RawToken) -> Result<Vec<Account>, NativeError> {
        let info = TokenInformation::query(token.into(), TokenGroups)?;
        let groups = info.as_ptr::<TOKEN_GROUPS>();
        // SAFETY: the buffer was filled for the `TokenGroups` class.
        let count = unsafe { (*groups).GroupCount } as usize;
        // SAFETY: pointer derived from the whole buffer, no reference is created.
        let first = unsafe { ptr::addr_of!((*groups).Groups) }.cast::<SID_AND_ATTRIBUTES>();
        // SAFETY: `Groups` is a variable-length array of `GroupCount` entries
        // laid out inside the same buffer.
        let entries = unsafe { slice::from_raw_parts(first, count) };
        entries
            .iter()
            .map(|entry| account_from_sid(entry.Sid, true))
            .collect()
    }

    fn is_well_known_sid(&self, sid: &[u8], kind: WellKnownSid) -> bool {
        if SidComponents::from_binary(sid).is_err() {
            return false;
        }
        // Copied into aligned storage, the API reads the sub-authorities as u32.
        let mut aligned = [0u32; MAX_BINARY_SIZE / 4];
        // SAFETY: `aligned` spans MAX_BINARY_SIZE bytes and a validated SID never exceeds that.
        unsafe {
            ptr::copy_nonoverlapping(sid.as_ptr(), aligned.as_mut_ptr().cast::<u8>(), sid.len());
        }
        // SAFETY: `aligned` holds a structurally valid SID.
        unsafe { IsWellKnownSid(aligned.as_mut_ptr().cast(), kind.into()) != 0 }
    }

    fn duplicate_token(
        &self,
        token: RawToken,
        level: ImpersonationLevel,
    ) -> Result<RawToken, NativeError> {
        let mut duplicate: MaybeUninit<HANDLE> = MaybeUninit::uninit();
        let level: SECURITY_IMPERSONATION_LEVEL = level.into();
        // SAFETY: FFI call; the out pointer is valid. We check the return value immediately.
        check(unsafe { DuplicateToken(token.into(), level, duplicate.as_mut_ptr()) })?;
        // SAFETY: DuplicateToken reported success; the handle is initialized.
        Ok(unsafe { duplicate.assume_init() }.into())
    }

    fn close_handle(&self, token: RawToken) -> Result<(), NativeError> {
        // SAFETY: the caller owns `token` and never uses it again.
        check(unsafe { CloseHandle(token.into()) })
    }

    fn begin_impersonation(&self, token: RawToken) -> Result<(), NativeError> {
        // SAFETY: plain FFI call on a token handle value.
        check(unsafe { ImpersonateLoggedOnUser(token.into()) })
    }

    fn end_impersonation(&self) -> Result<(), NativeError> {
        // SAFETY: RevertToSelf has no preconditions.
        check(unsafe { RevertToSelf() })
    }
}
