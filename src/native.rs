//! Boundary to the native security subsystem.
//!
//! Everything the crate needs from the operating system goes through
//! [`SecurityApi`]. Tokens cross that boundary as [`RawToken`] values and are
//! owned on this side by [`OwnedToken`], which closes them exactly once.

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::Win32;

use core::fmt::{self, Debug};
use core::mem::ManuallyDrop;
use core::ptr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{Account, NativeError, WellKnownSid};

/// Raw, non-owning token handle value.
///
/// This is an opaque copy of the OS handle: holding one neither keeps the
/// token open nor closes it. Ownership lives in [`OwnedToken`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawToken(usize);

impl RawToken {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Wraps a raw handle value.
    #[inline]
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    /// The handle value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> usize {
        self.0
    }

    /// Returns `true` for the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Debug for RawToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawToken({:#x})", self.0)
    }
}

/// Rust representation of `SECURITY_IMPERSONATION_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum ImpersonationLevel {
    /// The server cannot obtain identification information about the client.
    Anonymous = 0,
    /// The server can identify the client but not act as it.
    Identification = 1,
    /// The server can act as the client on the local system.
    #[default]
    Impersonation = 2,
    /// The server can act as the client on remote systems too.
    Delegation = 3,
}

/// Capabilities required from the native security subsystem.
///
/// All calls are synchronous. `begin_impersonation` and `end_impersonation`
/// act on the calling thread and must be paired on that thread.
pub trait SecurityApi {
    /// Resolves the user account of `token`.
    ///
    /// # Errors
    /// The native error when the handle is invalid or not authorized.
    fn resolve_account(&self, token: RawToken) -> Result<Account, NativeError>;

    /// Resolves the group accounts of `token`, in token order.
    ///
    /// # Errors
    /// The native error when the handle is invalid or not authorized.
    fn resolve_groups(&self, token: RawToken) -> Result<Vec<Account>, NativeError>;

    /// Returns `true` when the binary `sid` has the `kind` classification.
    #[inline]
    fn is_well_known_sid(&self, sid: &[u8], kind: WellKnownSid) -> bool {
        kind.matches(sid)
    }

    /// Creates a new token from `token` at `level`.
    ///
    /// # Errors
    /// The native error on denial or exhaustion.
    fn duplicate_token(
        &self,
        token: RawToken,
        level: ImpersonationLevel,
    ) -> Result<RawToken, NativeError>;

    /// Closes `token`.
    ///
    /// # Errors
    /// The native error; callers treat it as best effort.
    fn close_handle(&self, token: RawToken) -> Result<(), NativeError>;

    /// Runs the calling thread under the security context of `token`.
    ///
    /// # Errors
    /// The native error when the switch is refused.
    fn begin_impersonation(&self, token: RawToken) -> Result<(), NativeError>;

    /// Returns the calling thread to its own security context.
    ///
    /// # Errors
    /// The native error when reverting fails.
    fn end_impersonation(&self) -> Result<(), NativeError>;
}

impl<A: SecurityApi + ?Sized> SecurityApi for &A {
    #[inline]
    fn resolve_account(&self, token: RawToken) -> Result<Account, NativeError> {
        (**self).resolve_account(token)
    }
    #[inline]
    fn resolve_groups(&self, token: RawToken) -> Result<Vec<Account>, NativeError> {
        (**self).resolve_groups(token)
    }
    #[inline]
    fn is_well_known_sid(&self, sid: &[u8], kind: WellKnownSid) -> bool {
        (**self).is_well_known_sid(sid, kind)
    }
    #[inline]
    fn duplicate_token(
        &self,
        token: RawToken,
        level: ImpersonationLevel,
    ) -> Result<RawToken, NativeError> {
        (**self).duplicate_token(token, level)
    }
    #[inline]
    fn close_handle(&self, token: RawToken) -> Result<(), NativeError> {
        (**self).close_handle(token)
    }
    #[inline]
    fn begin_impersonation(&self, token: RawToken) -> Result<(), NativeError> {
        (**self).begin_impersonation(token)
    }
    #[inline]
    fn end_impersonation(&self) -> Result<(), NativeError> {
        (**self).end_impersonation()
    }
}

/// Exclusively owned token handle, closed exactly once when dropped.
pub struct OwnedToken<A: SecurityApi> {
    raw: RawToken,
    api: A,
}

impl<A: SecurityApi> OwnedToken<A> {
    /// Takes ownership of `raw`.
    ///
    /// # Safety
    /// `raw` must be an open, non-null token that nothing else closes. It is
    /// closed through `api` when the returned value is dropped.
    #[inline]
    pub const unsafe fn from_raw(api: A, raw: RawToken) -> Self {
        Self { raw, api }
    }

    /// The handle value, still owned by `self`.
    #[inline]
    #[must_use]
    pub const fn as_raw(&self) -> RawToken {
        self.raw
    }

    /// Gives up ownership without closing the handle.
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> RawToken {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so `api` is read out exactly once and dropped here.
        drop(unsafe { ptr::read(&this.api) });
        this.raw
    }
}

impl<A: SecurityApi> Debug for OwnedToken<A> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedToken").field(&self.raw).finish()
    }
}

impl<A: SecurityApi> Drop for OwnedToken<A> {
    fn drop(&mut self) {
        match self.api.close_handle(self.raw) {
            Ok(()) => tracing::debug!(token = ?self.raw, "token closed"),
            Err(err) => tracing::warn!(token = ?self.raw, code = err.code(), "failed to close token: {err}"),
        }
    }
}
