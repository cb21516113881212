//! Error types: raw Win32 codes reported by the native layer and the crate [`Error`].

use core::fmt::{self, Display};

use thiserror::Error;

/// Win32 error codes given a name in [`NativeError`].
pub mod codes {
    /// `ERROR_ACCESS_DENIED`
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    /// `ERROR_INVALID_HANDLE`
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    /// `ERROR_NOT_ENOUGH_MEMORY`
    pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
    /// `ERROR_INVALID_PARAMETER`
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    /// `ERROR_INSUFFICIENT_BUFFER`
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    /// `ERROR_NO_IMPERSONATION_TOKEN`
    pub const ERROR_NO_IMPERSONATION_TOKEN: u32 = 1309;
    /// `ERROR_NONE_MAPPED`
    pub const ERROR_NONE_MAPPED: u32 = 1332;
    /// `ERROR_BAD_IMPERSONATION_LEVEL`
    pub const ERROR_BAD_IMPERSONATION_LEVEL: u32 = 1346;
}

use codes::{
    ERROR_ACCESS_DENIED, ERROR_BAD_IMPERSONATION_LEVEL, ERROR_INVALID_HANDLE,
    ERROR_INVALID_PARAMETER, ERROR_NO_IMPERSONATION_TOKEN, ERROR_NONE_MAPPED,
    ERROR_NOT_ENOUGH_MEMORY,
};

/// Failure reported by the native security subsystem, keyed by its Win32 error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NativeError {
    /// The caller lacks the rights for the operation.
    #[error("access denied (error 5)")]
    AccessDenied,
    /// The token handle is not valid (closed or never opened).
    #[error("invalid handle (error 6)")]
    InvalidHandle,
    /// The system ran out of memory or handles.
    #[error("not enough memory (error 8)")]
    NotEnoughMemory,
    /// One or more parameters are invalid.
    #[error("invalid parameter (error 87)")]
    InvalidParameter,
    /// A primary token was used where an impersonation token is required.
    #[error("no impersonation token (error 1309)")]
    NoImpersonationToken,
    /// The SID is not mapped to any account.
    #[error("no mapping between account names and security IDs (error 1332)")]
    NoneMapped,
    /// The requested impersonation level is not allowed for this token.
    #[error("bad impersonation level (error 1346)")]
    BadImpersonationLevel,
    /// Any other Win32 error code.
    #[error("win32 error {0}")]
    Other(u32),
}

impl NativeError {
    /// The Win32 error code.
    #[inline]
    #[must_use]
    pub fn code(self) -> u32 {
        self.into()
    }
}

impl From<u32> for NativeError {
    #[inline]
    fn from(code: u32) -> Self {
        match code {
            ERROR_ACCESS_DENIED => Self::AccessDenied,
            ERROR_INVALID_HANDLE => Self::InvalidHandle,
            ERROR_NOT_ENOUGH_MEMORY => Self::NotEnoughMemory,
            ERROR_INVALID_PARAMETER => Self::InvalidParameter,
            ERROR_NO_IMPERSONATION_TOKEN => Self::NoImpersonationToken,
            ERROR_NONE_MAPPED => Self::NoneMapped,
            ERROR_BAD_IMPERSONATION_LEVEL => Self::BadImpersonationLevel,
            other => Self::Other(other),
        }
    }
}

impl From<NativeError> for u32 {
    #[inline]
    fn from(error: NativeError) -> Self {
        match error {
            NativeError::AccessDenied => ERROR_ACCESS_DENIED,
            NativeError::InvalidHandle => ERROR_INVALID_HANDLE,
            NativeError::NotEnoughMemory => ERROR_NOT_ENOUGH_MEMORY,
            NativeError::InvalidParameter => ERROR_INVALID_PARAMETER,
            NativeError::NoImpersonationToken => ERROR_NO_IMPERSONATION_TOKEN,
            NativeError::NoneMapped => ERROR_NONE_MAPPED,
            NativeError::BadImpersonationLevel => ERROR_BAD_IMPERSONATION_LEVEL,
            NativeError::Other(other) => other,
        }
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<NativeError> for windows_result::HRESULT {
    #[inline]
    fn from(value: NativeError) -> Self {
        Self::from_win32(value.code())
    }
}

#[cfg(all(windows, feature = "windows_result"))]
impl From<NativeError> for windows_result::Error {
    #[inline]
    fn from(value: NativeError) -> Self {
        let hresult: windows_result::HRESULT = value.into();
        Self::from_hresult(hresult)
    }
}

/// Which cached fact a failed resolution was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The token user account.
    Account,
    /// The token group list.
    Groups,
}

impl Display for Resolution {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => f.write_str("account"),
            Self::Groups => f.write_str("groups"),
        }
    }
}

/// Errors returned by [`Identity`](crate::Identity) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Resolving the token account or groups failed. Nothing is cached, a later call asks again.
    #[error("failed to resolve token {what}: {source}")]
    NativeResolution {
        /// What was being resolved.
        what: Resolution,
        /// Native failure.
        #[source]
        source: NativeError,
    },
    /// Duplicating the token failed.
    #[error("token duplication failed: {0}")]
    NativeOperation(#[source] NativeError),
    /// Switching the thread to the token security context failed.
    #[error("impersonation failed: {0}")]
    Impersonation(#[source] NativeError),
    /// An impersonation is already active on the calling thread.
    #[error("an impersonation is already active on this thread")]
    ImpersonationActive,
    /// The identity token was disposed (or never set) and the value is not cached.
    #[error("the identity token has been disposed")]
    UseAfterDispose,
}

impl Error {
    /// The native code behind this error, if any.
    #[inline]
    #[must_use]
    pub const fn native(&self) -> Option<NativeError> {
        match self {
            Self::NativeResolution { source, .. } => Some(*source),
            Self::NativeOperation(source) | Self::Impersonation(source) => Some(*source),
            Self::ImpersonationActive | Self::UseAfterDispose => None,
        }
    }

    /// The Win32 error code behind this error, if any.
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        self.native().map(NativeError::code)
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
