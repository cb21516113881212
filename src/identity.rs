use core::fmt::{self, Debug};
use std::sync::Arc;

use crate::impersonation::ImpersonationContext;
use crate::resolve_once::ResolveOnce;
use crate::{
    Account, Error, ImpersonationLevel, OwnedToken, RawToken, Resolution, Result, SecurityApi,
    classify,
};

/// Identity behind a Windows security token.
///
/// Owns the token and closes it on [`dispose`](Self::dispose) or drop. The
/// user account and the group list are each resolved through `A` at most
/// once, on first use, and then served from cache. Resolution is safe to
/// race from several threads: the first caller resolves, the others wait
/// for its result.
///
/// # Examples
/// ```no_run
/// # #[cfg(windows)]
/// # fn demo(handle: std::os::windows::io::RawHandle) -> win_security_identity::Result<()> {
/// use std::os::windows::io::FromRawHandle;
/// use win_security_identity::{Identity, Win32};
///
/// // SAFETY: `handle` is an open token handle nobody else closes.
/// let identity = unsafe { Identity::<Win32>::from_raw_handle(handle) };
/// println!("{} ({})", identity.fqn()?, identity.sid_string()?);
/// if !identity.is_guest()? {
///     identity.run_as(|| {
///         // Runs under the token's security context.
///     })?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Identity<A: SecurityApi + Clone> {
    api: A,
    token: Option<OwnedToken<A>>,
    account: ResolveOnce<Account>,
    groups: ResolveOnce<Vec<Account>>,
}

impl<A: SecurityApi + Clone> Identity<A> {
    /// Wraps `raw`, taking ownership of it. A null `raw` gives an identity
    /// with no token, every resolution then fails with [`Error::UseAfterDispose`].
    ///
    /// # Safety
    /// A non-null `raw` must be an open token that nothing else closes.
    #[inline]
    pub unsafe fn from_raw(api: A, raw: RawToken) -> Self {
        let token = (!raw.is_null()).then(|| {
            // SAFETY: non-null, ownership is transferred by the caller.
            unsafe { OwnedToken::from_raw(api.clone(), raw) }
        });
        Self {
            api,
            token,
            account: ResolveOnce::new(),
            groups: ResolveOnce::new(),
        }
    }

    /// The native backend.
    #[inline]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// The owned token handle, `None` once disposed.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> Option<RawToken> {
        self.token.as_ref().map(OwnedToken::as_raw)
    }

    /// Releases the token without closing it.
    #[inline]
    #[must_use]
    pub fn into_raw(mut self) -> Option<RawToken> {
        self.token.take().map(OwnedToken::into_raw)
    }

    /// Returns `true` once the token is gone.
    #[inline]
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.token.is_none()
    }

    fn live_token(&self) -> Result<RawToken> {
        self.as_raw().ok_or(Error::UseAfterDispose)
    }

    fn cached_account(&self) -> Result<Arc<Account>> {
        self.account.get_or_try_resolve(|| {
            let token = self.live_token()?;
            tracing::debug!(?token, "resolving token account");
            self.api
                .resolve_account(token)
                .map_err(|source| Error::NativeResolution {
                    what: Resolution::Account,
                    source,
                })
        })
    }

    fn cached_groups(&self) -> Result<Arc<Vec<Account>>> {
        self.groups.get_or_try_resolve(|| {
            let token = self.live_token()?;
            tracing::debug!(?token, "resolving token groups");
            self.api
                .resolve_groups(token)
                .map_err(|source| Error::NativeResolution {
                    what: Resolution::Groups,
                    source,
                })
        })
    }

    /// The token user account.
    ///
    /// # Errors
    /// [`Error::NativeResolution`] if the lookup fails, [`Error::UseAfterDispose`]
    /// if the token is gone and the account was never resolved.
    #[inline]
    pub fn account(&self) -> Result<Account> {
        self.cached_account().map(|account| (*account).clone())
    }

    /// Fully-qualified name, `DOMAIN\user`.
    ///
    /// # Errors
    /// See [`account`](Self::account).
    #[inline]
    pub fn fqn(&self) -> Result<String> {
        self.cached_account().map(|account| account.fqn().to_owned())
    }

    /// Binary SID of the user.
    ///
    /// # Errors
    /// See [`account`](Self::account).
    #[inline]
    pub fn sid(&self) -> Result<Vec<u8>> {
        self.cached_account().map(|account| account.sid().to_vec())
    }

    /// Textual SID of the user.
    ///
    /// # Errors
    /// See [`account`](Self::account).
    #[inline]
    pub fn sid_string(&self) -> Result<String> {
        self.cached_account()
            .map(|account| account.sid_string().to_owned())
    }

    /// The token groups, as a copy the caller is free to modify.
    ///
    /// # Errors
    /// [`Error::NativeResolution`] if the lookup fails, [`Error::UseAfterDispose`]
    /// if the token is gone and the groups were never resolved.
    #[inline]
    pub fn groups(&self) -> Result<Vec<Account>> {
        self.cached_groups().map(|groups| (*groups).clone())
    }

    /// Whether the identity is a guest: member of a guest group, or the anonymous principal.
    ///
    /// The user account is only resolved when no group decides it.
    ///
    /// # Errors
    /// Resolution errors, see [`groups`](Self::groups) and [`account`](Self::account).
    #[inline]
    pub fn is_guest(&self) -> Result<bool> {
        let groups = self.cached_groups()?;
        classify::is_guest(&self.api, groups.as_slice(), || {
            self.cached_account().map(|account| account.sid().to_vec())
        })
    }

    /// Closes the token. Cached facts stay readable, anything else fails
    /// with [`Error::UseAfterDispose`]. Calling it again is a no-op.
    #[inline]
    pub fn dispose(&mut self) {
        if let Some(token) = self.token.take() {
            tracing::debug!(token = ?token.as_raw(), "disposing identity");
        }
    }

    /// Runs the calling thread under this identity until the returned context is dropped.
    ///
    /// # Errors
    /// [`Error::Impersonation`] when the native switch fails,
    /// [`Error::ImpersonationActive`] when the thread already impersonates,
    /// [`Error::UseAfterDispose`] when the token is gone.
    #[inline]
    pub fn impersonate(&self) -> Result<ImpersonationContext<'_, A>> {
        let token = self.live_token()?;
        ImpersonationContext::begin(&self.api, token)
    }

    /// Runs `f` under this identity and reverts afterwards, also if `f` panics.
    ///
    /// # Errors
    /// See [`impersonate`](Self::impersonate).
    #[inline]
    pub fn run_as<R, F: FnOnce() -> R>(&self, f: F) -> Result<R> {
        let _context = self.impersonate()?;
        Ok(f())
    }

    /// Duplicates the token at [`ImpersonationLevel::Impersonation`].
    ///
    /// # Errors
    /// See [`duplicate_with_level`](Self::duplicate_with_level).
    #[inline]
    pub fn duplicate(&self) -> Result<Self> {
        self.duplicate_with_level(ImpersonationLevel::Impersonation)
    }

    /// Duplicates the token at `level`. The new identity owns its own token
    /// and starts with empty caches.
    ///
    /// # Errors
    /// [`Error::NativeOperation`] with the native code when duplication fails,
    /// [`Error::UseAfterDispose`] when the token is gone.
    #[inline]
    pub fn duplicate_with_level(&self, level: ImpersonationLevel) -> Result<Self> {
        let token = self.live_token()?;
        let duplicate = self
            .api
            .duplicate_token(token, level)
            .map_err(Error::NativeOperation)?;
        tracing::debug!(?token, ?duplicate, ?level, "token duplicated");
        // SAFETY: the native layer hands over a fresh token that only we own.
        Ok(unsafe { Self::from_raw(self.api.clone(), duplicate) })
    }
}

impl<A: SecurityApi + Clone> Debug for Identity<A> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &self.as_raw())
            .field("account", &self.account.get())
            .field("groups_resolved", &self.groups.is_resolved())
            .finish_non_exhaustive()
    }
}

#[cfg(windows)]
mod windows {
    use std::os::windows::io::{FromRawHandle, IntoRawHandle, RawHandle};

    use super::Identity;
    use crate::{RawToken, Win32};

    impl FromRawHandle for Identity<Win32> {
        #[inline]
        unsafe fn from_raw_handle(handle: RawHandle) -> Self {
            // SAFETY: same contract as `FromRawHandle::from_raw_handle`.
            unsafe { Self::from_raw(Win32, RawToken::from(handle)) }
        }
    }

    impl IntoRawHandle for Identity<Win32> {
        #[inline]
        fn into_raw_handle(self) -> RawHandle {
            self.into_raw().unwrap_or(RawToken::NULL).into()
        }
    }
}
