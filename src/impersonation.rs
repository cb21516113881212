use core::cell::Cell;
use core::fmt::{self, Debug};
use core::marker::PhantomData;

use crate::{Error, RawToken, Result, SecurityApi};

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Returns `true` while an impersonation started by this crate is active on the calling thread.
#[inline]
#[must_use]
pub fn is_impersonating() -> bool {
    ACTIVE.get()
}

/// Scope during which the current thread runs under a token's security context.
///
/// Created by [`Identity::impersonate`](crate::Identity::impersonate). The
/// thread is reverted to its own context when the value is dropped, on normal
/// return as well as during a panic unwind. The guard is neither `Send` nor
/// `Sync`: it can only be released by the thread that activated it.
///
/// Only one impersonation may be active per thread.
///
/// # Aborts
/// If the native revert fails the process is aborted, since the thread would
/// otherwise keep running under the foreign identity.
#[must_use = "the impersonation ends as soon as the context is dropped"]
pub struct ImpersonationContext<'a, A: SecurityApi> {
    api: &'a A,
    token: RawToken,
    _not_send: PhantomData<*const ()>,
}

impl<'a, A: SecurityApi> ImpersonationContext<'a, A> {
    pub(crate) fn begin(api: &'a A, token: RawToken) -> Result<Self> {
        if is_impersonating() {
            return Err(Error::ImpersonationActive);
        }
        api.begin_impersonation(token)
            .map_err(Error::Impersonation)?;
        ACTIVE.set(true);
        tracing::debug!(?token, "impersonation started");
        Ok(Self {
            api,
            token,
            _not_send: PhantomData,
        })
    }

    /// The token the thread is running under.
    #[inline]
    #[must_use]
    pub const fn token(&self) -> RawToken {
        self.token
    }

    /// Ends the impersonation now.
    #[inline]
    pub fn revert(self) {}
}

impl<A: SecurityApi> Debug for ImpersonationContext<'_, A> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonationContext")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl<A: SecurityApi> Drop for ImpersonationContext<'_, A> {
    fn drop(&mut self) {
        if let Err(err) = self.api.end_impersonation() {
            tracing::error!(
                token = ?self.token,
                code = err.code(),
                "failed to revert impersonation, aborting: {err}"
            );
            std::process::abort();
        }
        ACTIVE.set(false);
        tracing::debug!(token = ?self.token, "impersonation reverted");
    }
}
