//! Guest / anonymous classification of a token.

use crate::{Account, SecurityApi, WellKnownSid};

/// Returns `true` when `sid` is one of the guest-like groups.
///
/// Checked in [`WellKnownSid::GUEST_GROUPS`] order, stopping at the first hit.
#[inline]
pub fn is_guest_group<A: SecurityApi + ?Sized>(api: &A, sid: &[u8]) -> bool {
    WellKnownSid::GUEST_GROUPS
        .into_iter()
        .any(|kind| api.is_well_known_sid(sid, kind))
}

/// Decides whether an identity is a guest.
///
/// True if any of `groups` is a guest-like group, otherwise true only if the
/// identity's own SID is the anonymous SID. `own_sid` is only called in the
/// latter case, so an identity that is a member of a guest group never has
/// its account resolved here.
///
/// # Errors
/// Whatever `own_sid` returns.
#[inline]
pub fn is_guest<A, F, S, E>(api: &A, groups: &[Account], own_sid: F) -> Result<bool, E>
where
    A: SecurityApi + ?Sized,
    F: FnOnce() -> Result<S, E>,
    S: AsRef<[u8]>,
{
    if groups.iter().any(|group| is_guest_group(api, group.sid())) {
        return Ok(true);
    }
    let own_sid = own_sid()?;
    Ok(api.is_well_known_sid(own_sid.as_ref(), WellKnownSid::Anonymous))
}
