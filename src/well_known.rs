//! Well-known SID classifications used for guest detection.
//!
//! Source: <https://learn.microsoft.com/windows/win32/secauthz/well-known-sids>
//!
//! [`WellKnownSid`] values are numerically equal to the Win32
//! `WELL_KNOWN_SID_TYPE` members so a native backend can hand them straight
//! to `IsWellKnownSid`. [`WellKnownSid::matches`] is a portable equivalent
//! working on the binary SID alone.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use parsing::SidComponents;

use crate::sid;

/// Anonymous logon (S-1-5-7)
pub const ANONYMOUS: [u8; 12] = sid!("S-1-5-7");

/// BUILTIN\Guests (S-1-5-32-546)
pub const BUILTIN_GUESTS: [u8; 16] = sid!("S-1-5-32-546");

/// Relative id of the built-in Guest account in an account domain.
pub const DOMAIN_USER_RID_GUEST: u32 = 501;

/// Relative id of the Domain Guests group in an account domain.
pub const DOMAIN_GROUP_RID_GUESTS: u32 = 514;

const NT_AUTHORITY: [u8; 6] = [0, 0, 0, 0, 0, 5];
const NT_NON_UNIQUE: u32 = 21;

/// Classifications this crate checks a SID against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum WellKnownSid {
    /// `WinAnonymousSid`, the anonymous logon principal.
    Anonymous = 13,
    /// `WinBuiltinGuestsSid`, the local `BUILTIN\Guests` alias.
    BuiltinGuests = 28,
    /// `WinAccountGuestSid`, the Guest account of an account domain (RID 501).
    AccountGuest = 39,
    /// `WinAccountDomainGuestsSid`, the Domain Guests group (RID 514).
    AccountDomainGuests = 43,
}

impl WellKnownSid {
    /// Guest-like group classifications, in the order they are checked.
    pub const GUEST_GROUPS: [Self; 3] = [
        Self::BuiltinGuests,
        Self::AccountDomainGuests,
        Self::AccountGuest,
    ];

    /// Returns `true` when the binary `sid` has this classification.
    ///
    /// Malformed buffers never match.
    ///
    /// # Examples
    /// ```rust
    /// # use win_security_identity::{WellKnownSid, sid};
    /// assert!(WellKnownSid::AccountDomainGuests.matches(&sid!("S-1-5-21-10-20-30-514")));
    /// assert!(!WellKnownSid::AccountDomainGuests.matches(&sid!("S-1-5-21-10-20-30-513")));
    /// ```
    #[inline]
    #[must_use]
    pub fn matches(self, sid: &[u8]) -> bool {
        match self {
            Self::Anonymous => sid == ANONYMOUS,
            Self::BuiltinGuests => sid == BUILTIN_GUESTS,
            Self::AccountGuest => account_domain_rid(sid) == Some(DOMAIN_USER_RID_GUEST),
            Self::AccountDomainGuests => account_domain_rid(sid) == Some(DOMAIN_GROUP_RID_GUESTS),
        }
    }
}

/// RID of `S-1-5-21-x-y-z-RID` SIDs, `None` for anything else.
fn account_domain_rid(sid: &[u8]) -> Option<u32> {
    let components = SidComponents::from_binary(sid).ok()?;
    if components.identifier_authority != NT_AUTHORITY {
        return None;
    }
    match components.sub_authority.as_slice() {
        [NT_NON_UNIQUE, _, _, _, rid] => Some(*rid),
        _ => None,
    }
}
