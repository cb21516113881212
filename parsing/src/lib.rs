//! Text and binary SID components shared by `win-security-identity` and its `sid!` macro.
//!
//! A SID is handled here as plain components (revision, 6-byte authority,
//! sub-authorities). The binary form is the Windows one: revision, count,
//! big-endian authority, then little-endian 32-bit sub-authorities.
#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt::{self, Display};
use core::str::FromStr;

use arrayvec::ArrayVec;
use thiserror::Error;

/// Smallest number of sub-authorities a valid SID carries.
pub const MIN_SUBAUTHORITY_COUNT: u8 = 1;
/// Largest number of sub-authorities a valid SID carries.
pub const MAX_SUBAUTHORITY_COUNT: u8 = 15;
/// Only SID revision in use.
pub const SID_REVISION: u8 = 1;

const HEAD_SIZE: usize = 8;
/// Size in bytes of the largest binary SID.
pub const MAX_BINARY_SIZE: usize = HEAD_SIZE + 4 * MAX_SUBAUTHORITY_COUNT as usize;

/// Binary SID buffer sized for the largest valid SID.
pub type SidBytes = ArrayVec<u8, MAX_BINARY_SIZE>;

/// Decoded SID parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SidComponents {
    /// The SID revision value, generally 1.
    pub revision: u8,
    /// The SID identifier authority value (big-endian).
    pub identifier_authority: [u8; 6],
    /// The SID sub-authority values.
    pub sub_authority: ArrayVec<u32, { MAX_SUBAUTHORITY_COUNT as usize }>,
}

/// Error returned when a SID string or buffer is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub struct InvalidSidFormat;

impl Display for InvalidSidFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid format for Sid")
    }
}

const fn count_is_valid(count: usize) -> bool {
    MIN_SUBAUTHORITY_COUNT as usize <= count && count <= MAX_SUBAUTHORITY_COUNT as usize
}

impl SidComponents {
    /// Identifier authority as a single integer.
    #[inline]
    #[must_use]
    pub fn authority_value(&self) -> u64 {
        let mut be_bytes = [0u8; 8];
        for (dst, src) in be_bytes.iter_mut().skip(2).zip(self.identifier_authority) {
            *dst = src;
        }
        u64::from_be_bytes(be_bytes)
    }

    /// Decodes a binary SID, checking revision, count and exact length
    /// the way `IsValidSid` does.
    ///
    /// # Errors
    /// [`InvalidSidFormat`] when the buffer is not a complete SID.
    #[inline]
    pub fn from_binary(bytes: &[u8]) -> Result<Self, InvalidSidFormat> {
        let (head, tail) = bytes.split_at_checked(HEAD_SIZE).ok_or(InvalidSidFormat)?;
        let [revision, count, authority @ ..] = head else {
            return Err(InvalidSidFormat);
        };
        if *revision != SID_REVISION || !count_is_valid(usize::from(*count)) {
            return Err(InvalidSidFormat);
        }
        if tail.len() != usize::from(*count) * 4 {
            return Err(InvalidSidFormat);
        }
        let identifier_authority: [u8; 6] =
            authority.try_into().map_err(|_| InvalidSidFormat)?;
        let mut sub_authority = ArrayVec::new();
        for chunk in tail.chunks_exact(4) {
            let value: [u8; 4] = chunk.try_into().map_err(|_| InvalidSidFormat)?;
            sub_authority
                .try_push(u32::from_le_bytes(value))
                .map_err(|_| InvalidSidFormat)?;
        }
        Ok(Self {
            revision: *revision,
            identifier_authority,
            sub_authority,
        })
    }

    /// Encodes the components into the Windows binary layout.
    #[inline]
    #[must_use]
    pub fn to_binary(&self) -> SidBytes {
        let mut out = SidBytes::new();
        out.push(self.revision);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "sub_authority capacity is MAX_SUBAUTHORITY_COUNT"
        )]
        out.push(self.sub_authority.len() as u8);
        out.extend(self.identifier_authority);
        for sub in &self.sub_authority {
            out.extend(sub.to_le_bytes());
        }
        out
    }
}

impl FromStr for SidComponents {
    type Err = InvalidSidFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut s_cmp = s.split('-');
        if !s_cmp
            .next()
            .is_some_and(|head| head.eq_ignore_ascii_case("s"))
        {
            return Err(InvalidSidFormat);
        }
        let revision = s_cmp
            .next()
            .ok_or(InvalidSidFormat)?
            .parse::<u8>()
            .map_err(|_| InvalidSidFormat)?;
        if revision != SID_REVISION {
            return Err(InvalidSidFormat);
        }

        let authority = s_cmp.next().ok_or(InvalidSidFormat)?;
        let authority = match authority
            .strip_prefix("0x")
            .or_else(|| authority.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority.parse::<u64>(),
        }
        .map_err(|_| InvalidSidFormat)?;
        let [0, 0, authority @ ..] = authority.to_be_bytes() else {
            return Err(InvalidSidFormat);
        };

        let mut sub_authority = ArrayVec::new();
        for item in s_cmp {
            let item = item.parse::<u32>().map_err(|_| InvalidSidFormat)?;
            sub_authority.try_push(item).map_err(|_| InvalidSidFormat)?;
        }
        if sub_authority.is_empty() {
            return Err(InvalidSidFormat);
        }

        Ok(Self {
            revision,
            identifier_authority: authority,
            sub_authority,
        })
    }
}

impl Display for SidComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.revision)?;
        // Authorities that do not fit in 32 bits are printed in hex.
        let authority = self.authority_value();
        if authority <= 0xFFFF_FFFF {
            write!(f, "-{authority}")?;
        } else {
            write!(f, "-0x{authority:012X}")?;
        }
        for sub_auth in &self.sub_authority {
            write!(f, "-{sub_auth}")?;
        }
        Ok(())
    }
}
