use parsing::{InvalidSidFormat, SidComponents};

use crate::DomainAndName;

/// One principal (user or group) as resolved from a token.
///
/// The three facts are produced together by a single native lookup and
/// never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    fqn: String,
    sid: Vec<u8>,
    sid_string: String,
}

impl Account {
    /// Builds a record from already consistent parts.
    #[inline]
    pub fn new<F, S, T>(fqn: F, sid: S, sid_string: T) -> Self
    where
        F: Into<String>,
        S: Into<Vec<u8>>,
        T: Into<String>,
    {
        Self {
            fqn: fqn.into(),
            sid: sid.into(),
            sid_string: sid_string.into(),
        }
    }

    /// Builds a record from a binary SID, deriving the textual form from it.
    ///
    /// # Errors
    /// [`InvalidSidFormat`] when `sid` is not a complete binary SID.
    ///
    /// # Examples
    /// ```rust
    /// # use win_security_identity::{Account, sid};
    /// let guests = Account::with_sid(r"BUILTIN\Guests", sid!("S-1-5-32-546")).unwrap();
    /// assert_eq!(guests.sid_string(), "S-1-5-32-546");
    /// assert_eq!(guests.name(), "Guests");
    /// ```
    #[inline]
    pub fn with_sid<F: Into<String>, S: Into<Vec<u8>>>(
        fqn: F,
        sid: S,
    ) -> Result<Self, InvalidSidFormat> {
        let sid = sid.into();
        let sid_string = SidComponents::from_binary(&sid)?.to_string();
        Ok(Self {
            fqn: fqn.into(),
            sid,
            sid_string,
        })
    }

    /// Fully-qualified name, `DOMAIN\name`.
    #[inline]
    #[must_use]
    pub fn fqn(&self) -> &str {
        &self.fqn
    }

    /// Binary SID.
    #[inline]
    #[must_use]
    pub fn sid(&self) -> &[u8] {
        &self.sid
    }

    /// Textual SID, `S-1-...`.
    #[inline]
    #[must_use]
    pub fn sid_string(&self) -> &str {
        &self.sid_string
    }

    /// Domain part of the fqn, empty when it has none.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        DomainAndName::split(&self.fqn).0
    }

    /// Account name part of the fqn.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        DomainAndName::split(&self.fqn).1
    }

    /// Owned split of the fqn.
    #[inline]
    #[must_use]
    pub fn domain_and_name(&self) -> DomainAndName {
        DomainAndName::from(self.fqn.as_str())
    }
}
