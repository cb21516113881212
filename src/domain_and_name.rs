//! `DOMAIN\Name` split of a fully-qualified account name.

use core::fmt::{self, Display};

/// Domain and account name parts of an fqn.
///
/// Parsing splits on the first `\`. A name without separator has an empty
/// domain (well-known principals such as `Everyone` are reported that way).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DomainAndName {
    /// The domain part (before the `\`), possibly empty.
    pub domain: String,
    /// The name part (after the `\`).
    pub name: String,
}

impl DomainAndName {
    /// Non-validating constructor (domain, then name).
    #[inline]
    pub fn new<D: Into<String>, N: Into<String>>(domain: D, name: N) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }

    /// Borrowed split of `fqn` into `(domain, name)`.
    #[inline]
    #[must_use]
    pub fn split(fqn: &str) -> (&str, &str) {
        fqn.split_once('\\').unwrap_or(("", fqn))
    }
}

impl From<&str> for DomainAndName {
    #[inline]
    fn from(fqn: &str) -> Self {
        let (domain, name) = Self::split(fqn);
        Self::new(domain, name)
    }
}

impl Display for DomainAndName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}\\{}", self.domain, self.name)
        }
    }
}
