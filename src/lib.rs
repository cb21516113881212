//! # Windows security token identities for Rust
//!
//! A handle-owning view of the principal behind a Windows security token.
//! The crate provides:
//! - [`Identity`]: owns a token and lazily resolves, at most once each, the
//!   user [`Account`] and the group accounts. It classifies the principal as
//!   guest or not, impersonates it on the calling thread and duplicates the
//!   token.
//! - [`Account`]: the immutable `(fqn, binary SID, textual SID)` record of a
//!   user or group.
//! - [`ImpersonationContext`]: a scope guard that reverts the thread to its
//!   own security context exactly once, when dropped.
//! - [`SecurityApi`]: the native capabilities the crate needs. [`Win32`]
//!   implements it on Windows. Any other implementation (a test double, a
//!   remote backend) can drive [`Identity`] too.
//! - [`sid!`]: builds binary SIDs from their string form at compile time.
//!
//! ## Overview
//! - **Compute-once caches**: concurrent first accesses trigger a single
//!   native lookup, later accesses never call the native layer.
//! - **Single close**: the token is closed by [`Identity::dispose`] or when
//!   the identity is dropped, never twice. Operations needing the token after
//!   that fail with [`Error::UseAfterDispose`].
//! - **Scoped impersonation**: the guard is not `Send`, so it is released on
//!   the thread that created it, also during a panic unwind.
//!
//! ## Examples
//! ### Classify and impersonate
//! ```no_run
//! # #[cfg(windows)]
//! # fn demo(handle: std::os::windows::io::RawHandle) -> win_security_identity::Result<()> {
//! use std::os::windows::io::FromRawHandle;
//! use win_security_identity::{Identity, Win32};
//!
//! // SAFETY: `handle` is an open token handle the identity takes over.
//! let identity = unsafe { Identity::<Win32>::from_raw_handle(handle) };
//! for group in identity.groups()? {
//!     println!("{} {}", group.sid_string(), group.fqn());
//! }
//! if !identity.is_guest()? {
//!     let _context = identity.impersonate()?;
//!     // The thread runs as `identity` until `_context` goes out of scope.
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Well-known SIDs
//! ```rust
//! use win_security_identity::{WellKnownSid, sid};
//!
//! assert!(WellKnownSid::BuiltinGuests.matches(&sid!("S-1-5-32-546")));
//! assert!(WellKnownSid::Anonymous.matches(&sid!("S-1-5-7")));
//! ```
//!
//! ## Features
//! - `windows_result` (default): conversions from [`NativeError`] into
//!   `windows_result::Error` and `HRESULT`.
//! - `serde`: `Serialize`/`Deserialize` for [`Account`] and [`DomainAndName`].

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

mod account;
pub mod classify;
mod domain_and_name;
mod error;
mod identity;
mod impersonation;
mod native;
mod resolve_once;
pub mod well_known;

/// Builds the binary form of a SID literal at compile time.
///
/// ```rust
/// use win_security_identity::sid;
///
/// const EVERYONE: [u8; 12] = sid!("S-1-1-0");
/// assert_eq!(EVERYONE, [1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
/// ```
pub use sid_macro::sid;

pub use account::Account;
pub use domain_and_name::DomainAndName;
pub use error::{Error, NativeError, Resolution, Result, codes};
pub use identity::Identity;
pub use impersonation::{ImpersonationContext, is_impersonating};
#[cfg_attr(docsrs, doc(cfg(windows)))]
#[cfg(windows)]
pub use native::Win32;
pub use native::{ImpersonationLevel, OwnedToken, RawToken, SecurityApi};
pub use well_known::WellKnownSid;

/// Binary SID parsing and formatting.
pub use parsing::{InvalidSidFormat, SidComponents};
