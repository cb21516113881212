// Identity behavior against an in-memory security backend.
#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in tests")]
#![allow(clippy::panic, reason = "Panics are the point of the unwind test")]

use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use win_security_identity::{
    Account, Error, Identity, ImpersonationLevel, NativeError, RawToken, Resolution, SecurityApi,
    is_impersonating, sid,
};

const TOKEN: RawToken = RawToken::new(0x100);

#[derive(Default)]
struct Backend {
    account: Option<Account>,
    groups: Vec<Account>,
    account_error: Mutex<Option<NativeError>>,
    duplicate_error: Option<NativeError>,
    begin_error: Option<NativeError>,
    end_error: Option<NativeError>,
    resolve_delay: Duration,
    account_calls: AtomicUsize,
    group_calls: AtomicUsize,
    next_handle: AtomicUsize,
    closed: Mutex<Vec<RawToken>>,
    begun: Mutex<Vec<RawToken>>,
    reverts: AtomicUsize,
}

/// Shared handle on a [`Backend`], cloned into every identity and token.
#[derive(Clone)]
struct MockApi(Arc<Backend>);

impl MockApi {
    fn new(backend: Backend) -> Self {
        Self(Arc::new(backend))
    }

    fn identity(&self) -> Identity<Self> {
        // SAFETY: fake handle value only known to this backend.
        unsafe { Identity::from_raw(self.clone(), TOKEN) }
    }

    fn account_calls(&self) -> usize {
        self.0.account_calls.load(Ordering::SeqCst)
    }

    fn group_calls(&self) -> usize {
        self.0.group_calls.load(Ordering::SeqCst)
    }

    fn closed(&self) -> Vec<RawToken> {
        self.0.closed.lock().unwrap().clone()
    }

    fn begun(&self) -> Vec<RawToken> {
        self.0.begun.lock().unwrap().clone()
    }

    fn reverts(&self) -> usize {
        self.0.reverts.load(Ordering::SeqCst)
    }
}

impl SecurityApi for MockApi {
    fn resolve_account(&self, _token: RawToken) -> Result<Account, NativeError> {
        self.0.account_calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.0.resolve_delay);
        if let Some(err) = self.0.account_error.lock().unwrap().take() {
            return Err(err);
        }
        self.0.account.clone().ok_or(NativeError::InvalidHandle)
    }

    fn resolve_groups(&self, _token: RawToken) -> Result<Vec<Account>, NativeError> {
        self.0.group_calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.0.resolve_delay);
        Ok(self.0.groups.clone())
    }

    fn duplicate_token(
        &self,
        _token: RawToken,
        _level: ImpersonationLevel,
    ) -> Result<RawToken, NativeError> {
        if let Some(err) = self.0.duplicate_error {
            return Err(err);
        }
        let next = self.0.next_handle.fetch_add(1, Ordering::SeqCst);
        Ok(RawToken::new(0x200 + next * 4))
    }

    fn close_handle(&self, token: RawToken) -> Result<(), NativeError> {
        self.0.closed.lock().unwrap().push(token);
        Ok(())
    }

    fn begin_impersonation(&self, token: RawToken) -> Result<(), NativeError> {
        if let Some(err) = self.0.begin_error {
            return Err(err);
        }
        self.0.begun.lock().unwrap().push(token);
        Ok(())
    }

    fn end_impersonation(&self) -> Result<(), NativeError> {
        self.0.reverts.fetch_add(1, Ordering::SeqCst);
        self.0.end_error.map_or(Ok(()), Err)
    }
}

fn account(fqn: &str, sid: &[u8]) -> Account {
    Account::with_sid(fqn, sid).unwrap()
}

fn alice() -> Account {
    account(r"CORP\alice", &sid!("S-1-5-21-1-2-3-1001"))
}

fn ordinary_groups() -> Vec<Account> {
    vec![
        account("Everyone", &sid!("S-1-1-0")),
        account(r"BUILTIN\Users", &sid!("S-1-5-32-545")),
    ]
}

fn alice_backend() -> Backend {
    Backend {
        account: Some(alice()),
        groups: ordinary_groups(),
        ..Backend::default()
    }
}

#[test]
fn resolves_account_once() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");
    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");
    assert_eq!(identity.sid_string().unwrap(), "S-1-5-21-1-2-3-1001");
    assert_eq!(identity.sid().unwrap(), sid!("S-1-5-21-1-2-3-1001"));
    assert_eq!(identity.account().unwrap().name(), "alice");
    assert_eq!(api.account_calls(), 1, "account must be resolved once");
    assert_eq!(api.group_calls(), 0, "groups were never asked for");
}

#[test]
fn regular_user_is_not_guest() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    assert!(!identity.is_guest().unwrap());
    assert!(!identity.is_guest().unwrap());
    assert_eq!(api.group_calls(), 1, "groups must be resolved once");
    assert_eq!(api.account_calls(), 1, "anonymous fallback needs the account once");
}

#[test]
fn groups_are_a_copy() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    let mut groups = identity.groups().unwrap();
    assert_eq!(groups, ordinary_groups());
    groups.clear();
    assert_eq!(identity.groups().unwrap().len(), 2);
    assert_eq!(api.group_calls(), 1, "groups must be resolved once");
}

#[test]
fn guest_group_member_skips_account() {
    let mut backend = alice_backend();
    backend
        .groups
        .push(account(r"CORP\Domain Guests", &sid!("S-1-5-21-1-2-3-514")));
    let api = MockApi::new(backend);

    let identity = api.identity();

    assert!(identity.is_guest().unwrap());
    assert_eq!(api.account_calls(), 0, "a guest group decides without the account");
    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");
}

#[test]
fn builtin_guests_member_is_guest() {
    let backend = Backend {
        account: Some(alice()),
        groups: vec![account(r"BUILTIN\Guests", &sid!("S-1-5-32-546"))],
        ..Backend::default()
    };
    assert!(MockApi::new(backend).identity().is_guest().unwrap());
}

#[test]
fn anonymous_is_guest() {
    let backend = Backend {
        account: Some(account(r"NT AUTHORITY\ANONYMOUS LOGON", &sid!("S-1-5-7"))),
        groups: vec![account("Everyone", &sid!("S-1-1-0"))],
        ..Backend::default()
    };
    let api = MockApi::new(backend);
    assert!(api.identity().is_guest().unwrap());
    assert_eq!(api.account_calls(), 1, "fallback resolves the account");
}

#[test]
fn failed_resolution_is_retried() {
    let backend = Backend {
        account_error: Mutex::new(Some(NativeError::AccessDenied)),
        ..alice_backend()
    };
    let api = MockApi::new(backend);
    let identity = api.identity();

    assert_eq!(
        identity.fqn(),
        Err(Error::NativeResolution {
            what: Resolution::Account,
            source: NativeError::AccessDenied,
        })
    );
    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");
    assert_eq!(api.account_calls(), 2, "failure must not be cached");
}

#[test]
fn concurrent_first_access_resolves_once() {
    let backend = Backend {
        resolve_delay: Duration::from_millis(20),
        ..alice_backend()
    };
    let api = MockApi::new(backend);
    let identity = Arc::new(api.identity());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let identity = Arc::clone(&identity);
            thread::spawn(move || (identity.fqn().unwrap(), identity.groups().unwrap().len()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), (r"CORP\alice".to_owned(), 2));
    }
    assert_eq!(api.account_calls(), 1, "account must be resolved once");
    assert_eq!(api.group_calls(), 1, "groups must be resolved once");
}

#[test]
fn drop_closes_once() {
    let api = MockApi::new(alice_backend());
    drop(api.identity());
    assert_eq!(api.closed(), vec![TOKEN]);
}

#[test]
fn dispose_closes_once_and_keeps_cache() {
    let api = MockApi::new(alice_backend());
    let mut identity = api.identity();
    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");

    identity.dispose();
    identity.dispose();
    assert!(identity.is_disposed());
    assert_eq!(identity.as_raw(), None);

    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");
    assert_eq!(identity.groups(), Err(Error::UseAfterDispose));
    assert!(matches!(identity.impersonate(), Err(Error::UseAfterDispose)));
    assert!(matches!(identity.duplicate(), Err(Error::UseAfterDispose)));

    drop(identity);
    assert_eq!(api.closed(), vec![TOKEN]);
}

#[test]
fn null_handle_is_never_closed() {
    let api = MockApi::new(alice_backend());
    // SAFETY: the null handle carries no ownership.
    let mut identity = unsafe { Identity::from_raw(api.clone(), RawToken::NULL) };
    assert!(identity.is_disposed());
    identity.dispose();
    assert_eq!(identity.fqn(), Err(Error::UseAfterDispose));
    drop(identity);
    assert!(api.closed().is_empty());
    assert_eq!(api.account_calls(), 0);
}

#[test]
fn into_raw_releases_without_closing() {
    let api = MockApi::new(alice_backend());
    assert_eq!(api.identity().into_raw(), Some(TOKEN));
    assert!(api.closed().is_empty());
}

#[test]
fn duplicate_owns_a_new_token() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();
    assert_eq!(identity.fqn().unwrap(), r"CORP\alice");

    assert_eq!(identity.groups().unwrap().len(), 2);

    let duplicate = identity.duplicate().unwrap();
    assert_ne!(duplicate.as_raw(), identity.as_raw());
    assert_eq!(duplicate.fqn().unwrap(), r"CORP\alice");
    assert_eq!(api.account_calls(), 2, "the duplicate starts with empty caches");
    assert_eq!(duplicate.groups().unwrap(), ordinary_groups());
    assert_eq!(api.group_calls(), 2, "the duplicate resolves its own groups");

    let duplicate_token = duplicate.as_raw().unwrap();
    drop(duplicate);
    assert_eq!(api.closed(), vec![duplicate_token]);
    drop(identity);
    assert_eq!(api.closed(), vec![duplicate_token, TOKEN]);
}

#[test]
fn duplicate_failure_carries_code() {
    let backend = Backend {
        duplicate_error: Some(NativeError::AccessDenied),
        ..alice_backend()
    };
    let api = MockApi::new(backend);
    let identity = api.identity();
    let err = identity.duplicate().unwrap_err();
    assert_eq!(err, Error::NativeOperation(NativeError::AccessDenied));
    assert_eq!(err.code(), Some(5));
    drop(identity);
    assert_eq!(api.closed(), vec![TOKEN], "only the source token is closed");
}

#[test]
fn run_as_reverts_after_closure_error() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    let result = identity.run_as(|| {
        assert!(is_impersonating(), "closure runs impersonated");
        Err::<(), _>("work failed")
    });
    assert_eq!(result, Ok(Err("work failed")));
    assert_eq!(api.begun(), vec![TOKEN]);
    assert_eq!(api.reverts(), 1);
    assert!(!is_impersonating());
}

#[test]
fn run_as_reverts_on_panic() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        identity.run_as(|| -> u8 { panic!("work panicked") }).unwrap();
    }));
    assert!(outcome.is_err(), "the panic must propagate");
    assert_eq!(api.reverts(), 1);
    assert!(!is_impersonating());
}

#[test]
fn explicit_revert_happens_once() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();

    let context = identity.impersonate().unwrap();
    assert_eq!(context.token(), TOKEN);
    context.revert();
    assert_eq!(api.reverts(), 1);
    drop(identity);
    assert_eq!(api.reverts(), 1);
}

#[test]
fn nested_impersonation_is_rejected() {
    let api = MockApi::new(alice_backend());
    let identity = api.identity();
    let other = identity.duplicate().unwrap();

    let context = identity.impersonate().unwrap();
    assert!(matches!(other.impersonate(), Err(Error::ImpersonationActive)));
    assert_eq!(api.begun().len(), 1);
    drop(context);

    let context = other.impersonate().unwrap();
    drop(context);
    assert_eq!(api.reverts(), 2);
}

#[test]
fn failed_impersonation_never_reverts() {
    let backend = Backend {
        begin_error: Some(NativeError::BadImpersonationLevel),
        ..alice_backend()
    };
    let api = MockApi::new(backend);
    let identity = api.identity();

    let mut ran = false;
    let result = identity.run_as(|| ran = true);
    assert_eq!(result, Err(Error::Impersonation(NativeError::BadImpersonationLevel)));
    assert_eq!(result.unwrap_err().code(), Some(1346));
    assert!(!ran);
    assert_eq!(api.reverts(), 0);
    assert!(!is_impersonating());
}

/// Set in the child process that exercises the failing revert.
const REVERT_FAILURE_CHILD: &str = "WIN_SECURITY_IDENTITY_REVERT_FAILURE_CHILD";
const SURVIVED: &str = "revert failure did not abort";

#[test]
#[allow(clippy::print_stdout, reason = "The child reports through stdout")]
fn failed_revert_aborts_process() {
    if env::var_os(REVERT_FAILURE_CHILD).is_some() {
        let backend = Backend {
            end_error: Some(NativeError::InvalidHandle),
            ..alice_backend()
        };
        let api = MockApi::new(backend);
        let identity = api.identity();
        let context = identity.impersonate().unwrap();
        drop(context);
        println!("{SURVIVED}");
        return;
    }

    let output = Command::new(env::current_exe().unwrap())
        .args(["failed_revert_aborts_process", "--exact", "--nocapture", "--test-threads=1"])
        .env(REVERT_FAILURE_CHILD, "1")
        .output()
        .unwrap();
    assert!(!output.status.success(), "child must not exit cleanly: {:?}", output.status);
    assert!(
        !String::from_utf8_lossy(&output.stdout).contains(SURVIVED),
        "child kept running after the failed revert"
    );
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(output.status.signal(), Some(6), "child must be aborted");
    }
}
