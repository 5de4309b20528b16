use std::cell::RefCell;
use std::sync::Arc;

use crate::error::Error;
use crate::registry::{CleanupEntry, Origin, Registry};
use crate::sink::{CleanupSink, LogSink};

thread_local! {
    /// Scopes currently active on this thread, innermost last.
    ///
    /// [`defer()`] resolves the registry by dynamic extent, so any amount
    /// of helper indirection between the wrapper and the registration
    /// works.
    static ACTIVE_SCOPES: RefCell<Vec<Scope>> = RefCell::new(Vec::new());
}

/// Handle to the cleanup registry of one [`with_defer`] invocation.
///
/// The handle is cheap to clone and can be passed down to helpers that
/// want to register cleanups without relying on the ambient [`defer()`]
/// lookup. Once the owning invocation has drained, every surviving handle
/// is closed for registration.
#[derive(Clone)]
pub struct Scope {
    registry: Arc<Registry>,
    sink: Arc<dyn CleanupSink>,
}

impl Scope {
    fn new(sink: Arc<dyn CleanupSink>) -> Self {
        Scope {
            registry: Arc::new(Registry::new()),
            sink,
        }
    }

    /// Queue `action` to run when this scope exits.
    ///
    /// The closure captures its arguments now, not at drain time. Actions
    /// run in reverse registration order.
    #[track_caller]
    pub fn defer<F>(&self, action: F) -> Result<(), Error>
    where
        F: FnOnce() + 'static,
    {
        self.registry
            .append(CleanupEntry::new(Box::new(action), Origin::caller()))
    }

    fn drain(&self) {
        self.registry.drain(self.sink.as_ref());
    }

    fn same_registry(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

/// Queue `action` on the innermost scope active on this thread.
///
/// Fails with [`Error::NotInScope`] when no [`with_defer`] invocation is in
/// progress, and with [`Error::RegistryClosed`] when called from inside a
/// cleanup action of the scope that is currently draining.
#[track_caller]
pub fn defer<F>(action: F) -> Result<(), Error>
where
    F: FnOnce() + 'static,
{
    let origin = Origin::caller();
    let innermost = ACTIVE_SCOPES.with(|scopes| scopes.borrow().last().cloned());
    match innermost {
        Some(scope) => scope
            .registry
            .append(CleanupEntry::new(Box::new(action), origin)),
        None => Err(Error::NotInScope),
    }
}

/// Run `f` inside a fresh cleanup scope.
///
/// Every cleanup registered during `f` runs when `f` exits, last registered
/// first, on all exit paths: normal return, `Err` propagation and panic.
/// `f`'s return value passes through unchanged after the drain, and a panic
/// resumes unwinding unchanged once all cleanups have run. Failing cleanups
/// are logged through the `log` facade.
///
/// Each invocation gets its own registry, so recursive wrapped calls do not
/// share pending cleanups.
pub fn with_defer<F, R>(f: F) -> R
where
    F: FnOnce(&Scope) -> R,
{
    with_defer_reporting(Arc::new(LogSink), f)
}

/// Same as [`with_defer`], but failing cleanups are reported to `sink`
/// instead of the `log` facade.
pub fn with_defer_reporting<F, R>(sink: Arc<dyn CleanupSink>, f: F) -> R
where
    F: FnOnce(&Scope) -> R,
{
    let scope = Scope::new(sink);
    ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().push(scope.clone()));
    let _guard = DrainGuard {
        scope: scope.clone(),
    };
    f(&scope)
}

/// Drains and unregisters its scope on drop, so the cleanups also run while
/// unwinding from a panic in the wrapped function.
struct DrainGuard {
    scope: Scope,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        // Drain while the scope is still the innermost one, so a cleanup
        // that calls defer() is rejected with RegistryClosed instead of
        // landing in an outer scope.
        self.scope.drain();
        ACTIVE_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            debug_assert!(
                matches!(scopes.last(), Some(top) if top.same_registry(&self.scope)),
                "scope stack out of order"
            );
            scopes.pop();
        });
    }
}
