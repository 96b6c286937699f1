//! Mutual exclusion for every resource tree in the process.
//!
//! All claims and releases run inside a single critical section so that checking a
//! resource's availability and registering a new user can never interleave with another
//! claim. Notifications are delivered from inside that critical section, which means
//! observers run while the calling thread holds the arbiter. From there:
//!
//! - availability queries are answered directly,
//! - [`ResourceRef::retain`] is rejected with [`ResourceError::Reentrant`],
//! - [`ResourceRef::release`] is queued and applied before the outer operation returns.
//!
//! Other threads simply wait for the critical section to end. An observer that blocks on
//! another thread which itself claims a resource will deadlock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

use super::{ResourceError, ResourceRef};

static ARBITER: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

thread_local! {
    static HELD: Cell<bool> = Cell::new(false);
    static DEFERRED: RefCell<VecDeque<ResourceRef>> = RefCell::new(VecDeque::new());
}

/// Proof that the current thread is inside the arbiter's critical section.
///
/// Only the arbiter hands these out, and they cannot leave the thread they were created on.
/// The registration hooks of [`Resource`](super::Resource) require one.
#[derive(Debug)]
pub struct Arbitration {
    _not_send: PhantomData<*const ()>,
}

impl Arbitration {
    fn new() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

/// Resets the per-thread state when leaving the critical section, even on unwind.
struct Held;

impl Held {
    fn enter() -> Self {
        HELD.with(|held| held.set(true));
        Held
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        HELD.with(|held| held.set(false));
        DEFERRED.with(|deferred| deferred.borrow_mut().clear());
    }
}

/// Is the current thread inside the critical section?
pub fn is_held() -> bool {
    HELD.with(Cell::get)
}

/// Run `f` as one atomic operation.
///
/// Fails with [`ResourceError::Reentrant`] if called from within another critical section
/// on the same thread, i.e. from a change notification.
pub(crate) fn exclusive<R>(f: impl FnOnce(&Arbitration) -> R) -> Result<R, ResourceError> {
    if is_held() {
        return Err(ResourceError::Reentrant);
    }

    // The lock guards no data of its own so a poisoned lock is still perfectly usable.
    let _lock = ARBITER.lock().unwrap_or_else(PoisonError::into_inner);
    let _held = Held::enter();
    let arbitration = Arbitration::new();

    let out = f(&arbitration);
    drain_deferred(&arbitration);
    Ok(out)
}

/// Run a read-only `f`, reusing the current critical section if there is one.
///
/// Releases queued while `f` ran (by a user or resource with side effects) are applied
/// before the outermost section ends, same as for [`exclusive`].
pub(crate) fn inspect<R>(f: impl FnOnce(&Arbitration) -> R) -> R {
    if is_held() {
        return f(&Arbitration::new());
    }

    let _lock = ARBITER.lock().unwrap_or_else(PoisonError::into_inner);
    let _held = Held::enter();
    let arbitration = Arbitration::new();

    let out = f(&arbitration);
    drain_deferred(&arbitration);
    out
}

/// Queue `resource` to be released once the running operation has finished.
pub(crate) fn defer_release(resource: ResourceRef) {
    tracing::debug!(id = %resource.id(), "release requested during notification, deferring");
    DEFERRED.with(|deferred| deferred.borrow_mut().push_back(resource));
}

fn drain_deferred(arbitration: &Arbitration) {
    // Releases may fire notifications that queue further releases.
    while let Some(resource) = DEFERRED.with(|deferred| deferred.borrow_mut().pop_front()) {
        resource.release_within(arbitration);
    }
}
