use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Receiving end of an [`Observable`].
///
/// Implementors declare which events they understand through the type parameter; an
/// `Observable<E>` only ever delivers to `Observer<E>`s.
pub trait Observer<E>: Send + Sync {
    fn notify(&self, event: &E);
}

/// A list of observers interested in events of type `E`.
///
/// Observers are held weakly: watching something does not keep the observer alive, and an
/// observer that has been dropped is silently skipped (and forgotten) on the next [`fire`].
///
/// [`fire`]: Observable::fire
pub struct Observable<E> {
    observers: Mutex<Vec<Weak<dyn Observer<E>>>>,
}

fn same_observer<E>(a: &Weak<dyn Observer<E>>, b: *const ()) -> bool {
    a.as_ptr().cast::<()>() == b
}

impl<E> Observable<E> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    fn observers(&self) -> MutexGuard<'_, Vec<Weak<dyn Observer<E>>>> {
        // The list is never left half-updated, a panicking observer can't poison it in any
        // meaningful way.
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start delivering events to `observer`. Watching twice is a no-op.
    pub fn watch<O>(&self, observer: &Arc<O>)
    where
        O: Observer<E> + 'static,
    {
        let weak: Weak<O> = Arc::downgrade(observer);
        self.watch_weak(weak);
    }

    /// Like [`watch`](Observable::watch) but for observers that are not fully constructed
    /// yet, e.g. from inside `Arc::new_cyclic`.
    pub fn watch_weak(&self, observer: Weak<dyn Observer<E>>) {
        let mut observers = self.observers();
        let ptr = observer.as_ptr().cast::<()>();
        if !observers.iter().any(|o| same_observer(o, ptr)) {
            observers.push(observer);
        }
    }

    /// Stop delivering events to `observer`. Unwatching something that isn't watching is a
    /// no-op.
    pub fn unwatch<O: ?Sized>(&self, observer: &Arc<O>) {
        let ptr = Arc::as_ptr(observer).cast::<()>();
        self.observers().retain(|o| !same_observer(o, ptr));
    }

    pub fn is_watched_by<O: ?Sized>(&self, observer: &Arc<O>) -> bool {
        let ptr = Arc::as_ptr(observer).cast::<()>();
        self.observers()
            .iter()
            .any(|o| same_observer(o, ptr) && o.strong_count() > 0)
    }

    /// Number of observers that are still alive.
    pub fn len(&self) -> usize {
        self.observers()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every current observer, in the order they started watching.
    ///
    /// Delivery works on a snapshot of the observer list, so observers may freely call
    /// `watch`, `unwatch` or even `fire` on this very observable from within `notify`.
    pub fn fire(&self, event: &E) {
        let snapshot: Vec<Weak<dyn Observer<E>>> = {
            let mut observers = self.observers();
            observers.retain(|o| o.strong_count() > 0);
            observers.clone()
        };

        tracing::trace!(observers = snapshot.len(), "firing change event");
        for observer in snapshot {
            if let Some(observer) = observer.upgrade() {
                observer.notify(event);
            }
        }
    }
}

impl<E> Default for Observable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.len())
            .finish()
    }
}
