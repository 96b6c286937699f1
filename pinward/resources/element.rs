use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Arbitration, Observable, Resource, ResourceChanged, ResourceId, User};

#[derive(Debug)]
/// The unit of a physical resource, held by at most one user at a time.
pub struct ResourceElement {
    id: ResourceId,
    observers: Observable<ResourceChanged>,
    user: Mutex<Option<Arc<dyn User>>>,
}

impl ResourceElement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ResourceId::new(),
            observers: Observable::new(),
            user: Mutex::new(None),
        })
    }

    fn user(&self) -> MutexGuard<'_, Option<Arc<dyn User>>> {
        self.user.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whoever holds this element right now.
    pub fn current_user(&self) -> Option<Arc<dyn User>> {
        self.user().clone()
    }
}

impl Resource for ResourceElement {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn observers(&self) -> &Observable<ResourceChanged> {
        &self.observers
    }

    fn is_available(&self, user: Option<&dyn User>, _arbitration: &Arbitration) -> bool {
        match (&*self.user(), user) {
            (None, _) => true,
            // Already used, and nobody to compare against
            (Some(_), None) => false,
            (Some(current), Some(user)) => current.path() == user.path(),
        }
    }

    fn register(&self, user: &Arc<dyn User>, _arbitration: &Arbitration) {
        tracing::trace!(id = %self.id, path = %user.path(), "registering user");
        self.user().replace(user.clone());
        self.announce();
    }

    fn unregister(&self, _arbitration: &Arbitration) {
        if let Some(previous) = self.user().take() {
            tracing::trace!(id = %self.id, path = %previous.path(), "unregistering user");
        }
        self.announce();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
