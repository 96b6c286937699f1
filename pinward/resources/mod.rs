//! Exclusive-access hardware resources.
//!
//! A resource is either a single [`ResourceElement`] (a pin, a converter channel, ...) or a
//! group of resources, unordered ([`ResourceSet`]) or named ([`ResourceMap`]). Devices and
//! channels claim resources with [`ResourceRef::retain`] and give them back with
//! [`ResourceRef::release`]; anybody interested in availability changes can
//! [`watch`](ResourceRef::watch) a resource instead of polling it.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

pub mod arbiter;
mod element;
mod group;
mod layout;
pub mod observable;

pub use arbiter::Arbitration;
pub use element::ResourceElement;
pub use group::{Propagation, ResourceMap, ResourceSet};
pub use layout::{build, build_map, ResourceSpec};
pub use observable::{Observable, Observer};

#[derive(Debug, Error, Diagnostic, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource already used")]
    #[diagnostic(
        code(resource::in_use),
        help("release the resource, or claim it with a user sharing the holder's path")
    )]
    AlreadyInUse,
    #[error("resources can not be claimed from within a change notification")]
    #[diagnostic(
        code(resource::reentrant),
        help("claim the resource after the notification has been handled")
    )]
    Reentrant,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Process-unique identity of a single resource node
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Emitted whenever the availability of a resource may have changed.
pub struct ResourceChanged {
    /// The resource that fired this event.
    pub source: ResourceId,
}

/// Anybody that can hold a resource.
///
/// Users are compared by their path only: two users with the same path are considered the
/// same claimant, so a resource held by one of them is still available to the other.
pub trait User: fmt::Debug + Send + Sync {
    fn path(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
/// A user that is nothing but its path
pub struct UserRef {
    path: String,
}

impl UserRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl User for UserRef {
    fn path(&self) -> &str {
        &self.path
    }
}

/// A managed physical resource.
///
/// Implementations provide the availability predicate and the two registration hooks. The
/// hooks are unchecked: they overwrite whatever was registered before and are only ever
/// called by [`ResourceRef::retain`] / [`ResourceRef::release`] (or a parent group) after
/// availability has been decided. Each hook announces the change of its own node exactly
/// once through [`observers`](Resource::observers).
pub trait Resource: fmt::Debug + Send + Sync {
    fn id(&self) -> ResourceId;

    fn observers(&self) -> &Observable<ResourceChanged>;

    /// Is this resource available for `user`?
    ///
    /// Without a user only a completely free resource is available. Unknown resources are
    /// never available.
    fn is_available(&self, user: Option<&dyn User>, arbitration: &Arbitration) -> bool {
        let _ = (user, arbitration);
        false
    }

    /// Registers `user` without any checking.
    fn register(&self, user: &Arc<dyn User>, arbitration: &Arbitration);

    /// Un-registers any existing user(s).
    fn unregister(&self, arbitration: &Arbitration);

    /// The direct children of a group, `None` for anything that is not a group.
    fn components(&self) -> Option<Vec<ResourceRef>> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn announce(&self) {
        self.observers().fire(&ResourceChanged { source: self.id() });
    }
}

#[derive(Clone)]
/// Shared handle to a resource of any kind
pub struct ResourceRef {
    inner: Arc<dyn Resource>,
}

impl ResourceRef {
    pub fn new(inner: Arc<dyn Resource>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ResourceId {
        self.inner.id()
    }

    pub fn as_resource(&self) -> &dyn Resource {
        &*self.inner
    }

    pub fn downcast_ref<T: Resource + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    pub fn components(&self) -> Option<Vec<ResourceRef>> {
        self.inner.components()
    }

    pub fn is_group(&self) -> bool {
        self.inner.components().is_some()
    }

    /// Tests if this resource is available for `user`.
    pub fn is_available(&self, user: Option<&dyn User>) -> bool {
        arbiter::inspect(|arbitration| self.inner.is_available(user, arbitration))
    }

    /// Claims this resource for `user`.
    ///
    /// Succeeds with this very resource if it is available for `user`. The check and the
    /// claim are atomic and observers are notified after the state has changed. A refused
    /// claim changes nothing and notifies nobody.
    pub fn retain(&self, user: Arc<dyn User>) -> Result<ResourceRef, ResourceError> {
        let span = tracing::debug_span!("retain", id = %self.id(), path = %user.path());
        let _guard = span.enter();

        arbiter::exclusive(|arbitration| {
            if !self.inner.is_available(Some(&*user), arbitration) {
                tracing::debug!("resource already in use, refusing claim");
                return Err(ResourceError::AlreadyInUse);
            }
            self.inner.register(&user, arbitration);
            tracing::debug!("resource retained");
            Ok(self.clone())
        })?
    }

    /// Releases whoever holds this resource. Releasing a free resource is a no-op apart
    /// from the change notification.
    ///
    /// Called from within a change notification the release is queued and applied as soon
    /// as the notifying operation has finished.
    pub fn release(&self) {
        if arbiter::is_held() {
            arbiter::defer_release(self.clone());
            return;
        }

        let released = arbiter::exclusive(|arbitration| self.release_within(arbitration));
        debug_assert!(released.is_ok(), "arbiter was held without being flagged");
    }

    pub(crate) fn release_within(&self, arbitration: &Arbitration) {
        tracing::debug!(id = %self.id(), "releasing resource");
        self.inner.unregister(arbitration);
    }

    pub fn watch<O>(&self, observer: &Arc<O>)
    where
        O: Observer<ResourceChanged> + 'static,
    {
        self.inner.observers().watch(observer);
    }

    pub fn unwatch<O: ?Sized>(&self, observer: &Arc<O>) {
        self.inner.observers().unwatch(observer);
    }

    pub fn observers(&self) -> &Observable<ResourceChanged> {
        self.inner.observers()
    }

    /// Children of a group, or the resource itself for anything else.
    fn flattened(&self) -> Vec<ResourceRef> {
        self.components().unwrap_or_else(|| vec![self.clone()])
    }
}

impl<R: Resource + 'static> From<Arc<R>> for ResourceRef {
    fn from(inner: Arc<R>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl PartialEq for ResourceRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ResourceRef {}

impl Hash for ResourceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// Merges two resources into a new set.
///
/// Groups contribute their children rather than themselves, so combining never nests sets:
/// `(a + b) + c` is the set `{a, b, c}`.
pub fn combine(left: &ResourceRef, right: &ResourceRef) -> Arc<ResourceSet> {
    ResourceSet::new(left.flattened().into_iter().chain(right.flattened()))
}

impl<'a> Add<&'a ResourceRef> for &'a ResourceRef {
    type Output = ResourceRef;

    fn add(self, other: &'a ResourceRef) -> ResourceRef {
        combine(self, other).into()
    }
}

impl Add for ResourceRef {
    type Output = ResourceRef;

    fn add(self, other: ResourceRef) -> ResourceRef {
        &self + &other
    }
}
