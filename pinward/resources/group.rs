use std::any::Any;
use std::fmt;
use std::ops::Index;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use indexmap::{IndexMap, IndexSet};

use super::{
    Arbitration, Observable, Observer, Resource, ResourceChanged, ResourceId, ResourceRef, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a group is doing with its children right now
pub enum Propagation {
    /// Children change on their own; every change is forwarded to the group's observers.
    Idle,
    /// The group itself is (un)registering all of its children and will announce the
    /// result once, so the children's individual events are swallowed.
    Propagating,
}

/// State shared by every kind of group. Never shared between groups.
struct GroupCore {
    id: ResourceId,
    observers: Observable<ResourceChanged>,
    state: Mutex<Propagation>,
}

/// Puts a group back to [`Propagation::Idle`] when dropped.
struct PropagationGuard<'a> {
    core: &'a GroupCore,
}

impl Drop for PropagationGuard<'_> {
    fn drop(&mut self) {
        self.core.set_state(Propagation::Idle);
    }
}

impl GroupCore {
    fn new() -> Self {
        Self {
            id: ResourceId::new(),
            observers: Observable::new(),
            state: Mutex::new(Propagation::Idle),
        }
    }

    fn state(&self) -> Propagation {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: Propagation) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn propagate(&self) -> PropagationGuard<'_> {
        self.set_state(Propagation::Propagating);
        PropagationGuard { core: self }
    }

    fn announce(&self) {
        self.observers.fire(&ResourceChanged { source: self.id });
    }

    fn is_available<'a>(
        &self,
        mut children: impl Iterator<Item = &'a ResourceRef>,
        user: Option<&dyn User>,
        arbitration: &Arbitration,
    ) -> bool {
        children.all(|child| child.as_resource().is_available(user, arbitration))
    }

    fn register<'a>(
        &self,
        children: impl Iterator<Item = &'a ResourceRef>,
        user: &Arc<dyn User>,
        arbitration: &Arbitration,
    ) {
        let _propagating = self.propagate();
        for child in children {
            child.as_resource().register(user, arbitration);
        }
        self.announce();
    }

    fn unregister<'a>(
        &self,
        children: impl Iterator<Item = &'a ResourceRef>,
        arbitration: &Arbitration,
    ) {
        let _propagating = self.propagate();
        for child in children {
            child.as_resource().unregister(arbitration);
        }
        self.announce();
    }

    /// A child changed; forward the event unless we caused it ourselves.
    fn child_changed(&self, event: &ResourceChanged) {
        match self.state() {
            Propagation::Idle => {
                tracing::trace!(group = %self.id, child = %event.source, "forwarding child change");
                self.announce();
            }
            Propagation::Propagating => {
                tracing::trace!(
                    group = %self.id,
                    child = %event.source,
                    "suppressing child change"
                );
            }
        }
    }
}

/// Subscribes the group under construction to all of its children.
fn watch_children<'a, G>(group: &Weak<G>, children: impl Iterator<Item = &'a ResourceRef>)
where
    G: Observer<ResourceChanged> + 'static,
{
    let observer: Weak<dyn Observer<ResourceChanged>> = group.clone();
    for child in children {
        child.observers().watch_weak(observer.clone());
    }
}

/// A set of resources, without any ordering or naming.
pub struct ResourceSet {
    core: GroupCore,
    children: IndexSet<ResourceRef>,
}

impl ResourceSet {
    /// Children are de-duplicated by identity.
    pub fn new(children: impl IntoIterator<Item = ResourceRef>) -> Arc<Self> {
        let children: IndexSet<ResourceRef> = children.into_iter().collect();
        Arc::new_cyclic(|this| {
            watch_children(this, children.iter());
            Self {
                core: GroupCore::new(),
                children,
            }
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &ResourceRef> + '_ {
        self.children.iter()
    }

    pub fn contains(&self, resource: &ResourceRef) -> bool {
        self.children.contains(resource)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn propagation(&self) -> Propagation {
        self.core.state()
    }
}

impl Resource for ResourceSet {
    fn id(&self) -> ResourceId {
        self.core.id
    }

    fn observers(&self) -> &Observable<ResourceChanged> {
        &self.core.observers
    }

    fn is_available(&self, user: Option<&dyn User>, arbitration: &Arbitration) -> bool {
        self.core.is_available(self.children.iter(), user, arbitration)
    }

    fn register(&self, user: &Arc<dyn User>, arbitration: &Arbitration) {
        self.core.register(self.children.iter(), user, arbitration);
    }

    fn unregister(&self, arbitration: &Arbitration) {
        self.core.unregister(self.children.iter(), arbitration);
    }

    fn components(&self) -> Option<Vec<ResourceRef>> {
        Some(self.children.iter().cloned().collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Observer<ResourceChanged> for ResourceSet {
    fn notify(&self, event: &ResourceChanged) {
        self.core.child_changed(event);
    }
}

impl fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSet")
            .field("id", &self.core.id)
            .field("children", &self.children)
            .finish()
    }
}

/// A map of named resources, in insertion order.
pub struct ResourceMap {
    core: GroupCore,
    children: IndexMap<String, ResourceRef>,
}

impl ResourceMap {
    pub fn new(children: IndexMap<String, ResourceRef>) -> Arc<Self> {
        Arc::new_cyclic(|this| {
            watch_children(this, children.values());
            Self {
                core: GroupCore::new(),
                children,
            }
        })
    }

    /// Builds a map from `(name, resource)` pairs.
    ///
    /// # Panics
    /// If a name occurs more than once.
    pub fn from_entries<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, ResourceRef)>,
    ) -> Arc<Self> {
        let mut children: IndexMap<String, ResourceRef> = IndexMap::new();
        for (name, resource) in entries {
            let name: String = name.into();
            if children.contains_key(&name) {
                panic!("duplicate resource name \"{}\"", name);
            }
            children.insert(name, resource);
        }
        Self::new(children)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceRef> {
        self.children.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.children.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &ResourceRef> + '_ {
        self.children.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceRef)> + '_ {
        self.children.iter().map(|(name, child)| (name.as_str(), child))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn propagation(&self) -> Propagation {
        self.core.state()
    }
}

impl Index<&str> for ResourceMap {
    type Output = ResourceRef;

    /// # Panics
    /// If there is no resource called `name`.
    fn index(&self, name: &str) -> &ResourceRef {
        self.children
            .get(name)
            .unwrap_or_else(|| panic!("no resource named \"{}\"", name))
    }
}

impl Resource for ResourceMap {
    fn id(&self) -> ResourceId {
        self.core.id
    }

    fn observers(&self) -> &Observable<ResourceChanged> {
        &self.core.observers
    }

    fn is_available(&self, user: Option<&dyn User>, arbitration: &Arbitration) -> bool {
        self.core.is_available(self.children.values(), user, arbitration)
    }

    fn register(&self, user: &Arc<dyn User>, arbitration: &Arbitration) {
        self.core.register(self.children.values(), user, arbitration);
    }

    fn unregister(&self, arbitration: &Arbitration) {
        self.core.unregister(self.children.values(), arbitration);
    }

    fn components(&self) -> Option<Vec<ResourceRef>> {
        Some(self.children.values().cloned().collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Observer<ResourceChanged> for ResourceMap {
    fn notify(&self, event: &ResourceChanged) {
        self.core.child_changed(event);
    }
}

impl fmt::Debug for ResourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMap")
            .field("id", &self.core.id)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceElement, UserRef};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(path: &str) -> Arc<dyn User> {
        Arc::new(UserRef::new(path))
    }

    fn element() -> ResourceRef {
        ResourceElement::new().into()
    }

    #[derive(Default)]
    struct Tally(AtomicUsize);

    impl Tally {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl Observer<ResourceChanged> for Tally {
        fn notify(&self, _event: &ResourceChanged) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn empty_group_is_available() {
        let set: ResourceRef = ResourceSet::new(Vec::new()).into();
        let map: ResourceRef = ResourceMap::new(IndexMap::new()).into();
        assert!(set.is_available(None));
        assert!(map.is_available(None));
    }

    #[test]
    fn set_availability_is_and_of_children() {
        let e1 = element();
        let e2 = element();
        let set: ResourceRef = ResourceSet::new([e1.clone(), e2.clone()]).into();
        let u = user("A");
        let u2 = UserRef::new("B");

        assert!(set.is_available(Some(&*u)));
        e1.retain(u.clone()).unwrap();

        assert!(!set.is_available(None));
        assert!(!set.is_available(Some(&u2)));
        // Same-path rule applies through the group.
        assert!(set.is_available(Some(&*u)));
    }

    #[test]
    fn set_deduplicates_children() {
        let e = element();
        let set = ResourceSet::new([e.clone(), e.clone(), element()]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&e));
        // Subscribed once despite being listed twice.
        assert_eq!(e.observers().len(), 1);
    }

    #[test]
    fn group_watches_children() {
        let e1 = element();
        let e2 = element();
        let map = ResourceMap::from_entries([("a", e1.clone()), ("b", e2.clone())]);

        assert!(e1.observers().is_watched_by(&map));
        assert!(e2.observers().is_watched_by(&map));
    }

    #[test]
    fn retaining_map_notifies_once() {
        let children = [element(), element(), element()];
        let map: ResourceRef = ResourceMap::from_entries(
            ["x", "y", "z"].into_iter().zip(children.iter().cloned()),
        )
        .into();
        let on_map = Arc::new(Tally::default());
        let on_child = Arc::new(Tally::default());
        map.watch(&on_map);
        children[0].watch(&on_child);

        map.retain(user("A")).unwrap();
        assert_eq!(on_map.count(), 1);
        // Direct observers of a child still hear about it.
        assert_eq!(on_child.count(), 1);
        assert!(children.iter().all(|child| !child.is_available(None)));

        map.release();
        assert_eq!(on_map.count(), 2);
        assert!(map.is_available(None));
    }

    #[test]
    fn independent_child_change_is_forwarded() {
        let e1 = element();
        let set = ResourceSet::new([e1.clone(), element()]);
        let handle: ResourceRef = set.clone().into();
        let tally = Arc::new(Tally::default());
        handle.watch(&tally);

        e1.retain(user("A")).unwrap();
        assert_eq!(tally.count(), 1);
        e1.release();
        assert_eq!(tally.count(), 2);
        assert_eq!(set.propagation(), Propagation::Idle);
    }

    #[test]
    fn nested_groups_notify_once_each() {
        let inner = ResourceMap::from_entries([("z", element()), ("w", element())]);
        let outer: ResourceRef =
            ResourceMap::from_entries([("x", element()), ("y", ResourceRef::from(inner.clone()))])
                .into();
        let on_outer = Arc::new(Tally::default());
        let on_inner = Arc::new(Tally::default());
        outer.watch(&on_outer);
        ResourceRef::from(inner.clone()).watch(&on_inner);

        outer.retain(user("A")).unwrap();
        assert_eq!(on_outer.count(), 1);
        assert_eq!(on_inner.count(), 1);
        assert!(!inner["z"].is_available(None));
    }

    #[test]
    fn group_retain_refused_when_any_child_taken() {
        let e1 = element();
        let e2 = element();
        let map: ResourceRef =
            ResourceMap::from_entries([("a", e1.clone()), ("b", e2.clone())]).into();
        e2.retain(user("B")).unwrap();

        assert!(map.retain(user("A")).is_err());
        // Nothing was claimed partially.
        assert!(e1.is_available(None));
        assert!(e2.is_available(Some(&UserRef::new("B"))));
    }

    #[test]
    fn map_preserves_insertion_order() {
        let map = ResourceMap::from_entries([("c", element()), ("a", element()), ("b", element())]);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["c", "a", "b"]);
        let names: Vec<&str> = map.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["c", "a", "b"]);
        assert_eq!(map.values().count(), 3);
        assert!(map.get("d").is_none());
    }

    #[test]
    #[should_panic(expected = "no resource named \"nope\"")]
    fn unknown_name_panics() {
        let map = ResourceMap::from_entries([("a", element())]);
        let _ = &map["nope"];
    }

    #[test]
    #[should_panic(expected = "duplicate resource name")]
    fn duplicate_names_panic() {
        let _ = ResourceMap::from_entries([("a", element()), ("a", element())]);
    }
}
