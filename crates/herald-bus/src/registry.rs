//! Subscription registry: the mutable side of the notification bus.
//!
//! All mutations are serialized by one mutex. Every mutation discards the
//! current [`Policy`] snapshot; the next reader rebuilds it under the same
//! mutex and publishes it through an [`ArcSwapOption`], so readers that find
//! a snapshot never take the lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use tracing::debug;

use herald_core::{
    Error, ListenerSubscriptionPair, NotificationListener, Result, TypeCatalog, TypeRef, TypeTag,
};

use crate::policy::Policy;
use crate::sender::Sender;

#[derive(Default)]
struct RegistryState {
    interface_to_events: HashMap<TypeTag, HashSet<TypeTag>>,
    senders: Vec<Arc<Sender>>,
    disabled_interfaces: HashSet<TypeTag>,
    disabled_events: HashSet<TypeTag>,
    generation: u64,
}

/// Thread-safe store of bindings, listener registrations and disabled types.
pub struct Registry {
    catalog: Arc<TypeCatalog>,
    state: Mutex<RegistryState>,
    policy: ArcSwapOption<Policy>,
}

impl Registry {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            state: Mutex::new(RegistryState::default()),
            policy: ArcSwapOption::empty(),
        }
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Listener code never runs under this lock (listener types are
        // captured by `Sender::new` before it is taken), so the state behind
        // a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the current snapshot. Must be called with the state lock held.
    fn invalidate(&self, state: &mut RegistryState) {
        state.generation += 1;
        self.policy.store(None);
    }

    fn check_binding(&self, iface: TypeTag, event: TypeTag) -> Result<()> {
        if !self.catalog.contains(iface) {
            return Err(Error::InvalidArgument(format!(
                "interface {} is not registered",
                iface
            )));
        }
        if !self.catalog.is_notification(event) {
            return Err(Error::InvalidArgument(format!(
                "{} is not a notification type",
                self.catalog.describe(event)
            )));
        }
        Ok(())
    }

    /// Declare that listeners implementing `iface` receive `event`.
    pub fn bind_interface_to_event(&self, iface: TypeTag, event: TypeTag) -> Result<()> {
        self.check_binding(iface, event)?;
        let mut state = self.lock();
        state.interface_to_events.entry(iface).or_default().insert(event);
        self.invalidate(&mut state);
        debug!(
            interface = %self.catalog.describe(iface),
            event_type = %self.catalog.describe(event),
            "Bound interface to event type"
        );
        Ok(())
    }

    /// Bulk variant of [`Registry::bind_interface_to_event`] taking
    /// `(interface, event)` pairs given as names or handles.
    ///
    /// Every entry is resolved and validated before anything is bound.
    pub fn bind_all<I, K, V>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<TypeRef>,
        V: Into<TypeRef>,
    {
        let mut resolved = Vec::new();
        for (iface, event) in bindings {
            let iface = self.catalog.resolve_ref(&iface.into())?;
            let event = self.catalog.resolve_ref(&event.into())?;
            self.check_binding(iface, event)?;
            resolved.push((iface, event));
        }

        let mut state = self.lock();
        for (iface, event) in &resolved {
            state.interface_to_events.entry(*iface).or_default().insert(*event);
        }
        self.invalidate(&mut state);
        debug!(count = resolved.len(), "Bound interfaces to event types");
        Ok(())
    }

    /// Register a listener. Registering an equal pair twice has no effect.
    pub fn add_listener_subscription(&self, pair: ListenerSubscriptionPair) -> Result<()> {
        self.add_listener_subscriptions([pair])
    }

    /// Register several listeners; all subscriptions are compiled first.
    pub fn add_listener_subscriptions<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = ListenerSubscriptionPair>,
    {
        let compiled = pairs
            .into_iter()
            .map(|pair| Sender::new(pair).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.lock();
        for sender in compiled {
            if state.senders.iter().any(|s| s.pair() == sender.pair()) {
                continue;
            }
            state.senders.push(sender);
        }
        self.invalidate(&mut state);
        debug!(listener_count = state.senders.len(), "Listener registrations updated");
        Ok(())
    }

    /// Remove the first registration of `listener`.
    ///
    /// A listener registered under several subscriptions loses exactly one
    /// of them per call. Returns whether a registration was removed.
    pub fn remove_listener(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        let mut state = self.lock();
        let position = state.senders.iter().position(|s| s.pair().is_for(listener));
        match position {
            Some(index) => {
                state.senders.remove(index);
                self.invalidate(&mut state);
                debug!(listener_count = state.senders.len(), "Listener removed");
                true
            }
            None => false,
        }
    }

    /// Apply [`Registry::remove_listener`] once per entry.
    pub fn remove_all_listeners(&self, listeners: &[Arc<dyn NotificationListener>]) -> usize {
        listeners
            .iter()
            .filter(|listener| self.remove_listener(listener))
            .count()
    }

    /// Disable `iface` and every capability derived from it.
    pub fn disable_interface(&self, iface: TypeTag) -> Result<()> {
        self.disable_interfaces([iface])
    }

    pub fn disable_interfaces<I, T>(&self, ifaces: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        let resolved = self.resolve_all(ifaces)?;
        let mut state = self.lock();
        state.disabled_interfaces.extend(resolved);
        self.invalidate(&mut state);
        debug!(
            count = state.disabled_interfaces.len(),
            "Disabled interfaces updated"
        );
        Ok(())
    }

    /// Disable `event` and every notification type derived from it.
    pub fn disable_event_type(&self, event: TypeTag) -> Result<()> {
        self.disable_event_types([event])
    }

    pub fn disable_event_types<I, T>(&self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        let resolved = self.resolve_all(events)?;
        let mut state = self.lock();
        state.disabled_events.extend(resolved);
        self.invalidate(&mut state);
        debug!(count = state.disabled_events.len(), "Disabled events updated");
        Ok(())
    }

    fn resolve_all<I, T>(&self, refs: I) -> Result<Vec<TypeTag>>
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        refs.into_iter()
            .map(|r| self.catalog.resolve_ref(&r.into()))
            .collect()
    }

    /// Current decision table, rebuilt first if a mutation discarded it.
    pub fn policy(&self) -> Arc<Policy> {
        if let Some(policy) = self.policy.load_full() {
            return policy;
        }

        let state = self.lock();
        if let Some(policy) = self.policy.load_full() {
            return policy;
        }

        let policy = Arc::new(Policy::new(
            self.catalog.clone(),
            state.generation,
            &state.interface_to_events,
            &state.senders,
            &state.disabled_interfaces,
            &state.disabled_events,
        ));
        self.policy.store(Some(policy.clone()));
        policy
    }

    /// Number of mutations applied so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_listener_registered(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        self.lock().senders.iter().any(|s| s.pair().is_for(listener))
    }

    /// Snapshot of the registered pairs, in registration order.
    pub fn listeners(&self) -> Vec<ListenerSubscriptionPair> {
        self.lock().senders.iter().map(|s| s.pair().clone()).collect()
    }

    pub fn bindings(&self) -> HashMap<TypeTag, HashSet<TypeTag>> {
        self.lock().interface_to_events.clone()
    }

    pub fn disabled_interfaces(&self) -> HashSet<TypeTag> {
        self.lock().disabled_interfaces.clone()
    }

    pub fn disabled_events(&self) -> HashSet<TypeTag> {
        self.lock().disabled_events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Notification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Quiet(TypeTag);

    impl NotificationListener for Quiet {
        fn listener_type(&self) -> TypeTag {
            self.0
        }

        fn on_notification(&self, _notification: &Notification) {}
    }

    fn catalog() -> (Arc<TypeCatalog>, TypeTag, TypeTag) {
        let mut b = TypeCatalog::builder();
        let order = b.event("OrderCreated", &[]).unwrap();
        let listens = b.listener("OrderListener", &[]).unwrap();
        (Arc::new(b.build()), order, listens)
    }

    #[test]
    fn test_bind_rejects_non_notification() {
        let (catalog, _, listens) = catalog();
        let registry = Registry::new(catalog);
        let err = registry
            .bind_interface_to_event(listens, listens)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_bind_all_resolves_names_and_handles() {
        let (catalog, order, listens) = catalog();
        let registry = Registry::new(catalog);
        registry
            .bind_all([(TypeRef::from("OrderListener"), TypeRef::from(order))])
            .unwrap();
        assert!(registry.bindings()[&listens].contains(&order));
    }

    #[test]
    fn test_bind_all_unresolvable_name_binds_nothing() {
        let (catalog, order, listens) = catalog();
        let registry = Registry::new(catalog);
        let err = registry
            .bind_all([
                (TypeRef::from(listens), TypeRef::from(order)),
                (TypeRef::from("OrderListener"), TypeRef::from("com.acme.Nope")),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::TypeResolution(_)));
        assert!(registry.bindings().is_empty());
    }

    #[test]
    fn test_duplicate_pair_registered_once() {
        let (catalog, _, listens) = catalog();
        let registry = Registry::new(catalog);
        let l: Arc<dyn NotificationListener> = Arc::new(Quiet(listens));
        registry
            .add_listener_subscription(ListenerSubscriptionPair::with_subscription(l.clone(), "a.*"))
            .unwrap();
        registry
            .add_listener_subscription(ListenerSubscriptionPair::with_subscription(l.clone(), "a.*"))
            .unwrap();
        assert_eq!(registry.listeners().len(), 1);
    }

    #[test]
    fn test_remove_listener_removes_exactly_one() {
        let (catalog, _, listens) = catalog();
        let registry = Registry::new(catalog);
        let l: Arc<dyn NotificationListener> = Arc::new(Quiet(listens));
        registry
            .add_listener_subscriptions([
                ListenerSubscriptionPair::with_subscription(l.clone(), "s1"),
                ListenerSubscriptionPair::with_subscription(l.clone(), "s2"),
            ])
            .unwrap();

        assert!(registry.remove_listener(&l));
        let remaining = registry.listeners();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subscription(), Some("s2"));
        assert!(registry.is_listener_registered(&l));

        assert!(registry.remove_listener(&l));
        assert!(registry.listeners().is_empty());
        assert!(!registry.remove_listener(&l));
    }

    #[test]
    fn test_remove_all_listeners_once_per_entry() {
        let (catalog, _, listens) = catalog();
        let registry = Registry::new(catalog);
        let a: Arc<dyn NotificationListener> = Arc::new(Quiet(listens));
        let b: Arc<dyn NotificationListener> = Arc::new(Quiet(listens));
        registry
            .add_listener_subscriptions([
                ListenerSubscriptionPair::with_subscription(a.clone(), "x"),
                ListenerSubscriptionPair::with_subscription(a.clone(), "y"),
                ListenerSubscriptionPair::new(b.clone()),
            ])
            .unwrap();

        assert_eq!(registry.remove_all_listeners(&[a.clone(), b.clone()]), 2);
        assert_eq!(registry.listeners().len(), 1);
        assert!(registry.is_listener_registered(&a));
        assert!(!registry.is_listener_registered(&b));
    }

    #[test]
    fn test_policy_reused_until_mutation() {
        let (catalog, order, listens) = catalog();
        let registry = Registry::new(catalog);
        registry.bind_interface_to_event(listens, order).unwrap();

        let first = registry.policy();
        let second = registry.policy();
        assert!(Arc::ptr_eq(&first, &second));

        registry.disable_event_type(order).unwrap();
        let third = registry.policy();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.generation(), registry.generation());
    }

    #[test]
    fn test_disable_by_name() {
        let (catalog, order, listens) = catalog();
        let registry = Registry::new(catalog);
        registry.disable_event_types(["OrderCreated"]).unwrap();
        registry.disable_interfaces([listens]).unwrap();
        assert!(registry.disabled_events().contains(&order));
        assert!(registry.disabled_interfaces().contains(&listens));
        assert!(matches!(
            registry.disable_event_types(["Missing"]),
            Err(Error::TypeResolution(_))
        ));
    }

    /// Counts how often the registry asks for its type.
    struct TypeQueries {
        kind: TypeTag,
        queries: AtomicUsize,
    }

    impl NotificationListener for TypeQueries {
        fn listener_type(&self) -> TypeTag {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.kind
        }

        fn on_notification(&self, _notification: &Notification) {}
    }

    #[test]
    fn test_policy_rebuild_does_not_query_listener() {
        let (catalog, order, listens) = catalog();
        let registry = Registry::new(catalog);
        let listener = Arc::new(TypeQueries {
            kind: listens,
            queries: AtomicUsize::new(0),
        });
        registry.bind_interface_to_event(listens, order).unwrap();
        registry
            .add_listener_subscription(ListenerSubscriptionPair::new(listener.clone()))
            .unwrap();
        assert_eq!(listener.queries.load(Ordering::SeqCst), 1);

        assert!(registry.policy().is_enabled(order));
        registry.bind_interface_to_event(listens, order).unwrap();
        assert!(registry.policy().is_enabled(order));
        assert_eq!(registry.policy().senders_for(order).len(), 1);
        assert_eq!(listener.queries.load(Ordering::SeqCst), 1);
    }
}
