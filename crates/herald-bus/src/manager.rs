//! Notification manager: the public facade of the bus and its delivery worker.
//!
//! Blocking notifications are dispatched on the firing thread. Everything
//! else goes onto an unbounded queue drained in FIFO order by one worker task
//! spawned with [`NotificationManager::start`]. Disposal is terminal: later
//! calls are silent no-ops and queued notifications are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace};

use herald_core::{
    Error, ListenerSubscriptionPair, ManagerConfig, Notification, NotificationListener,
    NotificationsConfig, Result, TypeCatalog, TypeRef, TypeTag,
};

use crate::handler::NotificationHandler;
use crate::registry::Registry;

/// Point-in-time delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Notifications accepted by `fire_notification` while active.
    pub fired: u64,
    /// Notifications dispatched on the firing thread.
    pub dispatched_inline: u64,
    /// Notifications handed to the worker queue.
    pub queued: u64,
    /// Notifications dispatched by the worker.
    pub dispatched_async: u64,
    /// Notifications lost because the queue was closed.
    pub queue_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fired: AtomicU64,
    dispatched_inline: AtomicU64,
    queued: AtomicU64,
    dispatched_async: AtomicU64,
    queue_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            fired: self.fired.load(Ordering::Relaxed),
            dispatched_inline: self.dispatched_inline.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dispatched_async: self.dispatched_async.load(Ordering::Relaxed),
            queue_failures: self.queue_failures.load(Ordering::Relaxed),
        }
    }
}

/// Receiving ends held until the worker is started.
struct WorkerChannels {
    queue_rx: mpsc::UnboundedReceiver<Notification>,
    shutdown_rx: mpsc::Receiver<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publish/subscribe facade over the subscription registry.
pub struct NotificationManager {
    catalog: Arc<TypeCatalog>,
    registry: ArcSwapOption<Registry>,
    disposed: Arc<AtomicBool>,
    dynamic: AtomicBool,
    worker_enabled: bool,
    queue_tx: mpsc::UnboundedSender<Notification>,
    shutdown_tx: mpsc::Sender<()>,
    pending: Mutex<Option<WorkerChannels>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl NotificationManager {
    pub fn new(catalog: Arc<TypeCatalog>, config: ManagerConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let registry = Registry::new(catalog.clone());

        Self {
            catalog,
            registry: ArcSwapOption::from_pointee(registry),
            disposed: Arc::new(AtomicBool::new(false)),
            dynamic: AtomicBool::new(config.dynamic),
            worker_enabled: config.worker_enabled,
            queue_tx,
            shutdown_tx,
            pending: Mutex::new(Some(WorkerChannels {
                queue_rx,
                shutdown_rx,
            })),
            worker: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_defaults(catalog: Arc<TypeCatalog>) -> Self {
        Self::new(catalog, ManagerConfig::default())
    }

    /// Start the asynchronous delivery worker on the current tokio runtime.
    ///
    /// Notifications fired before this call stay queued and are delivered
    /// once the worker runs. With the worker disabled in [`ManagerConfig`]
    /// this is a no-op and every notification is dispatched inline.
    pub fn start(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::IllegalState("notification manager is disposed".into()));
        }
        if !self.worker_enabled {
            info!("Notification worker is disabled, delivering inline");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::IllegalState(format!("no tokio runtime available: {}", e)))?;
        let registry = self
            .registry
            .load_full()
            .ok_or_else(|| Error::IllegalState("notification manager is disposed".into()))?;
        let channels = lock(&self.pending)
            .take()
            .ok_or_else(|| Error::IllegalState("notification worker already started".into()))?;

        let worker = DeliveryWorker {
            registry,
            disposed: self.disposed.clone(),
            counters: self.counters.clone(),
        };
        let handle = runtime.spawn(worker.run(channels));
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Whether the delivery worker has been spawned and not yet finished.
    pub fn is_worker_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn with_registry<T>(&self, op: &str, default: T, f: impl FnOnce(&Registry) -> T) -> T {
        match self.registry.load_full() {
            Some(registry) => f(&registry),
            None => {
                debug!(op, "Notification manager disposed, ignoring call");
                default
            }
        }
    }

    // ─── Registration ──────────────────────────────────────────────────────

    pub fn bind_interface_to_event(&self, iface: TypeTag, event: TypeTag) -> Result<()> {
        self.with_registry("bind_interface_to_event", Ok(()), |r| {
            r.bind_interface_to_event(iface, event)
        })
    }

    /// Bind `(interface, event)` pairs given as names or handles.
    pub fn bind_all<I, K, V>(&self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<TypeRef>,
        V: Into<TypeRef>,
    {
        self.with_registry("bind_all", Ok(()), |r| r.bind_all(bindings))
    }

    /// Register `listener` without a subscription filter.
    pub fn add_listener(&self, listener: Arc<dyn NotificationListener>) -> Result<()> {
        self.add_listener_subscription_pair(ListenerSubscriptionPair::new(listener))
    }

    /// Register `listener` for resource identifiers matching `subscription`.
    pub fn add_listener_subscription(
        &self,
        listener: Arc<dyn NotificationListener>,
        subscription: &str,
    ) -> Result<()> {
        self.add_listener_subscription_pair(ListenerSubscriptionPair::with_subscription(
            listener,
            subscription,
        ))
    }

    pub fn add_listener_subscription_pair(&self, pair: ListenerSubscriptionPair) -> Result<()> {
        self.with_registry("add_listener", Ok(()), |r| {
            r.add_listener_subscription(pair)
        })
    }

    pub fn add_listener_subscription_pairs<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = ListenerSubscriptionPair>,
    {
        self.with_registry("add_listeners", Ok(()), |r| {
            r.add_listener_subscriptions(pairs)
        })
    }

    /// Remove one registration of `listener`; see [`Registry::remove_listener`].
    pub fn remove_listener(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        self.with_registry("remove_listener", false, |r| r.remove_listener(listener))
    }

    pub fn remove_all_listeners(&self, listeners: &[Arc<dyn NotificationListener>]) -> usize {
        self.with_registry("remove_all_listeners", 0, |r| {
            r.remove_all_listeners(listeners)
        })
    }

    pub fn disable_interface(&self, iface: TypeTag) -> Result<()> {
        self.with_registry("disable_interface", Ok(()), |r| r.disable_interface(iface))
    }

    pub fn disable_interfaces<I, T>(&self, ifaces: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        self.with_registry("disable_interfaces", Ok(()), |r| {
            r.disable_interfaces(ifaces)
        })
    }

    pub fn disable_event_type(&self, event: TypeTag) -> Result<()> {
        self.with_registry("disable_event_type", Ok(()), |r| {
            r.disable_event_type(event)
        })
    }

    pub fn disable_event_types<I, T>(&self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeRef>,
    {
        self.with_registry("disable_event_types", Ok(()), |r| {
            r.disable_event_types(events)
        })
    }

    /// Apply a declarative configuration.
    ///
    /// Every name is resolved and checked before anything changes, so a bad
    /// configuration leaves the manager untouched. Unknown names fail with
    /// `TypeResolution`; an event name that is not a notification type or an
    /// interface name that is not a listener type fails with `Config`.
    pub fn apply_config(&self, config: &NotificationsConfig) -> Result<()> {
        let bindings = config
            .bindings
            .iter()
            .map(|b| Ok((self.config_interface(&b.interface)?, self.config_event(&b.event)?)))
            .collect::<Result<Vec<_>>>()?;
        let disabled_events = config
            .disabled_events
            .iter()
            .map(|name| self.config_event(name))
            .collect::<Result<Vec<_>>>()?;
        let disabled_interfaces = config
            .disabled_interfaces
            .iter()
            .map(|name| self.config_interface(name))
            .collect::<Result<Vec<_>>>()?;

        self.with_registry("apply_config", Ok(()), |r| {
            r.bind_all(bindings)?;
            r.disable_event_types(disabled_events)?;
            r.disable_interfaces(disabled_interfaces)
        })?;

        if let Some(dynamic) = config.dynamic {
            self.set_dynamic(dynamic);
        }
        debug!(
            binding_count = config.bindings.len(),
            disabled_event_count = config.disabled_events.len(),
            disabled_interface_count = config.disabled_interfaces.len(),
            "Notification configuration applied"
        );
        Ok(())
    }

    fn config_event(&self, name: &str) -> Result<TypeTag> {
        let tag = self.catalog.resolve(name)?;
        if !self.catalog.is_notification(tag) {
            return Err(Error::Config(format!(
                "'{}' is configured as an event but is not a notification type",
                name
            )));
        }
        Ok(tag)
    }

    fn config_interface(&self, name: &str) -> Result<TypeTag> {
        let tag = self.catalog.resolve(name)?;
        if !self
            .catalog
            .is_assignable(TypeTag::NOTIFICATION_LISTENER, tag)
        {
            return Err(Error::Config(format!(
                "'{}' is configured as an interface but is not a listener type",
                name
            )));
        }
        Ok(tag)
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn set_dynamic(&self, dynamic: bool) {
        self.dynamic.store(dynamic, Ordering::Release);
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether any listener would receive a notification of `tag`.
    /// Always false once disposed.
    pub fn is_notification_enabled(&self, tag: TypeTag) -> bool {
        self.with_registry("is_notification_enabled", false, |r| {
            r.policy().is_enabled(tag)
        })
    }

    pub fn is_listener_registered(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        self.with_registry("is_listener_registered", false, |r| {
            r.is_listener_registered(listener)
        })
    }

    pub fn listeners(&self) -> Vec<ListenerSubscriptionPair> {
        self.with_registry("listeners", Vec::new(), Registry::listeners)
    }

    pub fn bindings(&self) -> HashMap<TypeTag, HashSet<TypeTag>> {
        self.with_registry("bindings", HashMap::new(), Registry::bindings)
    }

    pub fn disabled_interfaces(&self) -> HashSet<TypeTag> {
        self.with_registry("disabled_interfaces", HashSet::new(), Registry::disabled_interfaces)
    }

    pub fn disabled_events(&self) -> HashSet<TypeTag> {
        self.with_registry("disabled_events", HashSet::new(), Registry::disabled_events)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.counters.snapshot()
    }

    // ─── Delivery ──────────────────────────────────────────────────────────

    /// Fire a notification.
    ///
    /// Blocking notification types (and every type when the worker is
    /// disabled) are delivered before this returns. Other notifications are
    /// queued for the worker. Failures are logged, never returned.
    pub fn fire_notification(&self, notification: Notification) {
        if self.is_disposed() {
            trace!(notification_id = %notification.id, "Notification fired after dispose, dropped");
            return;
        }
        self.counters.fired.fetch_add(1, Ordering::Relaxed);

        if !self.worker_enabled || self.catalog.is_blocking(notification.type_tag) {
            self.dispatch_inline(&notification);
            return;
        }

        match self.queue_tx.send(notification) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::SendError(notification)) => {
                if !self.is_disposed() {
                    self.counters.queue_failures.fetch_add(1, Ordering::Relaxed);
                    let err = Error::DeliveryQueueing("delivery queue is closed".into());
                    error!(
                        notification_id = %notification.id,
                        event_type = %self.catalog.describe(notification.type_tag),
                        error = %err,
                        "Failed to queue notification"
                    );
                }
            }
        }
    }

    fn dispatch_inline(&self, notification: &Notification) {
        if let Some(registry) = self.registry.load_full() {
            registry.policy().dispatch(notification);
            self.counters
                .dispatched_inline
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    /// Dispose the manager. Idempotent; only the first call has any effect.
    pub fn dispose(&self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.registry.store(None);
        let _ = self.shutdown_tx.try_send(());
        lock(&self.pending).take();
        lock(&self.worker).take();
        info!("Notification manager disposed");
    }
}

impl NotificationHandler for NotificationManager {
    fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    fn is_dynamic(&self) -> bool {
        NotificationManager::is_dynamic(self)
    }

    fn is_notification_enabled(&self, tag: TypeTag) -> bool {
        NotificationManager::is_notification_enabled(self, tag)
    }

    fn fire_notification(&self, notification: Notification) {
        NotificationManager::fire_notification(self, notification)
    }
}

/// State moved into the spawned worker task.
struct DeliveryWorker {
    registry: Arc<Registry>,
    disposed: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl DeliveryWorker {
    #[instrument(name = "notification_worker", skip_all)]
    async fn run(self, mut channels: WorkerChannels) {
        info!("Notification worker started");

        loop {
            tokio::select! {
                biased;
                _ = channels.shutdown_rx.recv() => {
                    info!("Notification worker received shutdown signal");
                    break;
                }
                next = channels.queue_rx.recv() => {
                    let Some(notification) = next else {
                        break;
                    };
                    if self.disposed.load(Ordering::Acquire) {
                        break;
                    }
                    let invoked = self.registry.policy().dispatch(&notification);
                    self.counters.dispatched_async.fetch_add(1, Ordering::Relaxed);
                    trace!(notification_id = %notification.id, invoked, "Queued notification delivered");
                }
            }
        }

        info!("Notification worker stopped");
    }
}
