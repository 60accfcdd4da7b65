//! Decision table: which senders receive which notification types.
//!
//! A [`Policy`] is an immutable snapshot built from one generation of the
//! [`Registry`](crate::registry::Registry). The only state that changes after
//! construction is the per-concrete-type decision cache, which is a
//! concurrent map so dispatching threads can populate it without locking.
//! Racing writers always compute the same boolean for a given type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use herald_core::{Notification, TypeCatalog, TypeTag};

use crate::sender::Sender;

/// Immutable decision table plus its lazily-filled enablement cache.
#[derive(Debug)]
pub struct Policy {
    catalog: Arc<TypeCatalog>,
    generation: u64,
    event_to_senders: HashMap<TypeTag, Vec<Arc<Sender>>>,
    disabled_events: Vec<TypeTag>,
    known_events: DashMap<TypeTag, bool>,
}

/// True iff `tag` equals or derives from some entry of `disabled`.
fn is_disabled<'a>(
    catalog: &TypeCatalog,
    disabled: impl IntoIterator<Item = &'a TypeTag>,
    tag: TypeTag,
) -> bool {
    disabled
        .into_iter()
        .any(|entry| catalog.is_assignable(*entry, tag))
}

impl Policy {
    /// Build the table.
    ///
    /// For every sender, for every bound interface that is not disabled and
    /// that the sender's listener implements, for every event bound to that
    /// interface that is not disabled, the sender is added under the event.
    pub fn new(
        catalog: Arc<TypeCatalog>,
        generation: u64,
        interface_to_events: &HashMap<TypeTag, HashSet<TypeTag>>,
        senders: &[Arc<Sender>],
        disabled_interfaces: &HashSet<TypeTag>,
        disabled_events: &HashSet<TypeTag>,
    ) -> Self {
        let mut event_to_senders: HashMap<TypeTag, Vec<Arc<Sender>>> = HashMap::new();

        for sender in senders {
            let listener_type = sender.listener_type();
            for (iface, events) in interface_to_events {
                if is_disabled(&catalog, disabled_interfaces, *iface) {
                    continue;
                }
                if !catalog.is_assignable(*iface, listener_type) {
                    continue;
                }
                for event in events {
                    if is_disabled(&catalog, disabled_events, *event) {
                        continue;
                    }
                    let entry = event_to_senders.entry(*event).or_default();
                    if !entry.iter().any(|s| Arc::ptr_eq(s, sender)) {
                        entry.push(sender.clone());
                    }
                }
            }
        }

        debug!(
            generation,
            event_type_count = event_to_senders.len(),
            sender_count = event_to_senders.values().map(Vec::len).sum::<usize>(),
            "Decision table built"
        );

        Self {
            catalog,
            generation,
            event_to_senders,
            disabled_events: disabled_events.iter().copied().collect(),
            known_events: DashMap::new(),
        }
    }

    /// Registry generation this table was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Event types that have at least one sender.
    pub fn event_types(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.event_to_senders.keys().copied()
    }

    /// Senders registered directly under `event`.
    pub fn senders_for(&self, event: TypeTag) -> &[Arc<Sender>] {
        self.event_to_senders
            .get(&event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn type_disabled(&self, tag: TypeTag) -> bool {
        is_disabled(&self.catalog, &self.disabled_events, tag)
    }

    /// Deliver `notification` to every interested sender.
    ///
    /// A cached `false` for the concrete type skips the scan entirely; an
    /// unknown or `true` type scans every event key. Each sender is invoked
    /// at most once even when it sits under several matching keys. Returns
    /// the number of listeners invoked.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let concrete = notification.type_tag;
        if self.known_events.get(&concrete).map(|e| *e) == Some(false) {
            trace!(notification_id = %notification.id, "No senders for notification type (cached)");
            return 0;
        }

        let mut found = false;
        let mut visited: Vec<&Arc<Sender>> = Vec::new();
        let mut invoked = 0;

        if !self.type_disabled(concrete) {
            for (event, senders) in &self.event_to_senders {
                if !self.catalog.is_assignable(*event, concrete) {
                    continue;
                }
                found = true;
                for sender in senders {
                    if visited.iter().any(|s| Arc::ptr_eq(s, sender)) {
                        continue;
                    }
                    visited.push(sender);
                    if sender.dispatch(notification) {
                        invoked += 1;
                    }
                }
            }
        }

        self.known_events.insert(concrete, found);
        trace!(
            notification_id = %notification.id,
            event_type = %self.catalog.describe(concrete),
            enabled = found,
            invoked,
            "Notification dispatched"
        );
        invoked
    }

    /// Whether any sender is interested in `tag` or one of its supertypes.
    pub fn is_enabled(&self, tag: TypeTag) -> bool {
        if let Some(known) = self.known_events.get(&tag).map(|e| *e) {
            return known;
        }

        let enabled = !self.type_disabled(tag)
            && self
                .event_to_senders
                .keys()
                .any(|event| self.catalog.is_assignable(*event, tag));
        self.known_events.insert(tag, enabled);
        enabled
    }

    /// Number of concrete types with a cached decision.
    pub fn cached_decisions(&self) -> usize {
        self.known_events.len()
    }
}
