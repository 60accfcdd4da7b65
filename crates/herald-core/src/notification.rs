//! Notification values, the listener contract and listener registrations.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::TypeTag;

/// Subscription value meaning "deliver regardless of resource identifier".
pub const NO_FILTER: &str = "NULL";

/// A notification fired through the bus.
///
/// The concrete `type_tag` is the dispatch and cache key; whether delivery is
/// synchronous follows from the tag's place in the type catalog. The
/// `resource_identifier` is what subscription filters match against.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Unique notification identifier (UUIDv7 for temporal ordering).
    pub id: Uuid,
    /// Concrete notification type.
    #[serde(skip)]
    pub type_tag: TypeTag,
    /// Action name, e.g. `"created"` or `"started"`.
    pub action: String,
    /// Identifier of the resource this notification is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_identifier: Option<String>,
    /// When the notification was created (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Arbitrary payload.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(type_tag: TypeTag, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            type_tag,
            action: action.into(),
            resource_identifier: None,
            occurred_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_resource(mut self, resource_identifier: impl Into<String>) -> Self {
        self.resource_identifier = Some(resource_identifier.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn resource_identifier(&self) -> Option<&str> {
        self.resource_identifier.as_deref()
    }
}

/// A party interested in notifications.
///
/// `listener_type` names the listener's concrete type in the catalog; the
/// capability interfaces it implements are that type's ancestors.
pub trait NotificationListener: Send + Sync {
    /// The concrete catalog type of this listener.
    fn listener_type(&self) -> TypeTag;

    /// Receive a notification. Panics are caught and logged by the dispatcher.
    fn on_notification(&self, notification: &Notification);
}

/// A registered (listener, subscription) binding.
///
/// Equality is listener identity plus subscription text.
#[derive(Clone)]
pub struct ListenerSubscriptionPair {
    listener: Arc<dyn NotificationListener>,
    subscription: Option<String>,
}

impl ListenerSubscriptionPair {
    /// Register `listener` without a subscription filter.
    pub fn new(listener: Arc<dyn NotificationListener>) -> Self {
        Self {
            listener,
            subscription: None,
        }
    }

    /// Register `listener` filtered by a wildcard `subscription`.
    ///
    /// The literal [`NO_FILTER`] is treated like no subscription at all.
    pub fn with_subscription(
        listener: Arc<dyn NotificationListener>,
        subscription: impl Into<String>,
    ) -> Self {
        let subscription = subscription.into();
        let subscription = if subscription == NO_FILTER {
            None
        } else {
            Some(subscription)
        };
        Self {
            listener,
            subscription,
        }
    }

    pub fn listener(&self) -> &Arc<dyn NotificationListener> {
        &self.listener
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// True when notifications reach the listener regardless of resource id.
    pub fn is_unfiltered(&self) -> bool {
        self.subscription.is_none()
    }

    /// True when this pair registers exactly `listener` (pointer identity).
    pub fn is_for(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        same_listener(&self.listener, listener)
    }
}

/// Listener identity: two handles are the same listener iff they point at
/// the same allocation.
pub fn same_listener(a: &Arc<dyn NotificationListener>, b: &Arc<dyn NotificationListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl PartialEq for ListenerSubscriptionPair {
    fn eq(&self, other: &Self) -> bool {
        same_listener(&self.listener, &other.listener) && self.subscription == other.subscription
    }
}

impl Eq for ListenerSubscriptionPair {}

impl fmt::Debug for ListenerSubscriptionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSubscriptionPair")
            .field("listener", &Arc::as_ptr(&self.listener))
            .field("listener_type", &self.listener.listener_type())
            .field("subscription", &self.subscription.as_deref().unwrap_or(NO_FILTER))
            .finish()
    }
}
