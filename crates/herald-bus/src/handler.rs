//! Caller-side handler abstraction and its caching decorators.

use std::fmt;
use std::sync::Arc;

use herald_core::{Notification, TypeCatalog, TypeTag};

/// Anything notifications can be fired through.
pub trait NotificationHandler: Send + Sync {
    /// Catalog used to interpret notification types.
    fn catalog(&self) -> &TypeCatalog;

    /// Whether enablement decisions may change at runtime.
    fn is_dynamic(&self) -> bool;

    /// Whether any listener would receive a notification of `tag`.
    fn is_notification_enabled(&self, tag: TypeTag) -> bool;

    /// Fire a notification. Never fails from the caller's point of view.
    fn fire_notification(&self, notification: Notification);
}

/// Fast-path wrapper for a source that repeatedly fires one kind of
/// notification.
///
/// The delegate's dynamic flag and its decision for `fixed_type` are captured
/// at construction. For a static delegate, queries about `fixed_type` or any
/// of its subtypes are answered from the captured value; everything else
/// goes to the delegate.
pub struct OptimisedNotificationHandler {
    delegate: Arc<dyn NotificationHandler>,
    fixed_type: TypeTag,
    dynamic: bool,
    enabled: bool,
}

impl OptimisedNotificationHandler {
    pub fn new(delegate: Arc<dyn NotificationHandler>, fixed_type: TypeTag) -> Self {
        let dynamic = delegate.is_dynamic();
        let enabled = delegate.is_notification_enabled(fixed_type);
        Self {
            delegate,
            fixed_type,
            dynamic,
            enabled,
        }
    }

    pub fn fixed_type(&self) -> TypeTag {
        self.fixed_type
    }
}

impl NotificationHandler for OptimisedNotificationHandler {
    fn catalog(&self) -> &TypeCatalog {
        self.delegate.catalog()
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn is_notification_enabled(&self, tag: TypeTag) -> bool {
        if !self.dynamic && self.catalog().is_assignable(self.fixed_type, tag) {
            self.enabled
        } else {
            self.delegate.is_notification_enabled(tag)
        }
    }

    fn fire_notification(&self, notification: Notification) {
        if self.is_notification_enabled(notification.type_tag) {
            self.delegate.fire_notification(notification);
        }
    }
}

impl fmt::Debug for OptimisedNotificationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisedNotificationHandler")
            .field("fixed_type", &self.fixed_type)
            .field("dynamic", &self.dynamic)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A held enablement decision for one notification type.
#[derive(Clone)]
pub enum EventDecision {
    /// Captured once; never changes.
    Fixed(bool),
    /// Re-queried from the handler on every call.
    Dynamic {
        handler: Arc<dyn NotificationHandler>,
        tag: TypeTag,
    },
}

impl EventDecision {
    pub fn fixed(enabled: bool) -> Self {
        EventDecision::Fixed(enabled)
    }

    pub fn dynamic(handler: Arc<dyn NotificationHandler>, tag: TypeTag) -> Self {
        EventDecision::Dynamic { handler, tag }
    }

    /// Fixed when `handler` is static, dynamic otherwise.
    pub fn from_handler(handler: Arc<dyn NotificationHandler>, tag: TypeTag) -> Self {
        if handler.is_dynamic() {
            Self::dynamic(handler, tag)
        } else {
            Self::fixed(handler.is_notification_enabled(tag))
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, EventDecision::Dynamic { .. })
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            EventDecision::Fixed(enabled) => *enabled,
            EventDecision::Dynamic { handler, tag } => handler.is_notification_enabled(*tag),
        }
    }
}

impl fmt::Debug for EventDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventDecision::Fixed(enabled) => f.debug_tuple("Fixed").field(enabled).finish(),
            EventDecision::Dynamic { tag, .. } => {
                f.debug_struct("Dynamic").field("tag", tag).finish()
            }
        }
    }
}
