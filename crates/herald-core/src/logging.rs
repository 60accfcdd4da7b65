//! Structured logging field name constants for herald.
//!
//! Every crate uses these constants so log aggregation can query the bus by
//! standardized field names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Listener failure, notification lost |
//! | WARN  | Recoverable issue (queueing failure, late call after dispose) |
//! | INFO  | Lifecycle events (worker start/stop, dispose) |
//! | DEBUG | Registrations, decision table rebuilds |
//! | TRACE | Per-notification dispatch and filter decisions |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Logical operation name.
/// Examples: "bind_all", "add_listener", "is_notification_enabled"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Notification UUID.
pub const NOTIFICATION_ID: &str = "notification_id";

/// Catalog name of a notification type.
pub const EVENT_TYPE: &str = "event_type";

/// Catalog name of a listener capability.
pub const INTERFACE: &str = "interface";

/// Resource identifier carried by a notification.
pub const RESOURCE: &str = "resource";

/// Subscription pattern of a listener registration.
pub const SUBSCRIPTION: &str = "subscription";

/// Action string carried by a notification.
pub const ACTION: &str = "action";

/// Registry generation a decision table was built from.
pub const GENERATION: &str = "generation";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of listener registrations.
pub const LISTENER_COUNT: &str = "listener_count";

/// Number of senders in a rebuilt decision table.
pub const SENDER_COUNT: &str = "sender_count";

/// Number of event types with at least one sender.
pub const EVENT_TYPE_COUNT: &str = "event_type_count";

/// Number of entries affected by a bulk operation.
pub const COUNT: &str = "count";

/// Number of bindings in an applied configuration.
pub const BINDING_COUNT: &str = "binding_count";

/// Number of disabled event types in an applied configuration.
pub const DISABLED_EVENT_COUNT: &str = "disabled_event_count";

/// Number of disabled interfaces in an applied configuration.
pub const DISABLED_INTERFACE_COUNT: &str = "disabled_interface_count";

/// Number of listeners a dispatch invoked.
pub const INVOKED: &str = "invoked";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether a notification type has any interested listener.
pub const ENABLED: &str = "enabled";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
