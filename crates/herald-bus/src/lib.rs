//! # herald-bus
//!
//! Notification dispatch engine for herald.
//!
//! This crate provides:
//! - A subscription registry of interface -> event bindings, listener
//!   registrations and disabled types
//! - A lazily rebuilt decision table resolving which listeners receive a
//!   notification, with a per-type enablement cache
//! - Wildcard subscription filtering on resource identifiers
//! - Synchronous delivery for blocking notifications and a FIFO worker for
//!   everything else
//! - Caller-side caching wrappers for high-frequency notification sources
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use herald_bus::{
//!     ManagerConfig, Notification, NotificationListener, NotificationManager, TypeCatalog,
//!     TypeTag,
//! };
//!
//! struct OrderAudit(TypeTag);
//!
//! impl NotificationListener for OrderAudit {
//!     fn listener_type(&self) -> TypeTag {
//!         self.0
//!     }
//!
//!     fn on_notification(&self, notification: &Notification) {
//!         println!("{} {:?}", notification.action, notification.resource_identifier());
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> herald_bus::Result<()> {
//! let mut types = TypeCatalog::builder();
//! let order_created = types.event("OrderCreated", &[])?;
//! let order_listener = types.listener("OrderListener", &[])?;
//! let order_audit = types.listener("OrderAudit", &[order_listener])?;
//! let catalog = Arc::new(types.build());
//!
//! let manager = NotificationManager::new(catalog, ManagerConfig::default());
//! manager.bind_interface_to_event(order_listener, order_created)?;
//! manager.add_listener_subscription(Arc::new(OrderAudit(order_audit)), "orders.*")?;
//! manager.start()?;
//!
//! manager.fire_notification(
//!     Notification::new(order_created, "created").with_resource("orders.42"),
//! );
//! assert!(manager.is_notification_enabled(order_created));
//!
//! manager.dispose();
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod manager;
pub mod policy;
pub mod registry;
pub mod sender;

// Re-export core types
pub use herald_core::*;

pub use handler::{EventDecision, NotificationHandler, OptimisedNotificationHandler};
pub use manager::{DeliveryStats, NotificationManager};
pub use policy::Policy;
pub use registry::Registry;
pub use sender::{Sender, WildcardFilter};
