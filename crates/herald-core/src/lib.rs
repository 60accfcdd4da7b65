//! # herald-core
//!
//! Core types, traits, and abstractions for the herald notification bus.
//!
//! This crate provides the explicit type hierarchy used for polymorphic
//! dispatch, the notification value, the listener contract and the shared
//! error, logging and configuration definitions that `herald-bus` builds on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod notification;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{BindingConfig, ManagerConfig, NotificationsConfig};
pub use error::{Error, Result};
pub use notification::{
    same_listener, ListenerSubscriptionPair, Notification, NotificationListener, NO_FILTER,
};
pub use types::{TypeCatalog, TypeCatalogBuilder, TypeRef, TypeTag};
