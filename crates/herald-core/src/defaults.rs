//! Centralized default constants for herald.
//!
//! All crates reference these constants instead of defining their own
//! literals.

// =============================================================================
// MANAGER
// =============================================================================

/// Whether enablement decisions may change at runtime by default.
///
/// Dynamic managers are re-queried by the optimised handler on every call.
pub const NOTIFICATIONS_DYNAMIC: bool = false;

/// Whether the asynchronous delivery worker runs by default.
pub const WORKER_ENABLED: bool = true;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Environment variable overriding [`NOTIFICATIONS_DYNAMIC`].
pub const ENV_NOTIFICATIONS_DYNAMIC: &str = "HERALD_NOTIFICATIONS_DYNAMIC";

/// Environment variable overriding [`WORKER_ENABLED`].
pub const ENV_WORKER_ENABLED: &str = "HERALD_WORKER_ENABLED";
