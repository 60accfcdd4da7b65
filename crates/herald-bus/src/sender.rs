//! Per-listener delivery adapter with its compiled subscription filter.

use std::panic::{catch_unwind, AssertUnwindSafe};

use regex::{Regex, RegexBuilder};
use tracing::{error, trace};

use herald_core::{Error, ListenerSubscriptionPair, Notification, Result, TypeTag};

/// Case-insensitive, full-string wildcard matcher.
///
/// `*` matches any run of characters and `?` exactly one; every other
/// character is literal. Comma-separated alternatives match if any does.
#[derive(Debug, Clone)]
pub struct WildcardFilter {
    pattern: String,
    regex: Regex,
}

impl WildcardFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let alternatives: Vec<String> = pattern
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(glob_to_regex)
            .collect();

        if alternatives.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "subscription '{}' has no pattern",
                pattern
            )));
        }

        let regex = RegexBuilder::new(&format!("^(?:{})$", alternatives.join("|")))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("subscription '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Binds one listener registration to its compiled filter.
#[derive(Debug)]
pub struct Sender {
    pair: ListenerSubscriptionPair,
    filter: Option<WildcardFilter>,
    listener_type: TypeTag,
}

impl Sender {
    /// Compile the pair's subscription. Fails with `InvalidArgument` when
    /// the subscription contains no pattern.
    ///
    /// The listener's type is read once here and never again.
    pub fn new(pair: ListenerSubscriptionPair) -> Result<Self> {
        let filter = pair.subscription().map(WildcardFilter::new).transpose()?;
        let listener_type = pair.listener().listener_type();
        Ok(Self {
            pair,
            filter,
            listener_type,
        })
    }

    pub fn pair(&self) -> &ListenerSubscriptionPair {
        &self.pair
    }

    pub fn listener_type(&self) -> TypeTag {
        self.listener_type
    }

    /// True when the filter admits `notification`. A filtered sender never
    /// admits a notification without a resource identifier.
    pub fn accepts(&self, notification: &Notification) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => notification
                .resource_identifier()
                .map(|id| filter.matches(id))
                .unwrap_or(false),
        }
    }

    /// Deliver `notification` if the filter admits it.
    ///
    /// Returns whether the listener was invoked. A panicking listener is
    /// logged and counts as invoked.
    pub fn dispatch(&self, notification: &Notification) -> bool {
        if !self.accepts(notification) {
            trace!(
                notification_id = %notification.id,
                resource = ?notification.resource_identifier(),
                subscription = ?self.pair.subscription(),
                "Subscription filter rejected notification"
            );
            return false;
        }

        let listener = self.pair.listener();
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_notification(notification)));
        if let Err(panic) = outcome {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                notification_id = %notification.id,
                action = %notification.action,
                subscription = ?self.pair.subscription(),
                error = %message,
                "Listener failed while handling notification"
            );
        }
        true
    }
}
