//! Explicit type hierarchy for notifications and listener capabilities.
//!
//! Every notification kind, listener capability and concrete listener type is
//! registered in a [`TypeCatalog`] together with its parents. Subtype checks
//! ("is `sub` the same as, or derived from, `sup`") are answered from the
//! ancestor set computed at registration time, so the dispatch hot path never
//! walks the graph.
//!
//! Three roots are always present:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | [`TypeTag::NOTIFICATION`] | Root of every event type |
//! | [`TypeTag::BLOCKING_NOTIFICATION`] | Marker: delivered synchronously |
//! | [`TypeTag::NOTIFICATION_LISTENER`] | Root of listener capabilities |

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Opaque handle to a type registered in a [`TypeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Root of every notification (event) type.
    pub const NOTIFICATION: TypeTag = TypeTag(0);

    /// Marker for notifications that must be delivered on the firing thread.
    pub const BLOCKING_NOTIFICATION: TypeTag = TypeTag(1);

    /// Root of every listener capability.
    pub const NOTIFICATION_LISTENER: TypeTag = TypeTag(2);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A type given either by its registered name or by a direct handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Name(String),
    Tag(TypeTag),
}

impl From<TypeTag> for TypeRef {
    fn from(tag: TypeTag) -> Self {
        TypeRef::Tag(tag)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Name(name) => f.write_str(name),
            TypeRef::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    parents: Vec<TypeTag>,
    /// Sorted; always contains the entry's own tag.
    ancestors: Vec<TypeTag>,
}

/// Builder for an immutable [`TypeCatalog`].
#[derive(Debug, Clone)]
pub struct TypeCatalogBuilder {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeTag>,
}

impl Default for TypeCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalogBuilder {
    /// Create a builder pre-populated with the built-in roots.
    pub fn new() -> Self {
        let mut builder = Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        };
        builder.push("Notification", Vec::new());
        builder.push("BlockingNotification", Vec::new());
        builder.push("NotificationListener", Vec::new());
        builder
    }

    fn push(&mut self, name: &str, parents: Vec<TypeTag>) -> TypeTag {
        let tag = TypeTag(self.entries.len() as u32);
        let mut ancestors = vec![tag];
        for parent in &parents {
            ancestors.extend_from_slice(&self.entries[parent.index()].ancestors);
        }
        ancestors.sort_unstable();
        ancestors.dedup();

        self.entries.push(TypeEntry {
            name: name.to_string(),
            parents,
            ancestors,
        });
        self.by_name.insert(name.to_string(), tag);
        tag
    }

    /// Register a type under `name`, deriving from every tag in `parents`.
    ///
    /// Parents must already be registered and names must be unique.
    pub fn register(&mut self, name: &str, parents: &[TypeTag]) -> Result<TypeTag> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("type name must not be empty".into()));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::InvalidArgument(format!(
                "type '{}' is already registered",
                name
            )));
        }
        if let Some(unknown) = parents.iter().find(|p| p.index() >= self.entries.len()) {
            return Err(Error::InvalidArgument(format!(
                "parent {} of '{}' is not registered",
                unknown, name
            )));
        }
        Ok(self.push(name, parents.to_vec()))
    }

    /// Register a notification type. With no parents it derives from
    /// [`TypeTag::NOTIFICATION`].
    pub fn event(&mut self, name: &str, parents: &[TypeTag]) -> Result<TypeTag> {
        if parents.is_empty() {
            self.register(name, &[TypeTag::NOTIFICATION])
        } else {
            self.register(name, parents)
        }
    }

    /// Register a listener capability or concrete listener type. With no
    /// parents it derives from [`TypeTag::NOTIFICATION_LISTENER`].
    pub fn listener(&mut self, name: &str, parents: &[TypeTag]) -> Result<TypeTag> {
        if parents.is_empty() {
            self.register(name, &[TypeTag::NOTIFICATION_LISTENER])
        } else {
            self.register(name, parents)
        }
    }

    pub fn build(self) -> TypeCatalog {
        TypeCatalog {
            entries: self.entries,
            by_name: self.by_name,
        }
    }
}

/// Immutable catalog of registered types with precomputed ancestry.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeTag>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        TypeCatalogBuilder::new().build()
    }
}

impl TypeCatalog {
    pub fn builder() -> TypeCatalogBuilder {
        TypeCatalogBuilder::new()
    }

    /// True iff `sub` is `sup` or derives from it (directly or transitively).
    ///
    /// Tags unknown to this catalog are never assignable.
    pub fn is_assignable(&self, sup: TypeTag, sub: TypeTag) -> bool {
        self.entries
            .get(sub.index())
            .map(|e| e.ancestors.binary_search(&sup).is_ok())
            .unwrap_or(false)
    }

    /// True iff `tag` is a notification (event) type.
    pub fn is_notification(&self, tag: TypeTag) -> bool {
        self.is_assignable(TypeTag::NOTIFICATION, tag)
    }

    /// True iff notifications of `tag` must be delivered synchronously.
    pub fn is_blocking(&self, tag: TypeTag) -> bool {
        self.is_assignable(TypeTag::BLOCKING_NOTIFICATION, tag)
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        tag.index() < self.entries.len()
    }

    pub fn name(&self, tag: TypeTag) -> Option<&str> {
        self.entries.get(tag.index()).map(|e| e.name.as_str())
    }

    /// Direct parents of `tag`, empty for roots and unknown tags.
    pub fn parents(&self, tag: TypeTag) -> &[TypeTag] {
        self.entries
            .get(tag.index())
            .map(|e| e.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a fully qualified type name.
    pub fn resolve(&self, name: &str) -> Result<TypeTag> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::TypeResolution(name.to_string()))
    }

    /// Resolve a name-or-handle reference. Handles must belong to this catalog.
    pub fn resolve_ref(&self, type_ref: &TypeRef) -> Result<TypeTag> {
        match type_ref {
            TypeRef::Name(name) => self.resolve(name),
            TypeRef::Tag(tag) if self.contains(*tag) => Ok(*tag),
            TypeRef::Tag(tag) => Err(Error::TypeResolution(format!(
                "{} is not registered in this catalog",
                tag
            ))),
        }
    }

    /// Display helper used in log fields.
    pub fn describe(&self, tag: TypeTag) -> String {
        self.name(tag)
            .map(String::from)
            .unwrap_or_else(|| tag.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (TypeCatalog, TypeTag, TypeTag, TypeTag, TypeTag) {
        let mut b = TypeCatalog::builder();
        let order = b.event("OrderCreated", &[]).unwrap();
        let high = b.event("OrderCreatedHighPriority", &[order]).unwrap();
        let audit = b
            .event(
                "AuditRecorded",
                &[TypeTag::NOTIFICATION, TypeTag::BLOCKING_NOTIFICATION],
            )
            .unwrap();
        let listens = b.listener("OrderListener", &[]).unwrap();
        (b.build(), order, high, audit, listens)
    }

    #[test]
    fn test_builtin_roots_present() {
        let catalog = TypeCatalog::default();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.name(TypeTag::NOTIFICATION), Some("Notification"));
        assert_eq!(
            catalog.resolve("BlockingNotification").unwrap(),
            TypeTag::BLOCKING_NOTIFICATION
        );
        assert_eq!(
            catalog.resolve("NotificationListener").unwrap(),
            TypeTag::NOTIFICATION_LISTENER
        );
    }

    #[test]
    fn test_assignable_is_reflexive_and_transitive() {
        let (catalog, order, high, _, _) = sample();
        assert!(catalog.is_assignable(order, order));
        assert!(catalog.is_assignable(order, high));
        assert!(catalog.is_assignable(TypeTag::NOTIFICATION, high));
        assert!(!catalog.is_assignable(high, order));
    }

    #[test]
    fn test_multiple_parents() {
        let (catalog, order, _, audit, _) = sample();
        assert!(catalog.is_notification(audit));
        assert!(catalog.is_blocking(audit));
        assert!(!catalog.is_blocking(order));
        assert_eq!(catalog.parents(audit).len(), 2);
    }

    #[test]
    fn test_listener_is_not_a_notification() {
        let (catalog, _, _, _, listens) = sample();
        assert!(!catalog.is_notification(listens));
        assert!(catalog.is_assignable(TypeTag::NOTIFICATION_LISTENER, listens));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut b = TypeCatalog::builder();
        b.event("Ping", &[]).unwrap();
        let err = b.event("Ping", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut b = TypeCatalog::builder();
        let err = b.register("Orphan", &[TypeTag(42)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_resolve_unknown_name() {
        let catalog = TypeCatalog::default();
        let err = catalog.resolve("com.acme.Missing").unwrap_err();
        assert!(matches!(err, Error::TypeResolution(ref n) if n == "com.acme.Missing"));
    }

    #[test]
    fn test_resolve_ref_variants() {
        let (catalog, order, _, _, _) = sample();
        assert_eq!(catalog.resolve_ref(&"OrderCreated".into()).unwrap(), order);
        assert_eq!(catalog.resolve_ref(&order.into()).unwrap(), order);
        assert!(catalog.resolve_ref(&TypeRef::Tag(TypeTag(99))).is_err());
    }

    #[test]
    fn test_unknown_tag_never_assignable() {
        let catalog = TypeCatalog::default();
        assert!(!catalog.is_assignable(TypeTag::NOTIFICATION, TypeTag(77)));
        assert_eq!(catalog.describe(TypeTag(77)), "#77");
    }
}
