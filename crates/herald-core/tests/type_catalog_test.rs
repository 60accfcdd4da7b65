/// Tests for the type catalog as used by declarative configuration.
///
/// Names in a `NotificationsConfig` are resolved against the catalog; these
/// tests check that a realistic hierarchy resolves and classifies as the bus
/// expects.
use herald_core::{NotificationsConfig, TypeCatalog, TypeTag};

fn catalog() -> TypeCatalog {
    let mut b = TypeCatalog::builder();
    let flow = b.event("org.herald.FlowNotification", &[]).unwrap();
    b.event("org.herald.FlowStarted", &[flow]).unwrap();
    b.event(
        "org.herald.SecurityNotification",
        &[TypeTag::NOTIFICATION, TypeTag::BLOCKING_NOTIFICATION],
    )
    .unwrap();
    let flow_listener = b.listener("org.herald.FlowListener", &[]).unwrap();
    let security_listener = b.listener("org.herald.SecurityListener", &[]).unwrap();
    b.listener(
        "org.herald.AuditTrail",
        &[flow_listener, security_listener],
    )
    .unwrap();
    b.build()
}

#[test]
fn test_config_names_resolve() {
    let catalog = catalog();
    let config = NotificationsConfig::from_yaml_str(
        r#"
bindings:
  - event: org.herald.FlowNotification
    interface: org.herald.FlowListener
  - event: org.herald.SecurityNotification
    interface: org.herald.SecurityListener
"#,
    )
    .unwrap();

    for binding in &config.bindings {
        let event = catalog.resolve(&binding.event).unwrap();
        let iface = catalog.resolve(&binding.interface).unwrap();
        assert!(catalog.is_notification(event), "{} is an event", binding.event);
        assert!(!catalog.is_notification(iface), "{} is a listener", binding.interface);
    }
}

#[test]
fn test_listener_implementing_two_capabilities() {
    let catalog = catalog();
    let trail = catalog.resolve("org.herald.AuditTrail").unwrap();
    let flow_listener = catalog.resolve("org.herald.FlowListener").unwrap();
    let security_listener = catalog.resolve("org.herald.SecurityListener").unwrap();

    assert!(catalog.is_assignable(flow_listener, trail));
    assert!(catalog.is_assignable(security_listener, trail));
    assert!(catalog.is_assignable(TypeTag::NOTIFICATION_LISTENER, trail));
    assert!(!catalog.is_assignable(trail, flow_listener));
}

#[test]
fn test_blocking_marker_is_inherited_only_where_declared() {
    let catalog = catalog();
    let security = catalog.resolve("org.herald.SecurityNotification").unwrap();
    let started = catalog.resolve("org.herald.FlowStarted").unwrap();

    assert!(catalog.is_blocking(security));
    assert!(!catalog.is_blocking(started));
    assert!(!catalog.is_blocking(TypeTag::NOTIFICATION));
}
