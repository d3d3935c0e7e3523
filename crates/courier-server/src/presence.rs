use courier_core::ServerFrame;

use crate::client::ClientHub;
use crate::registry::SessionRegistry;

/// Fan the full current identity list out to every connection.
///
/// Full-replace semantics: each `user_list` frame is authoritative, never a
/// delta. The snapshot is taken under the registry lock; delivery happens
/// afterwards, against the hub's per-client queues.
pub fn broadcast_presence(hub: &ClientHub, registry: &SessionRegistry) {
    let users = registry.snapshot();
    tracing::debug!(count = users.len(), "Broadcasting presence");
    hub.broadcast(&ServerFrame::UserList { users });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_CLIENT_TIMEOUT;

    fn recv_frame(rx: &mut tokio::sync::mpsc::Receiver<String>) -> ServerFrame {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn presence_reaches_every_connection() {
        let hub = ClientHub::new(32, DEFAULT_CLIENT_TIMEOUT);
        let registry = SessionRegistry::new();

        // Two identified clients plus one that never set a name
        let (id_a, mut rx_a) = hub.register();
        let (id_b, mut rx_b) = hub.register();
        let (_id_c, mut rx_c) = hub.register();
        registry.register(&id_a, "10.0.0.1:1");
        registry.register(&id_b, "10.0.0.2:1");
        registry.bind(&id_a, "alice").unwrap();
        registry.bind(&id_b, "bob").unwrap();

        broadcast_presence(&hub, &registry);

        let expected = ServerFrame::UserList {
            users: vec!["alice".into(), "bob".into()],
        };
        assert_eq!(recv_frame(&mut rx_a), expected);
        assert_eq!(recv_frame(&mut rx_b), expected);
        assert_eq!(recv_frame(&mut rx_c), expected);
    }

    #[test]
    fn presence_matches_registry_snapshot() {
        let hub = ClientHub::new(32, DEFAULT_CLIENT_TIMEOUT);
        let registry = SessionRegistry::new();

        let (id_a, mut rx_a) = hub.register();
        registry.register(&id_a, "10.0.0.1:1");
        registry.bind(&id_a, "alice").unwrap();

        broadcast_presence(&hub, &registry);
        match recv_frame(&mut rx_a) {
            ServerFrame::UserList { users } => assert_eq!(users, registry.snapshot()),
            other => panic!("expected user_list, got {other:?}"),
        }
    }

    #[test]
    fn presence_with_no_identities_is_empty_list() {
        let hub = ClientHub::new(32, DEFAULT_CLIENT_TIMEOUT);
        let registry = SessionRegistry::new();
        let (_id, mut rx) = hub.register();

        broadcast_presence(&hub, &registry);
        assert_eq!(
            recv_frame(&mut rx),
            ServerFrame::UserList { users: vec![] }
        );
    }
}
