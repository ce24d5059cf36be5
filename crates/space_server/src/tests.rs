
// Include tests
#[cfg(test)]
mod tests {
    use crate::auth::{mint_token, Identity};
    use crate::config::AuthConfig;
    use crate::connection::{Outbound, Session};
    use crate::directory::{SpaceInfo, UserProfile};
    use crate::messaging::{MessageRouter, PeerSignal, ServerMessage};
    use crate::rooms::RoomRegistry;
    use crate::*;
    use futures::{SinkExt, StreamExt};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    const SECRET: &str = "test-secret";

    fn directory() -> Arc<InMemoryDirectory> {
        Arc::new(InMemoryDirectory::seeded(
            vec![
                SpaceInfo {
                    id: "r1".to_string(),
                    name: "Lobby".to_string(),
                    dimensions: Some("1000x1000".to_string()),
                },
                SpaceInfo {
                    id: "r2".to_string(),
                    name: "Garden".to_string(),
                    dimensions: None,
                },
            ],
            ["u-a", "u-b", "u-c"].iter().map(|user_id| UserProfile {
                user_id: user_id.to_string(),
                avatar_image_url: format!("https://img.example/{user_id}.png"),
                avatar_name: None,
            }),
        ))
    }

    fn router() -> MessageRouter {
        let directory = directory();
        MessageRouter::new(
            Arc::new(RoomRegistry::new()),
            directory.clone(),
            directory,
            &ServerConfig::default(),
        )
    }

    fn connect(user_id: &str) -> (Arc<Session>, UnboundedReceiver<Outbound>) {
        Session::channel(Identity {
            user_id: user_id.to_string(),
            username: user_id.trim_start_matches("u-").to_string(),
        })
    }

    fn join(space: &str, peer: &str) -> String {
        format!(r#"{{"type":"join","payload":{{"spaceId":"{space}","peerId":"{peer}"}}}}"#)
    }

    fn moved(x: f64, y: f64) -> String {
        format!(r#"{{"type":"move","payload":{{"x":{x},"y":{y},"spaceId":"r1"}}}}"#)
    }

    /// Everything queued for a session so far.
    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Message(message) = item {
                messages.push(message);
            }
        }
        messages
    }

    fn call_init(peer: &str) -> ServerMessage {
        ServerMessage::CallInit(PeerSignal {
            remote_peer_id: peer.to_string(),
        })
    }

    fn remove_peer(peer: &str) -> ServerMessage {
        ServerMessage::RemovePeerId(PeerSignal {
            remote_peer_id: peer.to_string(),
        })
    }

    #[tokio::test]
    async fn test_join_announces_to_existing_members() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");

        router.route(&a, &join("r1", "pa")).await;
        drain(&mut rx_a);
        router.route(&b, &join("r1", "pb")).await;

        match drain(&mut rx_b).as_slice() {
            [ServerMessage::SpaceJoined(payload)] => {
                assert_eq!(payload.users.len(), 1);
                assert_eq!(payload.users[0].id, a.id());
                assert_eq!(payload.users[0].peer_id.as_deref(), Some("pa"));
                assert_eq!(
                    payload.spawn.avatar_image_url.as_deref(),
                    Some("https://img.example/u-b.png")
                );
            }
            other => panic!("unexpected messages for joiner: {other:?}"),
        }

        match drain(&mut rx_a).as_slice() {
            [ServerMessage::UserJoined(view)] => {
                assert_eq!(view.id, b.id());
                assert_eq!(view.user_id.as_deref(), Some("u-b"));
                assert_eq!(view.username.as_deref(), Some("b"));
            }
            other => panic!("unexpected messages for member: {other:?}"),
        }
        assert_eq!(router.rooms().get_user_count("r1").await, 2);
    }

    #[tokio::test]
    async fn test_walking_into_range_starts_call() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");
        router.route(&a, &join("r1", "pa")).await;
        router.route(&b, &join("r1", "pb")).await;

        router.route(&a, &moved(100.0, 100.0)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router.route(&b, &moved(150.0, 100.0)).await;

        let to_b = drain(&mut rx_b);
        assert_eq!(to_b, vec![call_init("pa")]);

        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.len(), 2);
        assert!(matches!(
            &to_a[0],
            ServerMessage::Movement(m) if m.x == 150.0 && m.y == 100.0 && m.user_id.as_deref() == Some("u-b")
        ));
        assert_eq!(to_a[1], call_init("pb"));
    }

    #[tokio::test]
    async fn test_walking_out_of_range_ends_call() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");
        router.route(&a, &join("r1", "pa")).await;
        router.route(&b, &join("r1", "pb")).await;
        router.route(&a, &moved(100.0, 100.0)).await;
        router.route(&b, &moved(150.0, 100.0)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router.route(&b, &moved(400.0, 100.0)).await;

        assert_eq!(drain(&mut rx_b), vec![remove_peer("pa")]);
        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.last(), Some(&remove_peer("pb")));
    }

    #[tokio::test]
    async fn test_boundary_distance_counts_as_nearby() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");
        router.route(&a, &join("r1", "pa")).await;
        router.route(&b, &join("r1", "pb")).await;
        router.route(&a, &moved(0.0, 0.0)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router.route(&b, &moved(60.0, 80.0)).await;
        assert_eq!(drain(&mut rx_b), vec![call_init("pa")]);
    }

    #[tokio::test]
    async fn test_same_account_never_calls_itself() {
        let router = router();
        let (first_tab, mut rx_1) = connect("u-a");
        let (second_tab, mut rx_2) = connect("u-a");
        router.route(&first_tab, &join("r1", "pa-1")).await;
        router.route(&second_tab, &join("r1", "pa-2")).await;
        drain(&mut rx_1);
        drain(&mut rx_2);

        router.route(&second_tab, &moved(549.0, 749.0)).await;

        let to_first = drain(&mut rx_1);
        assert_eq!(to_first.len(), 1);
        assert!(matches!(to_first[0], ServerMessage::Movement(_)));
        assert!(drain(&mut rx_2).is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_announces_departure_and_empties_room() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");
        router.route(&a, &join("r1", "pa")).await;
        router.route(&b, &join("r1", "pb")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router.disconnect(&b).await;
        match drain(&mut rx_a).as_slice() {
            [ServerMessage::UserLeft(payload)] => {
                assert_eq!(payload.id, b.id());
                assert_eq!(payload.user_id.as_deref(), Some("u-b"));
            }
            other => panic!("unexpected messages: {other:?}"),
        }
        assert_eq!(router.rooms().get_user_count("r1").await, 1);

        // A second close for the same connection is silent
        router.disconnect(&b).await;
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(router.rooms().get_user_count("r1").await, 1);

        router.disconnect(&a).await;
        assert!(router.rooms().get_users("r1").await.is_none());
        assert!(router.rooms().room_ids().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_receive_space_joined_first() {
        for _ in 0..200 {
            let router = Arc::new(router());
            let (a, mut rx_a) = connect("u-a");
            let (b, mut rx_b) = connect("u-b");

            let first = {
                let router = router.clone();
                tokio::spawn(async move { router.route(&a, &join("r1", "pa")).await })
            };
            let second = {
                let router = router.clone();
                tokio::spawn(async move { router.route(&b, &join("r1", "pb")).await })
            };
            first.await.unwrap();
            second.await.unwrap();

            for rx in [&mut rx_a, &mut rx_b] {
                let messages = drain(rx);
                assert!(
                    matches!(messages.first(), Some(ServerMessage::SpaceJoined(_))),
                    "unexpected order: {messages:?}"
                );
            }
            assert_eq!(router.rooms().get_user_count("r1").await, 2);
        }
    }

    #[tokio::test]
    async fn test_rejoin_elsewhere_leaves_previous_room() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, mut rx_b) = connect("u-b");
        router.route(&a, &join("r1", "pa")).await;
        router.route(&b, &join("r1", "pb")).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        router.route(&a, &join("r2", "pa")).await;

        assert!(matches!(drain(&mut rx_b).as_slice(), [ServerMessage::UserLeft(_)]));
        assert!(matches!(drain(&mut rx_a).as_slice(), [ServerMessage::SpaceJoined(_)]));
        assert_eq!(router.rooms().get_user_count("r1").await, 1);
        assert_eq!(router.rooms().get_user_count("r2").await, 1);
        assert_eq!(a.room_id().await.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_dead_member_is_evicted_during_fanout() {
        let router = router();
        let (a, mut rx_a) = connect("u-a");
        let (b, rx_b) = connect("u-b");
        let (c, mut rx_c) = connect("u-c");
        for (session, peer) in [(&a, "pa"), (&b, "pb"), (&c, "pc")] {
            router.route(session, &join("r1", peer)).await;
        }
        drain(&mut rx_a);
        drain(&mut rx_c);
        drop(rx_b);

        router.route(&a, &moved(10.0, 10.0)).await;

        assert!(drain(&mut rx_c)
            .iter()
            .any(|m| matches!(m, ServerMessage::Movement(_))));
        assert_eq!(router.rooms().get_user_count("r1").await, 2);
    }

    #[tokio::test]
    async fn test_end_to_end_join_over_websocket() {
        let config = ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            auth: AuthConfig {
                jwt_secret: SECRET.to_string(),
                leeway_secs: 0,
            },
            ..Default::default()
        };
        let server = Arc::new(create_server_with_directory(config, directory()));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener, None).await })
        };

        let token = mint_token(
            SECRET,
            &Identity {
                user_id: "u-a".to_string(),
                username: "a".to_string(),
            },
            Duration::from_secs(3600),
        )
        .unwrap();
        let (mut ws, _) = connect_async(format!("ws://{addr}/?token={token}"))
            .await
            .expect("authorized handshake");

        ws.send(Message::Text(join("r1", "pa").into())).await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("reply in time")
            .expect("stream open")
            .unwrap();
        let reply: ServerMessage = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        match reply {
            ServerMessage::SpaceJoined(payload) => {
                assert!(server.config().spawn.contains(payload.spawn.x, payload.spawn.y));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(server.get_connection_manager().connection_count().await, 1);
        assert_eq!(server.get_rooms().get_user_count("r1").await, 1);

        ws.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while server.get_connection_manager().connection_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection cleaned up");
        assert!(server.get_rooms().get_users("r1").await.is_none());

        server.shutdown().await.unwrap();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handshake_without_token_is_refused() {
        let config = ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = Arc::new(create_server_with_config(config));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener, None).await });
        }

        let refused = connect_async(format!("ws://{addr}/")).await;
        match refused {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 401);
            }
            Err(e) => panic!("expected HTTP refusal, got {e}"),
            Ok(_) => panic!("handshake without a token was accepted"),
        }
        assert_eq!(server.get_connection_manager().connection_count().await, 0);
        server.shutdown().await.unwrap();
    }
}
