use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::protocol::Message as WsMessage;

use crate::router::{MessageKind, Router};
use crate::transport::message::{AuthRequest, ServerMessage};
use crate::transport::websocket::{serve, shared_secret};
use crate::utils::error::RouterError;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn setup_server() -> (String, Arc<Router>, tokio::task::JoinHandle<Result<(), RouterError>>) {
    let router = Arc::new(Router::new(64));
    let runner = tokio::spawn({
        let router = router.clone();
        async move { router.run().await }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve(
        listener,
        router.clone(),
        shared_secret(Some("welcome".to_string())),
    ));

    (addr, router, runner)
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(WsMessage::text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

async fn recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if frame.is_text() {
            let text = frame.to_text().unwrap();
            return serde_json::from_str(text)
                .unwrap_or_else(|e| panic!("Failed to deserialize ServerMessage from '{text}': {e}"));
        }
    }
}

async fn connect(addr: &str, id: &str, credential: &str, topics: &[&str]) -> Ws {
    let (mut ws, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("WebSocket handshake failed");
    send_json(
        &mut ws,
        json!({ "type": "auth", "id": id, "credential": credential, "topics": topics }),
    )
    .await;
    ws
}

async fn connect_authenticated(addr: &str, id: &str, topics: &[&str]) -> Ws {
    let mut ws = connect(addr, id, "welcome", topics).await;
    match recv(&mut ws).await {
        ServerMessage::Authenticated { id: got } => assert_eq!(got, id),
        other => panic!("Expected Authenticated, got {other:?}"),
    }
    ws
}

async fn expect_error(ws: &mut Ws) -> String {
    match recv(ws).await {
        ServerMessage::Error { message } => message,
        other => panic!("Expected Error, got {other:?}"),
    }
}

async fn expect_closed(ws: &mut Ws) {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("connection was not closed");
        match frame {
            None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

async fn wait_for_subscribers(router: &Router, expected: usize) {
    for _ in 0..100 {
        if router.subscriber_count() == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} subscribers, found {}",
        router.subscriber_count()
    );
}

#[test]
fn test_shared_secret() {
    let request = |credential: &str| AuthRequest {
        id: "aaa".to_string(),
        credential: credential.to_string(),
    };

    let check = shared_secret(Some("welcome".to_string()));
    assert!(check(&request("welcome")));
    assert!(!check(&request("nope")));

    let open = shared_secret(None);
    assert!(open(&request("anything")));
}

#[tokio::test]
async fn test_broadcast_between_clients() {
    let (addr, router, _runner) = setup_server().await;
    let mut ws_a = connect_authenticated(&addr, "aaa", &["test"]).await;
    let mut ws_b = connect_authenticated(&addr, "bbb", &["test"]).await;

    send_json(
        &mut ws_a,
        json!({ "type": "publish", "topic": "test", "payload": "hello world" }),
    )
    .await;

    for ws in [&mut ws_a, &mut ws_b] {
        match recv(ws).await {
            ServerMessage::Message {
                kind,
                sender,
                destination,
                payload,
                ..
            } => {
                assert_eq!(kind, MessageKind::Broadcast);
                assert_eq!(sender, "aaa");
                assert_eq!(destination, "test");
                assert_eq!(payload, "hello world");
            }
            other => panic!("Expected Message, got {other:?}"),
        }
    }
    assert_eq!(router.topic_count(), 1);
}

#[tokio::test]
async fn test_point_to_point_between_clients() {
    let (addr, _router, _runner) = setup_server().await;
    let mut ws_a = connect_authenticated(&addr, "aaa", &["test"]).await;
    let mut ws_b = connect_authenticated(&addr, "bbb", &[]).await;

    send_json(&mut ws_a, json!({ "type": "send", "to": "bbb", "payload": "hahaha" })).await;

    match recv(&mut ws_b).await {
        ServerMessage::Message {
            kind,
            sender,
            payload,
            ..
        } => {
            assert_eq!(kind, MessageKind::PointToPoint);
            assert_eq!(sender, "aaa");
            assert_eq!(payload, "hahaha");
        }
        other => panic!("Expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_subscribe_after_connect() {
    let (addr, router, _runner) = setup_server().await;
    let mut ws_a = connect_authenticated(&addr, "aaa", &[]).await;
    let mut ws_b = connect_authenticated(&addr, "bbb", &[]).await;

    send_json(&mut ws_b, json!({ "type": "subscribe", "topics": ["news"] })).await;
    for _ in 0..100 {
        if router.topic_count() == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(router.topic_count(), 1);

    send_json(&mut ws_a, json!({ "type": "publish", "topic": "news", "payload": "extra" })).await;
    match recv(&mut ws_b).await {
        ServerMessage::Message { payload, .. } => assert_eq!(payload, "extra"),
        other => panic!("Expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_action_before_auth_fails() {
    let (addr, router, _runner) = setup_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

    send_json(&mut ws, json!({ "type": "subscribe", "topics": ["test"] })).await;

    assert_eq!(expect_error(&mut ws).await, "must authenticate first");
    expect_closed(&mut ws).await;
    assert_eq!(router.subscriber_count(), 0);
}

#[tokio::test]
async fn test_auth_failure() {
    let (addr, router, _runner) = setup_server().await;
    let mut ws = connect(&addr, "aaa", "wrong", &["test"]).await;

    assert_eq!(expect_error(&mut ws).await, "authentication failed");
    expect_closed(&mut ws).await;
    assert_eq!(router.subscriber_count(), 0);
}

#[tokio::test]
async fn test_identity_conflict_rejected() {
    let (addr, router, _runner) = setup_server().await;
    let _first = connect_authenticated(&addr, "aaa", &["test"]).await;
    let mut second = connect(&addr, "aaa", "welcome", &["other"]).await;

    assert_eq!(expect_error(&mut second).await, "identity conflict: aaa");
    expect_closed(&mut second).await;
    assert_eq!(router.subscriber_count(), 1);
    assert_eq!(router.topic_count(), 1);
}

#[tokio::test]
async fn test_invalid_message_keeps_connection() {
    let (addr, _router, _runner) = setup_server().await;
    let mut ws = connect_authenticated(&addr, "aaa", &["test"]).await;

    ws.send(WsMessage::text("not json")).await.unwrap();
    assert!(expect_error(&mut ws).await.starts_with("invalid message"));

    send_json(&mut ws, json!({ "type": "send", "to": "aaa", "payload": "still here" })).await;
    match recv(&mut ws).await {
        ServerMessage::Message { payload, .. } => assert_eq!(payload, "still here"),
        other => panic!("Expected Message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_unregisters_client() {
    let (addr, router, _runner) = setup_server().await;
    let mut ws = connect_authenticated(&addr, "aaa", &["test"]).await;
    assert_eq!(router.subscriber_count(), 1);

    ws.close(None).await.expect("Failed to close WebSocket");
    wait_for_subscribers(&router, 0).await;
    assert_eq!(router.topic_count(), 0);

    // The identity is free again.
    let _again = connect_authenticated(&addr, "aaa", &["test"]).await;
}

#[tokio::test]
async fn test_authenticated_precedes_routed_messages() {
    let (addr, _router, _runner) = setup_server().await;
    let mut ws_a = connect_authenticated(&addr, "aaa", &[]).await;

    for n in 0..200 {
        send_json(
            &mut ws_a,
            json!({ "type": "publish", "topic": "busy", "payload": format!("m{n}") }),
        )
        .await;
    }

    // Registration happens while the topic is flooded; the first frame must
    // still be the acknowledgement.
    for id in ["b0", "b1", "b2", "b3"] {
        let mut ws = connect(&addr, id, "welcome", &["busy"]).await;
        match recv(&mut ws).await {
            ServerMessage::Authenticated { id: got } => assert_eq!(got, id),
            other => panic!("Expected Authenticated first, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_router_close_disconnects_clients() {
    let (addr, router, runner) = setup_server().await;
    let mut ws_a = connect_authenticated(&addr, "aaa", &["test"]).await;
    let mut ws_b = connect_authenticated(&addr, "bbb", &[]).await;

    router.close();
    runner.await.unwrap().unwrap();

    expect_closed(&mut ws_a).await;
    expect_closed(&mut ws_b).await;
}
