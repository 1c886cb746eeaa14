//! Integration test: drive the relay over a real WebSocket connection.
//! Frames are handled in order on one connection, so the first reply observed after
//! several ignored frames proves those frames produced no output.

use futures_util::{SinkExt, StreamExt};
use relay::config::Config;
use relay::gateway;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn local_config(port: u16) -> Config {
    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config
}

async fn connect(port: u16) -> Ws {
    let url = format!("ws://127.0.0.1:{}/ws", port);
    let mut last_err = None;
    for _ in 0..100 {
        match tokio_tungstenite::connect_async(&url).await {
            Ok((ws, _)) => return ws,
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("could not connect to {} within 5s; last error: {:?}", url, last_err);
}

async fn start_relay() -> Ws {
    let port = free_port();
    let config = local_config(port);
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });
    connect(port).await
}

fn conversation_request(body: serde_json::Value) -> Message {
    Message::Text(
        serde_json::json!({
            "category": "scene",
            "kind": "request",
            "name": "conversationRequest",
            "body": body,
        })
        .to_string(),
    )
}

async fn next_reply(ws: &mut Ws) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("connection ended unexpectedly: {:?}", other),
            }
        }
    })
    .await
    .expect("reply within 5s");
    serde_json::from_str(&frame).expect("reply is JSON")
}

#[tokio::test]
async fn ignored_frames_produce_no_output_and_keep_connection_open() {
    let mut ws = start_relay().await;

    ws.send(Message::Text("this is not json".to_string())).await.expect("send junk");
    ws.send(Message::Text(
        r#"{"category":"scene","kind":"event","name":"state","body":{}}"#.to_string(),
    ))
    .await
    .expect("send other name");
    ws.send(conversation_request(serde_json::json!({ "input": {} })))
        .await
        .expect("send invalid body");
    ws.send(conversation_request(serde_json::json!({ "input": { "text": "Hello" } })))
        .await
        .expect("send request");

    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["name"], "conversationResponse");
    assert_eq!(reply["category"], "scene");
    assert_eq!(reply["kind"], "request");
    assert_eq!(reply["body"]["input"]["text"], "Hello");
    assert_eq!(reply["body"]["output"]["text"], "Echo: Hello");
    assert_eq!(reply["body"]["fallback"], false);
}

#[tokio::test]
async fn each_request_is_answered_in_order() {
    let mut ws = start_relay().await;

    ws.send(conversation_request(serde_json::json!({
        "input": { "text": "" },
        "optionalArgs": { "kind": "init" }
    })))
    .await
    .expect("send init");
    ws.send(conversation_request(serde_json::json!({ "input": { "text": "why not" } })))
        .await
        .expect("send why");
    ws.send(conversation_request(serde_json::json!({ "input": { "text": "show card" } })))
        .await
        .expect("send card");

    let greeting = next_reply(&mut ws).await;
    assert_eq!(greeting["body"]["output"]["text"], "Hi there!");

    let fallback = next_reply(&mut ws).await;
    assert_eq!(fallback["body"]["output"]["text"], "I do not know how to answer that");
    assert_eq!(fallback["body"]["fallback"], true);

    let card = next_reply(&mut ws).await;
    assert_eq!(card["body"]["output"]["text"], "Here is a cat @showcards(cat)");
    assert_eq!(card["body"]["variables"]["public-cat"]["component"], "image");
}

#[tokio::test]
async fn fallback_overrides_greeting_on_the_wire() {
    let mut ws = start_relay().await;

    ws.send(conversation_request(serde_json::json!({
        "input": { "text": "Why show card" },
        "optionalArgs": { "kind": "init" }
    })))
    .await
    .expect("send request");

    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["body"]["input"]["text"], "Why show card");
    assert_eq!(reply["body"]["output"]["text"], "I do not know how to answer that");
    assert_eq!(reply["body"]["fallback"], true);
    assert_eq!(reply["body"]["variables"], serde_json::json!({}));
}

#[tokio::test]
async fn shutdown_sends_close_frame_and_waits_for_connections() {
    let port = free_port();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(gateway::run_gateway_with_shutdown(local_config(port), async move {
        let _ = stop_rx.await;
    }));

    let mut ws = connect(port).await;
    ws.send(conversation_request(serde_json::json!({ "input": { "text": "Hello" } })))
        .await
        .expect("send request");
    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["body"]["output"]["text"], "Echo: Hello");

    stop_tx.send(()).expect("server still waiting for shutdown");

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("frame within 5s");
    assert!(
        matches!(frame, Some(Ok(Message::Close(_)))),
        "expected close frame, got {:?}",
        frame
    );

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops within 5s")
        .expect("server task not panicked");
    assert!(result.is_ok(), "server returned error: {:?}", result);
}
