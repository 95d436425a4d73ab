// Integration tests for `WsClient` against a local tokio-tungstenite server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use reel_api::{ConnectionState, MessageType, ReconnectConfig, WsClient, WsConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

struct TestServer {
    url: Url,
    /// Text frames the server received.
    seen: mpsc::UnboundedReceiver<String>,
    /// Text frames for the server to push.
    push: mpsc::UnboundedSender<String>,
    /// `Authorization` header of the upgrade request.
    auth: oneshot::Receiver<Option<String>>,
}

/// Accept a single WebSocket connection and relay frames over channels.
async fn spawn_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (seen_tx, seen) = mpsc::unbounded_channel();
    let (push, mut push_rx) = mpsc::unbounded_channel::<String>();
    let (auth_tx, auth) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();

        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let _ = auth_tx.send(header);
            Ok(resp)
        };

        let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = seen_tx.send(text.as_str().to_owned());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
                outgoing = push_rx.recv() => match outgoing {
                    Some(text) => write.send(Message::text(text)).await.unwrap(),
                    None => break,
                },
            }
        }
    });

    TestServer {
        url: Url::parse(&format!("ws://{addr}/ws")).unwrap(),
        seen,
        push,
        auth,
    }
}

async fn wait_connected(client: &WsClient) {
    let mut state = client.connection_state();
    tokio::time::timeout(
        TIMEOUT,
        state.wait_for(|c| c.state == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_receives_messages_of_requested_type() {
    let server = spawn_server().await;
    let client = WsClient::connect(server.url.clone(), WsConfig::default(), CancellationToken::new())
        .unwrap();
    wait_connected(&client).await;

    let mut cinemas = client.on(&MessageType::from("cinemas"));

    server
        .push
        .send(json!({ "type": "movies", "status": "update", "data": { "id": 9 } }).to_string())
        .unwrap();
    server
        .push
        .send(
            json!({ "type": "cinemas", "status": "snapshot", "data": [{ "id": 1, "name": "IMAX", "color": "#000" }] })
                .to_string(),
        )
        .unwrap();

    let msg = tokio::time::timeout(TIMEOUT, cinemas.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.message_type.as_str(), "cinemas");
    assert_eq!(msg.data, Some(json!([{ "id": 1, "name": "IMAX", "color": "#000" }])));

    client.shutdown();
}

#[tokio::test]
async fn test_send_reaches_server() {
    let mut server = spawn_server().await;
    let client = WsClient::connect(server.url.clone(), WsConfig::default(), CancellationToken::new())
        .unwrap();
    wait_connected(&client).await;

    client
        .send(&json!({ "type": "cinemas", "action": "list" }))
        .unwrap();

    let text = tokio::time::timeout(TIMEOUT, server.seen.recv())
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({ "type": "cinemas", "action": "list" }));

    client.shutdown();
}

#[tokio::test]
async fn test_send_before_connect_is_flushed_on_connect() {
    let mut server = spawn_server().await;
    let client = WsClient::connect(server.url.clone(), WsConfig::default(), CancellationToken::new())
        .unwrap();

    // Queued immediately, before the handshake has had a chance to run.
    client.send(&json!({ "type": "cinemas", "action": "subscribe" })).unwrap();

    let text = tokio::time::timeout(TIMEOUT, server.seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(text.contains("subscribe"));

    client.shutdown();
}

#[tokio::test]
async fn test_bearer_token_sent_on_upgrade() {
    let server = spawn_server().await;
    let config = WsConfig {
        token: Some(secrecy::SecretString::from("s3cret".to_string())),
        ..WsConfig::default()
    };
    let client = WsClient::connect(server.url.clone(), config, CancellationToken::new()).unwrap();

    let header = tokio::time::timeout(TIMEOUT, server.auth)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(header.as_deref(), Some("Bearer s3cret"));

    client.shutdown();
}

#[tokio::test]
async fn test_shutdown_transitions_to_disconnected() {
    let server = spawn_server().await;
    let client = WsClient::connect(server.url.clone(), WsConfig::default(), CancellationToken::new())
        .unwrap();
    wait_connected(&client).await;

    let mut state = client.connection_state();
    client.shutdown();

    let change = *tokio::time::timeout(
        TIMEOUT,
        state.wait_for(|c| c.state == ConnectionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(change.prev_state, Some(ConnectionState::Connected));
}

#[tokio::test]
async fn test_parent_token_cancels_client() {
    let server = spawn_server().await;
    let parent = CancellationToken::new();
    let client = WsClient::connect(server.url.clone(), WsConfig::default(), parent.clone()).unwrap();
    wait_connected(&client).await;

    let mut state = client.connection_state();
    parent.cancel();

    tokio::time::timeout(
        TIMEOUT,
        state.wait_for(|c| c.state == ConnectionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn test_dropping_client_leaves_parent_token_alone() {
    let parent = CancellationToken::new();
    let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
    let client = WsClient::connect(url, WsConfig::default(), parent.clone()).unwrap();

    drop(client);
    assert!(!parent.is_cancelled());
}

#[tokio::test]
async fn test_clean_close_waits_before_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();

    // Accept each connection and close it straight away.
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let _ = accepted_tx.send(tokio::time::Instant::now());
            if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                let _ = ws.close(None).await;
            }
        }
    });

    let delay = Duration::from_millis(300);
    let config = WsConfig {
        reconnect: ReconnectConfig {
            initial_delay: delay,
            ..ReconnectConfig::default()
        },
        ..WsConfig::default()
    };
    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    let client = WsClient::connect(url, config, CancellationToken::new()).unwrap();

    let first = tokio::time::timeout(TIMEOUT, accepted.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(TIMEOUT, accepted.recv()).await.unwrap().unwrap();
    assert!(
        second - first >= delay,
        "reconnected after {:?}, expected at least {delay:?}",
        second - first
    );

    client.shutdown();
}
