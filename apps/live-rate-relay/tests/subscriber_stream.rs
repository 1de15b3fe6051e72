//! Subscriber Stream Integration Tests
//!
//! Runs the real HTTP listener on an ephemeral port and talks to it with a
//! WebSocket client. Updates are injected through the dispatcher, so no
//! upstream is involved.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use live_rate_relay::domain::topic::{LiveSlot, MetadataSlot};
use live_rate_relay::infrastructure::http::{router, serve};
use live_rate_relay::{
    AppState, Broadcaster, CacheStore, SharedAppState, Topic, TopicUpdate, UpdateDispatcher,
    UpstreamStatus,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    addr: std::net::SocketAddr,
    state: SharedAppState,
    cache: Arc<CacheStore>,
    broadcaster: Arc<Broadcaster>,
    dispatcher: UpdateDispatcher,
    cancel: CancellationToken,
    server: tokio::task::JoinHandle<()>,
}

async fn start_relay() -> TestRelay {
    let cache = Arc::new(CacheStore::new());
    let broadcaster = Arc::new(Broadcaster::default());
    let dispatcher = UpdateDispatcher::new(Arc::clone(&cache), Arc::clone(&broadcaster) as _);
    let cancel = CancellationToken::new();
    let state = Arc::new(AppState::new(
        "test-0.0.1".to_string(),
        Arc::clone(&cache),
        Arc::clone(&broadcaster),
        Arc::new(UpstreamStatus::new()),
        cancel.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_state = Arc::clone(&state);
    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        serve(listener, server_state, server_cancel).await.unwrap();
    });

    TestRelay {
        addr,
        state,
        cache,
        broadcaster,
        dispatcher,
        cancel,
        server,
    }
}

async fn connect(relay: &TestRelay) -> Client {
    let (client, _response) = connect_async(format!("ws://{}/ws/stream", relay.addr))
        .await
        .unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_for_subscribers(relay: &TestRelay, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while relay.broadcaster.subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never settled");
}

#[tokio::test]
async fn first_message_is_initial_store_with_cached_state() {
    let relay = start_relay().await;
    relay
        .cache
        .write_metadata(MetadataSlot::ReferenceDetails, json!({"ref": "x"}));
    relay
        .cache
        .write_live(LiveSlot::Rates, json!({"gold": 6200}), Utc::now());

    let mut client = connect(&relay).await;
    let first = next_json(&mut client).await;

    assert_eq!(first["target"], json!("initialStore"));
    assert_eq!(first["data"]["referanceDetails"], json!({"ref": "x"}));
    assert_eq!(first["data"]["liveRates"], json!({"gold": 6200}));
    assert_eq!(first["data"]["workerPublishCoin"], Value::Null);
    assert!(first["data"]["lastUpdate"].is_string());
    assert!(first.get("timestamp").is_none());
}

#[tokio::test]
async fn empty_cache_still_sends_initial_store() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;

    let first = next_json(&mut client).await;

    assert_eq!(first["target"], json!("initialStore"));
    assert_eq!(first["data"]["liveRates"], json!({}));
    assert_eq!(first["data"]["contactDetails"], Value::Null);
}

#[tokio::test]
async fn live_update_reaches_every_subscriber() {
    let relay = start_relay().await;
    let mut a = connect(&relay).await;
    let mut b = connect(&relay).await;
    let _ = next_json(&mut a).await;
    let _ = next_json(&mut b).await;

    relay.dispatcher.dispatch(TopicUpdate::new(
        Topic::COIN_RATES,
        json!({"BTC": 50000}),
    ));

    for client in [&mut a, &mut b] {
        let update = next_json(client).await;
        assert_eq!(update["target"], json!("workerPublishCoin"));
        assert_eq!(update["data"], json!({"BTC": 50000}));
        assert!(update["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

#[tokio::test]
async fn metadata_is_cached_but_not_pushed() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;
    let _ = next_json(&mut client).await;

    relay.dispatcher.dispatch(TopicUpdate::new(
        Topic::CONTACT_DETAILS,
        json!({"phone": "123"}),
    ));
    relay
        .dispatcher
        .dispatch(TopicUpdate::new(Topic::LIVE_RATES, json!({"gold": 1})));

    // The next frame is the live update; the metadata write produced nothing.
    let next = next_json(&mut client).await;
    assert_eq!(next["target"], json!("workerPublish"));
    assert_eq!(
        relay.cache.snapshot().contact_details,
        json!({"phone": "123"})
    );
}

#[tokio::test]
async fn disconnect_unregisters_without_affecting_others() {
    let relay = start_relay().await;
    let mut leaving = connect(&relay).await;
    let mut staying = connect(&relay).await;
    let _ = next_json(&mut leaving).await;
    let _ = next_json(&mut staying).await;
    assert_eq!(relay.broadcaster.subscriber_count(), 2);

    leaving.close(None).await.unwrap();
    wait_for_subscribers(&relay, 1).await;

    relay
        .dispatcher
        .dispatch(TopicUpdate::new(Topic::LIVE_RATES, json!({"silver": 75})));

    let update = next_json(&mut staying).await;
    assert_eq!(update["data"], json!({"silver": 75}));
}

#[tokio::test]
async fn subscriber_messages_are_ignored() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;
    let _ = next_json(&mut client).await;

    client
        .send(Message::Text("{\"hello\":\"relay\"}".into()))
        .await
        .unwrap();
    relay
        .dispatcher
        .dispatch(TopicUpdate::new(Topic::COIN_RATES, json!({"ETH": 3000})));

    let update = next_json(&mut client).await;
    assert_eq!(update["data"], json!({"ETH": 3000}));
    assert_eq!(relay.broadcaster.subscriber_count(), 1);
}

#[tokio::test]
async fn snapshot_query_matches_stream_state() {
    let relay = start_relay().await;
    relay
        .dispatcher
        .dispatch(TopicUpdate::new(Topic::COIN_RATES, json!({"BTC": 1})));

    let response = router(Arc::clone(&relay.state))
        .oneshot(Request::get("/api/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
            .unwrap();

    let mut client = connect(&relay).await;
    let initial = next_json(&mut client).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"], initial["data"]);
}

#[tokio::test]
async fn shutdown_closes_sessions_and_stops_server() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;
    let _ = next_json(&mut client).await;

    relay.cancel.cancel();

    let ended = timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "session should close on shutdown");
    wait_for_subscribers(&relay, 0).await;

    timeout(Duration::from_secs(2), relay.server)
        .await
        .expect("server should stop")
        .unwrap();
}
