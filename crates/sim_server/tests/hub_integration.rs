//! End-to-end tests for event fan-out
//!
//! Covers the hub under concurrency, the REST surface feeding the hub, and a
//! live WebSocket connection against a server bound to port 0.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sim_core::{Event, StateStore};
use sim_server::config::ServerConfig;
use sim_server::hub::{BroadcastReport, SubscriptionHub};
use sim_server::routes::{build_router, AppState};
use sim_server::server::Server;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tower::ServiceExt;

// ============================================================================
// Fixtures
// ============================================================================

fn event(n: usize) -> Event {
    Event::strategy_error(format!("s{}", n), "boom")
}

fn test_state() -> AppState {
    AppState::new(Arc::new(ServerConfig::default()))
}

/// Start a server whose scheduler stays quiet for the duration of a test
async fn start_test_server() -> (std::net::SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Server::new(ServerConfig {
        tick_interval_secs: 3600,
        ..Default::default()
    });
    let state = server.state().clone();

    tokio::spawn(server.run_until(listener, std::future::pending()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, state)
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream closed")
            .expect("Message error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_subscribers(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.hub.subscriber_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} subscribers, found {}",
        expected,
        state.hub.subscriber_count()
    );
}

// ============================================================================
// Hub
// ============================================================================

#[test]
fn test_register_then_broadcast_delivers_exactly_once() {
    let hub = SubscriptionHub::default();
    let mut subs: Vec<_> = (0..5).map(|_| hub.register()).collect();

    let report = hub.broadcast(&event(1));
    assert_eq!(report, BroadcastReport { delivered: 5, dropped: 0 });

    for sub in &mut subs {
        assert_eq!(sub.try_recv(), Some(event(1)));
        assert_eq!(sub.try_recv(), None);
    }
}

#[test]
fn test_unregister_during_broadcasts_is_isolated() {
    let hub = Arc::new(SubscriptionHub::new(10_000));
    let mut steady = hub.register();
    let leaving = hub.register();
    let leaving_id = leaving.id();
    let (_, mut leaving_rx) = leaving.into_parts();

    let producer = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            let mut dropped = 0;
            for n in 0..2_000 {
                dropped += hub.broadcast(&event(n)).dropped;
            }
            dropped
        })
    };

    thread::sleep(Duration::from_millis(1));
    hub.unregister(leaving_id);

    // Whatever was enqueued before unregister returned is all there will be.
    let mut late = 0;
    while leaving_rx.try_recv().is_ok() {
        late += 1;
    }
    let after_unregister = late;
    assert_eq!(producer.join().unwrap(), 0);
    while leaving_rx.try_recv().is_ok() {
        late += 1;
    }
    assert_eq!(late, after_unregister);

    let mut received = 0;
    while steady.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 2_000);
}

#[test]
fn test_slow_subscriber_does_not_stall_others() {
    let hub = SubscriptionHub::new(2);
    let mut fast = hub.register();
    let slow = hub.register();

    let mut fast_received = 0;
    for n in 0..10 {
        hub.broadcast(&event(n));
        while fast.try_recv().is_some() {
            fast_received += 1;
        }
    }

    assert_eq!(fast_received, 10);
    assert!(!hub.is_registered(slow.id()));
    assert!(hub.is_registered(fast.id()));
}

#[test]
fn test_concurrent_toggles_all_broadcast() {
    let hub = Arc::new(SubscriptionHub::default());
    let store = Arc::new(StateStore::with_defaults());
    let mut watcher = hub.register();
    let ids: Vec<String> = store.strategies().ids().to_vec();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let hub = Arc::clone(&hub);
            let store = Arc::clone(&store);
            let sender = hub.register();
            thread::spawn(move || {
                let text = json!({"type": "toggle_strategy", "strategy": id, "enabled": false});
                hub.handle_inbound(&store, sender.id(), &text.to_string())
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut tables = 0;
    while let Some(event) = watcher.try_recv() {
        assert_eq!(event.kind(), "strategy_status");
        tables += 1;
    }
    assert_eq!(tables, ids.len());
    assert!(store.strategies().snapshot().iter().all(|s| !s.is_active()));
}

#[test]
fn test_last_strategy_table_matches_store_after_racing_toggles() {
    for round in 0..25 {
        let hub = Arc::new(SubscriptionHub::new(10_000));
        let store = Arc::new(StateStore::with_defaults());
        let mut watcher = hub.register();
        let ids: Vec<String> = store.strategies().ids().to_vec();

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let hub = Arc::clone(&hub);
                let store = Arc::clone(&store);
                let ids = ids.clone();
                let sender = hub.register();
                thread::spawn(move || {
                    for n in 0..50 {
                        let id = &ids[(worker + n) % 3];
                        let enabled = (worker * 7 + n + round) % 2 == 0;
                        if n % 2 == 0 {
                            let text = json!({
                                "type": "toggle_strategy",
                                "strategy": id,
                                "enabled": enabled,
                            });
                            hub.handle_inbound(&store, sender.id(), &text.to_string())
                                .unwrap();
                        } else {
                            hub.toggle_strategy(&store, id, enabled).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last = None;
        let mut tables = 0;
        while let Some(event) = watcher.try_recv() {
            tables += 1;
            last = Some(event);
        }
        assert_eq!(tables, 8 * 50, "round {}", round);
        assert_eq!(
            last,
            Some(Event::strategy_status(&store.strategies().snapshot())),
            "round {}",
            round
        );
    }
}

// ============================================================================
// REST feeding the hub
// ============================================================================

#[tokio::test]
async fn test_prediction_reaches_all_subscribers() {
    let state = test_state();
    let mut subs: Vec<_> = (0..3).map(|_| state.hub.register()).collect();

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"model":"cnn1d","symbol":"ETH"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for sub in &mut subs {
        match sub.try_recv() {
            Some(Event::ModelPrediction { model, symbol, confidence, .. }) => {
                assert_eq!(model, "cnn1d");
                assert_eq!(symbol, "ETH");
                assert!((60..=95).contains(&confidence));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_unknown_model_does_not_broadcast() {
    let state = test_state();
    let mut sub = state.hub.register();

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"model":"doesnotexist","symbol":"ETH"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(sub.try_recv(), None);
}

#[tokio::test]
async fn test_btc_snapshot_in_bounds() {
    let response = build_router(test_state())
        .oneshot(Request::builder().uri("/api/market/btc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let price = json["price"].as_f64().unwrap();
    let high = json["high"].as_f64().unwrap();
    let low = json["low"].as_f64().unwrap();

    assert_eq!(json["symbol"], "BTC");
    assert!((42_750.0..=47_250.0).contains(&price));
    assert!(high >= price && price >= low);
    chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).unwrap();
}

// ============================================================================
// Live WebSocket
// ============================================================================

#[tokio::test]
async fn test_websocket_subscribe_and_strategy_status() {
    let (addr, state) = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    wait_for_subscribers(&state, 1).await;

    ws.send(Message::Text(json!({"type": "subscribe"}).to_string().into()))
        .await
        .unwrap();
    for model in state.store.models().ids() {
        let msg = next_json(&mut ws).await;
        assert_eq!(msg["type"], "model_metrics");
        assert_eq!(msg["model"], model.as_str());
    }

    ws.send(Message::Text(
        json!({"type": "get_strategy_status"}).to_string().into(),
    ))
    .await
    .unwrap();
    let msg = next_json(&mut ws).await;
    assert_eq!(msg["type"], "strategy_status");
    assert_eq!(msg["strategies"].as_array().unwrap().len(), 11);
}

#[tokio::test]
async fn test_websocket_ignores_malformed_and_receives_broadcasts() {
    let (addr, state) = start_test_server().await;
    let (mut a, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let (mut b, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    wait_for_subscribers(&state, 2).await;

    a.send(Message::Text("not json".into())).await.unwrap();
    a.send(Message::Text(
        json!({"type": "toggle_strategy", "strategy": "lvn_breakout", "enabled": false})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    for ws in [&mut a, &mut b] {
        let msg = next_json(ws).await;
        assert_eq!(msg["type"], "strategy_status");
        let row = msg["strategies"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == "lvn_breakout")
            .cloned()
            .unwrap();
        assert_eq!(row["status"], "inactive");
    }
    assert_eq!(state.hub.subscriber_count(), 2);
}

#[tokio::test]
async fn test_websocket_disconnect_unregisters() {
    let (addr, state) = start_test_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    wait_for_subscribers(&state, 1).await;

    ws.close(None).await.unwrap();
    drop(ws);
    wait_for_subscribers(&state, 0).await;

    assert_eq!(state.hub.broadcast(&event(0)), BroadcastReport::default());
}
