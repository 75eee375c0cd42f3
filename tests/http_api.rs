use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::broadcast;

use txstats::handlers::spawn_server;
use txstats::window::{Aggregator, Clock, ManualClock, SystemClock};
use txstats::Statistics;

struct TestServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: tokio::task::JoinHandle<Result<(), hyper::Error>>,
}

impl TestServer {
    fn start(clock: Arc<dyn Clock>) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let aggregator = Arc::new(Aggregator::new(clock));
        let server = spawn_server("127.0.0.1:0".parse().unwrap(), aggregator, shutdown_rx).unwrap();

        Self {
            addr: server.local_addr,
            shutdown_tx,
            task: server.task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_post_and_read_statistics() {
    let server = TestServer::start(Arc::new(SystemClock));
    let client = reqwest::Client::new();
    let now = chrono::Utc::now().timestamp_millis();

    for amount in [1.2, 1.5, 1.8] {
        let response = client
            .post(server.url("/transactions"))
            .json(&json!({ "amount": amount, "timestamp": now }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client
        .post(server.url("/transactions"))
        .json(&json!({ "amount": 99999.9, "timestamp": 123456578 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get(server.url("/statistics/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Statistics = response.json().await.unwrap();

    assert_eq!(stats.count, 3);
    assert!((stats.sum - 4.5).abs() < 1e-9);
    assert!((stats.avg - 1.5).abs() < 1e-9);
    assert_eq!(stats.min, 1.2);
    assert_eq!(stats.max, 1.8);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_malformed_bodies_are_teapots() {
    let server = TestServer::start(Arc::new(SystemClock));
    let client = reqwest::Client::new();

    for body in [r#"{"amount": 10}"#, r#"{"timestamp": 1478192204000}"#, "{", "hello"] {
        let response = client
            .post(server.url("/transactions"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT, "body {body}");
    }

    let stats: Statistics = client
        .get(server.url("/statistics/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats, Statistics::default());

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_outdated_transactions_are_ignored() {
    let start = 1_709_994_461_250;
    let clock = Arc::new(ManualClock::new(start));
    let server = TestServer::start(clock.clone());
    let client = reqwest::Client::new();

    let fifty_seven_seconds_ago = start - 57_000;
    for amount in [1.2, 1.5, 1.8, 1.9] {
        let response = client
            .post(server.url("/transactions"))
            .json(&json!({ "amount": amount, "timestamp": fifty_seven_seconds_ago }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    client
        .post(server.url("/transactions"))
        .json(&json!({ "amount": 1.0, "timestamp": start }))
        .send()
        .await
        .unwrap();

    // The first four are now 61 seconds old
    clock.advance(4_000);

    let stats: Statistics = client
        .get(server.url("/statistics/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        stats,
        Statistics {
            sum: 1.0,
            avg: 1.0,
            max: 1.0,
            min: 1.0,
            count: 1,
        }
    );

    drop(client);
    server.stop().await;
}
