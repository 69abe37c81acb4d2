// tests/integration/health_test.rs

use otprelay::core::metrics::CONNECTION_ATTEMPTS_TOTAL;
use otprelay::server::run_health_server;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

#[tokio::test]
async fn test_liveness_routes() {
    // Metrics register on first use.
    CONNECTION_ATTEMPTS_TOTAL.get();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server = tokio::spawn(run_health_server(listener, shutdown_rx));

    let http = reqwest::Client::new();

    let res = http.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "Service is running");

    let res = http.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "OK");

    let res = http.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.text().await.unwrap().contains("otprelay_connection_attempts_total"));

    let res = http.get(format!("{base}/nope")).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

    drop(http);
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop on shutdown")
        .unwrap()
        .unwrap();
}
