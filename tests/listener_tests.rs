// Integration tests for the sensor event listener
//
// Router tests drive the axum service directly; the server test goes over
// a real TCP socket.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use sensor_collector::http::{ACK_BAD, ACK_GOOD, HEART_RATE_PATH};
use sensor_collector::{create_router, CollectorServer, HeartRateEvent, HeartRateRegistry, ListenerState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

/// Registry with a consumer that records every reading
fn recording_registry() -> (HeartRateRegistry, Arc<Mutex<Vec<f64>>>) {
    let registry = HeartRateRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    registry.register(move |event: HeartRateEvent| {
        sink.lock().unwrap().push(event.heart_rate);
    });
    (registry, seen)
}

async fn send(registry: &HeartRateRegistry, method: &str, uri: &str, body: &str) -> Result<(StatusCode, String)> {
    let router = create_router(ListenerState::new(registry.clone()));
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;

    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, String::from_utf8(bytes.to_vec())?))
}

#[tokio::test]
async fn test_heart_rate_forwarded_once() -> Result<()> {
    let (registry, seen) = recording_registry();

    let (status, body) = send(&registry, "POST", HEART_RATE_PATH, r#"{"heartrate": 72.5}"#).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK_GOOD);
    assert_eq!(*seen.lock().unwrap(), vec![72.5]);

    Ok(())
}

#[tokio::test]
async fn test_missing_field_is_rejected() -> Result<()> {
    let (registry, seen) = recording_registry();

    let (status, body) = send(&registry, "POST", HEART_RATE_PATH, r#"{"pulse": 72.5}"#).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACK_BAD);
    assert!(seen.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unparseable_body_is_rejected() -> Result<()> {
    let (registry, seen) = recording_registry();

    for payload in ["", "heartrate=72", "{\"heartrate\": ", "[1, 2, 3]"] {
        let (_, body) = send(&registry, "POST", HEART_RATE_PATH, payload).await?;
        assert_eq!(body, ACK_BAD, "payload {:?}", payload);
    }
    assert!(seen.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_other_paths_acknowledge_without_dispatch() -> Result<()> {
    let (registry, seen) = recording_registry();

    for uri in ["/", "/steps", "/heartrate/extra", "/status?x=1"] {
        let (status, body) = send(&registry, "POST", uri, r#"{"heartrate": 99}"#).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK_GOOD, "uri {}", uri);
    }
    assert!(seen.lock().unwrap().is_empty());

    // Same answer with nobody registered
    let empty = HeartRateRegistry::new();
    let (_, body) = send(&empty, "GET", "/anything", "").await?;
    assert_eq!(body, ACK_GOOD);

    Ok(())
}

#[tokio::test]
async fn test_unregistered_event_is_dropped() -> Result<()> {
    let (registry, seen) = recording_registry();
    registry.unregister();

    let (_, body) = send(&registry, "POST", HEART_RATE_PATH, r#"{"heartrate": 64}"#).await?;

    assert_eq!(body, ACK_GOOD);
    assert!(seen.lock().unwrap().is_empty());

    // Re-registering picks up later events
    let sink = Arc::clone(&seen);
    registry.register(move |event: HeartRateEvent| {
        sink.lock().unwrap().push(event.heart_rate);
    });
    send(&registry, "PUT", HEART_RATE_PATH, r#"{"heartrate": "65"}"#).await?;
    assert_eq!(*seen.lock().unwrap(), vec![65.0]);

    Ok(())
}

#[tokio::test]
async fn test_server_over_tcp() -> Result<()> {
    let (registry, seen) = recording_registry();

    let server = CollectorServer::bind("127.0.0.1:0", registry).await?;
    let addr = server.local_addr()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_task = tokio::spawn(server.run(async move {
        let _ = shutdown_rx.await;
    }));

    let payload = r#"{"heartrate": 58}"#;
    let request = format!(
        "POST /heartrate HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        addr,
        payload.len(),
        payload
    );

    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;

    assert!(response.starts_with("HTTP/1.1 200"), "response: {}", response);
    assert!(response.ends_with(ACK_GOOD), "response: {}", response);
    assert_eq!(*seen.lock().unwrap(), vec![58.0]);

    let _ = shutdown_tx.send(());
    server_task.await??;

    Ok(())
}
