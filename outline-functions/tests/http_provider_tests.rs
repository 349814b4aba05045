//! HTTP Provider Tests
//!
//! A one-shot local server answers each connection with a canned response
//! so the request path, decoding and rate-limit handling run for real.

use outline_core::{LatLng, OutlineError, ProviderEndpoint, ProviderError};
use outline_functions::{OsrmRoutingProvider, RoutingProvider};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

type RequestLog = Arc<Mutex<Vec<String>>>;

fn response(status: &str, extra_headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        body.len(),
        extra_headers,
        body
    )
}

/// Serve `responses` in order, one per connection, recording request lines.
async fn serve(responses: Vec<String>) -> (ProviderEndpoint, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let log: RequestLog = Arc::default();
    let requests = Arc::clone(&log);

    tokio::spawn(async move {
        for reply in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }
            let request = String::from_utf8_lossy(&received);
            if let Some(line) = request.lines().next() {
                requests.lock().unwrap().push(line.to_string());
            }
            let _ = socket.write_all(reply.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    let endpoint = ProviderEndpoint {
        base_url: format!("http://{}/", addr),
        api_key: None,
    };
    (endpoint, log)
}

const ROUTE_BODY: &str = r#"{
    "code": "Ok",
    "routes": [{
        "distance": 12345.0,
        "duration": 600.0,
        "geometry": {"coordinates": [[2.35, 48.85], [13.4, 52.52]]}
    }]
}"#;

#[tokio::test]
async fn test_osrm_route_over_http() {
    let (endpoint, log) = serve(vec![response("200 OK", "", ROUTE_BODY)]).await;
    let provider = OsrmRoutingProvider::new(&endpoint, 600);

    let route = provider
        .route(LatLng::new(48.85, 2.35), LatLng::new(52.52, 13.4))
        .await
        .expect("route");

    assert!((route.distance_km - 12.345).abs() < 1e-9);
    assert!((route.duration_min - 10.0).abs() < 1e-9);
    assert_eq!(
        route.geometry,
        vec![LatLng::new(48.85, 2.35), LatLng::new(52.52, 13.4)]
    );

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0].starts_with("GET /route/v1/driving/2.35,48.85;13.4,52.52?"),
        "unexpected request line: {}",
        requests[0]
    );
    assert!(requests[0].contains("geometries=geojson"));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (endpoint, log) = serve(vec![
        response("429 Too Many Requests", "Retry-After: 0\r\n", "{}"),
        response("200 OK", "", ROUTE_BODY),
    ])
    .await;
    let provider = OsrmRoutingProvider::new(&endpoint, 600);

    let route = provider
        .route(LatLng::new(48.85, 2.35), LatLng::new(52.52, 13.4))
        .await
        .expect("route after retry");

    assert!((route.distance_km - 12.345).abs() < 1e-9);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_long_retry_after_is_reported() {
    let (endpoint, _log) = serve(vec![response(
        "429 Too Many Requests",
        "Retry-After: 120\r\n",
        "{}",
    )])
    .await;
    let provider = OsrmRoutingProvider::new(&endpoint, 600);

    let err = provider
        .route(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0))
        .await
        .unwrap_err();

    match err {
        OutlineError::Provider(ProviderError::RateLimited {
            provider,
            retry_after_ms,
        }) => {
            assert_eq!(provider, "osrm");
            assert_eq!(retry_after_ms, 120_000);
        }
        other => panic!("Expected RateLimited, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_request_failure() {
    let (endpoint, _log) = serve(vec![response(
        "503 Service Unavailable",
        "",
        r#"{"message": "down"}"#,
    )])
    .await;
    let provider = OsrmRoutingProvider::new(&endpoint, 600);

    let err = provider
        .route(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            OutlineError::Provider(ProviderError::RequestFailed { status: 503, .. })
        ),
        "unexpected error: {:?}",
        err
    );
}
