use refx_performance::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// What the canned server does with one connection.
#[derive(Clone, Copy)]
enum Reply {
    Respond(u16, &'static str),
    /// Reads the request and never answers
    Stall,
}

/// Serves `responses` in order, one per connection, and records each request
/// line it receives.
async fn canned_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<String>>>) {
    scripted_server(
        responses
            .into_iter()
            .map(|(status, body)| Reply::Respond(status, body))
            .collect(),
    )
    .await
}

async fn scripted_server(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    tokio::spawn(async move {
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..read]);
            }
            let request = String::from_utf8_lossy(&buffer);
            let request_line = request.lines().next().unwrap_or_default().to_string();
            recorded.lock().await.push(request_line);

            let (status, body) = match reply {
                Reply::Respond(status, body) => (status, body),
                Reply::Stall => {
                    // Keep the socket open so the client sees silence, not a reset.
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        drop(socket);
                    });
                    continue;
                }
            };

            let reason = if status == 200 { "OK" } else { "Internal Server Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}"), seen)
}

fn client(base_url: String) -> ComputeClient {
    client_with_timeout(base_url, Duration::from_secs(2))
}

fn client_with_timeout(base_url: String, timeout: Duration) -> ComputeClient {
    ComputeClient::new(ComputeConfig { base_url, timeout }).unwrap()
}

#[tokio::test]
async fn test_decodes_success_body() {
    let (base_url, seen) =
        canned_server(vec![(200, r#"{"data":{"stars":6.12,"pp":412.5}}"#)]).await;
    let client = client(base_url);

    let request = ScoreParams {
        mods: Some(64),
        combo: Some(1200),
        ..ScoreParams::new(4)
    }
    .to_request(1234);
    let result = client.try_calculate(&request).await.unwrap();

    assert_eq!(result, PerformanceResult { stars: 6.12, pp: 412.5 });

    let seen = seen.lock().await;
    let line = &seen[0];
    assert!(line.starts_with("GET /calculate?"), "{line}");
    assert!(line.contains("beatmap_id=1234"));
    assert!(line.contains("mode=0"), "relax mode must be folded: {line}");
    assert!(line.contains("mods=64"));
    assert!(line.contains("max_combo=1200"));
    assert!(line.contains("accuracy=100"));
    assert!(!line.contains("miss_count"));
    assert!(!line.contains("passed_objects"));
}

#[tokio::test]
async fn test_server_error_is_zero() {
    let (base_url, _) = canned_server(vec![(500, r#"{"error":"boom"}"#), (500, "{}")]).await;
    let client = client(base_url);
    let request = PerformanceRequest::new(1234, 0);

    assert!(matches!(
        client.try_calculate(&request).await,
        Err(ComputeError::Status(500))
    ));
    assert!(client.calculate(&request).await.is_zero());
}

#[tokio::test]
async fn test_malformed_body_is_zero() {
    let (base_url, _) = canned_server(vec![(200, r#"{"stars":1.0}"#)]).await;
    let client = client(base_url);

    let result = client.calculate(&PerformanceRequest::new(1234, 0)).await;
    assert!(result.is_zero());
}

#[tokio::test]
async fn test_refused_connection_is_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{addr}"));
    let request = PerformanceRequest::new(1234, 0);
    assert!(matches!(
        client.try_calculate(&request).await,
        Err(ComputeError::Request(_))
    ));
    assert!(client.calculate(&request).await.is_zero());
}

#[tokio::test]
async fn test_fanout_over_http_isolates_failures() {
    let (base_url, _) = canned_server(vec![
        (200, r#"{"data":{"stars":5.0,"pp":100.0}}"#),
        (500, "{}"),
        (200, r#"{"data":{"stars":5.0,"pp":100.0}}"#),
    ])
    .await;
    let fanout = PerformanceFanout::new(Arc::new(client(base_url))).with_max_in_flight(Some(1));

    let results = fanout
        .compute_many(1234, &[ScoreParams::new(0), ScoreParams::new(0), ScoreParams::new(0)])
        .await;

    let pp: Vec<f64> = results.iter().map(|r| r.performance.pp).collect();
    assert_eq!(pp, vec![100.0, 0.0, 100.0]);
}

#[tokio::test]
async fn test_timeout_is_zero() {
    let (base_url, seen) = scripted_server(vec![Reply::Stall, Reply::Stall]).await;
    let client = client_with_timeout(base_url, Duration::from_millis(200));
    let request = PerformanceRequest::new(1234, 0);

    let started = Instant::now();
    assert!(matches!(
        client.try_calculate(&request).await,
        Err(ComputeError::Request(_))
    ));
    assert!(client.calculate(&request).await.is_zero());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(seen.lock().await.len(), 2);
}

#[tokio::test]
async fn test_fanout_isolates_stalled_request() {
    let ok = Reply::Respond(200, r#"{"data":{"stars":5.0,"pp":100.0}}"#);
    let (base_url, _) = scripted_server(vec![ok, Reply::Stall, ok, ok]).await;
    let client = client_with_timeout(base_url, Duration::from_millis(200));
    let fanout = PerformanceFanout::new(Arc::new(client)).with_max_in_flight(Some(1));

    let scores = vec![ScoreParams::new(0); 4];
    let results = fanout.compute_many(1234, &scores).await;

    let pp: Vec<f64> = results.iter().map(|r| r.performance.pp).collect();
    assert_eq!(pp, vec![100.0, 0.0, 100.0, 100.0]);
    assert_eq!(results[1].difficulty.stars, 0.0);
}
