//! End-to-end tests: a client connection talking to a tunnel proxy over
//! in-memory channels, exercising fragmentation, correlation, timeouts,
//! and teardown together.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use bletun::proxy::{ProxyConfig, ProxyStats, TunnelProxy};
use bletun::transport::ChannelTransport;
use bletun::{Connection, HttpRequest, HttpResponse, TunnelError};

/// Router used by every tunnel pair in this file.
async fn router(request: HttpRequest) -> bletun::proxy::HandlerResult {
    match request.target.as_str() {
        "/echo" => {
            let body = request.body.clone();
            Ok(HttpResponse::new(200, "OK")
                .header("Content-Length", body.len().to_string())
                .body(body))
        }
        "/slow" => {
            std::future::pending::<()>().await;
            unreachable!()
        }
        target if target.starts_with("/item/") => {
            let name = target.trim_start_matches("/item/").to_string();
            Ok(HttpResponse::new(200, "OK").body(Bytes::from(name)))
        }
        _ => Ok(HttpResponse::new(404, "Not Found")),
    }
}

/// Wire a connection and a proxy back to back at the given payload
/// ceiling.
fn tunnel_pair(max_payload: usize) -> (Connection, TunnelProxy, ProxyStats) {
    let (transport, requests) = ChannelTransport::new(Some(max_payload));
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();

    let proxy = TunnelProxy::spawn(
        Arc::new(router),
        requests,
        notify_tx,
        ProxyConfig {
            max_payload,
            notify_delay: Duration::from_millis(1),
        },
    );
    let stats = proxy.stats();

    let connection = Connection::builder()
        .write_delay(Duration::from_millis(1))
        .connect(Arc::new(transport), notify_rx);

    (connection, proxy, stats)
}

#[tokio::test]
async fn test_end_to_end_echo() {
    let (connection, _proxy, stats) = tunnel_pair(100);

    let response = connection
        .fetch(&HttpRequest::new("POST", "/echo").body(&b"hello tunnel"[..]))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header_value("content-length"), Some("12"));
    assert_eq!(&response.body[..], b"hello tunnel");
    assert_eq!(stats.requests_served(), 1);
}

#[tokio::test]
async fn test_multi_frame_exchange_at_small_ceiling() {
    // Ceiling 27 leaves 10-byte chunks; both directions fragment.
    let (connection, _proxy, _stats) = tunnel_pair(27);

    let body: Vec<u8> = (0..120u8).collect();
    let response = connection
        .fetch(&HttpRequest::new("POST", "/echo").body(body.clone()))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], &body[..]);
}

#[tokio::test]
async fn test_concurrent_requests_get_their_own_responses() {
    let (connection, _proxy, stats) = tunnel_pair(64);
    let connection = Arc::new(connection);

    let mut handles = Vec::new();
    for i in 0..8 {
        let connection = connection.clone();
        handles.push(tokio::spawn(async move {
            let response = connection
                .fetch(&HttpRequest::get(format!("/item/{i}")))
                .await
                .unwrap();
            (i, response)
        }));
    }

    for handle in handles {
        let (i, response) = handle.await.unwrap();
        // Each caller gets the body that matches its own request.
        assert_eq!(response.body, format!("{i}").as_bytes());
    }
    assert_eq!(stats.requests_served(), 8);
    assert_eq!(connection.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_disturb_other_requests() {
    let (transport, requests) = ChannelTransport::new(Some(100));
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let _proxy = TunnelProxy::spawn(
        Arc::new(router),
        requests,
        notify_tx,
        ProxyConfig {
            max_payload: 100,
            notify_delay: Duration::from_millis(1),
        },
    );
    let connection = Arc::new(
        Connection::builder()
            .response_timeout(Duration::from_millis(200))
            .write_delay(Duration::from_millis(1))
            .connect(Arc::new(transport), notify_rx),
    );

    let slow = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.fetch(&HttpRequest::get("/slow")).await })
    };
    let fast = {
        let connection = connection.clone();
        tokio::spawn(async move {
            connection
                .fetch(&HttpRequest::new("POST", "/echo").body(&b"quick"[..]))
                .await
        })
    };

    let fast_result = fast.await.unwrap().unwrap();
    assert_eq!(&fast_result.body[..], b"quick");

    let slow_result = slow.await.unwrap();
    assert!(matches!(slow_result, Err(TunnelError::Timeout)));
    assert_eq!(connection.pending_requests(), 0);
}

#[tokio::test]
async fn test_unroutable_target_gets_404_through_tunnel() {
    let (connection, _proxy, _stats) = tunnel_pair(100);

    let response = connection
        .fetch(&HttpRequest::get("/no/such/route"))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_disconnect_fails_all_pending_requests() {
    // No proxy: requests are written and never answered, then the
    // notification side goes away.
    let (transport, _requests) = ChannelTransport::new(Some(100));
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let connection = Arc::new(
        Connection::builder()
            .write_delay(Duration::from_millis(1))
            .connect(Arc::new(transport), notify_rx),
    );

    let mut handles = Vec::new();
    for i in 0..3 {
        let connection = connection.clone();
        handles.push(tokio::spawn(async move {
            connection.fetch(&HttpRequest::get(format!("/p/{i}"))).await
        }));
    }

    // Let the requests register and write before cutting the channel.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connection.pending_requests(), 3);
    drop(notify_tx);

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(TunnelError::ConnectionLost)));
    }
    assert!(!connection.is_connected());
    assert_eq!(connection.pending_requests(), 0);
}

#[tokio::test]
async fn test_status_report_reflects_served_exchanges() {
    let (connection, proxy, _stats) = tunnel_pair(100);

    for _ in 0..2 {
        connection
            .fetch(&HttpRequest::new("POST", "/echo").body(&b"x"[..]))
            .await
            .unwrap();
    }

    let report = proxy.stats().report();
    assert_eq!(report.status, "ok");
    assert_eq!(report.requests_served, 2);
    assert_eq!(report.pending_requests, 0);

    let json = report.to_json();
    assert!(json.contains(r#""requests_served":2"#));
}

#[tokio::test]
async fn test_written_frames_respect_negotiated_ceiling() {
    let (transport, mut requests) = ChannelTransport::new(Some(40));
    let (_notify_tx, notify_rx) = mpsc::unbounded_channel();
    let connection = Connection::builder()
        .response_timeout(Duration::from_millis(100))
        .write_delay(Duration::from_millis(1))
        .connect(Arc::new(transport), notify_rx);

    let body = vec![b'q'; 200];
    let _ = connection
        .fetch(&HttpRequest::new("POST", "/echo").body(body))
        .await;

    let mut total = 0;
    while let Ok(data) = requests.try_recv() {
        assert!(data.len() <= 40, "frame exceeds ceiling: {}", data.len());
        total += 1;
    }
    assert!(total > 1);
}
