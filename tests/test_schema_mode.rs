//! End-to-end tests for the schema-mode proxy

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use common::{
    closed_port, hangup_upstream, scripted_upstream, send_raw, silent_upstream, split_response,
    start_proxy, timeouts,
};
use interposer::http::target::ParsedQuery;
use interposer::proxy::{Interceptor, Timeouts};
use interposer::schema::{LocalResponder, ResponseGenerator, SchemaDocument, SchemaHandle};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Answers `/mock` and nothing else.
struct MockGenerator;

impl ResponseGenerator for MockGenerator {
    fn generate(
        &self,
        segments: &[String],
        _query: &ParsedQuery,
        _schema: &SchemaHandle,
    ) -> Option<Bytes> {
        (segments.len() == 1 && segments[0] == "mock")
            .then(|| Bytes::from_static(br#"{"ok":true}"#))
    }
}

fn schema_interceptor() -> Interceptor {
    schema_interceptor_with(timeouts())
}

fn schema_interceptor_with(timeouts: Timeouts) -> Interceptor {
    let schema = Arc::new(SchemaHandle::new("inline", SchemaDocument::default()));
    let responder = LocalResponder::new(Arc::new(MockGenerator), schema);
    Interceptor::schema(responder, timeouts)
}

#[tokio::test]
async fn test_schema_answer_is_served_locally() {
    let origin = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_port = origin.local_addr().unwrap().port();
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!("GET /mock HTTP/1.1\r\nHost: 127.0.0.1:{origin_port}\r\n\r\n");
    let raw = send_raw(proxy, request.as_bytes()).await;
    let (head, body) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: application/json\r\n"));
    assert!(head.contains("Content-Length: 11\r\n"));
    assert_eq!(head.matches("\r\n").count(), 4); // status line, two headers, blank line
    assert_eq!(body, br#"{"ok":true}"#);

    // The origin must never have been contacted.
    let accepted = tokio::time::timeout(Duration::from_millis(200), origin.accept()).await;
    assert!(accepted.is_err());
}

#[tokio::test]
async fn test_schema_answer_ignores_request_body() {
    let proxy = start_proxy(schema_interceptor()).await;

    let raw = send_raw(
        proxy,
        b"POST //mock/ HTTP/1.1\r\nHost: 127.0.0.1:1\r\nContent-Length: 7\r\n\r\npayload",
    )
    .await;
    let (head, body) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, br#"{"ok":true}"#);
}

#[tokio::test]
async fn test_unanswered_request_is_proxied() {
    let (origin, captured) = scripted_upstream(vec![
        b"HTTP/1.1 201 Created\r\nX-Upstream: yes\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
    ])
    .await;
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!(
        "GET /other?x=1 HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nUser-Agent: test\r\n\r\n",
        origin.port()
    );
    let raw = send_raw(proxy, request.as_bytes()).await;
    let (head, body) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(head.contains("X-Upstream: yes\r\n"));
    assert_eq!(body, b"hello");

    let forwarded = String::from_utf8(captured.await.unwrap()).unwrap();
    assert!(forwarded.starts_with("GET /other?x=1 HTTP/1.1\r\n"));
    assert!(forwarded.contains(&format!("Host: 127.0.0.1:{}\r\n", origin.port())));
    assert!(forwarded.contains("User-Agent: test\r\n"));
}

#[tokio::test]
async fn test_streaming_relay_is_byte_identical() {
    let pieces: Vec<Vec<u8>> = vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nX-A: 1\r\nX-A: 2\r\n\r\n".to_vec(),
        b"4\r\nWi".to_vec(),
        b"ki\r\n5\r".to_vec(),
        b"\npedia\r\n".to_vec(),
        b"0\r\n\r\n".to_vec(),
    ];
    let expected: Vec<u8> = pieces.concat();
    let (origin, _captured) = scripted_upstream(pieces).await;
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!("GET /wiki HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", origin.port());
    let raw = send_raw(proxy, request.as_bytes()).await;

    assert_eq!(raw, expected);
}

#[tokio::test]
async fn test_request_body_is_forwarded() {
    let (origin, captured) = scripted_upstream(vec![
        b"HTTP/1.1 204 No Content\r\n\r\n".to_vec(),
    ])
    .await;
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!(
        "POST /submit HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nContent-Length: 9\r\n\r\nname=test",
        origin.port()
    );
    let raw = send_raw(proxy, request.as_bytes()).await;
    let (head, body) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(body.is_empty());

    let forwarded = captured.await.unwrap();
    assert!(forwarded.ends_with(b"\r\n\r\nname=test"));
}

#[tokio::test]
async fn test_missing_host_is_rejected() {
    let proxy = start_proxy(schema_interceptor()).await;

    let raw = send_raw(proxy, b"GET /nowhere HTTP/1.1\r\n\r\n").await;
    let (head, _) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let proxy = start_proxy(schema_interceptor()).await;

    let raw = send_raw(proxy, b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n").await;
    let (head, _) = split_response(&raw);

    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_unreachable_origin_ends_response_without_body() {
    let port = closed_port().await;
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!("GET /down HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\n\r\n");
    let raw = send_raw(proxy, request.as_bytes()).await;

    assert!(raw.is_empty());

    // The proxy keeps serving after the failure.
    let raw = send_raw(proxy, b"GET /mock HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n").await;
    assert!(raw.starts_with(b"HTTP/1.1 200 OK\r\n"));
}

#[tokio::test]
async fn test_origin_hangup_mid_body_ends_client_response() {
    let (origin, _origin_task) = hangup_upstream(
        Duration::ZERO,
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc".to_vec(),
    )
    .await;
    let proxy = start_proxy(schema_interceptor()).await;

    let request = format!("GET /partial HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", origin.port());
    let raw = send_raw(proxy, request.as_bytes()).await;

    assert_eq!(raw, b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc");
}

#[tokio::test]
async fn test_request_deadline_ends_connection_without_body() {
    let origin = silent_upstream().await;
    let proxy = start_proxy(schema_interceptor_with(Timeouts {
        connect: Duration::from_secs(2),
        request: Duration::from_millis(300),
    }))
    .await;

    let started = Instant::now();
    let request = format!("GET /slow HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", origin.port());
    let raw = send_raw(proxy, request.as_bytes()).await;

    assert!(raw.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_client_disconnect_does_not_stop_the_proxy() {
    let (origin, origin_task) = hangup_upstream(
        Duration::from_millis(200),
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nlater".to_vec(),
    )
    .await;
    let proxy = start_proxy(schema_interceptor()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("GET /gone HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", origin.port());
    stream.write_all(request.as_bytes()).await.unwrap();
    drop(stream);

    // The origin still gets the request and answers into a dead connection.
    tokio::time::timeout(Duration::from_secs(5), origin_task)
        .await
        .unwrap()
        .unwrap();

    let raw = send_raw(proxy, b"GET /mock HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n").await;
    assert!(raw.starts_with(b"HTTP/1.1 200 OK\r\n"));

    let (origin, _captured) = scripted_upstream(vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec(),
    ])
    .await;
    let request = format!("GET /again HTTP/1.1\r\nHost: 127.0.0.1:{}\r\n\r\n", origin.port());
    let (_, body) = split_response(&send_raw(proxy, request.as_bytes()).await);
    assert_eq!(body, b"ok");
}
