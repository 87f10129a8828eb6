use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use hearth_config::{ACTOR_HEADER, CONNECTION_HEADER};
use hearth_persistence::{MemoryHouseholdStore, RecordStoreExt};
use hearth_server::{router, AppServices, ServerConfig};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

const FORM: &str = "application/x-www-form-urlencoded";

async fn start_server() -> (SocketAddr, AppServices) {
    let store = Arc::new(MemoryHouseholdStore::new());
    let services = AppServices::new(store, &ServerConfig::default());
    services.queue.start();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(services.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, services)
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

/// Minimal `text/event-stream` reader: yields `(event, data)` per frame and
/// skips keep-alive comments.
struct SseReader {
    stream: ByteStream,
    buf: Vec<u8>,
}

impl SseReader {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(resp.bytes_stream().map(|r| r.map(|b| b.to_vec()))),
            buf: Vec::new(),
        }
    }

    async fn next_frame(&mut self) -> (String, String) {
        loop {
            // Chunks may split a multi-byte character, so frame on bytes first.
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
                let raw: Vec<u8> = self.buf.drain(..pos + 2).collect();
                let frame = String::from_utf8(raw).expect("utf-8 frame");
                let mut event = String::new();
                let mut data = Vec::new();
                for line in frame.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        event = v.trim_start().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push(v.strip_prefix(' ').unwrap_or(v).to_string());
                    }
                }
                if event.is_empty() && data.is_empty() {
                    continue;
                }
                return (event, data.join("\n"));
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("frame within five seconds")
                .expect("stream still open")
                .expect("chunk");
            self.buf.extend_from_slice(&chunk);
        }
    }
}

async fn open_live(addr: SocketAddr, path: &str, actor: Option<&str>) -> reqwest::Response {
    let mut req = reqwest::Client::new().get(format!("http://{addr}{path}"));
    if let Some(actor) = actor {
        req = req.header(ACTOR_HEADER, actor);
    }
    req.send().await.unwrap()
}

async fn post_form(
    addr: SocketAddr,
    path: &str,
    actor: &str,
    connection: &str,
    body: &str,
) -> StatusCode {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .header(ACTOR_HEADER, actor)
        .header(CONNECTION_HEADER, connection)
        .header(CONTENT_TYPE, FORM)
        .body(body.to_string())
        .send()
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn health_reports_a_running_queue() {
    let (addr, _services) = start_server().await;
    let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn live_views_require_an_actor_and_forms_a_connection() {
    let (addr, services) = start_server().await;

    let anonymous = open_live(addr, "/live/dashboard", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let no_connection = open_live(addr, "/live/bills/new", Some("u1")).await;
    assert_eq!(no_connection.status(), StatusCode::BAD_REQUEST);

    let bad_connection =
        open_live(addr, "/live/bills/new?connection=no%20spaces", Some("u1")).await;
    assert_eq!(bad_connection.status(), StatusCode::BAD_REQUEST);

    let anonymous_post = reqwest::Client::new()
        .post(format!("http://{addr}/bills"))
        .header(CONNECTION_HEADER, "c1")
        .header(CONTENT_TYPE, FORM)
        .body("title=Gas")
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous_post.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(services.queue.pending() + services.queue.processed(), 0);
}

#[tokio::test]
async fn form_stream_shows_errors_then_redirects_after_a_valid_submission() {
    let (addr, services) = start_server().await;
    let resp = open_live(addr, "/live/bills/new?connection=tab-1", Some("u1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let mut frames = SseReader::new(resp);

    let (event, data) = frames.next_frame().await;
    assert_eq!(event, "render");
    assert!(data.contains(r#"<form method="post" action="/bills">"#));
    assert!(!data.contains("field-error"));

    let invalid = "title=&amount=abc&due_on=2026-12-01";
    let status = post_form(addr, "/bills", "u1", "tab-1", invalid).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (event, data) = frames.next_frame().await;
    assert_eq!(event, "render");
    assert!(data.contains(r#"data-field="title">This field is required"#));
    assert!(data.contains(r#"data-field="amount">Enter an amount like 12.50"#));
    assert_eq!(services.queue.processed(), 0);

    let valid = "title=Water&amount=31.20&due_on=2026-12-01";
    let status = post_form(addr, "/bills", "u1", "tab-1", valid).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (event, data) = frames.next_frame().await;
    assert_eq!(event, "redirect");
    assert_eq!(data, "/");

    let bills: Vec<hearth_core::Bill> = services
        .store
        .list(&hearth_core::ActorId::parse("u1").unwrap())
        .unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].amount_cents, 3120);
    assert!(services.validation.is_empty());
}

#[tokio::test]
async fn dashboard_follows_another_tabs_mutations() {
    let (addr, _services) = start_server().await;
    let mut dashboard = SseReader::new(open_live(addr, "/live/dashboard", Some("u1")).await);
    let mut stranger = SseReader::new(open_live(addr, "/live/dashboard", Some("u2")).await);

    let (_, initial) = dashboard.next_frame().await;
    assert!(!initial.contains("Dentist"));
    stranger.next_frame().await;

    let status = post_form(
        addr,
        "/appointments",
        "u1",
        "tab-2",
        "title=Dentist&starts_at=2026-11-02T09%3A30&location=Main+St",
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (event, data) = dashboard.next_frame().await;
    assert_eq!(event, "render");
    assert!(data.contains("Dentist · 2026-11-02 09:30 @ Main St"));

    // u2's stream gets nothing but keep-alives.
    let quiet = tokio::time::timeout(Duration::from_millis(200), stranger.next_frame()).await;
    assert!(quiet.is_err());
}

#[tokio::test]
async fn failed_commands_surface_as_notifications() {
    let (addr, services) = start_server().await;
    let resp = open_live(addr, "/live/notifications", Some("u1")).await;
    let mut notifications = SseReader::new(resp);
    let (_, initial) = notifications.next_frame().await;
    assert!(initial.contains("Nothing new"));

    let status = post_form(addr, "/bills/does-not-exist/paid", "u1", "tab-3", "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (event, data) = notifications.next_frame().await;
    assert_eq!(event, "render");
    assert!(data.contains("Something went wrong while saving your bill"));
    assert_eq!(services.queue.failed(), 1);
}

#[tokio::test]
async fn client_disconnects_release_every_live_view() {
    let (addr, services) = start_server().await;

    let mut open = Vec::new();
    for n in 0..5 {
        let path = format!("/live/bills/new?connection=tab-{n}");
        let mut frames = SseReader::new(open_live(addr, &path, Some("u1")).await);
        frames.next_frame().await;
        open.push(frames);
    }
    // Each form view listens on its actor and its connection.
    assert_eq!(services.bus.total_subscriptions(), 10);

    drop(open);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while services.bus.total_subscriptions() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} subscriptions outlived their clients",
            services.bus.total_subscriptions()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(services.validation.is_empty());
}
