//! Collection against a live HTTP fixture server.

use std::sync::Arc;
use std::time::Duration;

use link_grabber::{
    Collector, FinalizeReason, Fetcher, GrabError, HttpClient, NoiseFilter, SourceKind,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

async fn mount(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

fn collector(deadline: Duration) -> Collector {
    let client: Arc<dyn Fetcher> = Arc::new(HttpClient::new(5000).with_max_retries(0));
    Collector::new(client, NoiseFilter::builtin()).with_deadline(deadline)
}

#[tokio::test]
async fn test_page_with_frame_and_script() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html(
            r#"<html><body>
            <a href="https://t.me/project">Telegram</a>
            <a href="/about">About</a>
            <img src="/static/banner.png" alt="banner">
            <iframe src="/embed"></iframe>
            <script src="/app.js"></script>
            <script src="https://cdn.other.net/lib.js"></script>
            </body></html>"#,
        ),
    )
    .await;
    mount(
        &server,
        "/embed",
        html(r#"<a href="https://docs.project.io/start">Docs</a><a href="https://t.me/project">dup</a>"#),
    )
    .await;
    mount(
        &server,
        "/app.js",
        ResponseTemplate::new(200).set_body_string(
            r#"const API = "https://api.partner.io/v2/feed"; const lib = "https://unpkg.com/react@18";"#,
        ),
    )
    .await;

    let collector = collector(Duration::from_secs(10));
    let result = collector.trigger(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(result.reason, FinalizeReason::Complete);
    assert_eq!(result.frames_expected, 2);
    assert_eq!(result.frames_received, 2);

    let hrefs: Vec<_> = result.links.iter().map(|l| l.href.as_str()).collect();
    assert!(hrefs.contains(&"https://t.me/project"));
    assert!(hrefs.contains(&"https://docs.project.io/start"));
    assert!(hrefs.contains(&"https://api.partner.io/v2/feed"));
    assert!(!hrefs.iter().any(|h| h.contains("unpkg.com")));
    assert_eq!(hrefs.iter().filter(|h| **h == "https://t.me/project").count(), 1);

    let banner = result
        .links
        .iter()
        .find(|l| l.pathname == "/static/banner.png")
        .unwrap();
    assert_eq!(banner.source_kind, SourceKind::Image);
    assert_eq!(banner.text, "banner");

    let script = result
        .links
        .iter()
        .find(|l| l.hostname == "api.partner.io")
        .unwrap();
    assert_eq!(script.source_kind, SourceKind::Script);
}

#[tokio::test]
async fn test_missing_frame_waits_for_deadline() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html(r#"<a href="https://x.com/project">X</a><iframe src="/gone"></iframe>"#),
    )
    .await;
    mount(&server, "/gone", ResponseTemplate::new(404)).await;

    let collector = collector(Duration::from_millis(300));
    let result = collector.trigger(&format!("{}/", server.uri())).await.unwrap();

    assert_eq!(result.reason, FinalizeReason::Deadline);
    assert_eq!(result.frames_expected, 2);
    assert_eq!(result.frames_received, 1);
    assert_eq!(result.links.len(), 1);
    assert_eq!(result.links[0].href, "https://x.com/project");
}

#[tokio::test]
async fn test_unreachable_page_is_an_error() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;

    let collector = collector(Duration::from_millis(300));
    let err = collector
        .trigger(&format!("{}/", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GrabError::PageUnavailable(_)));
}

#[tokio::test]
async fn test_http_client_reports_status() {
    let server = MockServer::start().await;
    mount(&server, "/missing", ResponseTemplate::new(404)).await;

    let client = HttpClient::new(5000).with_max_retries(0);
    let err = client
        .fetch_text(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, GrabError::Status { status: 404, .. }));
}
