//! Robots.txt and throttle behavior observed through the pipeline

use crate::common::{
    domain_of, mount_document, mount_robots, pipeline, test_config, USER_AGENT,
};
use std::time::{Duration, Instant};
use tidepool::config::UnreachablePolicy;
use tidepool::ErrorKind;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "<html><head><title>Notice</title></head><body><main><p>Public notice text.</p></main></body></html>";

#[tokio::test]
async fn test_disallowed_path_is_denied_without_throttle_use() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private/", 1).await;
    Mock::given(method("GET"))
        .and(path("/private/report.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let pipeline = pipeline(test_config());
    let url = format!("{}/private/report.html", server.uri());
    let err = pipeline.process(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PolicyDenied);
    let in_flight = pipeline
        .throttle()
        .snapshot(&domain_of(&server))
        .map_or(0, |state| state.in_flight);
    assert_eq!(in_flight, 0);
}

#[tokio::test]
async fn test_product_token_group_applies() {
    let server = MockServer::start().await;
    let robots = "User-agent: TidepoolTest\nDisallow: /reports/\n\nUser-agent: *\nDisallow: /";
    mount_robots(&server, robots, 1).await;
    mount_document(&server, "/notice.html", "text/html", PAGE.as_bytes().to_vec()).await;

    let pipeline = pipeline(test_config());
    assert!(USER_AGENT.starts_with("TidepoolTest"));

    let allowed = pipeline.process(&format!("{}/notice.html", server.uri())).await;
    assert!(allowed.is_ok(), "{:?}", allowed.err());

    let denied = pipeline
        .process(&format!("{}/reports/q1.html", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::PolicyDenied);
}

#[tokio::test]
async fn test_robots_fetched_once_per_domain() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /", 1).await;
    mount_document(&server, "/a.html", "text/html", PAGE.as_bytes().to_vec()).await;
    mount_document(&server, "/b.html", "text/html", PAGE.as_bytes().to_vec()).await;

    let pipeline = pipeline(test_config());
    pipeline.process(&format!("{}/a.html", server.uri())).await.unwrap();
    pipeline.process(&format!("{}/b.html", server.uri())).await.unwrap();
    pipeline.process(&format!("{}/a.html", server.uri())).await.unwrap();

    // Mock expectations are verified when the server drops
}

#[tokio::test]
async fn test_unreachable_robots_restrictive_denies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.robots.on_unreachable = UnreachablePolicy::Restrictive;
    let pipeline = pipeline(config);

    let first = pipeline.process(&format!("{}/a.html", server.uri())).await.unwrap_err();
    let second = pipeline.process(&format!("{}/b.html", server.uri())).await.unwrap_err();
    assert_eq!(first.kind(), ErrorKind::PolicyDenied);
    assert_eq!(second.kind(), ErrorKind::PolicyDenied);
}

#[tokio::test]
async fn test_missing_robots_permissive_allows() {
    let server = MockServer::start().await;
    mount_document(&server, "/a.html", "text/html", PAGE.as_bytes().to_vec()).await;

    let result = pipeline(test_config())
        .process(&format!("{}/a.html", server.uri()))
        .await
        .unwrap();
    assert_eq!(result.get("title").and_then(|v| v.as_str()), Some("Notice"));
}

#[tokio::test]
async fn test_feed_bypasses_robots_but_not_throttle() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /", 0).await;
    let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>News</title>
        <item><title>First</title><link>https://example.org/1</link></item></channel></rss>"#;
    mount_document(&server, "/news/feed", "application/rss+xml", rss.as_bytes().to_vec()).await;

    let pipeline = pipeline(test_config());
    let result = pipeline
        .process(&format!("{}/news/feed", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.get("format").and_then(|v| v.as_str()), Some("feed"));
    assert_eq!(result.text, "First\nhttps://example.org/1");
    let state = pipeline.throttle().snapshot(&domain_of(&server)).unwrap();
    assert_eq!(state.granted_total, 1);
    assert_eq!(state.in_flight, 0);
}

#[tokio::test]
async fn test_document_below_feed_path_is_denied() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /", 1).await;
    Mock::given(method("GET"))
        .and(path("/rss/x.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let err = pipeline(test_config())
        .process(&format!("{}/rss/x.pdf", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PolicyDenied);
}

#[tokio::test]
async fn test_same_domain_requests_are_spaced() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /", 1).await;
    mount_document(&server, "/a.html", "text/html", PAGE.as_bytes().to_vec()).await;
    mount_document(&server, "/b.html", "text/html", PAGE.as_bytes().to_vec()).await;

    let spacing = Duration::from_millis(300);
    let mut config = test_config();
    config.pipeline.default_delay_ms = spacing.as_millis() as u64;
    let pipeline = pipeline(config);

    // Warm the robots cache so both calls below only contend on the throttle
    pipeline.gate().robots().evaluate(&url::Url::parse(&format!("{}/a.html", server.uri())).unwrap()).await;

    let a = format!("{}/a.html", server.uri());
    let b = format!("{}/b.html", server.uri());
    let started = Instant::now();
    let (first, second) = tokio::join!(pipeline.process(&a), pipeline.process(&b));
    let elapsed = started.elapsed();

    assert!(first.is_ok() && second.is_ok());
    assert!(elapsed >= spacing, "two grants only {:?} apart", elapsed);
    let state = pipeline.throttle().snapshot(&domain_of(&server)).unwrap();
    assert_eq!(state.granted_total, 2);
    assert_eq!(state.in_flight, 0);
}

#[tokio::test]
async fn test_crawl_delay_raises_spacing() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1\nAllow: /", 1).await;
    mount_document(&server, "/a.html", "text/html", PAGE.as_bytes().to_vec()).await;

    let pipeline = pipeline(test_config());
    pipeline.process(&format!("{}/a.html", server.uri())).await.unwrap();

    let state = pipeline.throttle().snapshot(&domain_of(&server)).unwrap();
    assert_eq!(state.min_spacing, Duration::from_secs(1));
}

#[tokio::test]
async fn test_global_limit_holds_across_domains() {
    let response_delay = Duration::from_millis(200);
    let mut servers = Vec::new();
    for _ in 0..4 {
        let server = MockServer::start().await;
        mount_robots(&server, "User-agent: *\nAllow: /", 1).await;
        Mock::given(method("GET"))
            .and(path("/notice.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(PAGE)
                    .set_delay(response_delay),
            )
            .mount(&server)
            .await;
        servers.push(server);
    }

    let mut config = test_config();
    config.pipeline.global_concurrency = 2;
    let pipeline = pipeline(config);

    // Warm every robots cache so only the document fetches are timed
    for server in &servers {
        let url = url::Url::parse(&format!("{}/notice.html", server.uri())).unwrap();
        pipeline.gate().robots().evaluate(&url).await;
    }

    let urls: Vec<String> = servers
        .iter()
        .map(|server| format!("{}/notice.html", server.uri()))
        .collect();
    let started = Instant::now();
    let results = pipeline.process_many(&urls).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(|result| result.is_ok()));
    // Four slow responses two at a time take at least two rounds
    assert!(elapsed >= response_delay * 2, "finished in {:?}", elapsed);
    assert_eq!(pipeline.gate().global_available(), 2);
}
