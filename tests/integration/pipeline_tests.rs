//! End-to-end fetch and extract through mock sites

use crate::common::{
    docx_document, mount_document, mount_robots, page_text, pdf_document, pipeline, test_config,
};
use tidepool::extractor::PAGE_BREAK;
use tidepool::{DownloadError, ErrorKind, TidepoolError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn open_site() -> MockServer {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /", 1).await;
    server
}

#[tokio::test]
async fn test_native_pdf_pages_in_order() {
    let server = open_site().await;
    let pages = vec![page_text("First"), page_text("Second"), page_text("Third")];
    mount_document(&server, "/report.pdf", "application/pdf", pdf_document(&pages)).await;

    let url = format!("{}/report.pdf", server.uri());
    let result = pipeline(test_config()).process(&url).await.unwrap();

    let first = result.text.find("First section").unwrap();
    let second = result.text.find("Second section").unwrap();
    let third = result.text.find("Third section").unwrap();
    assert!(first < second && second < third);
    assert_eq!(result.text.matches(PAGE_BREAK).count(), 2);

    assert!(result.ocr_pages().is_empty());
    assert_eq!(result.get("pages_processed").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(result.get("format").and_then(|v| v.as_str()), Some("pdf"));
    assert_eq!(result.get("downloader").and_then(|v| v.as_str()), Some("http"));
    assert_eq!(result.get("status_code").and_then(|v| v.as_i64()), Some(200));
    assert_eq!(result.get("source_url").and_then(|v| v.as_str()), Some(url.as_str()));
    assert_eq!(
        result.get("char_count").and_then(|v| v.as_i64()),
        Some(result.text.chars().count() as i64)
    );
}

#[tokio::test]
async fn test_declared_type_beats_url_suffix() {
    let server = open_site().await;
    let pages = vec![page_text("Only")];
    mount_document(&server, "/viewer.html", "application/pdf", pdf_document(&pages)).await;

    let result = pipeline(test_config())
        .process(&format!("{}/viewer.html", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.get("format").and_then(|v| v.as_str()), Some("pdf"));
    assert!(result.text.contains("Only section"));
}

#[tokio::test]
async fn test_signature_used_when_type_and_suffix_are_silent() {
    let server = open_site().await;
    let pages = vec![page_text("Sniffed")];
    mount_document(&server, "/download", "application/octet-stream", pdf_document(&pages)).await;

    let result = pipeline(test_config())
        .process(&format!("{}/download", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.get("format").and_then(|v| v.as_str()), Some("pdf"));
}

#[tokio::test]
async fn test_docx_end_to_end() {
    let server = open_site().await;
    let docx = docx_document(&["Warning Letter", "Dear Sir or Madam,", "Please respond."]);
    mount_document(
        &server,
        "/letter.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        docx,
    )
    .await;

    let result = pipeline(test_config())
        .process(&format!("{}/letter.docx", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.text, "Warning Letter\nDear Sir or Madam,\nPlease respond.");
    assert_eq!(result.get("format").and_then(|v| v.as_str()), Some("docx"));
    assert_eq!(result.get("paragraphs").and_then(|v| v.as_i64()), Some(3));
}

#[tokio::test]
async fn test_unknown_format_is_unsupported() {
    let server = open_site().await;
    mount_document(&server, "/blob", "application/octet-stream", vec![0x00, 0x01, 0x02, 0x03]).await;

    let err = pipeline(test_config())
        .process(&format!("{}/blob", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TidepoolError::UnsupportedFormat { content_type: Some(ref ct), .. } if ct == "application/octet-stream"
    ));
}

#[tokio::test]
async fn test_malformed_pdf_is_extraction_error() {
    let server = open_site().await;
    mount_document(&server, "/broken.pdf", "application/pdf", b"%PDF-1.7\nnot really".to_vec()).await;

    let err = pipeline(test_config())
        .process(&format!("{}/broken.pdf", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = open_site().await;
    Mock::given(method("GET"))
        .and(path("/flaky.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_document(
        &server,
        "/flaky.html",
        "text/html",
        b"<html><body><p>Recovered.</p></body></html>".to_vec(),
    )
    .await;

    let result = pipeline(test_config())
        .process(&format!("{}/flaky.html", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.text, "Recovered.");
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = open_site().await;
    Mock::given(method("GET"))
        .and(path("/down.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = pipeline(test_config())
        .process(&format!("{}/down.pdf", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TidepoolError::Download(DownloadError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = open_site().await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = pipeline(test_config());
    let err = pipeline
        .process(&format!("{}/gone.pdf", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Download);
    let state = pipeline
        .throttle()
        .snapshot(&crate::common::domain_of(&server))
        .unwrap();
    assert_eq!(state.in_flight, 0);
}

#[tokio::test]
async fn test_batch_keeps_input_order() {
    // No robots.txt mock: concurrent first calls may each probe it
    let server = MockServer::start().await;
    mount_document(&server, "/a.html", "text/html", b"<html><body><p>Alpha</p></body></html>".to_vec()).await;
    mount_document(&server, "/b.html", "text/html", b"<html><body><p>Beta</p></body></html>".to_vec()).await;

    let urls = vec![
        format!("{}/a.html", server.uri()),
        "not a url".to_string(),
        format!("{}/b.html", server.uri()),
    ];
    let results = pipeline(test_config()).process_many(&urls).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().text, "Alpha");
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Input);
    assert_eq!(results[2].as_ref().unwrap().text, "Beta");
}
