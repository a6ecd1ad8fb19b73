//! Shared fixtures: configuration, mock-site setup, and document builders

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};
use tidepool::config::Config;
use tidepool::Pipeline;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_AGENT: &str = "TidepoolTest/1.0";

/// Fast, OCR-free configuration for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.pipeline.user_agent = USER_AGENT.to_string();
    config.pipeline.default_delay_ms = 0;
    config.pipeline.default_concurrency = 2;
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 40;
    config.robots.timeout_ms = 500;
    config.pdf.ocr = false;
    config
}

pub fn pipeline(config: Config) -> Pipeline {
    Pipeline::new(config).expect("test config is valid")
}

/// Domain key ("host:port") of the mock server, as the throttle sees it
pub fn domain_of(server: &MockServer) -> String {
    let url = url::Url::parse(&server.uri()).expect("mock server uri");
    tidepool::url::domain_key(&url).expect("mock server has a host")
}

/// Serves `body` as the site's robots.txt, expecting exactly `calls` fetches
pub async fn mount_robots(server: &MockServer, body: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(calls)
        .mount(server)
        .await;
}

/// Serves `body` at `route` with the given content type
pub async fn mount_document(server: &MockServer, route: &str, content_type: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

/// A Letter-size PDF with one line of text per page
pub fn pdf_document(pages: &[String]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 9.into()]),
                    Operation::new("Td", vec![36.into(), 740.into()]),
                    Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                    Operation::new("ET", vec![]),
                ],
            };
            let stream = Stream::new(dictionary! {}, content.encode().expect("encode content"));
            let content_id = doc.add_object(stream);
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save pdf");
    out
}

/// Page text long enough to count as native text on a Letter page
pub fn page_text(marker: &str) -> String {
    format!("{} section of the inspection report", marker).repeat(5)
}

/// A minimal DOCX package with the given paragraphs
pub fn docx_document(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).expect("zip entry");
        zip.write_all(b"<Types/>").expect("zip write");
        zip.start_file("word/document.xml", options).expect("zip entry");
        zip.write_all(xml.as_bytes()).expect("zip write");
        zip.finish().expect("zip finish");
    }
    cursor.into_inner()
}
