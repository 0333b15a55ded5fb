//! Integration tests for edgequake-pagebind.
//!
//! HTTP sources are served by a local wiremock server. Tests that need a
//! pdfium library print SKIP and return when none can be bound; point
//! `PDFIUM_LIB_PATH` at a libpdfium to run them:
//!
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test pipeline -- --nocapture

use edgequake_pagebind::pipeline::pdfium::bind_pdfium;
use edgequake_pagebind::{
    assemble_to_bytes, extract_ranges, fetch_and_assemble, fetch_and_assemble_manifest, Artifact,
    BatchConfig, CoreResult, FetchError, Manifest, PageRange, RangeError, SplitConfig,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn jpeg(w: u32, h: u32, shade: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([shade, shade, 255 - shade])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// Image XObject payloads of a PDF written by this crate, in page order.
fn image_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let find = |needle: &[u8], from: usize| {
        pdf[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| p + from)
    };
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(pos) = find(b"/Subtype /Image", from) {
        let len_at = find(b"/Length ", pos).unwrap() + 8;
        let len_end = find(b" ", len_at).unwrap();
        let len: usize = std::str::from_utf8(&pdf[len_at..len_end])
            .unwrap()
            .parse()
            .unwrap();
        let start = find(b"stream\n", len_end).unwrap() + 7;
        out.push(pdf[start..start + len].to_vec());
        from = start + len;
    }
    out
}

fn data_uri(bytes: &[u8]) -> String {
    use base64::Engine;
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

async fn serve(server: &MockServer, route: &str, body: Vec<u8>, content_type: &str) {
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

/// Skip this test unless a pdfium library can be bound.
macro_rules! skip_unless_pdfium {
    () => {{
        if let Err(e) = bind_pdfium(None) {
            println!("SKIP — pdfium not available: {e}");
            return;
        }
    }};
}

// ── Download-then-merge ──────────────────────────────────────────────────────

#[tokio::test]
async fn failed_entry_is_skipped_and_order_kept() {
    let server = MockServer::start().await;
    let a = jpeg(20, 10, 0);
    let c = jpeg(30, 10, 200);
    serve(&server, "/a.jpg", a.clone(), "image/jpeg").await;
    serve(&server, "/c.jpg", c.clone(), "image/jpeg").await;
    Mock::given(method("GET"))
        .and(path("/b.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.txt");
    let uri = server.uri();
    tokio::fs::write(
        &manifest,
        format!("1. {uri}/a.jpg\n2. {uri}/b.jpg\nbad line\n3. {uri}/c.jpg\n"),
    )
    .await
    .unwrap();

    let out = dir.path().join("merged.pdf");
    let config = BatchConfig::builder()
        .artifact_dir(dir.path().join("downloaded_images"))
        .build()
        .unwrap();
    let report = fetch_and_assemble(&manifest, &out, &config).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        FetchError::HttpStatus { status: 404, .. }
    ));

    let stats = report.assembly.expect("assembled");
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.passthrough_pages, 2);

    let pdf = std::fs::read(&out).unwrap();
    assert_eq!(image_streams(&pdf), vec![a.clone(), c]);

    let images = dir.path().join("downloaded_images");
    assert_eq!(std::fs::read(images.join("image_001.jpg")).unwrap(), a);
    assert!(!images.join("image_002.jpg").exists());
    assert!(images.join("image_003.jpg").exists());
}

#[tokio::test]
async fn extension_comes_from_content_type() {
    let server = MockServer::start().await;
    serve(&server, "/render", jpeg(8, 8, 50), "image/jpeg; charset=binary").await;

    let dir = tempfile::tempdir().unwrap();
    let config = BatchConfig::builder()
        .artifact_dir(dir.path())
        .build()
        .unwrap();
    let manifest = Manifest::from_pairs([(1, format!("{}/render", server.uri()))]);
    let report = fetch_and_assemble_manifest(manifest, dir.path().join("o.pdf"), &config)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report.artifacts[0].path.as_deref(),
        Some(dir.path().join("image_001.jpg").as_path())
    );
}

#[tokio::test]
async fn slow_source_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(jpeg(4, 4, 0))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    serve(&server, "/fast.jpg", jpeg(4, 4, 9), "image/jpeg").await;

    let dir = tempfile::tempdir().unwrap();
    let config = BatchConfig::builder()
        .fetch_timeout_secs(1)
        .build()
        .unwrap();
    let uri = server.uri();
    let manifest = Manifest::from_pairs([
        (1, format!("{uri}/slow.png")),
        (2, format!("{uri}/fast.jpg")),
    ]);
    let report = fetch_and_assemble_manifest(manifest, dir.path().join("o.pdf"), &config)
        .await
        .unwrap();

    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert!(matches!(
        report.failures[0].error,
        FetchError::Timeout { secs: 1, .. }
    ));
    assert_eq!(report.assembly.unwrap().pages, 1);
}

#[tokio::test]
async fn oversized_download_is_refused() {
    let server = MockServer::start().await;
    serve(&server, "/big.jpg", vec![0xAB; 4096], "image/jpeg").await;
    serve(&server, "/small.jpg", jpeg(4, 4, 30), "image/jpeg").await;

    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    let config = BatchConfig::builder()
        .artifact_dir(&images)
        .max_artifact_bytes(2048)
        .build()
        .unwrap();
    let uri = server.uri();
    let manifest = Manifest::from_pairs([
        (1, format!("{uri}/big.jpg")),
        (2, format!("{uri}/small.jpg")),
    ]);
    let report = fetch_and_assemble_manifest(manifest, dir.path().join("o.pdf"), &config)
        .await
        .unwrap();

    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert!(matches!(
        report.failures[0].error,
        FetchError::TooLarge { limit: 2048, .. }
    ));
    let names: Vec<String> = std::fs::read_dir(&images)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["image_002.jpg"]);
}

#[tokio::test]
async fn manifest_with_a_non_utf8_line_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.txt");
    let a = jpeg(8, 8, 10);
    let c = jpeg(8, 8, 90);
    let mut text = Vec::new();
    text.extend_from_slice(format!("1. {}\n", data_uri(&a)).as_bytes());
    text.extend_from_slice(b"2. https://example.invalid/caf\xE9.png\n");
    text.extend_from_slice(format!("3. {}\n", data_uri(&c)).as_bytes());
    tokio::fs::write(&manifest, text).await.unwrap();

    let report = fetch_and_assemble(&manifest, dir.path().join("o.pdf"), &BatchConfig::default())
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.assembly.unwrap().pages, 2);
}

#[tokio::test]
async fn all_failures_mean_nothing_to_assemble() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged.pdf");
    let uri = server.uri();
    let manifest = Manifest::from_pairs([(1, format!("{uri}/x.png")), (2, format!("{uri}/y.png"))]);
    let report = fetch_and_assemble_manifest(manifest, &out, &BatchConfig::default())
        .await
        .unwrap();

    assert!(report.nothing_to_assemble);
    assert_eq!(report.failed, 2);
    assert!(!out.exists());

    let json = serde_json::to_value(CoreResult::from(Ok::<_, edgequake_pagebind::PagebindError>(report))).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["nothing_to_assemble"], true);
    assert_eq!(json["data"]["failures"][0]["error"]["kind"], "http_status");
    assert_eq!(json["data"]["failures"][0]["error"]["status"], 500);
}

#[tokio::test]
async fn missing_manifest_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = fetch_and_assemble(dir.path().join("nope.txt"), dir.path().join("o.pdf"), &BatchConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "manifest");
}

// ── Range extraction (needs pdfium) ──────────────────────────────────────────

async fn write_sample_pdf(path: &Path, pages: u8) {
    let artifacts = (1..=pages)
        .map(|i| Artifact::from_bytes(u32::from(i), "jpg", jpeg(16, 16, i * 20)))
        .collect();
    let (bytes, _) = assemble_to_bytes(artifacts, 96).await.unwrap();
    tokio::fs::write(path, bytes).await.unwrap();
}

fn page_count(path: &Path) -> usize {
    let pdfium = bind_pdfium(None).unwrap();
    let doc = pdfium.load_pdf_from_file(path, None).unwrap();
    doc.pages().len() as usize
}

#[tokio::test]
async fn assembled_pdf_opens_in_pdfium() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("sample.pdf");
    write_sample_pdf(&pdf, 4).await;
    assert_eq!(page_count(&pdf), 4);
}

#[tokio::test]
async fn ranges_are_extracted_and_bad_ones_rejected() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("book.pdf");
    write_sample_pdf(&source, 5).await;

    let out_dir = dir.path().join("parts");
    let config = SplitConfig::builder().output_dir(&out_dir).build().unwrap();
    let ranges = vec![
        PageRange::new("front", 1, 2),
        PageRange::new("x", 3, 9),
        PageRange::new("back", 3, 5),
        PageRange::new("everything", 1, 5),
    ];
    let report = extract_ranges(&source, ranges, &config).await.unwrap();

    assert_eq!(report.total_pages, 5);
    let labels: Vec<&str> = report.extracted.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["front", "back", "everything"]);
    assert!(matches!(
        report.rejected[0].error,
        RangeError::EndBeyondDocument { end: 9, total: 5, .. }
    ));
    assert!(!out_dir.join("x.pdf").exists());

    assert_eq!(page_count(&out_dir.join("front.pdf")), 2);
    assert_eq!(page_count(&out_dir.join("back.pdf")), 3);
    assert_eq!(page_count(&out_dir.join("everything.pdf")), 5);
}

#[tokio::test]
async fn unreadable_source_is_fatal() {
    skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("not.pdf");
    tokio::fs::write(&bogus, b"plain text").await.unwrap();
    let config = SplitConfig::builder().output_dir(dir.path()).build().unwrap();

    let err = extract_ranges(&bogus, vec![PageRange::new("a", 1, 1)], &config)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "open");
}
