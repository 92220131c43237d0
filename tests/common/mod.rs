//! Common test utilities for fallback-dl integration tests

#![allow(dead_code)]

use fallback_dl::{Config, DownloadConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Manifest header using the default column names
pub const MANIFEST_HEADER: &str = "BRnum,Company,Pdf_URL,Report Html Address";

/// Write a manifest of `(id, primary, secondary)` rows and return its path
pub fn write_manifest(dir: &Path, rows: &[(&str, String, String)]) -> PathBuf {
    let mut text = String::from(MANIFEST_HEADER);
    text.push('\n');
    for (id, primary, secondary) in rows {
        text.push_str(&format!("{id},Acme {id},{primary},{secondary}\n"));
    }
    let path = dir.join("manifest.csv");
    std::fs::write(&path, text).unwrap();
    path
}

/// Config rooted in `dir` with short timeouts for local mock servers
pub fn test_config(dir: &Path, manifest: PathBuf, workers: usize, limit: usize) -> Config {
    Config {
        manifest_path: manifest,
        output_dir: dir.join("output"),
        download: DownloadConfig {
            workers,
            limit,
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Mount a GET route answering with `template`
pub async fn route(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mount a GET route that must be hit exactly `times` times
pub async fn route_expecting(
    server: &MockServer,
    route: &str,
    template: ResponseTemplate,
    times: u64,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

/// A body that looks like a small PDF
pub fn pdf(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_bytes(format!("%PDF-1.7 {id}").into_bytes())
}
