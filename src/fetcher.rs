//! Bounded-concurrency document download
//!
//! [`BulkFetcher`] downloads a list of document URLs with at most `concurrency`
//! requests in flight, using the session's client so the portal cookies go along. Every
//! URL produces exactly one [`FetchOutcome`], delivered to the sink in completion
//! order; a failed URL never cancels the others.

use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::pin;
use tracing::{debug, info, warn};

use crate::config::{FetchConfig, FileCollisionAction};
use crate::error::{Error, Result};
use crate::types::{FetchOutcome, FetchReport, FetchedDocument};
use crate::utils::{filename_from_content_disposition, get_unique_path, sanitize_filename};

/// Default number of concurrent downloads
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Downloads documents with a fixed concurrency ceiling
#[derive(Clone, Debug)]
pub struct BulkFetcher {
    client: reqwest::Client,
    concurrency: usize,
}

impl BulkFetcher {
    /// Fetcher with the default ceiling of 10
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Fetcher using the ceiling from `config`
    pub fn from_config(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self::new(client).with_concurrency(config.concurrency)
    }

    /// Override the ceiling; values below 1 become 1
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Current ceiling
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Download every URL, handing each outcome to `sink` as it completes.
    ///
    /// Never fails as a whole: per-URL failures show up as [`Error::FetchItem`] in the
    /// outcome and in the returned report.
    pub async fn fetch_all<I, U>(&self, urls: I, mut sink: impl FnMut(FetchOutcome)) -> FetchReport
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let mut outcomes = pin!(self.outcomes(urls.into_iter().map(Into::into).collect()));
        let mut report = FetchReport::default();
        while let Some(outcome) = outcomes.next().await {
            self.tally(&mut report, &outcome);
            sink(outcome);
        }
        self.finish(report)
    }

    /// Download every URL into `sink`'s directory
    pub async fn fetch_into<I, U>(&self, urls: I, sink: &mut DirectorySink) -> FetchReport
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let mut outcomes = pin!(self.outcomes(urls.into_iter().map(Into::into).collect()));
        let mut report = FetchReport::default();
        while let Some(outcome) = outcomes.next().await {
            self.tally(&mut report, &outcome);
            sink.accept(outcome).await;
        }
        self.finish(report)
    }

    fn outcomes(&self, urls: Vec<String>) -> impl Stream<Item = FetchOutcome> + '_ {
        stream::iter(urls)
            .map(move |url| {
                let client = self.client.clone();
                async move {
                    let result = fetch_one(&client, &url).await;
                    FetchOutcome { url, result }
                }
            })
            .buffer_unordered(self.concurrency)
    }

    fn tally(&self, report: &mut FetchReport, outcome: &FetchOutcome) {
        match &outcome.result {
            Ok(document) => {
                debug!(url = %outcome.url, filename = %document.filename, bytes = document.body.len(), "document fetched");
                report
                    .succeeded
                    .push((outcome.url.clone(), document.filename.clone()));
            }
            Err(e) => {
                warn!(url = %outcome.url, error = %e, "document fetch failed");
                report.failed.push((outcome.url.clone(), e.to_string()));
            }
        }
    }

    fn finish(&self, report: FetchReport) -> FetchReport {
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            concurrency = self.concurrency,
            "bulk fetch complete"
        );
        report
    }
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<FetchedDocument> {
    let item_error = |reason: String| Error::FetchItem {
        url: url.to_string(),
        reason,
    };

    let response = client.get(url).send().await.map_err(|e| {
        item_error(if e.is_timeout() {
            format!("timeout: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        })
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(item_error(format!("HTTP {status}")));
    }

    let filename = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(filename_from_content_disposition)
        .unwrap_or_else(|| format!("{}.xml", uuid::Uuid::new_v4()));

    let body = response
        .bytes()
        .await
        .map_err(|e| item_error(format!("unreadable body: {e}")))?;

    Ok(FetchedDocument { body, filename })
}

/// Sink that writes fetched documents into a directory
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    collision: FileCollisionAction,
    written: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
    errors: Vec<(String, String)>,
}

impl DirectorySink {
    /// Create the directory if needed
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub async fn new(dir: impl Into<PathBuf>, collision: FileCollisionAction) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            collision,
            written: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        })
    }

    /// Sink for [`FetchConfig::output_dir`] and its collision policy
    pub async fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(&config.output_dir, config.file_collision).await
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Paths left untouched because they already existed
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// URLs whose document was fetched but could not be written, with the reason
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    /// Write one outcome; failed fetches are ignored
    pub async fn accept(&mut self, outcome: FetchOutcome) {
        let Ok(document) = outcome.result else {
            return;
        };
        let name = sanitize_filename(&document.filename)
            .unwrap_or_else(|| format!("{}.xml", uuid::Uuid::new_v4()));
        let target = self.dir.join(name);

        match self.write(&target, &document).await {
            Ok(Some(path)) => self.written.push(path),
            Ok(None) => {
                debug!(path = %target.display(), "file exists, skipping");
                self.skipped.push(target);
            }
            Err(e) => {
                warn!(url = %outcome.url, error = %e, "failed to write document");
                self.errors.push((outcome.url, e.to_string()));
            }
        }
    }

    async fn write(&self, target: &Path, document: &FetchedDocument) -> Result<Option<PathBuf>> {
        let Some(path) = get_unique_path(target, self.collision)? else {
            return Ok(None);
        };
        tokio::fs::write(&path, &document.body).await?;
        Ok(Some(path))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Tracks how many requests the server has seen that the client has not yet
    /// finished with, keeping the highest value
    #[derive(Clone, Default)]
    struct InFlight {
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Respond for InFlight {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let started = self.started.fetch_add(1, Ordering::SeqCst) + 1;
            let running = started - self.finished.load(Ordering::SeqCst);
            self.peak.fetch_max(running, Ordering::SeqCst);
            ResponseTemplate::new(200)
                .set_body_string("<cfdi:Comprobante/>")
                .set_delay(Duration::from_millis(150))
        }
    }

    async fn mount_documents(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/RecuperaCfdi.aspx/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"A-1.xml\"")
                    .set_body_string("<cfdi:Comprobante Folio=\"1\"/>"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RecuperaCfdi.aspx/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<cfdi:Comprobante/>"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RecuperaCfdi.aspx/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_sink_sees_every_url_despite_failures() {
        let server = MockServer::start().await;
        mount_documents(&server).await;
        let urls: Vec<String> = ["a", "broken", "b"]
            .iter()
            .map(|p| format!("{}/RecuperaCfdi.aspx/{p}", server.uri()))
            .collect();

        let fetcher = BulkFetcher::new(reqwest::Client::new()).with_concurrency(1);
        let mut seen = Vec::new();
        let report = fetcher
            .fetch_all(urls.clone(), |outcome| seen.push(outcome))
            .await;

        assert_eq!(seen.len(), 3);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, urls[1]);
        assert!(report.failed[0].1.contains("500"));

        let failed = seen.iter().find(|o| o.url == urls[1]).unwrap();
        assert!(matches!(failed.result, Err(Error::FetchItem { .. })));
    }

    #[tokio::test]
    async fn test_filename_from_header_or_synthesized() {
        let server = MockServer::start().await;
        mount_documents(&server).await;

        let fetcher = BulkFetcher::new(reqwest::Client::new());
        let mut names = std::collections::HashMap::new();
        fetcher
            .fetch_all(
                [
                    format!("{}/RecuperaCfdi.aspx/a", server.uri()),
                    format!("{}/RecuperaCfdi.aspx/b", server.uri()),
                ],
                |outcome| {
                    names.insert(outcome.url, outcome.result.unwrap().filename);
                },
            )
            .await;

        assert_eq!(names[&format!("{}/RecuperaCfdi.aspx/a", server.uri())], "A-1.xml");
        let synthesized = &names[&format!("{}/RecuperaCfdi.aspx/b", server.uri())];
        let stem = synthesized.strip_suffix(".xml").unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
    }

    #[tokio::test]
    async fn test_empty_list_never_calls_sink() {
        let fetcher = BulkFetcher::new(reqwest::Client::new());
        let mut calls = 0;
        let report = fetcher.fetch_all(Vec::<String>::new(), |_| calls += 1).await;
        assert_eq!(calls, 0);
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency_ceiling() {
        let server = MockServer::start().await;
        let in_flight = InFlight::default();
        Mock::given(method("GET"))
            .and(path_regex("^/RecuperaCfdi.aspx/doc-[0-9]+$"))
            .respond_with(in_flight.clone())
            .expect(6)
            .mount(&server)
            .await;
        let urls: Vec<String> = (0..6)
            .map(|i| format!("{}/RecuperaCfdi.aspx/doc-{i}", server.uri()))
            .collect();

        let finished = in_flight.finished.clone();
        let report = BulkFetcher::new(reqwest::Client::new())
            .with_concurrency(2)
            .fetch_all(urls, |_| {
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(report.succeeded.len(), 6);
        assert_eq!(in_flight.started.load(Ordering::SeqCst), 6);
        let peak = in_flight.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "{peak} requests in flight with a ceiling of 2");
        assert_eq!(peak, 2, "slow responses should fill both slots");
    }

    #[tokio::test]
    async fn test_directory_sink_skips_under_sanitized_name() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a_b.xml"), "old").unwrap();
        let mut sink = DirectorySink::new(temp_dir.path(), FileCollisionAction::Skip)
            .await
            .unwrap();

        sink.accept(FetchOutcome {
            url: "https://portal.test/RecuperaCfdi.aspx?Datos=1".to_string(),
            result: Ok(FetchedDocument {
                body: bytes::Bytes::from_static(b"<cfdi:Comprobante/>"),
                filename: "a:b.xml".to_string(),
            }),
        })
        .await;

        assert!(sink.written().is_empty());
        assert_eq!(sink.skipped(), [temp_dir.path().join("a_b.xml")]);
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("a_b.xml")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_concurrency_floor_and_config() {
        let client = reqwest::Client::new();
        assert_eq!(BulkFetcher::new(client.clone()).concurrency(), 10);
        assert_eq!(
            BulkFetcher::new(client.clone()).with_concurrency(0).concurrency(),
            1
        );
        let config = FetchConfig {
            concurrency: 25,
            ..Default::default()
        };
        assert_eq!(BulkFetcher::from_config(client, &config).concurrency(), 25);
    }

    #[tokio::test]
    async fn test_directory_sink_writes_and_renames() {
        let server = MockServer::start().await;
        mount_documents(&server).await;
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("A-1.xml"), "old").unwrap();

        let mut sink = DirectorySink::new(temp_dir.path(), FileCollisionAction::Rename)
            .await
            .unwrap();
        let fetcher = BulkFetcher::new(reqwest::Client::new());
        let report = fetcher
            .fetch_into(
                [
                    format!("{}/RecuperaCfdi.aspx/a", server.uri()),
                    format!("{}/RecuperaCfdi.aspx/broken", server.uri()),
                ],
                &mut sink,
            )
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(sink.written(), [temp_dir.path().join("A-1 (1).xml")]);
        let body = std::fs::read_to_string(temp_dir.path().join("A-1 (1).xml")).unwrap();
        assert_eq!(body, "<cfdi:Comprobante Folio=\"1\"/>");
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("A-1.xml")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn test_directory_sink_skip_keeps_existing_file() {
        let server = MockServer::start().await;
        mount_documents(&server).await;
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("A-1.xml"), "old").unwrap();

        let mut sink = DirectorySink::new(temp_dir.path(), FileCollisionAction::Skip)
            .await
            .unwrap();
        BulkFetcher::new(reqwest::Client::new())
            .fetch_into([format!("{}/RecuperaCfdi.aspx/a", server.uri())], &mut sink)
            .await;

        assert!(sink.written().is_empty());
        assert_eq!(sink.skipped(), [temp_dir.path().join("A-1.xml")]);
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("A-1.xml")).unwrap(),
            "old"
        );
    }
}
