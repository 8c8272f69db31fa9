//! Integration tests for the crawl provider
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! lifecycle end-to-end: warm-up, crawl into a genesis index, shutdown and
//! promotion to stable.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tidemark::config::{parse_config, CrawlConfig, CrawlOptions, FetchConfig, LoadedConfig};
use tidemark::crawler::{build_http_client, Coordinator, CrawlError};
use tidemark::index::{
    promote, DocumentEmitter, GenerationRecord, GenesisOutcome, IndexBackend, IndexDocument,
    IndexError, IndexResult, IndexStats, PromotionError, PromotionReport, SqliteIndex,
    StoredDocument,
};
use tidemark::provider::{CrawlerProvider, DataProvider, DispatchType, ProviderError, RuntimeContext};
use tidemark::state::{ProviderState, RunState, SeenStatus};
use tidemark::storage::{open_storage, FrontierRecord, SeenStore, SqliteStorage, Storage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTEXT: &str = "site";

/// Builds a configuration rooted in `dir` for a crawl of `seed`
///
/// `crawl_extra` and `provider_extra` are appended verbatim to the
/// `[crawl]` and `[provider]` tables.
fn create_test_config(
    dir: &TempDir,
    seed: &str,
    crawl_extra: &str,
    provider_extra: &str,
    auto_promote: bool,
) -> LoadedConfig {
    let toml = format!(
        r#"
[provider]
context = "{context}"
state-path = "{state}"
concurrency = 4
{provider_extra}

[fetch]
timeout-secs = 5
connect-timeout-secs = 2
max-retries = 0

[index]
directory = "{index}"
database-name = "docs"
auto-promote = {auto_promote}

[crawl]
seed = "{seed}"
{crawl_extra}
"#,
        context = CONTEXT,
        state = dir.path().join("ledger.db").display(),
        index = dir.path().join("index").display(),
        seed = seed,
        auto_promote = auto_promote,
        provider_extra = provider_extra,
        crawl_extra = crawl_extra,
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

/// Serves every request a chunked HTML body with no Content-Length
async fn spawn_chunked_server(chunks: usize, chunk_len: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                    Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n"
                    .to_vec();
                for _ in 0..chunks {
                    response.extend_from_slice(format!("{:x}\r\n", chunk_len).as_bytes());
                    response.extend(std::iter::repeat(b'x').take(chunk_len));
                    response.extend_from_slice(b"\r\n");
                }
                response.extend_from_slice(b"0\r\n\r\n");

                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn stable_urls(dir: &TempDir) -> BTreeSet<String> {
    let index = SqliteIndex::open(&dir.path().join("index"), "docs").unwrap();
    index
        .read_stable()
        .unwrap()
        .into_iter()
        .map(|d| d.url)
        .collect()
}

#[tokio::test]
async fn test_host_and_depth_scope() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = Url::parse(&base_url).unwrap().port().unwrap();

    // localhost is a different host from the 127.0.0.1 seed
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/a">A</a>
            <a href="http://localhost:{port}/b">B</a>
            </body></html>"#,
            base = base_url,
            port = port
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/a/c">deeper</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a/c"))
        .respond_with(html("too deep"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("foreign"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &base_url,
        "own-host-only = true\nmax-link-depth = 1",
        "",
        true,
    );
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    let report = provider.run_once(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 2);
    assert!(report.promotion.is_some());
    assert_eq!(provider.state(), ProviderState::CooledDown);

    let expected: BTreeSet<String> = [format!("{}/", base_url), format!("{}/a", base_url)]
        .into_iter()
        .collect();
    assert_eq!(stable_urls(&dir), expected);
}

#[tokio::test]
async fn test_oversized_document_rejected_run_continues() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/big">big</a><a href="/small">small</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'x'; 5000], "text/html"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/small"))
        .respond_with(html("<p>small page</p>"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "content-max-size = 1000", "", false);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    provider.warm_up(&context).unwrap();
    let report = provider.execute(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 2);
    assert_eq!(report.counts.failed, 1);

    {
        let storage = provider.storage().unwrap();
        let ledger = storage.lock().unwrap();
        let record = ledger
            .seen_record(&format!("{}/big", base_url))
            .unwrap()
            .expect("oversized URL must be in the ledger");
        assert_eq!(record.status, SeenStatus::Rejected);
        assert_eq!(record.reason.as_deref(), Some("too_large"));

        let failures = ledger.get_failures(report.run_id).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, "too_large");
    }

    provider.cool_down(&context).unwrap();
    let storage = provider.storage().unwrap();
    assert_eq!(
        storage.lock().unwrap().count_seen(SeenStatus::Rejected).unwrap(),
        0
    );
}

#[tokio::test]
async fn test_crawl_limit_never_exceeded() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (0..10)
        .map(|n| format!(r#"<a href="/page{}">{}</a>"#, n, n))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&links))
        .mount(&mock_server)
        .await;
    for n in 0..10 {
        Mock::given(method("GET"))
            .and(path(format!("/page{}", n)))
            .respond_with(html("leaf").set_delay(Duration::from_millis(20)))
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "max-crawl-limit = 3", "", true);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    let report = provider.run_once(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 3);
    assert_eq!(stable_urls(&dir).len(), 3);
}

#[tokio::test]
async fn test_update_without_path_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &mock_server.uri(), "", "", false);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Update);

    provider.warm_up(&context).unwrap();
    let err = provider.execute(&context).await.unwrap_err();
    assert!(matches!(err, ProviderError::RuntimeValidation(_)));

    let storage = provider.storage().unwrap();
    let ledger = storage.lock().unwrap();
    assert!(ledger.get_latest_run().unwrap().is_none());
    assert_eq!(ledger.count_seen(SeenStatus::Accepted).unwrap(), 0);
    assert_eq!(ledger.count_seen(SeenStatus::Rejected).unwrap(), 0);
    assert_eq!(ledger.count_frontier().unwrap(), 0);
}

#[tokio::test]
async fn test_update_crawls_from_path() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("seed"))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/changed"))
        .respond_with(html("<title>Changed</title>updated"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "max-link-depth = 0", "", true);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Update).with_path("/docs/changed");

    let report = provider.run_once(&context).await.unwrap();
    assert!(report.is_completed());

    let expected: BTreeSet<String> = [format!("{}/docs/changed", base_url)].into_iter().collect();
    assert_eq!(stable_urls(&dir), expected);
}

#[tokio::test]
async fn test_no_url_fetched_twice() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // every page links to every other page, with fragment and query variants
    let pages = ["/", "/p1", "/p2", "/p3", "/p4", "/p5"];
    let links: String = pages
        .iter()
        .map(|p| format!(r#"<a href="{p}">x</a><a href="{p}#top">y</a><a href="{p}?ref=1">z</a>"#, p = p))
        .collect();

    for page in pages {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html(&links).set_delay(Duration::from_millis(10)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "", "", false);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    let report = provider.run_once(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 6);
    // mock expectations are verified when the server drops
}

#[tokio::test]
async fn test_streamed_oversize_without_length_rejected() {
    let base_url = spawn_chunked_server(5, 1000).await;
    let seed_url = format!("{}/", base_url);

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "content-max-size = 1000", "", false);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    provider.warm_up(&context).unwrap();
    let report = provider.execute(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 0);
    assert_eq!(report.counts.failed, 1);

    let storage = provider.storage().unwrap();
    let ledger = storage.lock().unwrap();
    let record = ledger.seen_record(&seed_url).unwrap().unwrap();
    assert_eq!(record.status, SeenStatus::Rejected);
    assert_eq!(record.reason.as_deref(), Some("too_large"));
}

#[tokio::test]
async fn test_redirect_off_host_not_indexed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = Url::parse(&base_url).unwrap().port().unwrap();
    let hop_url = format!("{}/hop", base_url);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/hop">hop</a>"#))
        .mount(&mock_server)
        .await;

    // localhost is a different host from the 127.0.0.1 seed
    let foreign = format!("http://localhost:{}/secret", port);
    Mock::given(method("GET"))
        .and(path("/hop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", foreign.as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(html("foreign content"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "own-host-only = true", "", true);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    provider.warm_up(&context).unwrap();
    let report = provider.execute(&context).await.unwrap();
    assert!(report.is_completed());
    assert_eq!(report.counts.accepted, 1);
    assert_eq!(report.counts.failed, 1);

    {
        let storage = provider.storage().unwrap();
        let ledger = storage.lock().unwrap();
        let record = ledger.seen_record(&hop_url).unwrap().unwrap();
        assert_eq!(record.status, SeenStatus::Rejected);
        assert_eq!(record.reason.as_deref(), Some("redirect"));
    }

    provider.cool_down(&context).unwrap();
    let expected: BTreeSet<String> = [format!("{}/", base_url)].into_iter().collect();
    assert_eq!(stable_urls(&dir), expected);
}

#[tokio::test]
async fn test_resume_after_crash() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let seed_url = format!("{}/", base_url);
    let a_url = format!("{}/a", base_url);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a>"#))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/">home</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "", "ledger-policy = \"resume-interrupted\"", true);

    // state left behind by a process that died while fetching /a
    {
        let mut ledger = open_storage(&dir.path().join("ledger.db"), CONTEXT).unwrap();
        ledger.create_run("INSERT", &seed_url, &config.hash).unwrap();
        ledger
            .mark_seen(&seed_url, SeenStatus::Accepted, None)
            .unwrap();
        ledger
            .push_frontier(&FrontierRecord {
                url: a_url.clone(),
                depth: 1,
                origin: Some(seed_url.clone()),
            })
            .unwrap();
        ledger.mark_in_flight(&a_url).unwrap();

        let mut index = SqliteIndex::open(&dir.path().join("index"), "docs").unwrap();
        let generation = index.open_genesis("crashed", false).unwrap();
        index
            .append(
                generation,
                &IndexDocument {
                    url: seed_url.clone(),
                    mime: "text/html".to_string(),
                    size: 16,
                    depth: 0,
                    title: None,
                    text: "a".to_string(),
                    content: br#"<a href="/a">a</a>"#.to_vec(),
                },
            )
            .unwrap();
    }

    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");
    let report = provider.run_once(&context).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.run_id, 1);
    assert_eq!(report.counts.accepted, 1);

    let expected: BTreeSet<String> = [seed_url, a_url].into_iter().collect();
    assert_eq!(stable_urls(&dir), expected);
}

#[tokio::test]
async fn test_resume_settles_indexed_in_flight_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let seed_url = format!("{}/", base_url);
    let a_url = format!("{}/a", base_url);
    let b_url = format!("{}/b", base_url);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a>"#))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/b">b</a>"#))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("leaf"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &base_url, "", "ledger-policy = \"resume-interrupted\"", true);

    // /a reached the genesis index, the process died before the ledger caught up
    {
        let mut ledger = open_storage(&dir.path().join("ledger.db"), CONTEXT).unwrap();
        ledger.create_run("INSERT", &seed_url, &config.hash).unwrap();
        ledger
            .mark_seen(&seed_url, SeenStatus::Accepted, None)
            .unwrap();
        ledger
            .push_frontier(&FrontierRecord {
                url: a_url.clone(),
                depth: 1,
                origin: Some(seed_url.clone()),
            })
            .unwrap();
        ledger.mark_in_flight(&a_url).unwrap();

        let mut index = SqliteIndex::open(&dir.path().join("index"), "docs").unwrap();
        let generation = index.open_genesis("crashed", false).unwrap();
        for (url, depth, content) in [
            (&seed_url, 0, r#"<a href="/a">a</a>"#),
            (&a_url, 1, r#"<a href="/b">b</a>"#),
        ] {
            index
                .append(
                    generation,
                    &IndexDocument {
                        url: url.clone(),
                        mime: "text/html".to_string(),
                        size: content.len() as u64,
                        depth,
                        title: None,
                        text: String::new(),
                        content: content.as_bytes().to_vec(),
                    },
                )
                .unwrap();
        }
    }

    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");
    let report = provider.run_once(&context).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.run_id, 1);
    assert_eq!(report.counts.accepted, 2);

    let expected: BTreeSet<String> = [seed_url, a_url, b_url].into_iter().collect();
    assert_eq!(stable_urls(&dir), expected);
}

fn build_generation(index: &mut SqliteIndex, label: &str, count: usize) -> i64 {
    let generation = index.open_genesis(label, false).unwrap();
    for n in 0..count {
        index
            .append(
                generation,
                &IndexDocument {
                    url: format!("http://example.com/{}/{}", label, n),
                    mime: "text/html".to_string(),
                    size: 4,
                    depth: 1,
                    title: Some(label.to_string()),
                    text: "body".to_string(),
                    content: b"body".to_vec(),
                },
            )
            .unwrap();
    }
    index.finalize(generation).unwrap();
    generation
}

#[test]
fn test_promotion_atomic_under_concurrent_reads() {
    let dir = TempDir::new().unwrap();
    let index_dir = dir.path().join("index");

    let first = {
        let mut index = SqliteIndex::open(&index_dir, "docs").unwrap();
        let first = build_generation(&mut index, "first", 20);
        index.promote().unwrap();
        build_generation(&mut index, "second", 35);
        first
    };

    let stop = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(Mutex::new(BTreeSet::new()));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let stop = Arc::clone(&stop);
            let observed = Arc::clone(&observed);
            let index_dir = index_dir.clone();
            std::thread::spawn(move || {
                let reader = SqliteIndex::open(&index_dir, "docs").unwrap();
                while !stop.load(Ordering::SeqCst) {
                    let documents = reader.read_stable().unwrap();
                    let generations: BTreeSet<i64> =
                        documents.iter().map(|d| d.generation_id).collect();
                    assert_eq!(generations.len(), 1, "stable read mixed generations");
                    assert!(
                        documents.len() == 20 || documents.len() == 35,
                        "partial stable snapshot of {} documents",
                        documents.len()
                    );
                    observed.lock().unwrap().insert(documents.len());
                }
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(50));
    let report = promote(&index_dir, "docs").unwrap();
    assert_eq!(report.retired, Some(first));
    assert_eq!(report.document_count, 35);
    std::thread::sleep(Duration::from_millis(50));

    stop.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(observed.lock().unwrap().contains(&35));

    // a second promotion finds nothing and leaves stable in place
    assert!(matches!(
        promote(&index_dir, "docs"),
        Err(PromotionError::NoGenesis(_))
    ));
    assert_eq!(
        SqliteIndex::open(&index_dir, "docs")
            .unwrap()
            .read_stable()
            .unwrap()
            .len(),
        35
    );
}

#[test]
fn test_reset_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut ledger = open_storage(&dir.path().join("ledger.db"), CONTEXT).unwrap();

    ledger.reset().unwrap();
    ledger.reset_filter_store().unwrap();

    ledger
        .mark_seen("http://example.com/", SeenStatus::Accepted, None)
        .unwrap();
    ledger
        .record_rejection("http://example.com/x.gif", "core_invalid")
        .unwrap();

    for _ in 0..2 {
        ledger.reset().unwrap();
        ledger.reset_filter_store().unwrap();
        assert!(!ledger.is_seen("http://example.com/").unwrap());
        assert_eq!(ledger.count_filter_rejections().unwrap(), 0);
    }

    // other contexts in the same database are untouched
    let mut other = open_storage(&dir.path().join("ledger.db"), "other").unwrap();
    other
        .mark_seen("http://example.com/", SeenStatus::Accepted, None)
        .unwrap();
    ledger.reset().unwrap();
    assert!(other.is_seen("http://example.com/").unwrap());
}

/// Index backend whose every write fails
struct BrokenIndex;

impl IndexBackend for BrokenIndex {
    fn open_genesis(&mut self, _label: &str, _resume: bool) -> IndexResult<i64> {
        Ok(1)
    }

    fn append(&mut self, _generation: i64, _document: &IndexDocument) -> IndexResult<()> {
        Err(IndexError::Database("disk I/O error".to_string()))
    }

    fn finalize(&mut self, _generation: i64) -> IndexResult<()> {
        Ok(())
    }

    fn discard(&mut self, _generation: i64) -> IndexResult<()> {
        Ok(())
    }

    fn promote(&mut self) -> Result<PromotionReport, PromotionError> {
        Err(PromotionError::NoGenesis("broken".to_string()))
    }

    fn stable_generation(&self) -> IndexResult<Option<GenerationRecord>> {
        Ok(None)
    }

    fn read_stable(&self) -> IndexResult<Vec<StoredDocument>> {
        Ok(Vec::new())
    }

    fn list_generations(&self) -> IndexResult<Vec<GenerationRecord>> {
        Ok(Vec::new())
    }

    fn stats(&self) -> IndexResult<IndexStats> {
        Ok(IndexStats::default())
    }
}

#[tokio::test]
async fn test_index_write_failure_aborts_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">a</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("a"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = Arc::new(Mutex::new(
        SqliteStorage::new(&dir.path().join("ledger.db"), CONTEXT).unwrap(),
    ));
    let config = Arc::new(CrawlConfig::new(&CrawlOptions::with_seed(mock_server.uri())).unwrap());
    let fetch = FetchConfig::default();

    let mut coordinator = Coordinator::new(
        config,
        &fetch,
        build_http_client(&fetch).unwrap(),
        Arc::clone(&storage),
        1,
        2,
        CancellationToken::new(),
    )
    .unwrap();
    coordinator
        .seed(&Url::parse(&mock_server.uri()).unwrap())
        .unwrap();

    let emitter = DocumentEmitter::start(Box::new(BrokenIndex), 1);
    let outcome = coordinator.run(&emitter).await;
    emitter.finish(GenesisOutcome::Discard).await.unwrap();

    assert_eq!(outcome.state, RunState::Aborted);
    assert!(matches!(outcome.error, Some(CrawlError::Index(_))));
    assert_eq!(outcome.counts.accepted, 0);
    assert_eq!(
        storage.lock().unwrap().count_seen(SeenStatus::Accepted).unwrap(),
        0
    );
}

#[tokio::test]
async fn test_cancellation_discards_genesis() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("slow").set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &mock_server.uri(), "", "", true);
    let mut provider = CrawlerProvider::new(config).unwrap();
    let context = RuntimeContext::new(CONTEXT, DispatchType::Insert).with_path("/");

    provider.warm_up(&context).unwrap();
    let cancel = provider.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let report = provider.execute(&context).await.unwrap();
    assert_eq!(report.state, RunState::Aborted);
    assert!(report.was_cancelled());
    assert!(report.promotion.is_none());

    provider.cancelled_shutdown(&context).unwrap();
    assert_eq!(provider.state(), ProviderState::Cancelled);

    let index = SqliteIndex::open(&dir.path().join("index"), "docs").unwrap();
    let stats = index.stats().unwrap();
    assert_eq!(stats.stable_generation, None);
    assert_eq!(stats.discarded, 1);
}
