//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with a scripted renderer against a
//! SQLite file in a temporary directory. The last test renders pages served
//! by wiremock in a real headless Chrome.

use quote_harvest::config::{BrowserConfig, Config, CrawlerConfig, OutputConfig, SourceConfig};
use quote_harvest::crawler::{
    run_crawl, CancelFlag, Coordinator, CrawlOutcome, PageRenderer, RenderedPage, StopReason,
};
use quote_harvest::storage::{open_store, QuoteStore, RunStatus, SqliteStore};
use quote_harvest::HarvestError;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SOURCE_URL: &str = "http://quotes.test/js/";

/// Creates a test configuration writing to `db_path`
fn create_test_config(db_path: &Path, max_pages: u32) -> Config {
    Config {
        source: SourceConfig::with_url(SOURCE_URL),
        crawler: CrawlerConfig {
            max_pages,
            page_timeout_ms: 2_000,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            empty_page_grace_ms: 500,
        },
        browser: BrowserConfig::default(),
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            busy_timeout_ms: 1_000,
        },
    }
}

fn open_test_store(db_path: &Path) -> SqliteStore {
    open_store(db_path, Duration::from_millis(1_000)).expect("Failed to open test store")
}

fn test_coordinator(db_path: &Path, max_pages: u32) -> Coordinator<SqliteStore> {
    Coordinator::new(create_test_config(db_path, max_pages), "hash", open_test_store(db_path))
        .expect("Failed to build coordinator")
}

fn quote_block(text: &str, author: &str, tags: &[&str]) -> String {
    let tags: String = tags
        .iter()
        .map(|t| format!("<a class=\"tag\" href=\"/tag/{t}/\">{t}</a>"))
        .collect();
    format!(
        "<div class=\"quote\"><span class=\"text\">{text}</span>\
         <span>by <small class=\"author\">{author}</small></span>\
         <div class=\"tags\">Tags: {tags}</div></div>"
    )
}

fn page(blocks: &[String]) -> String {
    format!("<html><body><div class=\"container\">{}</div></body></html>", blocks.concat())
}

/// Page 1 of the two-page scenario: three good blocks and one without an author
fn first_page() -> String {
    page(&[
        quote_block(
            "The world as we have created it is a process of our thinking.",
            "Albert Einstein",
            &["change", "thinking"],
        ),
        quote_block(
            "It is our choices that show what we truly are.",
            "J.K. Rowling",
            &["abilities", "choices"],
        ),
        "<div class=\"quote\"><span class=\"text\">An orphaned quote.</span></div>".to_string(),
        quote_block("A day without sunshine is like, you know, night.", "Steve Martin", &[]),
    ])
}

fn second_page() -> String {
    page(&[quote_block(
        "Try not to become a man of success. Rather become a man of value.",
        "Albert Einstein",
        &["adulthood", "success", "value"],
    )])
}

/// Serves a fixed list of pages; `advance` succeeds while pages remain
struct ScriptedRenderer {
    pages: Vec<String>,
    current: usize,
    endless: bool,
    fail_open: bool,
    fail_advance_from: Option<usize>,
    fail_render_on: Option<usize>,
    cancel_on_page: Option<(usize, CancelFlag)>,
    documents: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

impl ScriptedRenderer {
    fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            current: 0,
            endless: false,
            fail_open: false,
            fail_advance_from: None,
            fail_render_on: None,
            cancel_on_page: None,
            documents: Arc::new(AtomicU32::new(0)),
            closes: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Always offers a next page, cycling through `pages`
    fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Advancing away from page `page_index` (zero-based) times out
    fn failing_advance_from(mut self, page_index: usize) -> Self {
        self.fail_advance_from = Some(page_index);
        self
    }

    /// Page `page_index` (zero-based) never finishes rendering
    fn failing_render_on(mut self, page_index: usize) -> Self {
        self.fail_render_on = Some(page_index);
        self
    }

    /// Sets `cancel` while page `page_index` (zero-based) is being read
    fn cancelling_on(mut self, page_index: usize, cancel: CancelFlag) -> Self {
        self.cancel_on_page = Some((page_index, cancel));
        self
    }

    fn url(&self) -> String {
        format!("{}page/{}/", SOURCE_URL, self.current + 1)
    }
}

impl PageRenderer for ScriptedRenderer {
    async fn open(&mut self, url: &str) -> Result<(), HarvestError> {
        if self.fail_open {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                message: "page did not load within 2s".to_string(),
            });
        }
        Ok(())
    }

    async fn current_document(&mut self) -> Result<RenderedPage, HarvestError> {
        self.documents.fetch_add(1, Ordering::SeqCst);
        if self.fail_render_on == Some(self.current) {
            return Err(HarvestError::Navigation {
                url: self.url(),
                message: "quotes did not render within 2s".to_string(),
            });
        }
        if let Some((index, cancel)) = &self.cancel_on_page {
            if *index == self.current {
                cancel.cancel();
            }
        }

        let html = self.pages[self.current % self.pages.len()].clone();
        Ok(RenderedPage {
            url: self.url(),
            html,
        })
    }

    async fn advance(&mut self) -> Result<bool, HarvestError> {
        if self.fail_advance_from == Some(self.current) {
            return Err(HarvestError::Navigation {
                url: self.url(),
                message: "next page did not load within 2s".to_string(),
            });
        }
        if self.endless || self.current + 1 < self.pages.len() {
            self.current += 1;
            return Ok(true);
        }
        Ok(false)
    }

    async fn close(&mut self) -> Result<(), HarvestError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_two_page_crawl_persists_every_valid_quote() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let renderer = ScriptedRenderer::new(vec![first_page(), second_page()]);
    let closes = renderer.closes.clone();

    let mut coordinator = test_coordinator(&db_path, 5);
    let report = coordinator.run(renderer).await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.records_extracted, 4);
    assert_eq!(report.records_persisted, 4);
    assert_eq!(report.blocks_skipped, 1);
    assert_eq!(report.outcome, CrawlOutcome::Finished(StopReason::NoNextPage));
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let ids: Vec<i64> = report.records.iter().map(|r| r.id.unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids not increasing: {:?}", ids);

    // Page order first, then block order within the page
    let authors: Vec<&str> = report.records.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(
        authors,
        vec!["Albert Einstein", "J.K. Rowling", "Steve Martin", "Albert Einstein"]
    );

    let stored = open_test_store(&db_path).list_quotes().unwrap();
    assert_eq!(stored, report.records);
    assert_eq!(stored[0].tags, vec!["change", "thinking"]);
    assert!(stored[2].tags.is_empty());

    let run = coordinator.store().get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.pages_visited, 2);
    assert_eq!(run.records_persisted, 4);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_rerun_duplicates_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let mut first_ids = Vec::new();
    let mut all_ids = Vec::new();
    for run in 0..2 {
        let mut coordinator = test_coordinator(&db_path, 5);
        let report = coordinator
            .run(ScriptedRenderer::new(vec![first_page(), second_page()]))
            .await
            .unwrap();

        let ids: Vec<i64> = report.records.iter().map(|r| r.id.unwrap()).collect();
        if run == 0 {
            first_ids = ids.clone();
        }
        all_ids.extend(ids);
    }

    let store = open_test_store(&db_path);
    assert_eq!(store.count_quotes().unwrap(), 2 * first_ids.len() as u64);

    let mut distinct = all_ids.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), all_ids.len());
    assert!(all_ids[first_ids.len()] > *first_ids.last().unwrap());

    let runs = store.latest_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn test_page_bound_stops_an_endless_source() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let renderer = ScriptedRenderer::new(vec![second_page()]).endless();
    let documents = renderer.documents.clone();

    let mut coordinator = test_coordinator(&db_path, 3);
    let report = coordinator.run(renderer).await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(documents.load(Ordering::SeqCst), 3);
    assert_eq!(report.records_persisted, 3);
    assert_eq!(report.outcome, CrawlOutcome::Finished(StopReason::PageLimit));
}

#[tokio::test]
async fn test_missing_next_control_stops_on_first_page() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let mut coordinator = test_coordinator(&db_path, 5);
    let report = coordinator
        .run(ScriptedRenderer::new(vec![first_page()]))
        .await
        .unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.records_persisted, 3);
    assert_eq!(report.outcome, CrawlOutcome::Finished(StopReason::NoNextPage));
}

#[tokio::test]
async fn test_empty_page_does_not_end_the_crawl() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let mut coordinator = test_coordinator(&db_path, 5);
    let report = coordinator
        .run(ScriptedRenderer::new(vec![page(&[]), second_page()]))
        .await
        .unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.records_persisted, 1);
}

#[tokio::test]
async fn test_navigation_failure_after_first_page_keeps_earlier_quotes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let renderer = ScriptedRenderer::new(vec![first_page(), second_page()]).failing_advance_from(0);
    let closes = renderer.closes.clone();

    let mut coordinator = test_coordinator(&db_path, 5);
    let report = coordinator.run(renderer).await.unwrap();

    assert!(matches!(report.outcome, CrawlOutcome::Partial { .. }));
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.records_persisted, 3);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    assert_eq!(open_test_store(&db_path).count_quotes().unwrap(), 3);

    let run = coordinator.store().get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Partial);
    assert!(run.error_message.unwrap().contains("did not load"));
}

#[tokio::test]
async fn test_open_failure_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let renderer = ScriptedRenderer::new(vec![first_page()]).failing_open();
    let closes = renderer.closes.clone();
    let documents = renderer.documents.clone();

    let mut coordinator = test_coordinator(&db_path, 5);
    let error = coordinator.run(renderer).await.unwrap_err();

    assert!(matches!(error, HarvestError::Navigation { .. }));
    assert_eq!(error.stage(), "navigation");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(documents.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.store().count_quotes().unwrap(), 0);

    let runs = coordinator.store().latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_render_failure_on_first_page_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let renderer = ScriptedRenderer::new(vec![first_page(), second_page()]).failing_render_on(0);
    let closes = renderer.closes.clone();

    let mut coordinator = test_coordinator(&db_path, 5);
    let error = coordinator.run(renderer).await.unwrap_err();

    match &error {
        HarvestError::Navigation { message, .. } => assert!(message.contains("did not render")),
        other => panic!("expected a navigation error, got {:?}", other),
    }
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(open_test_store(&db_path).count_quotes().unwrap(), 0);

    let runs = coordinator.store().latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].records_persisted, 0);
    assert!(runs[0].error_message.as_deref().unwrap().contains("did not render"));
}

#[tokio::test]
async fn test_failure_after_only_unparseable_pages_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    // Page 1 is blank, so no page is fully extracted before page 2 fails
    let renderer =
        ScriptedRenderer::new(vec!["   ".to_string(), second_page()]).failing_render_on(1);
    let closes = renderer.closes.clone();
    let documents = renderer.documents.clone();

    let mut coordinator = test_coordinator(&db_path, 5);
    let error = coordinator.run(renderer).await.unwrap_err();

    assert!(matches!(error, HarvestError::Navigation { .. }));
    assert_eq!(documents.load(Ordering::SeqCst), 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.store().count_quotes().unwrap(), 0);

    let runs = coordinator.store().latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].pages_visited, 1);
}

#[tokio::test]
async fn test_cancellation_stops_between_pages() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");

    let cancel = CancelFlag::new();
    let renderer = ScriptedRenderer::new(vec![first_page(), second_page()])
        .endless()
        .cancelling_on(0, cancel.clone());
    let documents = renderer.documents.clone();

    let mut coordinator = test_coordinator(&db_path, 5).with_cancel_flag(cancel);
    let report = coordinator.run(renderer).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Finished(StopReason::Cancelled));
    assert_eq!(documents.load(Ordering::SeqCst), 1);
    assert_eq!(report.records_persisted, 3);

    let run = coordinator.store().get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_rejected_batch_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");
    let store = open_test_store(&db_path);

    // A second connection makes the store refuse one particular author
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_martin BEFORE INSERT ON quotes
         WHEN NEW.author = 'Steve Martin'
         BEGIN SELECT RAISE(ABORT, 'author rejected'); END;",
    )
    .unwrap();
    drop(conn);

    let renderer = ScriptedRenderer::new(vec![first_page(), second_page()]);
    let closes = renderer.closes.clone();

    let mut coordinator = Coordinator::new(create_test_config(&db_path, 5), "hash", store).unwrap();
    let error = coordinator.run(renderer).await.unwrap_err();

    match &error {
        HarvestError::Persistence {
            attempted,
            persisted,
            ..
        } => {
            assert_eq!(*attempted, 4);
            assert_eq!(*persisted, 0);
        }
        other => panic!("expected a persistence error, got {:?}", other),
    }
    assert_eq!(error.stage(), "persistence");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.store().count_quotes().unwrap(), 0);

    let runs = coordinator.store().latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].records_extracted, 4);
    assert_eq!(runs[0].records_persisted, 0);
}

/// A listing whose quotes only exist after its script runs
///
/// Each quote is `(text, author, comma-separated tags)`. The blocks appear
/// `render_delay_ms` after the document loads.
fn scripted_page(
    quotes: &[(&str, &str, &str)],
    next: Option<&str>,
    render_delay_ms: u64,
) -> String {
    let data: Vec<String> = quotes
        .iter()
        .map(|(text, author, tags)| {
            let tags: Vec<String> = tags
                .split(',')
                .filter(|t| !t.is_empty())
                .map(|t| format!("\"{}\"", t))
                .collect();
            format!(
                "{{\"text\": \"{}\", \"author\": \"{}\", \"tags\": [{}]}}",
                text,
                author,
                tags.join(",")
            )
        })
        .collect();

    let pager = next
        .map(|href| {
            format!(r#"<ul class="pager"><li class="next"><a href="{href}">Next</a></li></ul>"#)
        })
        .unwrap_or_default();

    format!(
        r#"<html><body><div class="container" id="quotes"></div>{pager}
<script>
var data = [{data}];
setTimeout(function () {{
  var root = document.getElementById("quotes");
  data.forEach(function (q) {{
    var block = document.createElement("div");
    block.className = "quote";
    var tags = q.tags.map(function (t) {{ return '<a class="tag">' + t + '</a>'; }}).join("");
    block.innerHTML = '<span class="text">' + q.text + '</span>' +
      '<span>by <small class="author">' + q.author + '</small></span>' +
      '<div class="tags">' + tags + '</div>';
    root.appendChild(block);
  }});
}}, {render_delay_ms});
</script></body></html>"#,
        data = data.join(",")
    )
}

#[tokio::test]
#[ignore = "requires a local Chrome installation"]
async fn test_full_crawl_with_headless_chrome() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/js/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            scripted_page(
                &[
                    ("Quote one", "Albert Einstein", "change,deep-thoughts"),
                    ("Quote two", "Jane Austen", ""),
                ],
                Some("/js/page/2/"),
                50,
            ),
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    // The last page has no next control, so it reads as ready before its quotes exist
    Mock::given(method("GET"))
        .and(path("/js/page/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            scripted_page(&[("Quote three", "Marilyn Monroe", "love")], None, 300),
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("quotes.db");
    let mut config = create_test_config(&db_path, 5);
    config.source.url = format!("{}/js/", mock_server.uri());
    config.crawler.page_timeout_ms = 15_000;
    config.crawler.settle_delay_ms = 0;
    config.crawler.empty_page_grace_ms = 2_000;

    let report = run_crawl(config, "hash", CancelFlag::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.records_persisted, 3);
    assert_eq!(report.outcome, CrawlOutcome::Finished(StopReason::NoNextPage));

    let stored = open_test_store(&db_path).list_quotes().unwrap();
    let texts: Vec<&str> = stored.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["Quote one", "Quote two", "Quote three"]);
    assert_eq!(stored[0].tags, vec!["change", "deep-thoughts"]);
}
