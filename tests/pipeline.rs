//! End-to-end batch runs with a scripted agent and canned search results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use sdscheck::checkpoint::{CheckpointStore, FsCheckpointStore, Stage};
use sdscheck::llm::{AgentError, ChatMessage, ExtractionAgent, StagePrompts};
use sdscheck::output::{ProcessedLog, ResultTable};
use sdscheck::pipeline::{BatchPipeline, BatchSummary, PipelineOptions};
use sdscheck::search::{QueryProvider, SearchError, SearchItem, SearchOptions, SearchResults};
use sdscheck::source::DirectorySource;

type Responder = dyn Fn(&str) -> Result<String, AgentError> + Send + Sync;

/// Agent that answers from a closure and records every conversation.
struct ScriptedAgent {
    respond: Box<Responder>,
    calls: AtomicUsize,
    conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedAgent {
    fn new(respond: impl Fn(&str) -> Result<String, AgentError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            conversations: Mutex::new(Vec::new()),
        })
    }

    /// Answers stage 1 from the document text and stage 2 with a fixed lookup.
    fn well_behaved() -> Arc<Self> {
        Self::new(|task| Ok(default_answer(task)))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionAgent for ScriptedAgent {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.conversations.lock().unwrap().push(messages.to_vec());
        let task = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        (self.respond)(task)
    }
}

fn is_lookup_task(task: &str) -> bool {
    task.contains("Web search results for")
}

fn default_answer(task: &str) -> String {
    if is_lookup_task(task) {
        return r#"{"latest_sds_url": "https://example.com/latest.pdf", "latest_sds_version": "4.0", "latest_sds_date": "2024-01-01"}"#.to_string();
    }
    let name = if task.contains("ALPHA") {
        "Alpha Clean"
    } else if task.contains("BETA") {
        "Beta Guard"
    } else {
        "Unknown"
    };
    format!(
        "```json\n{{\"product_code\": \"\", \"product_name\": \"{}\", \"manufacturer_supplier\": \"ACME\", \"current_sds_version\": \"1.0\", \"current_sds_date\": \"2015-10-27\"}}\n```",
        name
    )
}

/// Provider returning one canned item, or failing every call.
struct CannedSearch {
    fail: bool,
    calls: AtomicUsize,
}

impl CannedSearch {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QueryProvider for CannedSearch {
    fn name(&self) -> &str {
        "canned"
    }

    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<SearchResults, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::Status {
                backend: "canned".to_string(),
                status: 503,
            });
        }
        Ok(SearchResults::Items(vec![SearchItem {
            title: format!("Result for {}", query),
            url: "https://example.com/latest.pdf".to_string(),
            snippet: "Version 4.0".to_string(),
        }]))
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(docs: &[(&str, &[u8])]) -> Self {
        let dir = TempDir::new().unwrap();
        let docs_dir = dir.path().join("pdfs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        for (name, content) in docs {
            std::fs::write(docs_dir.join(name), content).unwrap();
        }
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn checkpoints(&self) -> Arc<FsCheckpointStore> {
        Arc::new(FsCheckpointStore::new(self.path("pdfs-json")).unwrap())
    }

    async fn run(
        &self,
        agent: Arc<ScriptedAgent>,
        search: Arc<CannedSearch>,
        rebuild: bool,
    ) -> BatchSummary {
        let source = Arc::new(DirectorySource::new(
            self.path("pdfs"),
            &["pdf".to_string(), "txt".to_string(), "md".to_string()],
        ));
        let pipeline = BatchPipeline::new(
            source,
            agent,
            search,
            self.checkpoints(),
            StagePrompts::default(),
            PipelineOptions {
                rebuild,
                ..PipelineOptions::default()
            },
        );

        let table = ResultTable::open(self.path("output.csv")).unwrap();
        let mut log = ProcessedLog::open(self.path("processed_file.csv")).unwrap();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        pipeline.run(&table, &mut log, tx).await.unwrap()
    }

    fn table_text(&self) -> String {
        std::fs::read_to_string(self.path("output.csv")).unwrap()
    }

    fn rows(&self) -> Vec<sdscheck::records::ResultRow> {
        ResultTable::open(self.path("output.csv"))
            .unwrap()
            .rows()
            .unwrap()
    }
}

fn sheets() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("a_alpha.txt", b"SECTION 1 ALPHA product sheet".as_slice()),
        ("b_beta.txt", b"SECTION 1 BETA product sheet".as_slice()),
    ]
}

#[tokio::test]
async fn second_run_makes_no_agent_calls() {
    let ws = Workspace::new(&sheets());

    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(agent.calls(), 4);
    assert_eq!(summary.agent_calls, 4);
    let first = ws.table_text();

    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 0);
    assert_eq!(agent.calls(), 0);

    let agent = ScriptedAgent::well_behaved();
    let search = CannedSearch::ok();
    let summary = ws.run(agent.clone(), search.clone(), true).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(agent.calls(), 0);
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ws.table_text(), first);
}

#[tokio::test]
async fn rows_follow_enumeration_order() {
    let ws = Workspace::new(&sheets());
    ws.run(ScriptedAgent::well_behaved(), CannedSearch::ok(), false)
        .await;

    let rows = ws.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].document, "a_alpha.txt");
    assert_eq!(rows[0].product_name, "Alpha Clean");
    assert_eq!(rows[0].latest_sds_version, "4.0");
    assert_eq!(rows[1].document, "b_beta.txt");
    assert_eq!(rows[1].product_name, "Beta Guard");

    let log = std::fs::read_to_string(ws.path("processed_file.csv")).unwrap();
    assert_eq!(log, "document\na_alpha.txt\nb_beta.txt\n");
}

#[tokio::test]
async fn documents_do_not_share_context() {
    let ws = Workspace::new(&sheets());
    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;

    let conversations = agent.conversations.lock().unwrap();
    assert_eq!(conversations.len(), 4);
    for conversation in conversations.iter() {
        let text: String = conversation.iter().map(|m| m.content.as_str()).collect();
        assert!(
            !(text.contains("Alpha") && text.contains("Beta")),
            "conversation mixes documents: {}",
            text
        );
        assert!(!(text.contains("ALPHA") && text.contains("BETA")));
    }

    let rows = ws.rows();
    assert!(!rows[1].product_name.contains("Alpha"));
}

#[tokio::test]
async fn unreadable_document_gets_empty_row() {
    let ws = Workspace::new(&[
        ("a_alpha.txt", b"ALPHA".as_slice()),
        ("broken.pdf", b"%PDF-1.4 garbage".as_slice()),
    ]);
    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.invalid, 1);
    assert_eq!(agent.calls(), 2);

    let rows = ws.rows();
    let broken = rows.iter().find(|r| r.document == "broken.pdf").unwrap();
    assert_eq!(
        *broken,
        sdscheck::records::ResultRow {
            document: "broken.pdf".to_string(),
            ..Default::default()
        }
    );
    assert!(ProcessedLog::open(ws.path("processed_file.csv"))
        .unwrap()
        .contains("broken.pdf"));
}

#[tokio::test]
async fn search_failure_is_persisted_and_not_retried() {
    let ws = Workspace::new(&[("a_alpha.txt", b"ALPHA".as_slice())]);
    let search = CannedSearch::failing();
    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), search.clone(), false).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(agent.calls(), 1);
    let rows = ws.rows();
    assert!(rows[0].latest_sds_url.starts_with("ERROR: "));
    assert!(rows[0].latest_sds_url.contains("503"));
    assert_eq!(rows[0].product_name, "Alpha Clean");
    assert!(ws.checkpoints().exists("a_alpha.txt", Stage::Verification));

    let agent = ScriptedAgent::well_behaved();
    let retry_search = CannedSearch::ok();
    ws.run(agent.clone(), retry_search.clone(), true).await;
    assert_eq!(agent.calls(), 0);
    assert_eq!(retry_search.calls.load(Ordering::SeqCst), 0);
    assert!(ws.rows()[0].latest_sds_url.starts_with("ERROR: "));
}

#[tokio::test]
async fn agent_failure_in_lookup_is_persisted() {
    let ws = Workspace::new(&[("a_alpha.txt", b"ALPHA".as_slice())]);
    let agent = ScriptedAgent::new(|task| {
        if is_lookup_task(task) {
            Err(AgentError::Api("rate limited\nretry later".to_string()))
        } else {
            Ok(default_answer(task))
        }
    });
    ws.run(agent.clone(), CannedSearch::ok(), false).await;

    let rows = ws.rows();
    assert_eq!(rows[0].latest_sds_url, "ERROR: API error: rate limited\\nretry later");
    assert_eq!(rows[0].latest_sds_version, "");

    let stored = ws
        .checkpoints()
        .read("a_alpha.txt", Stage::Verification)
        .unwrap()
        .unwrap();
    assert!(stored.contains("\"stage\": 2"));
}

#[tokio::test]
async fn unparseable_extraction_is_retried_next_run() {
    let ws = Workspace::new(&sheets());
    let agent = ScriptedAgent::new(|task| {
        if task.contains("ALPHA") && !is_lookup_task(task) {
            Ok("Sorry, I could not read this document.".to_string())
        } else {
            Ok(default_answer(task))
        }
    });
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retry_pending, 1);
    assert_eq!(agent.calls(), 3);
    let rows = ws.rows();
    assert!(rows[0].product_name.starts_with("ERROR: "));
    assert_eq!(rows[0].latest_sds_url, "ERROR: stage 1 failed");
    assert!(ws.checkpoints().exists("a_alpha.txt", Stage::Extraction));
    assert!(!ws.checkpoints().exists("a_alpha.txt", Stage::Verification));
    let logged = ProcessedLog::open(ws.path("processed_file.csv")).unwrap();
    assert!(!logged.contains("a_alpha.txt"));
    assert!(logged.contains("b_beta.txt"));

    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(agent.calls(), 2);

    let rows = ws.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].document, "a_alpha.txt");
    assert_eq!(rows[0].product_name, "Alpha Clean");
    assert_eq!(rows[0].latest_sds_version, "4.0");
    assert_eq!(rows[1].product_name, "Beta Guard");
    assert!(ProcessedLog::open(ws.path("processed_file.csv"))
        .unwrap()
        .contains("a_alpha.txt"));

    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn agent_failure_in_extraction_is_retried_next_run() {
    let ws = Workspace::new(&[("a_alpha.txt", b"ALPHA".as_slice())]);
    let agent = ScriptedAgent::new(|_| Err(AgentError::Connection("refused".to_string())));
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(summary.retry_pending, 1);
    assert!(!ws.checkpoints().exists("a_alpha.txt", Stage::Extraction));

    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(agent.calls(), 2);
    let rows = ws.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_name, "Alpha Clean");
}

#[tokio::test]
async fn same_stem_documents_keep_their_own_checkpoints() {
    let ws = Workspace::new(&[
        ("sheet.md", b"SECTION 1 BETA product sheet".as_slice()),
        ("sheet.txt", b"SECTION 1 ALPHA product sheet".as_slice()),
    ]);
    let agent = ScriptedAgent::well_behaved();
    let summary = ws.run(agent.clone(), CannedSearch::ok(), false).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(agent.calls(), 4);
    let rows = ws.rows();
    assert_eq!(rows[0].document, "sheet.md");
    assert_eq!(rows[0].product_name, "Beta Guard");
    assert_eq!(rows[1].document, "sheet.txt");
    assert_eq!(rows[1].product_name, "Alpha Clean");

    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), true).await;
    assert_eq!(agent.calls(), 0);
    assert_eq!(ws.rows()[1].product_name, "Alpha Clean");
}

#[tokio::test]
async fn stem_named_checkpoint_is_ignored_when_stems_collide() {
    let ws = Workspace::new(&[
        ("sheet.md", b"SECTION 1 BETA product sheet".as_slice()),
        ("sheet.txt", b"SECTION 1 ALPHA product sheet".as_slice()),
    ]);
    std::fs::create_dir_all(ws.path("pdfs-json")).unwrap();
    std::fs::write(
        ws.path("pdfs-json").join("sheet_1.json"),
        r#"{"product_code": "", "product_name": "Stale", "manufacturer_supplier": "", "product_item_number": "", "ufi_code": "", "current_sds_version": "", "current_sds_date": "", "language_country": "", "intended_use": ""}"#,
    )
    .unwrap();

    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(agent.calls(), 4);
    assert!(ws.rows().iter().all(|r| r.product_name != "Stale"));
}

#[tokio::test]
async fn partial_lookup_checkpoint_is_recomputed() {
    let ws = Workspace::new(&[("a_alpha.txt", b"ALPHA".as_slice())]);
    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;

    std::fs::remove_file(ws.path("pdfs-json").join("a_alpha.txt_2.json")).unwrap();
    std::fs::write(
        ws.path("pdfs-json").join("a_alpha_2.json"),
        r#"{"latest_sds_url": "x"}"#,
    )
    .unwrap();

    let agent = ScriptedAgent::well_behaved();
    let search = CannedSearch::ok();
    ws.run(agent.clone(), search.clone(), true).await;

    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.calls(), 1);
    let rows = ws.rows();
    assert_eq!(rows[0].latest_sds_url, "https://example.com/latest.pdf");
    assert_eq!(rows[0].latest_sds_version, "4.0");

    let stored = ws
        .checkpoints()
        .read("a_alpha.txt", Stage::Verification)
        .unwrap()
        .unwrap();
    assert!(stored.contains("\"latest_sds_version\": \"4.0\""));
}

#[tokio::test]
async fn legacy_checkpoints_are_reused() {
    let ws = Workspace::new(&[("a_alpha.txt", b"ALPHA".as_slice())]);
    let dir = ws.path("pdfs-json");
    std::fs::create_dir_all(&dir).unwrap();
    let stage1 = serde_json::to_string(
        r#"{"product_code": "X1", "product_name": "Legacy", "manufacturer_supplier": "ACME", "product_item_number": "", "ufi_code": "", "current_sds_version": "2", "current_sds_date": "2019", "language_country": "", "intended_use": ""}"#,
    )
    .unwrap();
    std::fs::write(dir.join("a_alpha_1.json"), stage1).unwrap();
    std::fs::write(
        dir.join("a_alpha_2.json"),
        r#"{"latest_sds_url": "https://x/legacy.pdf", "latest_sds_version": "3", "latest_sds_date": "2021"}"#,
    )
    .unwrap();

    let agent = ScriptedAgent::well_behaved();
    ws.run(agent.clone(), CannedSearch::ok(), false).await;
    assert_eq!(agent.calls(), 0);

    let rows = ws.rows();
    assert_eq!(rows[0].product_name, "Legacy");
    assert_eq!(rows[0].latest_sds_url, "https://x/legacy.pdf");
    assert!(!dir.join("a_alpha.txt_1.json").exists());
}
