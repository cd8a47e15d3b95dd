//! End-to-end workflow scenarios against mock providers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use orchestrator::config::Config;
use orchestrator::db::DbPool;
use orchestrator::error::{FetchError, ProviderError};
use orchestrator::models::{ScoredChunk, SearchHit};
use orchestrator::providers::{
    ArticleFetch, ChunkUpsert, LanguageModel, VectorStore, WebSearch,
};
use orchestrator::service::App;

// One connection: a pooled `sqlite::memory:` database is per-connection.
async fn test_pool() -> DbPool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// Dispatches on prompt shape; critique confidences pop off a script.
struct MockLlm {
    critique_confidences: Mutex<Vec<f64>>,
    generate_calls: AtomicUsize,
}

impl MockLlm {
    fn new(critique_confidences: Vec<f64>) -> Self {
        Self {
            critique_confidences: Mutex::new(critique_confidences),
            generate_calls: AtomicUsize::new(0),
        }
    }

    fn next_confidence(&self) -> f64 {
        let mut script = self.critique_confidences.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().copied().unwrap_or(0.5)
        }
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        if prompt.starts_with("Does answering") {
            return Ok("no".to_string());
        }
        if prompt.starts_with("You are an evaluator") {
            let conf = self.next_confidence();
            return Ok(format!(
                "{{\"ok\": {}, \"confidence\": {conf}, \"notes\": \"scripted\"}}",
                conf >= 0.6
            ));
        }
        if prompt.starts_with("Summarize this article") {
            let url = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Article URL: "))
                .unwrap_or("unknown");
            return Ok(format!("Key points from {url}."));
        }
        if prompt.contains("Synthesize the following article summaries") {
            return Ok("Overall synthesis across the fetched articles.".to_string());
        }

        // Answer prompt: cite the first bracketed locator from the context.
        let cited = prompt
            .split('[')
            .nth(1)
            .and_then(|rest| rest.split(']').next())
            .unwrap_or("no-evidence");
        Ok(format!("Grounded answer citing [{cited}]."))
    }
}

struct MockSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
    last_max: AtomicUsize,
}

impl MockSearch {
    fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
            last_max: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_max.store(max_results, Ordering::SeqCst);
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

struct MockFetcher {
    bodies: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn new(bodies: HashMap<String, String>) -> Self {
        Self {
            bodies,
            calls: AtomicUsize::new(0),
        }
    }

    fn serving(urls: &[&str]) -> Self {
        Self::new(
            urls.iter()
                .map(|u| (u.to_string(), format!("Article body from {u}. ").repeat(30)))
                .collect(),
        )
    }
}

#[async_trait]
impl ArticleFetch for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Http {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

struct MockVector {
    chunks: Vec<ScoredChunk>,
    upserted: Mutex<Vec<ChunkUpsert>>,
}

impl MockVector {
    fn new(chunks: Vec<ScoredChunk>) -> Self {
        Self {
            chunks,
            upserted: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl VectorStore for MockVector {
    async fn search(
        &self,
        _query: &str,
        _session_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, ProviderError> {
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }

    async fn upsert(&self, chunks: &[ChunkUpsert]) -> Result<(), ProviderError> {
        self.upserted.lock().unwrap().extend(chunks.iter().cloned());
        Ok(())
    }
}

fn hit(url: &str) -> SearchHit {
    SearchHit {
        title: format!("Title for {url}"),
        url: url.to_string(),
        content: "snippet".to_string(),
    }
}

fn web_urls(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("https://r{i}.example")).collect()
}

struct Fixture {
    app: App,
    llm: Arc<MockLlm>,
    search: Arc<MockSearch>,
    fetcher: Arc<MockFetcher>,
    vector: Arc<MockVector>,
}

async fn fixture(
    critique_confidences: Vec<f64>,
    hits: Vec<SearchHit>,
    fetcher: MockFetcher,
    chunks: Vec<ScoredChunk>,
) -> Fixture {
    let llm = Arc::new(MockLlm::new(critique_confidences));
    let search = Arc::new(MockSearch::new(hits));
    let fetcher = Arc::new(fetcher);
    let vector = Arc::new(MockVector::new(chunks));

    let app = App::with_providers(
        Config::default(),
        test_pool().await,
        llm.clone(),
        vector.clone(),
        search.clone(),
        fetcher.clone(),
    );

    Fixture {
        app,
        llm,
        search,
        fetcher,
        vector,
    }
}

#[tokio::test]
async fn chat_with_time_keyword_routes_web_and_cites_a_result() {
    let urls = web_urls(4);
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
    let fx = fixture(
        vec![0.9],
        urls.iter().map(|u| hit(u)).collect(),
        MockFetcher::serving(&url_refs),
        vec![],
    )
    .await;

    let resp = fx
        .app
        .run_chat(None, "What's the weather in Paris today?")
        .await
        .unwrap();

    // Confident turn: the one web search, no quick pass.
    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 1);
    assert!(resp.confidence >= 0.6, "confidence was {}", resp.confidence);
    assert!((resp.confidence - 0.8).abs() < 0.05);

    // All four results became sources, and the answer cites one of them.
    assert_eq!(resp.sources.len(), 4);
    assert!(resp
        .sources
        .iter()
        .all(|s| urls.contains(&s.locator)));
    assert!(urls.iter().any(|u| resp.answer.contains(u.as_str())));
}

#[tokio::test]
async fn feedback_loop_fires_at_most_once_however_low_confidence_stays() {
    let urls = web_urls(4);
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
    let fx = fixture(
        vec![0.1], // every critique reports low confidence
        urls.iter().map(|u| hit(u)).collect(),
        MockFetcher::serving(&url_refs),
        vec![],
    )
    .await;

    let resp = fx
        .app
        .run_chat(None, "latest results on the topic?")
        .await
        .unwrap();

    // One full search plus exactly one quick pass, then the loop stops.
    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fx.search.last_max.load(Ordering::SeqCst), 4);
    assert!(resp.confidence < 0.6);
}

#[tokio::test]
async fn sources_are_a_subset_of_retrieved_locators() {
    let urls = web_urls(3);
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
    let fx = fixture(
        vec![0.9],
        urls.iter().map(|u| hit(u)).collect(),
        MockFetcher::serving(&url_refs),
        vec![],
    )
    .await;

    let resp = fx.app.run_chat(None, "today's news").await.unwrap();
    for source in &resp.sources {
        assert!(urls.contains(&source.locator), "fabricated source {}", source.locator);
    }
}

#[tokio::test]
async fn research_with_one_failing_url_summarizes_the_other() {
    // u2 is not served by the fetcher, so its fetch fails.
    let fx = fixture(
        vec![0.1], // low confidence must NOT trigger a retry in research mode
        vec![],
        MockFetcher::serving(&["https://u1.example"]),
        vec![],
    )
    .await;

    let resp = fx
        .app
        .run_research(
            None,
            "quantum computing",
            vec![
                "https://u1.example".to_string(),
                "https://u2.example".to_string(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(fx.fetcher.calls.load(Ordering::SeqCst), 2);
    // one article summary, one synthesis, one answer, one critique
    assert_eq!(fx.llm.generate_calls.load(Ordering::SeqCst), 4);
    assert_eq!(resp.per_article.len(), 1);
    assert_eq!(resp.per_article[0].url, "https://u1.example");
    assert!(!resp.overall_summary.is_empty());
    assert!(!resp.overall_summary.contains("u2.example"));

    // Research never invokes the feedback loop.
    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn research_indexes_chunks_and_enables_local_chat() {
    let chunks: Vec<ScoredChunk> = (0..3)
        .map(|i| ScoredChunk {
            content: format!("indexed chunk {i}"),
            score: 0.9,
            locator: format!("chunk-{i}"),
        })
        .collect();
    let fx = fixture(
        vec![0.9],
        vec![],
        MockFetcher::serving(&["https://paper.example"]),
        chunks,
    )
    .await;

    let research = fx
        .app
        .run_research(None, "a topic", vec!["https://paper.example".to_string()])
        .await
        .unwrap();
    assert!(!fx.vector.upserted.lock().unwrap().is_empty());

    // Same session, no time keyword: the planner stays local and the answer
    // cites indexed chunks.
    let chat = fx
        .app
        .run_chat(Some(research.session_id.clone()), "summarize the paper")
        .await
        .unwrap();

    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 0);
    assert!(chat.sources.iter().all(|s| s.locator.starts_with("chunk-")));
    assert!(chat.answer.contains("chunk-0"));
}

#[tokio::test]
async fn insufficient_local_matches_fall_back_to_web_keeping_survivors() {
    // Two indexed chunks against a minimum of three: the local route must
    // fall back to web search and keep the surviving chunks as evidence.
    let urls = web_urls(2);
    let chunks: Vec<ScoredChunk> = (0..2)
        .map(|i| ScoredChunk {
            content: format!("indexed chunk {i}"),
            score: 0.9,
            locator: format!("chunk-{i}"),
        })
        .collect();
    let fx = fixture(
        vec![0.9],
        urls.iter().map(|u| hit(u)).collect(),
        MockFetcher::serving(&["https://paper.example", "https://r1.example", "https://r2.example"]),
        chunks,
    )
    .await;

    let research = fx
        .app
        .run_research(None, "a topic", vec!["https://paper.example".to_string()])
        .await
        .unwrap();
    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 0);

    let chat = fx
        .app
        .run_chat(Some(research.session_id.clone()), "summarize the paper")
        .await
        .unwrap();

    // The fallback search fired exactly once.
    assert_eq!(fx.search.calls.load(Ordering::SeqCst), 1);

    // Both survivors and the web results reached the evaluator.
    let locators: Vec<&str> = chat.sources.iter().map(|s| s.locator.as_str()).collect();
    assert!(locators.contains(&"chunk-0"));
    assert!(locators.contains(&"chunk-1"));
    assert!(urls.iter().any(|u| locators.contains(&u.as_str())));

    // Survivors keep precedence: the answer cites the first local chunk.
    assert!(chat.answer.contains("chunk-0"));
}

#[tokio::test]
async fn saved_session_survives_a_restart() {
    let urls = web_urls(2);
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();

    let pool = test_pool().await;
    let llm = Arc::new(MockLlm::new(vec![0.9]));
    let app = App::with_providers(
        Config::default(),
        pool.clone(),
        llm.clone(),
        Arc::new(MockVector::new(vec![])),
        Arc::new(MockSearch::new(urls.iter().map(|u| hit(u)).collect())),
        Arc::new(MockFetcher::serving(&url_refs)),
    );

    let resp = app.run_chat(None, "today's headlines").await.unwrap();
    let sid = resp.session_id.clone();
    app.save_session(&sid).await.unwrap();

    // New App over the same pool simulates a restart.
    let app2 = App::with_providers(
        Config::default(),
        pool,
        llm,
        Arc::new(MockVector::new(vec![])),
        Arc::new(MockSearch::new(vec![])),
        Arc::new(MockFetcher::new(HashMap::new())),
    );
    let loaded = app2.load_session(&sid).await.unwrap();
    assert_eq!(loaded.messages.len(), 2);

    assert!(matches!(
        app2.load_session("missing").await,
        Err(orchestrator::error::WorkflowError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn end_session_persists_and_evicts() {
    let urls = web_urls(2);
    let url_refs: Vec<&str> = urls.iter().map(|s| s.as_str()).collect();
    let fx = fixture(
        vec![0.9],
        urls.iter().map(|u| hit(u)).collect(),
        MockFetcher::serving(&url_refs),
        vec![],
    )
    .await;

    let resp = fx.app.run_chat(None, "breaking story?").await.unwrap();
    let sid = resp.session_id.clone();

    let ended = fx.app.end_session(&sid).await.unwrap();
    assert_eq!(ended.message, "Chat saved");

    // Ending again reports the persisted copy instead of failing.
    let again = fx.app.end_session(&sid).await.unwrap();
    assert_eq!(again.message, "Chat already saved");

    let chats = fx.app.list_chats(10, 0).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].session_id, sid);
}
