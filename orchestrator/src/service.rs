//! Application service: wires providers into the workflow engine and
//! exposes the session-level entry points used by the HTTP layer.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracing::warn;

use crate::chunking::{chunk_id, split_text, stable_doc_id, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::WorkflowError;
use crate::models::{
    ChatListEntry, ChatResponse, ChatSession, ChunkRecord, LoadChatResponse, Message,
    ResearchResponse, SaveChatResponse, WorkflowMode,
};
use crate::persistence::PersistenceGateway;
use crate::providers::{
    fetch::HttpArticleFetcher, llm::OpenAiClient, search::SearchRouter, vector::HttpVectorStore,
    ArticleFetch, ChunkUpsert, LanguageModel, VectorStore, WebSearch,
};
use crate::session::{Session, SessionHandle, SessionStore};
use crate::workflow::{
    Evaluator, FeedbackController, Planner, Retriever, Summarizer, WorkflowEngine, WorkflowState,
};

pub struct App {
    config: Config,
    sessions: SessionStore,
    persistence: PersistenceGateway,
    engine: WorkflowEngine,
    vector: Arc<dyn VectorStore>,
}

impl App {
    /// Build against the real providers.
    pub fn new(config: Config, pool: DbPool) -> anyhow::Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is required"))?;

        let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::new(
            &config.llm_api_base,
            &api_key,
            &config.llm_model,
        ));
        let vector: Arc<dyn VectorStore> =
            Arc::new(HttpVectorStore::new(&config.vector_db_service_url));
        let search: Arc<dyn WebSearch> = Arc::new(SearchRouter::from_config(&config));
        let fetcher: Arc<dyn ArticleFetch> =
            Arc::new(HttpArticleFetcher::new(config.min_article_chars));

        Ok(Self::with_providers(config, pool, llm, vector, search, fetcher))
    }

    /// Build with explicit providers (tests swap in mocks here).
    pub fn with_providers(
        config: Config,
        pool: DbPool,
        llm: Arc<dyn LanguageModel>,
        vector: Arc<dyn VectorStore>,
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn ArticleFetch>,
    ) -> Self {
        let planner = Planner::new(config.time_sensitive_keywords.clone(), Some(llm.clone()));
        let retriever = Retriever::new(
            vector.clone(),
            search,
            fetcher,
            config.retrieval_k,
            config.retrieval_sim_threshold,
            config.retrieval_min_docs,
            config.max_search_results,
            config.chat_quick_search_results,
        );
        let summarizer = Summarizer::new(llm.clone());
        let evaluator = Evaluator::new(llm);
        let feedback =
            FeedbackController::new(config.confidence_threshold, config.max_feedback_retries);
        let engine = WorkflowEngine::new(planner, retriever, summarizer, evaluator, feedback);

        Self {
            config,
            sessions: SessionStore::new(),
            persistence: PersistenceGateway::new(pool),
            engine,
            vector,
        }
    }

    /// Open a fresh session and return its id.
    pub async fn start_chat(&self) -> String {
        self.sessions.create(None).await
    }

    /// One chat turn: plan, retrieve, evaluate, maybe retry, answer.
    ///
    /// The session lock is held for the whole turn, so turns on the same
    /// session serialize while other sessions run in parallel.
    pub async fn run_chat(
        &self,
        session_id: Option<String>,
        message: &str,
    ) -> Result<ChatResponse, WorkflowError> {
        let (sid, handle) = self.ensure_session(session_id).await?;
        let mut session = handle.lock().await;

        let history = session.recent_history(self.config.max_history_messages);
        let has_local_docs = session.has_local_docs();
        session.messages.push(Message::user(message));

        let mut state =
            WorkflowState::new(sid.clone(), message, WorkflowMode::Chat, history, has_local_docs);
        self.engine.run(&mut state).await?;

        let answer = state
            .answer
            .unwrap_or_else(|| "I could not generate an answer.".to_string());
        session.messages.push(Message::assistant(answer.as_str()));

        Ok(ChatResponse {
            session_id: sid,
            answer,
            confidence: state.confidence,
            sources: state.sources,
        })
    }

    /// One research run: fetch (explicit URLs or search), summarize per
    /// article, synthesize, index chunks for later local retrieval.
    pub async fn run_research(
        &self,
        session_id: Option<String>,
        topic: &str,
        urls: Vec<String>,
    ) -> Result<ResearchResponse, WorkflowError> {
        let (sid, handle) = self.ensure_session(session_id).await?;
        let mut session = handle.lock().await;

        session
            .messages
            .push(Message::user(format!("New research request: {topic}")));

        let mut state =
            WorkflowState::new(sid.clone(), topic, WorkflowMode::Research, vec![], false)
                .with_urls(urls);
        self.engine.run(&mut state).await?;

        self.index_research_evidence(&mut session, &state).await;

        let overall_summary = state
            .overall_summary
            .unwrap_or_else(|| "No sufficient content to summarize.".to_string());

        let mut lines = vec!["Per-article summaries:".to_string()];
        for (i, article) in state.per_article.iter().enumerate() {
            lines.push(format!(
                "{}. {}\n(Source: {})",
                i + 1,
                article.summary,
                article.url
            ));
        }
        lines.push(format!("\nOverall synthesis:\n{overall_summary}"));
        session.messages.push(Message::assistant(lines.join("\n")));

        Ok(ResearchResponse {
            session_id: sid,
            topic: topic.to_string(),
            per_article: state.per_article,
            overall_summary,
        })
    }

    /// Checkpoint the transcript and pending provenance chunks.
    pub async fn save_session(&self, session_id: &str) -> Result<SaveChatResponse, WorkflowError> {
        let handle = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| WorkflowError::SessionNotFound(session_id.to_string()))?;
        let mut session = handle.lock().await;

        self.checkpoint(&mut session, false).await?;

        Ok(SaveChatResponse {
            message: "Chat saved".to_string(),
            session_id: session_id.to_string(),
            title: session.title(),
        })
    }

    /// Save, mark closed, and drop the session from memory.
    pub async fn end_session(&self, session_id: &str) -> Result<SaveChatResponse, WorkflowError> {
        let Some(handle) = self.sessions.get(session_id).await else {
            // Already evicted: report its persisted state if we have one.
            let persisted = self.persistence.load_transcript(session_id).await?;
            return match persisted {
                Some(chat) => Ok(SaveChatResponse {
                    message: "Chat already saved".to_string(),
                    session_id: session_id.to_string(),
                    title: chat.title,
                }),
                None => Err(WorkflowError::SessionNotFound(session_id.to_string())),
            };
        };

        let title = {
            let mut session = handle.lock().await;
            self.checkpoint(&mut session, true).await?;
            session.title()
        };
        self.sessions.remove(session_id).await;

        Ok(SaveChatResponse {
            message: "Chat saved".to_string(),
            session_id: session_id.to_string(),
            title,
        })
    }

    pub async fn list_chats(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatListEntry>, WorkflowError> {
        self.persistence.list_chats(limit, offset).await
    }

    /// Rehydrate a persisted session into memory and return its transcript.
    pub async fn load_session(&self, session_id: &str) -> Result<LoadChatResponse, WorkflowError> {
        if let Some(handle) = self.sessions.get(session_id).await {
            let session = handle.lock().await;
            return Ok(LoadChatResponse {
                session_id: session_id.to_string(),
                messages: session.messages.clone(),
            });
        }

        let chat = self
            .persistence
            .load_transcript(session_id)
            .await?
            .ok_or_else(|| WorkflowError::SessionNotFound(session_id.to_string()))?;

        let handle = self.rehydrate(chat).await?;
        let session = handle.lock().await;
        Ok(LoadChatResponse {
            session_id: session_id.to_string(),
            messages: session.messages.clone(),
        })
    }

    async fn ensure_session(
        &self,
        session_id: Option<String>,
    ) -> Result<(String, SessionHandle), WorkflowError> {
        let Some(sid) = session_id else {
            let sid = self.sessions.create(None).await;
            let handle = self
                .sessions
                .get(&sid)
                .await
                .ok_or_else(|| WorkflowError::SessionNotFound(sid.clone()))?;
            return Ok((sid, handle));
        };

        if let Some(handle) = self.sessions.get(&sid).await {
            return Ok((sid, handle));
        }

        let handle = match self.persistence.load_transcript(&sid).await? {
            Some(chat) => self.rehydrate(chat).await?,
            None => self.sessions.insert(Session::new(sid.clone(), None)).await,
        };
        Ok((sid, handle))
    }

    async fn rehydrate(&self, chat: ChatSession) -> Result<SessionHandle, WorkflowError> {
        let mut session = Session::new(chat.session_id.clone(), chat.user_id);
        session.messages = chat.messages;
        session.created_at = chat.created_at;
        session.chunk_ids = self
            .persistence
            .chunk_ids_for_session(&chat.session_id)
            .await?
            .into_iter()
            .collect();
        Ok(self.sessions.insert(session).await)
    }

    async fn checkpoint(&self, session: &mut Session, closed: bool) -> Result<(), WorkflowError> {
        let chat = ChatSession {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            title: session.title(),
            messages: session.messages.clone(),
            created_at: session.created_at,
            updated_at: Utc::now(),
            closed,
        };
        self.persistence.save_transcript(&chat).await?;
        self.persistence.save_chunks(&session.pending_chunks).await?;
        session.pending_chunks.clear();
        Ok(())
    }

    /// Chunk fetched research articles, index them in the vector store, and
    /// stage provenance records for the next checkpoint. Indexing failures
    /// degrade silently: the summaries already exist, only future local
    /// retrieval misses out.
    async fn index_research_evidence(&self, session: &mut Session, state: &WorkflowState) {
        let mut upserts = Vec::new();
        let mut records = Vec::new();

        for item in state.evidence.iter().filter(|i| i.is_usable()) {
            let doc_id = stable_doc_id(&item.locator, &item.title);
            for (position, chunk) in split_text(&item.content, CHUNK_SIZE, CHUNK_OVERLAP)
                .into_iter()
                .enumerate()
            {
                let cid = chunk_id(&chunk, &doc_id, position);
                if session.chunk_ids.contains(&cid) {
                    continue;
                }
                upserts.push(ChunkUpsert {
                    chunk_id: cid.clone(),
                    doc_id: doc_id.clone(),
                    session_id: session.session_id.clone(),
                    url: item.locator.clone(),
                    position: position as i64,
                    content: chunk,
                });
                records.push(ChunkRecord {
                    chunk_id: cid,
                    doc_id: doc_id.clone(),
                    session_id: session.session_id.clone(),
                    url: item.locator.clone(),
                    position: position as i64,
                });
            }
        }

        if upserts.is_empty() {
            return;
        }

        match self.vector.upsert(&upserts).await {
            Ok(()) => {
                for record in records {
                    session.chunk_ids.insert(record.chunk_id.clone());
                    session.pending_chunks.push(record);
                }
            }
            Err(e) => warn!("vector upsert failed, research chunks not indexed: {}", e),
        }
    }
}
