use anyhow::Result;

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    // Providers
    pub openai_api_key: Option<String>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub tavily_api_key: Option<String>,
    pub vector_db_service_url: String,

    // Conversation and search knobs
    pub max_history_messages: usize,
    pub max_search_results: usize,
    pub min_article_chars: usize,

    // Retrieval knobs
    pub retrieval_k: usize,
    pub retrieval_min_docs: usize,
    pub retrieval_sim_threshold: f64,
    pub chat_quick_search_results: usize,

    // Planner / feedback knobs
    pub time_sensitive_keywords: Vec<String>,
    pub use_tavily_only: bool,
    pub confidence_threshold: f64,
    pub max_feedback_retries: u32,

    pub log_level: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            port: env_or("PORT", "8080").parse()?,
            database_url: env_or("DATABASE_URL", "sqlite://chats.sqlite3?mode=rwc"),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            llm_api_base: env_or("LLM_API_BASE", "https://api.openai.com/v1"),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok(),
            vector_db_service_url: env_or("VECTOR_DB_SERVICE_URL", "http://localhost:8003"),
            max_history_messages: env_or("MAX_HISTORY_MESSAGES", "12").parse()?,
            max_search_results: env_or("MAX_SEARCH_RESULTS", "8").parse()?,
            min_article_chars: env_or("MIN_ARTICLE_CHARS", "200").parse()?,
            retrieval_k: env_or("RETRIEVAL_K", "5").parse()?,
            retrieval_min_docs: env_or("RETRIEVAL_MIN_DOCS", "3").parse()?,
            retrieval_sim_threshold: env_or("RETRIEVAL_SIM_THRESHOLD", "0.35").parse()?,
            chat_quick_search_results: env_or("CHAT_QUICK_SEARCH_RESULTS", "4").parse()?,
            time_sensitive_keywords: env_or(
                "TIME_SENSITIVE_KEYWORDS",
                "latest,breaking,news,today,this week,recent,update,updated,currently,now,2024,2025,2026",
            )
            .split(',')
            .map(|kw| kw.trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect(),
            use_tavily_only: env_or("USE_TAVILY_ONLY", "1").parse::<u8>()? != 0,
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", "0.6").parse()?,
            max_feedback_retries: env_or("MAX_FEEDBACK_RETRIES", "1").parse()?,
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            openai_api_key: None,
            llm_api_base: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            tavily_api_key: None,
            vector_db_service_url: "http://localhost:8003".to_string(),
            max_history_messages: 12,
            max_search_results: 8,
            min_article_chars: 200,
            retrieval_k: 5,
            retrieval_min_docs: 3,
            retrieval_sim_threshold: 0.35,
            chat_quick_search_results: 4,
            time_sensitive_keywords: vec![
                "latest".into(),
                "breaking".into(),
                "news".into(),
                "today".into(),
                "this week".into(),
                "recent".into(),
                "now".into(),
            ],
            use_tavily_only: true,
            confidence_threshold: 0.6,
            max_feedback_retries: 1,
            log_level: "info".to_string(),
        }
    }
}
