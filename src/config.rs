use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub embedding_provider: String,
    pub ollama_embedding_model: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_embedding_model: String,
    pub eval_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "groq".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            embedding_provider: env::var("EMBEDDING_PROVIDER")
                .unwrap_or_else(|_| "ollama".to_string()),
            ollama_embedding_model: env::var("OLLAMA_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            eval_enabled: env::var("EVAL_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join("records.csv")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join("patient_memory.json")
    }

    pub fn notes_path(&self) -> PathBuf {
        self.data_dir.join("patient_notes.json")
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.data_dir.join("patients")
    }

    pub fn diseases_dir(&self) -> PathBuf {
        self.data_dir.join("diseases")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("agent_log.jsonl")
    }
}
