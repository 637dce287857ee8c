use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_LLM_MODEL: &str = "llama3.2:3b";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the question-answering pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory where the vector index and chunk metadata are persisted.
    pub data_dir: PathBuf,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Number of texts sent to the embedding provider per request.
    pub embedding_batch_size: usize,
    /// Request timeout for embedding calls.
    pub embedding_timeout_secs: u64,
    /// Base URL of the Ollama runtime (embeddings and chat).
    pub ollama_url: String,
    /// API key for OpenAI-compatible embedding endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible embedding endpoints.
    pub openai_base_url: String,
    /// Chat model used to generate answers.
    pub llm_model: String,
    /// Request timeout for chat completions.
    pub llm_timeout_secs: u64,
    /// Upper bound on chunk length, measured in `chunk_unit`.
    pub chunk_size: usize,
    /// Overlap carried from one chunk into the next, measured in `chunk_unit`.
    pub chunk_overlap: usize,
    /// Unit used to measure chunk size and overlap.
    pub chunk_unit: ChunkUnit,
    /// Number of chunks retrieved when a query does not specify `k`.
    pub search_default_k: usize,
    /// Hard ceiling applied to requested `k` values.
    pub search_max_k: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI (or compatible) embeddings API.
    OpenAI,
}

/// How chunk sizes are measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkUnit {
    /// Unicode scalar values.
    #[default]
    Characters,
    /// `cl100k_base` tokens.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let embedding_provider = match get("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            None => EmbeddingProvider::Ollama,
        };
        let embedding_model = get("EMBEDDING_MODEL").unwrap_or_else(|| {
            match embedding_provider {
                EmbeddingProvider::Ollama => DEFAULT_OLLAMA_EMBEDDING_MODEL,
                EmbeddingProvider::OpenAI => DEFAULT_OPENAI_EMBEDDING_MODEL,
            }
            .to_string()
        });
        let openai_api_key = get("OPENAI_API_KEY");
        if embedding_provider == EmbeddingProvider::OpenAI && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        let chunk_size: usize = parse_or(&get, "CHUNK_SIZE", 600)?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        let embedding_batch_size: usize = parse_or(&get, "EMBEDDING_BATCH_SIZE", 32)?;
        if embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }

        let search_max_k = parse_or(&get, "SEARCH_MAX_K", 50usize)?.max(1);
        let search_default_k = parse_or(&get, "SEARCH_DEFAULT_K", 4usize)?.clamp(1, search_max_k);

        Ok(Self {
            data_dir: get("DOCQA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            embedding_provider,
            embedding_model,
            embedding_batch_size,
            embedding_timeout_secs: parse_or(&get, "EMBEDDING_TIMEOUT_SECS", 60)?,
            ollama_url: get("OLLAMA_URL")
                .or_else(|| get("OLLAMA_HOST"))
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_timeout_secs: parse_or(&get, "LLM_TIMEOUT_SECS", 120)?,
            chunk_size,
            chunk_overlap: parse_or(&get, "CHUNK_OVERLAP", 75)?,
            chunk_unit: match get("CHUNK_UNIT") {
                Some(value) => value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("CHUNK_UNIT".into()))?,
                None => ChunkUnit::default(),
            },
            search_default_k,
            search_max_k,
            server_port: get("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for ChunkUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Characters),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
///
/// Calling this more than once keeps the first configuration.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        llm_model = %config.llm_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
