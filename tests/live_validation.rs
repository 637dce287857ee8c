use std::{env, sync::Once};

use docqa::{config, embedding, llm, qa::QaService};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        set_default_env("LLM_MODEL", "llama3.2:3b");
        let data_dir = env::temp_dir().join("docqa-live-validation");
        set_default_env("DOCQA_DATA_DIR", &data_dir.to_string_lossy());
        config::init_config().expect("live test configuration");
    });
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    init_config_once();
    let client = embedding::get_embedding_client().expect("embedding client");
    let vectors = client
        .generate_embeddings(vec![
            "docqa live embedding".to_string(),
            "second input".to_string(),
        ])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 2, "expected embedding per input text");
    assert!(!vectors[0].is_empty(), "embedding should not be empty");
    assert_eq!(vectors[0].len(), vectors[1].len(), "dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires live Ollama chat model"]
async fn live_ollama_chat_replies() {
    init_config_once();
    let client = llm::get_llm_client().expect("chat client");
    let reply = client
        .chat("Reply with the single word: ready")
        .await
        .expect("chat request failed");
    assert!(!reply.is_empty(), "model returned an empty reply");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings and chat model"]
async fn live_reindex_and_ask() {
    init_config_once();
    let docs = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        docs.path().join("policy.txt"),
        "Employees receive 25 days of paid vacation per year.",
    )
    .expect("write fixture");

    let service = QaService::from_config().await.expect("service");
    let report = service.reindex(docs.path()).await.expect("reindex");
    assert_eq!(report.files, vec!["policy.txt"]);

    let answer = service
        .ask("How many vacation days do employees get?", Some(1))
        .await
        .expect("answer");
    assert_eq!(answer.sources, vec!["policy.txt"]);
    assert!(!answer.answer.starts_with("Error communicating with model"));
}
