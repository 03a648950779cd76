use std::path::PathBuf;

use serial_test::serial;

use super::*;

const RAG_VARS: &[&str] = &[
    "ARK_API_KEY",
    "ARK_BASE_URL",
    "ARK_MODEL",
    "ARK_EMBEDDING_MODEL",
    "RAG_DOCS_DIR",
    "RAG_STORE_PATH",
    "RAG_CHUNK_SIZE",
    "RAG_CHUNK_OVERLAP",
    "RAG_TOP_K",
    "RAG_MIN_SCORE",
    "RAG_ENABLE_FOR_CHAT",
    "SYSTEM_PROMPT",
    "CORS_ORIGINS",
    "BIND_ADDR",
];

fn clear_env() {
    for var in RAG_VARS {
        // SAFETY: tests touching the environment are serialized via serial_test
        unsafe { std::env::remove_var(var) };
    }
}

fn set_var(name: &str, value: &str) {
    // SAFETY: tests touching the environment are serialized via serial_test
    unsafe { std::env::set_var(name, value) };
}

#[test]
#[serial]
fn defaults_when_environment_empty() {
    clear_env();
    let config = Config::from_env().expect("default config should validate");

    assert_eq!(config.api_key, None);
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.embed_model, DEFAULT_EMBED_MODEL);
    assert_eq!(config.docs_dir, PathBuf::from("local_docs"));
    assert_eq!(config.store_path, PathBuf::from("local_docs/index.json"));
    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.chunk_overlap, 200);
    assert_eq!(config.top_k, 5);
    assert!((config.min_score - 0.75).abs() < f32::EPSILON);
    assert!(config.rag_enabled_for_chat);
    assert_eq!(config.system_prompt, None);
    assert_eq!(config.cors_origins.len(), 2);
}

#[test]
#[serial]
fn environment_overrides() {
    clear_env();
    set_var("ARK_API_KEY", "test-key");
    set_var("RAG_DOCS_DIR", "docs");
    set_var("RAG_CHUNK_SIZE", "500");
    set_var("RAG_CHUNK_OVERLAP", "50");
    set_var("RAG_TOP_K", "3");
    set_var("RAG_MIN_SCORE", "0.5");
    set_var("RAG_ENABLE_FOR_CHAT", "off");
    set_var("SYSTEM_PROMPT", "You are terse.");
    set_var("CORS_ORIGINS", "https://a.example, https://b.example");

    let config = Config::from_env().expect("overridden config should validate");
    clear_env();

    assert!(config.has_api_key());
    assert_eq!(config.docs_dir, PathBuf::from("docs"));
    // Store path follows the docs dir unless overridden explicitly.
    assert_eq!(config.store_path, PathBuf::from("docs/index.json"));
    assert_eq!(config.chunk_size, 500);
    assert_eq!(config.chunk_overlap, 50);
    assert_eq!(config.top_k, 3);
    assert!((config.min_score - 0.5).abs() < f32::EPSILON);
    assert!(!config.rag_enabled_for_chat);
    assert_eq!(config.system_prompt.as_deref(), Some("You are terse."));
    assert_eq!(
        config.cors_origins,
        vec!["https://a.example".to_string(), "https://b.example".to_string()]
    );
}

#[test]
#[serial]
fn explicit_store_path_wins_over_docs_dir() {
    clear_env();
    set_var("RAG_DOCS_DIR", "docs");
    set_var("RAG_STORE_PATH", "/var/lib/askdocs/index.json");

    let config = Config::from_env().expect("config should validate");
    clear_env();

    assert_eq!(config.docs_dir, PathBuf::from("docs"));
    assert_eq!(config.store_path, PathBuf::from("/var/lib/askdocs/index.json"));
}

#[test]
fn rejects_overlap_at_or_above_chunk_size() {
    let mut config = Config {
        chunk_size: 100,
        chunk_overlap: 100,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));

    config.chunk_overlap = 150;
    assert!(config.validate().is_err());

    config.chunk_overlap = 99;
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_zero_chunk_size_and_top_k() {
    let config = Config {
        chunk_size: 0,
        chunk_overlap: 0,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));

    let config = Config {
        top_k: 0,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[test]
fn rejects_out_of_range_min_score() {
    let config = Config {
        min_score: 1.5,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMinScore(_))
    ));
}

#[test]
fn rejects_invalid_base_url() {
    let config = Config {
        base_url: "not a url".to_string(),
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBaseUrl(_))
    ));
}

#[test]
fn bool_parsing_accepts_common_truthy_spellings() {
    for raw in ["1", "true", "TRUE", "yes", "on", " On "] {
        assert!(parse_bool(raw), "{raw:?} should parse as true");
    }
    for raw in ["0", "false", "no", "off", ""] {
        assert!(!parse_bool(raw), "{raw:?} should parse as false");
    }
}
