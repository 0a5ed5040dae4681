//! Config module tests

use crate::config::{Config, MergeConfig, TreeConfig};
use crate::domain::merge::DedupPolicy;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.llm.api_key.is_none());
    assert_eq!(config.llm.default_model, "anthropic/claude-sonnet-4-20250514");
    assert_eq!(config.llm.fallback_models.len(), 2);
    assert_eq!(config.llm.timeout_secs, 120);

    assert_eq!(config.merge.default_weight, 25.0);
    assert_eq!(config.merge.dedup, DedupPolicy::Allow);
    assert_eq!(config.merge.sentinel_root_id, "root");

    assert!(!config.tree.category_folders_open);
    assert_eq!(config.storage.owner, "local");
    assert!(config.storage.database_path.is_none());
}

#[test]
fn test_merge_config_default() {
    let merge = MergeConfig::default();
    assert_eq!(merge.sentinel_label, "Knowledge Root");
    assert!(!TreeConfig::default().category_folders_open);
}

#[test]
fn test_config_toml_roundtrip_keeps_sections() {
    let mut config = Config::default();
    config.merge.dedup = DedupPolicy::SkipExisting;
    config.tree.category_folders_open = true;

    let serialized = toml::to_string_pretty(&config).expect("Should serialize");
    assert!(serialized.contains("[merge]"));
    assert!(serialized.contains("skip_existing"));

    let parsed: Config = toml::from_str(&serialized).expect("Should deserialize");
    assert_eq!(parsed.merge.dedup, DedupPolicy::SkipExisting);
    assert!(parsed.tree.category_folders_open);
}

#[test]
fn test_config_missing_sections_fall_back_to_defaults() {
    let minimal = r#"
        [llm]
        default_model = "openai/gpt-4o"
        fallback_models = []
        temperature = 0.2
        max_tokens = 1024
        timeout_secs = 30
    "#;

    let config: Config = toml::from_str(minimal).expect("Should parse minimal config");
    assert_eq!(config.llm.default_model, "openai/gpt-4o");
    assert_eq!(config.merge.default_weight, 25.0);
    assert_eq!(config.storage.owner, "local");
}

#[test]
fn test_get_and_set_merge_keys() {
    let mut config = Config::default();

    config.set("merge.dedup", "reject_existing").unwrap();
    assert_eq!(config.get("merge.dedup").unwrap(), "reject_existing");

    config.set("merge.default_weight", "12.5").unwrap();
    assert_eq!(config.get("merge.default_weight").unwrap(), "12.5");

    config.set("tree.category_folders_open", "true").unwrap();
    assert_eq!(config.get("tree.category_folders_open").unwrap(), "true");
}

#[test]
fn test_set_rejects_invalid_values() {
    let mut config = Config::default();

    assert!(config.set("merge.dedup", "sometimes").is_err());
    assert!(config.set("merge.default_weight", "-1").is_err());
    assert!(config.set("merge.sentinel_root_id", "  ").is_err());
    assert!(config.set("llm.temperature", "3.5").is_err());
    assert!(config.set("storage.owner", "").is_err());
    assert!(config.set("tree.category_folders_open", "maybe").is_err());
}

#[test]
fn test_default_weight_must_be_finite() {
    let mut config = Config::default();

    assert!(config.set("merge.default_weight", "NaN").is_err());
    assert!(config.set("merge.default_weight", "inf").is_err());
    assert_eq!(config.merge.default_weight, 25.0);

    config.merge.default_weight = f64::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn test_api_key_cannot_be_set() {
    let mut config = Config::default();
    let err = config.set("llm.api_key", "sk-secret").unwrap_err();
    assert!(err.to_string().contains("environment variable"));
}

#[test]
fn test_unknown_key() {
    let config = Config::default();
    let err = config.get("nope.nothing").unwrap_err();
    assert!(err.to_string().contains("Unknown configuration key"));
}

#[test]
fn test_validate_rejects_stored_api_key() {
    let mut config = Config::default();
    config.llm.api_key = Some("sk-test".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_explicit_database_path() {
    let mut config = Config::default();
    config.set("storage.database_path", "/tmp/concepts.db").unwrap();
    assert_eq!(
        config.database_path().unwrap(),
        std::path::PathBuf::from("/tmp/concepts.db")
    );
}
