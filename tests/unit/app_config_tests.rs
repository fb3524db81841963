/*!
 * Tests for application configuration functionality
 */

use std::time::Duration;

use bookwai::app_config::{Config, LogLevel, TranslationProvider};
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.target_language, "pt-BR");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert_eq!(config.translation.available_providers.len(), 4);
    assert_eq!(config.translation.get_model(), "llama3.1");
    assert_eq!(config.translation.get_endpoint(), "http://localhost:11434");

    assert_eq!(config.chunking.chunk_size, 4000);
    assert_eq!(config.chunking.overlap_size, 200);
    assert_eq!(config.parallel.max_workers, 4);
    assert!((config.parallel.rate_limit - 2.0).abs() < f64::EPSILON);
    assert!(config.parallel.validate_connection);
    assert_eq!(config.translation.common.retry_count, 3);
    assert!(!config.output.save_chapters_separately);
    assert!(config.output.keep_chapter_files);
    assert_eq!(config.output.chapters_dir, "chapters");
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.target_language = "zz".to_string();
    assert!(config.validate().is_err());
    config.target_language = "fr".to_string();

    config.parallel.max_workers = 0;
    assert!(config.validate().is_err());
    config.parallel.max_workers = 2;

    config.parallel.rate_limit = -1.0;
    assert!(config.validate().is_err());
    config.parallel.rate_limit = 0.0;
    assert!(config.validate().is_ok());

    config.translation.active_provider_config_mut().endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
}

/// Test that a hosted provider needs a key and accepts one set through the active entry
#[test]
fn test_activeProviderConfigMut_withApiKey_shouldSatisfyValidation() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Anthropic;
    assert!(config.validate().is_err());

    config.translation.active_provider_config_mut().api_key = "sk-test".to_string();
    assert!(config.validate().is_ok());
    assert_eq!(config.translation.get_api_key(), "sk-test");
}

/// Test that a missing provider entry is created on demand
#[test]
fn test_activeProviderConfigMut_withMissingEntry_shouldInsertDefaults() {
    let mut config = Config::default();
    config.translation.available_providers.clear();
    config.translation.provider = TranslationProvider::LMStudio;

    config.translation.active_provider_config_mut().model = "qwen2.5-7b".to_string();

    assert_eq!(config.translation.available_providers.len(), 1);
    assert_eq!(config.translation.get_model(), "qwen2.5-7b");
    assert_eq!(config.translation.get_endpoint(), "http://localhost:1234/v1");
}

/// Test provider parsing
#[test]
fn test_provider_fromStr_withKnownNames_shouldParse() {
    assert_eq!("openai".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenAI);
    assert_eq!("LMStudio".parse::<TranslationProvider>().unwrap(), TranslationProvider::LMStudio);
    assert!("gemini".parse::<TranslationProvider>().is_err());
}

/// Test persistence timing conversion
#[test]
fn test_writerTiming_withDefaults_shouldConvertMilliseconds() {
    let timing = Config::default().persistence.writer_timing();
    assert_eq!(timing.debounce, Duration::from_millis(2000));
    assert_eq!(timing.important_delay, Duration::from_millis(500));
    assert_eq!(timing.queue_capacity, 64);
}

/// Test saving and loading a modified configuration
#[test]
fn test_saveAndLoad_withCustomValues_shouldPreserveThem() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = "de".to_string();
    config.parallel.max_workers = 7;
    config.output.book_title = Some("Der Test".to_string());
    config.log_level = LogLevel::Debug;
    config.save(&path).unwrap();

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(loaded.target_language, "de");
    assert_eq!(loaded.parallel.max_workers, 7);
    assert_eq!(loaded.output.book_title.as_deref(), Some("Der Test"));
    assert_eq!(loaded.log_level, LogLevel::Debug);
}

/// Test that a malformed config file is reported
#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();
    assert!(Config::load_or_create(&path).is_err());
}

/// Test that an explicit chunk size survives when model planning is off
#[test]
fn test_plannedFor_withPlanningDisabled_shouldKeepConfiguredSize() {
    let mut config = Config::default();
    config.chunking.chunk_size = 1500;
    config.chunking.overlap_size = 100;

    assert_eq!(config.chunking.planned_for("mistral").chunk_size, 19_200);

    config.chunking.plan_for_model = false;
    let planned = config.chunking.planned_for("mistral");
    assert_eq!(planned.chunk_size, 1500);
    assert_eq!(planned.overlap_size, 100);

    let parsed: Config = serde_json::from_str(r#"{"target_language": "fr", "chunking": {"chunk_size": 900}}"#).unwrap();
    assert!(parsed.chunking.plan_for_model);
}
