use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tapreply_memory::DEFAULT_MAX_EXCHANGES;
use tapreply_provider::ProviderConfig;

pub const CONFIG_FILE: &str = "tapreply.yaml";
pub const BASELINE_CANDIDATES: usize = 6;
pub const HISTORY_AWARE_CANDIDATES: usize = 9;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub provider: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Relative paths resolve against the config root. Defaults to `<root>/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_weights_file")]
    pub weights_file: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            weights_file: default_weights_file(),
            history_file: default_history_file(),
        }
    }
}

impl StorageConfig {
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.join("data"),
        }
    }

    pub fn weights_path(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(&self.weights_file)
    }

    pub fn history_path(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(&self.history_file)
    }
}

/// Suggestion behaviour. `history_aware` is the single deployment switch: it
/// selects both the candidate count and whether history reaches the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default)]
    pub history_aware: bool,
    #[serde(default = "default_max_utterance_chars")]
    pub max_utterance_chars: usize,
    #[serde(default = "default_history_prompt_exchanges")]
    pub history_prompt_exchanges: usize,
    #[serde(default = "default_common_replies_limit")]
    pub common_replies_limit: usize,
    #[serde(default = "default_choice_delta")]
    pub choice_delta: u64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            history_aware: false,
            max_utterance_chars: default_max_utterance_chars(),
            history_prompt_exchanges: default_history_prompt_exchanges(),
            common_replies_limit: default_common_replies_limit(),
            choice_delta: default_choice_delta(),
        }
    }
}

impl SuggestionConfig {
    pub fn history_aware() -> Self {
        Self {
            history_aware: true,
            ..Self::default()
        }
    }

    pub fn candidate_count(&self) -> usize {
        if self.history_aware {
            HISTORY_AWARE_CANDIDATES
        } else {
            BASELINE_CANDIDATES
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges_per_session: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_exchanges_per_session: default_max_exchanges(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the mode-dependent default (200, or 300 when history-aware).
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: None,
            model: default_model(),
            max_tokens: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Reads the credential from the configured environment variable. Blank
    /// values count as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn max_tokens(&self, history_aware: bool) -> u32 {
        self.max_tokens
            .unwrap_or(if history_aware { 300 } else { 200 })
    }

    pub fn provider_config(&self, api_key: String) -> ProviderConfig {
        let config = ProviderConfig::new()
            .with_api_key(api_key)
            .with_timeout_secs(self.timeout_secs);
        match &self.base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_weights_file() -> String {
    "weights.json".to_string()
}

fn default_history_file() -> String {
    "conversation_history.json".to_string()
}

fn default_max_utterance_chars() -> usize {
    300
}

fn default_history_prompt_exchanges() -> usize {
    10
}

fn default_common_replies_limit() -> usize {
    10
}

fn default_choice_delta() -> u64 {
    1
}

fn default_max_exchanges() -> usize {
    DEFAULT_MAX_EXCHANGES
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    15
}

/// Loads `<config_dir>/tapreply.yaml`. A missing file yields the defaults.
pub fn load_config(config_dir: &Path) -> Result<AppConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<AppConfig> {
    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_baseline_deployment() {
        let config = AppConfig::default();
        assert!(!config.suggestions.history_aware);
        assert_eq!(config.suggestions.candidate_count(), 6);
        assert_eq!(config.suggestions.max_utterance_chars, 300);
        assert_eq!(config.suggestions.choice_delta, 1);
        assert_eq!(config.history.max_exchanges_per_session, 20);
        assert_eq!(config.provider.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.provider.max_tokens(false), 200);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn history_aware_switch_changes_candidate_count() {
        let config = parse_config("suggestions:\n  history_aware: true\n").unwrap();
        assert!(config.suggestions.history_aware);
        assert_eq!(config.suggestions.candidate_count(), 9);
        assert_eq!(config.provider.max_tokens(true), 300);
        // untouched sections keep their defaults
        assert_eq!(config.suggestions.common_replies_limit, 10);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
server:
  bind: "0.0.0.0:9000"
storage:
  data_dir: state
  weights_file: w.json
suggestions:
  max_utterance_chars: 120
  choice_delta: 2
history:
  max_exchanges_per_session: 5
provider:
  api_key_env: MY_KEY
  base_url: http://localhost:1234
  model: claude-test
  max_tokens: 64
  timeout_secs: 3
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.suggestions.max_utterance_chars, 120);
        assert_eq!(config.suggestions.choice_delta, 2);
        assert_eq!(config.history.max_exchanges_per_session, 5);
        assert_eq!(config.provider.model, "claude-test");
        assert_eq!(config.provider.max_tokens(true), 64);

        let root = Path::new("/srv/tapreply");
        assert_eq!(
            config.storage.weights_path(root),
            PathBuf::from("/srv/tapreply/state/w.json")
        );
        assert_eq!(
            config.storage.history_path(root),
            PathBuf::from("/srv/tapreply/state/conversation_history.json")
        );

        let provider = config.provider.provider_config("k".into());
        assert_eq!(provider.base_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(provider.timeout_secs, Some(3));
    }

    #[test]
    fn empty_document_is_default() {
        let config = parse_config("  \n").unwrap();
        assert_eq!(config.suggestions.candidate_count(), 6);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(parse_config("suggestions: [unclosed").is_err());
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.storage.weights_file, "weights.json");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "suggestions:\n  history_aware: true\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert!(config.suggestions.history_aware);
    }

    #[test]
    fn missing_api_key_env_is_none() {
        let config = LlmConfig {
            api_key_env: "TAPREPLY_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        assert!(config.api_key().is_none());
    }
}
