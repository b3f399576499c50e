use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration — parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct FresnelConfig {
    /// HTTP API port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path to the primary store database file.
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Search index service.
    #[serde(default)]
    pub index: IndexConfig,

    /// Index propagation queue and retry policy.
    #[serde(default)]
    pub propagation: PropagationConfig,

    /// Collections mirrored into the search index. Collections not
    /// listed here are served but never propagated.
    #[serde(default)]
    pub mirrors: Vec<MirrorConfig>,
}

fn default_api_port() -> u16 {
    8000
}

fn default_data_file() -> String {
    "data/db.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index service.
    #[serde(default = "default_index_url")]
    pub url: String,
    /// Per-request timeout. A hung index call must not pin the
    /// propagation worker forever.
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            timeout_secs: default_index_timeout(),
        }
    }
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_timeout() -> u64 {
    10
}

/// Behavior when the bounded propagation queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): on a full queue the operation is dropped and logged.
    Drop,
    /// Detached send task waits for room (back-pressure on the index,
    /// never on the client).
    #[serde(alias = "backpressure")]
    BackPressure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropagationConfig {
    /// Queue capacity.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    #[serde(default = "default_overflow")]
    pub overflow: OverflowPolicy,
    /// Attempts per operation before it goes to the dead-letter log.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base; attempt n sleeps `retry_base_ms * 2^(n-1)`.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
            overflow: default_overflow(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

fn default_buffer() -> usize {
    1024
}

fn default_overflow() -> OverflowPolicy {
    OverflowPolicy::Drop
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    pub collection: String,
    /// Logical index name; defaults to the collection name.
    #[serde(default)]
    pub index: Option<String>,
}

impl FresnelConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let config = FresnelConfig::parse("").unwrap();
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.index.url, "http://localhost:9200");
        assert_eq!(config.propagation.overflow, OverflowPolicy::Drop);
        assert!(config.mirrors.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let config = FresnelConfig::parse(
            r#"
            api_port = 8000
            data_file = "data/db.json"

            [index]
            url = "http://search:9200"
            timeout_secs = 3

            [propagation]
            buffer = 16
            overflow = "back_pressure"
            max_attempts = 2
            retry_base_ms = 10

            [[mirrors]]
            collection = "blogs"

            [[mirrors]]
            collection = "posts"
            index = "articles"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.timeout_secs, 3);
        assert_eq!(config.propagation.overflow, OverflowPolicy::BackPressure);
        assert_eq!(config.mirrors.len(), 2);
        assert_eq!(config.mirrors[1].index.as_deref(), Some("articles"));
    }

    #[test]
    fn overflow_accepts_legacy_alias() {
        let config = FresnelConfig::parse("[propagation]\noverflow = \"backpressure\"\n").unwrap();
        assert_eq!(config.propagation.overflow, OverflowPolicy::BackPressure);
    }
}
