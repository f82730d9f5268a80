use std::env;
use std::time::Duration;

pub const EMBEDDING_DIMENSION: u64 = 1536;

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Endpoint of the index service; it also pins the region/environment.
    pub url: String,
    pub api_key: Option<String>,
    pub global_index: String,
    pub session_prefix: String,
    pub protected: Vec<String>,
    pub compare_source: String,
    pub compare_target: String,
}

/// Timing knobs for index lifecycle and document writes.
#[derive(Debug, Clone)]
pub struct PipelineTimings {
    pub poll_interval: Duration,
    pub delete_grace: Duration,
    pub ready_timeout: Duration,
    pub write_max_attempts: usize,
    pub write_backoff: Duration,
    pub write_verify_delay: Duration,
}

impl Default for PipelineTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            delete_grace: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(60),
            write_max_attempts: 3,
            write_backoff: Duration::from_secs(1),
            write_verify_delay: Duration::from_secs(1),
        }
    }
}

impl PipelineTimings {
    /// Zero-delay timings for tests and the in-memory index.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            delete_grace: Duration::ZERO,
            ready_timeout: Duration::from_millis(50),
            write_max_attempts: 3,
            write_backoff: Duration::ZERO,
            write_verify_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAIConfig,
    pub index: VectorIndexConfig,
    pub timings: PipelineTimings,
    /// Legacy mode: uploads without a session id write to the global index.
    pub global_uploads: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let openai = OpenAIConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
            chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
        };

        let global_index = env::var("RFP_GLOBAL_INDEX").unwrap_or_else(|_| "rfpuploads".to_string());
        let protected = env::var("RFP_PROTECTED_INDEXES")
            .map(|names| parse_list(&names))
            .unwrap_or_else(|_| vec!["paidmediabids".to_string()]);

        let index = VectorIndexConfig {
            url: env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6333".to_string()),
            api_key: env::var("QDRANT_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            protected: with_global(protected, &global_index),
            session_prefix: env::var("RFP_SESSION_INDEX_PREFIX")
                .unwrap_or_else(|_| "rfp-session".to_string()),
            compare_source: env::var("RFP_COMPARE_SOURCE_INDEX")
                .unwrap_or_else(|_| global_index.clone()),
            compare_target: env::var("RFP_COMPARE_TARGET_INDEX")
                .unwrap_or_else(|_| "paidmediabids".to_string()),
            global_index,
        };

        let defaults = PipelineTimings::default();
        let timings = PipelineTimings {
            poll_interval: env_millis("RFP_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            delete_grace: env_millis("RFP_DELETE_GRACE_MS").unwrap_or(defaults.delete_grace),
            ready_timeout: env_millis("RFP_READY_TIMEOUT_MS").unwrap_or(defaults.ready_timeout),
            write_max_attempts: env::var("RFP_WRITE_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.write_max_attempts),
            write_backoff: env_millis("RFP_WRITE_BACKOFF_MS").unwrap_or(defaults.write_backoff),
            write_verify_delay: env_millis("RFP_WRITE_VERIFY_DELAY_MS")
                .unwrap_or(defaults.write_verify_delay),
        };

        let global_uploads = env::var("RFP_GLOBAL_UPLOADS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            openai,
            index,
            timings,
            global_uploads,
        }
    }

    /// Configuration with no credentials and default names, used by tests
    /// and the `--memory-index` development mode.
    pub fn local() -> Self {
        let global_index = "rfpuploads".to_string();
        Self {
            openai: OpenAIConfig {
                api_key: None,
                embedding_model: "text-embedding-ada-002".to_string(),
                chat_model: "gpt-4o".to_string(),
            },
            index: VectorIndexConfig {
                url: "memory".to_string(),
                api_key: None,
                protected: with_global(vec!["paidmediabids".to_string()], &global_index),
                session_prefix: "rfp-session".to_string(),
                compare_source: global_index.clone(),
                compare_target: "paidmediabids".to_string(),
                global_index,
            },
            timings: PipelineTimings::immediate(),
            global_uploads: false,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// The global index is always protected from session cleanup.
fn with_global(mut protected: Vec<String>, global_index: &str) -> Vec<String> {
    if !protected.iter().any(|name| name == global_index) {
        protected.push(global_index.to_string());
    }
    protected
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(parse_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_global_index_always_protected() {
        let protected = with_global(vec!["paidmediabids".to_string()], "rfpuploads");
        assert!(protected.contains(&"rfpuploads".to_string()));

        let protected = with_global(vec!["rfpuploads".to_string()], "rfpuploads");
        assert_eq!(protected.len(), 1);
    }

    #[test]
    fn test_local_config_has_no_credentials() {
        let config = AppConfig::local();
        assert!(config.openai.api_key.is_none());
        assert!(config.index.protected.contains(&config.index.global_index));
        assert_eq!(config.timings.write_max_attempts, 3);
    }
}
