use cleanerio_agent::runtime::{AgentRuntime, RuntimeError};
use cleanerio_core::config::AppConfig;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: AgentRuntime,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("agent runtime failed to start: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Wires the agent runtime for an already loaded config. A missing API key
/// or an unreadable corpus stops startup here.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let shutdown = CancellationToken::new();

    let agent_runtime = AgentRuntime::from_config(&config, &shutdown).await?;
    info!(
        event_name = "system.bootstrap.knowledge_ready",
        correlation_id = "bootstrap",
        documents = agent_runtime.knowledge().document_count(),
        corpus = %config.knowledge.corpus_path.display(),
        "knowledge index ready"
    );

    Ok(Application { config, agent_runtime, shutdown })
}

#[cfg(test)]
mod tests {
    use cleanerio_agent::runtime::RuntimeError;
    use cleanerio_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_api_key() {
        let result = bootstrap_with_config(AppConfig::default()).await;

        let error = result.err().expect("missing key must be fatal");
        assert!(matches!(error, BootstrapError::Runtime(RuntimeError::Config(_))));
        assert!(error.to_string().contains("llm.api_key"));
    }

    #[tokio::test]
    async fn bootstrap_fails_when_corpus_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_api_key: Some("sk-test".to_string()),
                llm_base_url: Some("http://127.0.0.1:9".to_string()),
                corpus_path: Some(dir.path().join("missing.csv")),
                index_path: Some(dir.path().join("index.json")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config");

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Runtime(RuntimeError::Knowledge(_)))));
        assert!(!dir.path().join("index.json").exists());
    }
}
