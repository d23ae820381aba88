use tokio_util::sync::CancellationToken;

use cleanerio_agent::{Corpus, EmbeddingProvider, KnowledgeStore, OpenAiClient};
use cleanerio_core::config::{AppConfig, KnowledgeConfig, LoadOptions};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "build-index",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let client = match OpenAiClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "build-index",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "build-index",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(build(&config.knowledge, &client, &cancel));
    result_to_command(&config.knowledge, result)
}

/// Embeds the configured corpus and saves the index, returning the document count.
pub async fn build(
    config: &KnowledgeConfig,
    embedder: &dyn EmbeddingProvider,
    cancel: &CancellationToken,
) -> Result<usize, (&'static str, String, u8)> {
    let corpus = Corpus::load(&config.corpus_path)
        .await
        .map_err(|error| ("corpus", error.to_string(), 4u8))?;
    let index = KnowledgeStore::rebuild(&corpus, &config.index_path, embedder, cancel)
        .await
        .map_err(|error| ("index_build", error.to_string(), 5u8))?;
    Ok(index.len())
}

fn result_to_command(
    config: &KnowledgeConfig,
    result: Result<usize, (&'static str, String, u8)>,
) -> CommandResult {
    match result {
        Ok(documents) => CommandResult::success(
            "build-index",
            format!(
                "indexed {documents} documents from `{}` into `{}`",
                config.corpus_path.display(),
                config.index_path.display()
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("build-index", error_class, message, exit_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use cleanerio_agent::{EmbeddingProvider, KnowledgeIndex, OracleError};
    use cleanerio_core::config::KnowledgeConfig;

    use super::build;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn model(&self) -> &str {
            "text-length"
        }

        async fn embed(
            &self,
            texts: &[String],
            _cancel: &CancellationToken,
        ) -> Result<Vec<Vec<f32>>, OracleError> {
            Ok(texts.iter().map(|text| vec![text.len() as f32, 1.0]).collect())
        }
    }

    fn knowledge_config(dir: &std::path::Path) -> KnowledgeConfig {
        KnowledgeConfig {
            corpus_path: dir.join("training_data.csv"),
            index_path: dir.join("index").join("knowledge_index.json"),
            top_k: 1,
        }
    }

    #[tokio::test]
    async fn build_embeds_every_row_and_saves_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = knowledge_config(dir.path());
        std::fs::write(
            &config.corpus_path,
            "service,description,price\ngeneral_cleaning,regular home cleaning,$120\npost_renovation_cleaning,debris removal,$300\n",
        )
        .expect("write corpus");

        let documents =
            build(&config, &LengthEmbedder, &CancellationToken::new()).await.expect("index built");

        assert_eq!(documents, 2);
        let saved = KnowledgeIndex::load(&config.index_path).await.expect("saved index");
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.embedding_model, "text-length");
    }

    #[tokio::test]
    async fn missing_corpus_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = knowledge_config(dir.path());

        let (error_class, _, exit_code) =
            build(&config, &LengthEmbedder, &CancellationToken::new()).await.expect_err("missing");

        assert_eq!(error_class, "corpus");
        assert_eq!(exit_code, 4);
        assert!(!config.index_path.exists());
    }
}
