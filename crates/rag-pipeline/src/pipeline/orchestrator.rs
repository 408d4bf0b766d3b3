//! Pipeline orchestrator
//!
//! One run: load files, flatten, chunk, embed, index, retrieve, rerank,
//! build the prompt and call the LLM. Every run gets a fresh index that is
//! dropped when the run returns.

use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{PipelineConfig, ServiceConfig};
use crate::embeddings::{load_embedder, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::generation::{LlmBackends, LlmResolver, PromptTemplate};
use crate::ingestion::{ChunkingStrategy, DocumentLoader, TextChunker};
use crate::retrieval::{rerank, CrossEncoderReranker, Reranker, VectorIndex};
use crate::types::{RerankedChunk, RunResult};

/// Long-lived collaborators shared by every run
#[derive(Clone)]
pub struct Providers {
    /// Embeds chunks and queries
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Embeds sentences for semantic chunking
    pub semantic_embedder: Arc<dyn EmbeddingProvider>,
    /// Scores retrieved candidates
    pub reranker: Arc<dyn Reranker>,
    /// Maps a run's model name to an LLM provider
    pub llm: Arc<dyn LlmResolver>,
}

impl Providers {
    /// Load every model named by the service configuration
    pub async fn load(config: &ServiceConfig) -> Result<Self> {
        let embedder = load_embedder(config, &config.embeddings.model).await?;
        let semantic_embedder = if config.embeddings.semantic_model == config.embeddings.model {
            Arc::clone(&embedder)
        } else {
            load_embedder(config, &config.embeddings.semantic_model).await?
        };
        let reranker = Arc::new(CrossEncoderReranker::new(&config.reranker).await?);
        let llm = Arc::new(LlmBackends::new(&config.llm)?);

        Ok(Self {
            embedder,
            semantic_embedder,
            reranker,
            llm,
        })
    }
}

/// Runs the pipeline against shared providers
pub struct PipelineOrchestrator {
    config: ServiceConfig,
    template: PromptTemplate,
    providers: Providers,
}

impl PipelineOrchestrator {
    /// Create an orchestrator; the prompt template is parsed once here
    pub fn new(config: ServiceConfig, providers: Providers) -> Result<Self> {
        let template = PromptTemplate::parse(&config.prompt.template)?;
        Ok(Self {
            config,
            template,
            providers,
        })
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Execute one run
    pub async fn run(&self, run: &PipelineConfig) -> Result<RunResult> {
        let run_id = new_run_id();
        let span = tracing::info_span!("run", run_id = %run_id);
        let result = self.execute(&run_id, run).instrument(span).await;

        if let Err(e) = &result {
            if e.is_external_service() {
                tracing::warn!("Run {} failed in an external service: {}", run_id, e);
            } else {
                tracing::debug!("Run {} failed: {}", run_id, e);
            }
        }
        result
    }

    async fn execute(&self, run_id: &str, run: &PipelineConfig) -> Result<RunResult> {
        run.validate()?;
        let strategy = ChunkingStrategy::from_config(run)?;
        let llm = self.providers.llm.resolve(&run.model_name)?;

        tracing::info!(
            "Run {}: {} files, method={}, model={}",
            run_id,
            run.file_paths.len(),
            strategy.method(),
            run.model_name
        );

        // Load
        let loader = DocumentLoader::new(run.file_paths.clone());
        let documents = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| Error::internal(format!("Document loading task failed: {}", e)))?;
        let corpus = DocumentLoader::flatten(&documents);
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        // Chunk
        let mut chunker = TextChunker::new(strategy);
        if matches!(chunker.strategy(), ChunkingStrategy::Semantic { .. }) {
            chunker = chunker.with_embedder(Arc::clone(&self.providers.semantic_embedder));
        }
        let chunks = chunker.chunk(&corpus).await?;
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        tracing::info!("Run {}: {} chunks", run_id, chunks.len());

        // Embed and index
        let vectors = self.providers.embedder.embed_batch(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} chunk embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let chunk_count = chunks.len();
        let ids: Vec<String> = (0..chunk_count).map(|i| i.to_string()).collect();
        let mut index = VectorIndex::new(format!("rag_{}", run_id));
        index.add(ids, chunks, vectors)?;

        // Retrieve and rerank
        let query = run.query_or(&self.config.prompt.default_query);
        let query_vector = self.providers.embedder.embed(query).await?;
        let candidates = index.query(&query_vector, self.config.retrieval.top_k)?;
        tracing::debug!("Retrieved {} of {} chunks", candidates.len(), index.len());
        drop(index);

        let mut contexts = rerank(self.providers.reranker.as_ref(), query, candidates).await?;
        if let Some(top) = contexts.first() {
            tracing::debug!("Top rerank score {:.4} (chunk {})", top.score, top.id);
        }
        contexts.truncate(self.config.retrieval.context_count);

        // Generate
        let prompt = self.build_prompt(query, &contexts)?;
        let generation = llm.generate(&prompt, &self.config.llm.system_prompt).await?;

        tracing::info!(
            "Run {} done: {} tokens in {:.2}s",
            run_id,
            generation.total_tokens,
            generation.total_time
        );

        Ok(RunResult::new(
            run_id.to_string(),
            generation,
            chunk_count,
            contexts,
        ))
    }

    fn build_prompt(&self, question: &str, contexts: &[RerankedChunk]) -> Result<String> {
        let joined = contexts
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.retrieval.context_separator);

        self.template
            .render(&[("contexts", &joined), ("question", question)])
    }
}

/// `YYYYMMDDHHMMSS_xxxxxxxx`: UTC timestamp plus eight random hex digits
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_QUERY;
    use crate::generation::LlmProvider;
    use crate::types::Generation;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    const VOCABULARY: [&str; 4] = ["attention", "cat", "dog", "weather"];

    /// Counts vocabulary words
    struct VocabularyEmbedder;

    #[async_trait]
    impl EmbeddingProvider for VocabularyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(VOCABULARY
                .iter()
                .map(|word| lower.matches(word).count() as f32)
                .collect())
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }

        fn name(&self) -> &str {
            "vocabulary"
        }
    }

    /// Returns one embedding too few
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0]; texts.len().saturating_sub(1)])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    /// Scores by text length
    struct LengthReranker;

    #[async_trait]
    impl Reranker for LengthReranker {
        async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
            Ok(documents.iter().map(|d| d.len() as f32).collect())
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    /// Records the prompt it receives
    #[derive(Default)]
    struct RecordingLlm {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<Generation> {
            self.prompts
                .lock()
                .push((prompt.to_string(), system_prompt.to_string()));
            Ok(Generation {
                model_response: "Attention weighs tokens.".to_string(),
                prompt_tokens: 10,
                completion_tokens: 4,
                total_tokens: 14,
                total_time: 0.5,
            })
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    struct FixedResolver(Arc<RecordingLlm>);

    impl LlmResolver for FixedResolver {
        fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>> {
            crate::generation::LlmBackend::from_model(model_name)?;
            let llm: Arc<dyn LlmProvider> = self.0.clone();
            Ok(llm)
        }
    }

    fn orchestrator(embedder: Arc<dyn EmbeddingProvider>) -> (PipelineOrchestrator, Arc<RecordingLlm>) {
        let llm = Arc::new(RecordingLlm::default());
        let providers = Providers {
            semantic_embedder: Arc::clone(&embedder),
            embedder,
            reranker: Arc::new(LengthReranker),
            llm: Arc::new(FixedResolver(Arc::clone(&llm))),
        };
        let orchestrator = PipelineOrchestrator::new(ServiceConfig::default(), providers).unwrap();
        (orchestrator, llm)
    }

    fn write_corpus(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("notes.txt");
        std::fs::write(
            &path,
            "Attention lets every token look at every other token.\n\
             The cat sat.\n\
             Self attention computes attention weights from queries and keys.\n\
             The dog barked at the weather.\n\
             Multi-head attention runs several layers in parallel.\n\
             Weather today is mild.",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_run_id_format() {
        let id = new_run_id();
        let (stamp, suffix) = id.split_once('_').unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_run_id(), id);
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path());
        let (orchestrator, llm) = orchestrator(Arc::new(VocabularyEmbedder));

        let run = PipelineConfig {
            file_paths: vec![path, dir.path().join("ignored.xyz")],
            method: "paragraph".to_string(),
            ..Default::default()
        };
        let result = orchestrator.run(&run).await.unwrap();

        assert_eq!(result.chunk_count, 6);
        assert_eq!(result.model_response, "Attention weighs tokens.");
        assert_eq!(result.total_tokens, 14);
        assert_eq!(result.contexts.len(), 3);
        assert!(result
            .contexts
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
        assert!(result
            .contexts
            .iter()
            .all(|c| c.text.to_lowercase().contains("attention")));

        let prompts = llm.prompts.lock();
        assert_eq!(prompts.len(), 1);
        let (prompt, system) = &prompts[0];
        assert_eq!(system, &ServiceConfig::default().llm.system_prompt);
        assert!(prompt.contains(&format!("Question: {}", DEFAULT_QUERY)));

        let joined = result
            .contexts
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n -- \n\n");
        assert!(prompt.contains(&joined));
    }

    #[tokio::test]
    async fn test_run_uses_supplied_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path());
        let (orchestrator, llm) = orchestrator(Arc::new(VocabularyEmbedder));

        let run = PipelineConfig {
            file_paths: vec![path],
            method: "paragraph".to_string(),
            query: Some("What about the weather?".to_string()),
            ..Default::default()
        };
        orchestrator.run(&run).await.unwrap();

        let prompts = llm.prompts.lock();
        assert!(prompts[0].0.contains("Question: What about the weather?"));
    }

    #[tokio::test]
    async fn test_semantic_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path());
        let (orchestrator, _) = orchestrator(Arc::new(VocabularyEmbedder));

        let run = PipelineConfig {
            file_paths: vec![path],
            method: "semantic".to_string(),
            semantic_clusters: 3,
            ..Default::default()
        };
        let result = orchestrator.run(&run).await.unwrap();
        assert!(result.chunk_count >= 1 && result.chunk_count <= 3);
        assert!(result.contexts.len() <= result.chunk_count);
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let unsupported = dir.path().join("data.csv");
        std::fs::write(&unsupported, "a,b").unwrap();
        let (orchestrator, llm) = orchestrator(Arc::new(VocabularyEmbedder));

        let run = PipelineConfig {
            file_paths: vec![unsupported],
            ..Default::default()
        };
        assert!(matches!(orchestrator.run(&run).await, Err(Error::EmptyCorpus)));
        assert!(llm.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_run_configuration() {
        let (orchestrator, _) = orchestrator(Arc::new(VocabularyEmbedder));

        let unknown_method = PipelineConfig {
            method: "fractal".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            orchestrator.run(&unknown_method).await,
            Err(Error::InvalidConfiguration(_))
        ));

        let unknown_model = PipelineConfig {
            model_name: "mystery-model".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            orchestrator.run(&unknown_model).await,
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus(dir.path());
        let (orchestrator, _) = orchestrator(Arc::new(ShortEmbedder));

        let run = PipelineConfig {
            file_paths: vec![path],
            method: "paragraph".to_string(),
            ..Default::default()
        };
        assert!(matches!(orchestrator.run(&run).await, Err(Error::Embedding(_))));
    }

    #[test]
    fn test_bad_template_rejected_at_startup() {
        let mut config = ServiceConfig::default();
        config.prompt.template = "Contexts: {contexts".to_string();
        let providers = Providers {
            embedder: Arc::new(VocabularyEmbedder),
            semantic_embedder: Arc::new(VocabularyEmbedder),
            reranker: Arc::new(LengthReranker),
            llm: Arc::new(FixedResolver(Arc::new(RecordingLlm::default()))),
        };
        assert!(matches!(
            PipelineOrchestrator::new(config, providers),
            Err(Error::Template(_))
        ));
    }
}
