//! Text chunking strategies
//!
//! Every strategy except `semantic` is a pure function of the text and its
//! parameters. Adjacency-based strategies (character, word, sentence, token)
//! keep source order; paragraph and delimiter drop blank segments; semantic
//! groups sentences by k-means label, so its order carries no meaning.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};

use super::kmeans::KMeans;
use super::segment::{split_sentences, split_tokens};

/// Chunking method selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingMethod {
    Character,
    Word,
    Sentence,
    Paragraph,
    Delimiter,
    Token,
    Semantic,
}

impl ChunkingMethod {
    /// Selector string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Word => "word",
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
            Self::Delimiter => "delimiter",
            Self::Token => "token",
            Self::Semantic => "semantic",
        }
    }
}

impl FromStr for ChunkingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "character" => Ok(Self::Character),
            "word" => Ok(Self::Word),
            "sentence" => Ok(Self::Sentence),
            "paragraph" => Ok(Self::Paragraph),
            "delimiter" => Ok(Self::Delimiter),
            "token" => Ok(Self::Token),
            "semantic" => Ok(Self::Semantic),
            other => Err(Error::invalid_config(format!(
                "Unknown chunking method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ChunkingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunking method together with the parameters it uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Fixed windows of `chunk_size` characters
    Character { chunk_size: usize },
    /// Windows of `words_per_chunk` whitespace-separated words
    Word { words_per_chunk: usize },
    /// Windows of `sentences_per_chunk` sentences
    Sentence { sentences_per_chunk: usize },
    /// One chunk per non-blank line
    Paragraph,
    /// One chunk per non-blank segment between delimiters
    Delimiter { delimiter: String },
    /// Windows of `tokens_per_chunk` word/punctuation tokens
    Token { tokens_per_chunk: usize },
    /// Sentences grouped into at most `clusters` k-means clusters
    Semantic { clusters: usize },
}

impl ChunkingStrategy {
    /// Build the strategy selected by a run configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let method: ChunkingMethod = config.method.parse()?;

        let strategy = match method {
            ChunkingMethod::Character => Self::Character {
                chunk_size: positive("chunk_size", config.chunk_size)?,
            },
            ChunkingMethod::Word => Self::Word {
                words_per_chunk: positive("words_per_chunk", config.words_per_chunk)?,
            },
            ChunkingMethod::Sentence => Self::Sentence {
                sentences_per_chunk: positive("sentences_per_chunk", config.sentences_per_chunk)?,
            },
            ChunkingMethod::Paragraph => Self::Paragraph,
            ChunkingMethod::Delimiter => {
                if config.delimiter.is_empty() {
                    return Err(Error::invalid_config("delimiter must not be empty"));
                }
                Self::Delimiter {
                    delimiter: config.delimiter.clone(),
                }
            }
            ChunkingMethod::Token => Self::Token {
                tokens_per_chunk: positive("tokens_per_chunk", config.tokens_per_chunk)?,
            },
            ChunkingMethod::Semantic => Self::Semantic {
                clusters: positive("semantic_clusters", config.semantic_clusters)?,
            },
        };

        Ok(strategy)
    }

    /// The method this strategy implements
    pub fn method(&self) -> ChunkingMethod {
        match self {
            Self::Character { .. } => ChunkingMethod::Character,
            Self::Word { .. } => ChunkingMethod::Word,
            Self::Sentence { .. } => ChunkingMethod::Sentence,
            Self::Paragraph => ChunkingMethod::Paragraph,
            Self::Delimiter { .. } => ChunkingMethod::Delimiter,
            Self::Token { .. } => ChunkingMethod::Token,
            Self::Semantic { .. } => ChunkingMethod::Semantic,
        }
    }
}

fn positive(name: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(Error::invalid_config(format!(
            "{} must be a positive integer",
            name
        )));
    }
    Ok(value)
}

/// Splits text into ordered chunks with one strategy
pub struct TextChunker {
    strategy: ChunkingStrategy,
    /// Sentence embedder, only needed by the semantic strategy
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl TextChunker {
    /// Create a chunker for a non-semantic strategy
    pub fn new(strategy: ChunkingStrategy) -> Self {
        Self {
            strategy,
            embedder: None,
        }
    }

    /// Attach the sentence embedder used by the semantic strategy
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Active strategy
    pub fn strategy(&self) -> &ChunkingStrategy {
        &self.strategy
    }

    /// Chunk the text
    pub async fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let chunks = match &self.strategy {
            ChunkingStrategy::Semantic { clusters } => {
                let embedder = self.embedder.as_deref().ok_or_else(|| {
                    Error::invalid_config("semantic chunking requires a sentence embedder")
                })?;
                chunk_by_semantic(text, *clusters, embedder).await?
            }
            strategy => chunk_sync(strategy, text)?,
        };

        tracing::debug!(
            "Chunked {} chars into {} chunks ({})",
            text.chars().count(),
            chunks.len(),
            self.strategy.method()
        );

        Ok(chunks)
    }
}

/// Chunk with any strategy that needs no collaborator
fn chunk_sync(strategy: &ChunkingStrategy, text: &str) -> Result<Vec<String>> {
    let chunks = match strategy {
        ChunkingStrategy::Character { chunk_size } => chunk_by_character(text, *chunk_size),
        ChunkingStrategy::Word { words_per_chunk } => chunk_by_word(text, *words_per_chunk),
        ChunkingStrategy::Sentence {
            sentences_per_chunk,
        } => join_windows(&split_sentences(text), *sentences_per_chunk),
        ChunkingStrategy::Paragraph => split_and_strip(text, "\n"),
        ChunkingStrategy::Delimiter { delimiter } => split_and_strip(text, delimiter),
        ChunkingStrategy::Token { tokens_per_chunk } => {
            join_windows(&split_tokens(text), *tokens_per_chunk)
        }
        ChunkingStrategy::Semantic { .. } => {
            return Err(Error::internal("semantic chunking is asynchronous"));
        }
    };
    Ok(chunks)
}

/// Non-overlapping windows of `chunk_size` characters; the last may be shorter
fn chunk_by_character(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect())
        .collect()
}

fn chunk_by_word(text: &str, words_per_chunk: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    join_windows(&words, words_per_chunk)
}

/// Group segments into windows of `size` and join each with single spaces
fn join_windows(segments: &[&str], size: usize) -> Vec<String> {
    segments.chunks(size).map(|window| window.join(" ")).collect()
}

fn split_and_strip(text: &str, delimiter: &str) -> Vec<String> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

async fn chunk_by_semantic(
    text: &str,
    clusters: usize,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<String>> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Ok(Vec::new());
    }

    let inputs: Vec<String> = sentences.iter().map(|s| s.to_string()).collect();
    let embeddings = embedder.embed_batch(&inputs).await?;
    if embeddings.len() != sentences.len() {
        return Err(Error::embedding(format!(
            "Expected {} sentence embeddings, got {}",
            sentences.len(),
            embeddings.len()
        )));
    }

    let k = clusters.min(sentences.len());
    let labels = KMeans::new(k).fit_predict(&embeddings)?;

    let mut groups: Vec<Vec<&str>> = vec![Vec::new(); k];
    for (sentence, label) in sentences.iter().copied().zip(labels) {
        groups[label].push(sentence);
    }

    Ok(groups
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| group.join(" "))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn chunk(strategy: ChunkingStrategy, text: &str) -> Vec<String> {
        tokio_test::block_on(TextChunker::new(strategy).chunk(text)).unwrap()
    }

    /// Embeds a sentence by whether it mentions cats or dogs
    struct TopicEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            if lower.contains("cat") {
                Ok(vec![1.0, 0.0])
            } else if lower.contains("dog") {
                Ok(vec![0.0, 1.0])
            } else {
                Ok(vec![0.5, 0.5])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "topic"
        }
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("token".parse::<ChunkingMethod>().unwrap(), ChunkingMethod::Token);
        assert_eq!(ChunkingMethod::Semantic.to_string(), "semantic");
        assert!(matches!(
            "Character".parse::<ChunkingMethod>(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_strategy_from_config() {
        let config = PipelineConfig {
            method: "sentence".to_string(),
            sentences_per_chunk: 2,
            ..Default::default()
        };
        assert_eq!(
            ChunkingStrategy::from_config(&config).unwrap(),
            ChunkingStrategy::Sentence {
                sentences_per_chunk: 2
            }
        );

        let zero = PipelineConfig {
            method: "word".to_string(),
            words_per_chunk: 0,
            ..Default::default()
        };
        assert!(ChunkingStrategy::from_config(&zero).is_err());

        let empty_delimiter = PipelineConfig {
            method: "delimiter".to_string(),
            delimiter: String::new(),
            ..Default::default()
        };
        assert!(ChunkingStrategy::from_config(&empty_delimiter).is_err());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let strategies = vec![
            ChunkingStrategy::Character { chunk_size: 4 },
            ChunkingStrategy::Word { words_per_chunk: 2 },
            ChunkingStrategy::Sentence {
                sentences_per_chunk: 2,
            },
            ChunkingStrategy::Paragraph,
            ChunkingStrategy::Delimiter {
                delimiter: "|".to_string(),
            },
            ChunkingStrategy::Token { tokens_per_chunk: 3 },
        ];
        for strategy in strategies {
            assert!(chunk(strategy.clone(), "").is_empty(), "{:?}", strategy);
        }
    }

    #[test]
    fn test_character_chunks_reassemble() {
        let text = "The Transformer uses self-attention, über fast.";
        for size in [1, 3, 7, 10, 200] {
            let chunks = chunk(ChunkingStrategy::Character { chunk_size: size }, text);
            let len = text.chars().count();
            assert_eq!(chunks.len(), len.div_ceil(size));
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= size));
        }
    }

    #[test]
    fn test_character_exact_multiple() {
        let chunks = chunk(ChunkingStrategy::Character { chunk_size: 3 }, "abcdef");
        assert_eq!(chunks, vec!["abc", "def"]);
    }

    #[test]
    fn test_word_chunks() {
        let text = "  one two\tthree\n\nfour five  six seven ";
        let chunks = chunk(ChunkingStrategy::Word { words_per_chunk: 3 }, text);
        assert_eq!(chunks, vec!["one two three", "four five six", "seven"]);

        let normalized: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunks.join(" "), normalized.join(" "));
    }

    #[test]
    fn test_sentence_chunks() {
        let chunks = chunk(
            ChunkingStrategy::Sentence {
                sentences_per_chunk: 2,
            },
            "A. B. C. D.",
        );
        assert_eq!(chunks, vec!["A. B.", "C. D."]);

        let chunks = chunk(
            ChunkingStrategy::Sentence {
                sentences_per_chunk: 2,
            },
            "One. Two. Three.",
        );
        assert_eq!(chunks, vec!["One. Two.", "Three."]);
    }

    #[test]
    fn test_paragraph_chunks() {
        let text = "First line.\n\n   \n  Second line.  \nThird.";
        let chunks = chunk(ChunkingStrategy::Paragraph, text);
        assert_eq!(chunks, vec!["First line.", "Second line.", "Third."]);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    }

    #[test]
    fn test_delimiter_chunks() {
        let text = "alpha ## beta##  ## gamma ##";
        let chunks = chunk(
            ChunkingStrategy::Delimiter {
                delimiter: "##".to_string(),
            },
            text,
        );
        assert_eq!(chunks, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_token_chunks() {
        let chunks = chunk(
            ChunkingStrategy::Token { tokens_per_chunk: 3 },
            "Hello, world! Bye.",
        );
        assert_eq!(chunks, vec!["Hello , world", "! Bye ."]);
    }

    #[tokio::test]
    async fn test_semantic_groups_sentences() {
        let text = "Cats purr. Dogs bark. The cat sleeps. A dog runs.";
        let chunker = TextChunker::new(ChunkingStrategy::Semantic { clusters: 2 })
            .with_embedder(Arc::new(TopicEmbedder));
        let chunks = chunker.chunk(text).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks.contains(&"Cats purr. The cat sleeps.".to_string()));
        assert!(chunks.contains(&"Dogs bark. A dog runs.".to_string()));
    }

    #[tokio::test]
    async fn test_semantic_covers_every_sentence_once() {
        let text = "Cats purr. Dogs bark. Birds sing. The cat sleeps.";
        let chunker = TextChunker::new(ChunkingStrategy::Semantic { clusters: 10 })
            .with_embedder(Arc::new(TopicEmbedder));
        let chunks = chunker.chunk(text).await.unwrap();

        let sentences = split_sentences(text);
        assert!(chunks.len() <= sentences.len().min(10));

        let mut emitted: Vec<&str> = chunks.iter().flat_map(|c| split_sentences(c)).collect();
        let mut expected = sentences.clone();
        emitted.sort_unstable();
        expected.sort_unstable();
        assert_eq!(emitted, expected);
    }

    #[tokio::test]
    async fn test_semantic_without_embedder_fails() {
        let chunker = TextChunker::new(ChunkingStrategy::Semantic { clusters: 2 });
        assert!(matches!(
            chunker.chunk("One. Two.").await,
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_semantic_empty_text() {
        let chunker = TextChunker::new(ChunkingStrategy::Semantic { clusters: 3 })
            .with_embedder(Arc::new(TopicEmbedder));
        assert!(chunker.chunk("").await.unwrap().is_empty());
    }
}
