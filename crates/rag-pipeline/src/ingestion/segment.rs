//! Sentence and token segmentation
//!
//! Both follow Unicode text segmentation (UAX #29). Tokens are word-level
//! segments and punctuation, which only approximates model-specific subword
//! tokenization.

use unicode_segmentation::UnicodeSegmentation;

/// Split text into trimmed, non-empty sentences
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split text into word and punctuation tokens, dropping whitespace
pub fn split_tokens(text: &str) -> Vec<&str> {
    text.split_word_bounds()
        .filter(|t| !t.trim().is_empty())
        .collect()
}
