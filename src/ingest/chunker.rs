//! Token-bounded chunking with paragraph-then-sentence fallback splitting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tokenizers::Tokenizer;

use crate::core::config::Settings;

use super::{chunk_id, normalize, Chunk};

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("static regex"))
}

/// Token counting for chunk budgeting.
///
/// Delegates to a `tokenizers` encoder when one is configured; otherwise
/// estimates `chars / 4`. The estimate shifts chunk boundaries slightly
/// relative to a true tokenizer but stays deterministic for the same input
/// and configuration.
pub struct TokenCounter {
    tokenizer: Option<Tokenizer>,
}

impl TokenCounter {
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.tokenizer_path {
            Some(path) => Self::from_file(path),
            None => Self::estimate_only(),
        }
    }

    pub fn from_file(path: &Path) -> Self {
        match Tokenizer::from_file(path) {
            Ok(tokenizer) => Self {
                tokenizer: Some(tokenizer),
            },
            Err(err) => {
                tracing::warn!(
                    "Could not load tokenizer from {}: {}; using character estimate",
                    path.display(),
                    err
                );
                Self::estimate_only()
            }
        }
    }

    pub fn estimate_only() -> Self {
        Self { tokenizer: None }
    }

    pub fn count(&self, text: &str) -> usize {
        if let Some(tokenizer) = &self.tokenizer {
            if let Ok(encoding) = tokenizer.encode(text, false) {
                return encoding.get_ids().len();
            }
        }
        text.chars().count() / 4
    }
}

/// Splits normalized text into chunks of at most `chunk_size` tokens.
///
/// Stateless between calls; the same input and configuration always produce
/// the same chunks.
pub struct Chunker {
    chunk_size: usize,
    counter: TokenCounter,
}

impl Chunker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            counter: TokenCounter::from_settings(settings),
        }
    }

    #[cfg(test)]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            counter: TokenCounter::estimate_only(),
        }
    }

    /// Chunk `text`, attaching a copy of `metadata` (plus positional fields)
    /// to every chunk. Ids derive from the metadata's `source` and `id` keys.
    ///
    /// Never fails: empty or whitespace-only text yields an empty vec. A
    /// single sentence that alone exceeds the budget is emitted whole — the
    /// one documented exception to the size bound; content is never dropped
    /// or truncated.
    pub fn chunk(&self, text: &str, metadata: &BTreeMap<String, String>) -> Vec<Chunk> {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return Vec::new();
        }

        let texts = if self.counter.count(&cleaned) <= self.chunk_size {
            vec![cleaned]
        } else {
            self.split_paragraphs(&cleaned)
        };

        let source = metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or("unknown");
        let record_id = metadata.get("id").map(String::as_str).unwrap_or("unknown");

        let total_chunks = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| {
                let mut meta = metadata.clone();
                meta.insert("chunk_index".to_string(), chunk_index.to_string());
                meta.insert("total_chunks".to_string(), total_chunks.to_string());
                Chunk {
                    id: chunk_id(source, record_id, chunk_index),
                    text,
                    chunk_index,
                    total_chunks,
                    metadata: meta,
                }
            })
            .collect()
    }

    /// Greedy paragraph accumulation; paragraphs over budget fall through to
    /// sentence granularity.
    fn split_paragraphs(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let candidate = join(&current, paragraph, "\n\n");
            if self.counter.count(&candidate) <= self.chunk_size {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }

            if self.counter.count(paragraph) > self.chunk_size {
                self.split_sentences(paragraph, &mut current, &mut chunks);
            } else {
                current = paragraph.to_string();
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn split_sentences(&self, paragraph: &str, current: &mut String, chunks: &mut Vec<String>) {
        for sentence in sentence_re().split(paragraph) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence = format!("{sentence}.");

            let candidate = join(current, &sentence, " ");
            if self.counter.count(&candidate) <= self.chunk_size {
                *current = candidate;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(current));
            }

            if self.counter.count(&sentence) > self.chunk_size {
                // Atomic oversized sentence: emitted whole.
                chunks.push(sentence);
            } else {
                *current = sentence;
            }
        }
    }
}

fn join(current: &str, next: &str, separator: &str) -> String {
    if current.is_empty() {
        next.to_string()
    } else {
        format!("{current}{separator}{next}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str, id: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("source".to_string(), source.to_string()),
            ("id".to_string(), id.to_string()),
        ])
    }

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = Chunker::with_chunk_size(100);
        assert!(chunker.chunk("", &meta("github", "1")).is_empty());
        assert!(chunker.chunk("  \n\n ", &meta("github", "1")).is_empty());
    }

    #[test]
    fn short_text_is_a_single_normalized_chunk() {
        let chunker = Chunker::with_chunk_size(100);
        let chunks = chunker.chunk("Login  fails when token expires.", &meta("github", "42"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Login fails when token expires.");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].id, "github_42_0");
        assert_eq!(chunks[0].metadata.get("chunk_index").unwrap(), "0");
        assert_eq!(chunks[0].metadata.get("total_chunks").unwrap(), "1");
    }

    #[test]
    fn long_text_splits_on_paragraphs_within_budget() {
        // ~25 tokens per paragraph under the chars/4 estimate.
        let paragraph = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu.";
        let text = vec![paragraph; 6].join("\n\n");
        let chunker = Chunker::with_chunk_size(40);

        let chunks = chunker.chunk(&text, &meta("github", "7"));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunker.counter.count(&chunk.text) <= 40);
        }
    }

    #[test]
    fn chunk_indices_cover_zero_to_n_with_shared_total() {
        let paragraph = "one two three four five six seven eight nine ten eleven twelve.";
        let text = vec![paragraph; 8].join("\n\n");
        let chunker = Chunker::with_chunk_size(30);

        let chunks = chunker.chunk(&text, &meta("slack", "C1"));
        let n = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, n);
            assert_eq!(chunk.metadata.get("total_chunks").unwrap(), &n.to_string());
        }
    }

    #[test]
    fn no_content_is_dropped() {
        let paragraph = "aaa bbb ccc ddd eee fff ggg hhh. iii jjj kkk lll mmm nnn ooo ppp.";
        let text = vec![paragraph; 5].join("\n\n");
        let chunker = Chunker::with_chunk_size(20);

        let chunks = chunker.chunk(&text, &meta("github", "9"));
        let recombined: String = chunks.iter().map(|c| strip_ws(&c.text)).collect();
        assert_eq!(recombined, strip_ws(&normalize(&text)));
    }

    #[test]
    fn oversized_paragraph_falls_back_to_sentences() {
        let text = "Short one. Another short one. Yet another sentence here. And one more to overflow the budget.";
        let chunker = Chunker::with_chunk_size(10);

        let chunks = chunker.chunk(text, &meta("github", "3"));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.ends_with('.'));
        }
    }

    #[test]
    fn oversized_atomic_sentence_is_kept_whole() {
        let long_sentence =
            "this single sentence has no terminal punctuation until the very end and is far longer than the configured chunk budget allows";
        let chunker = Chunker::with_chunk_size(5);

        let chunks = chunker.chunk(long_sentence, &meta("github", "11"));
        assert_eq!(chunks.len(), 1);
        assert!(chunker.counter.count(&chunks[0].text) > 5);
        assert!(chunks[0].text.contains("terminal punctuation"));
    }

    #[test]
    fn chunking_is_deterministic() {
        let paragraph = "alpha beta gamma delta epsilon zeta eta theta iota kappa.";
        let text = vec![paragraph; 10].join("\n\n");
        let chunker = Chunker::with_chunk_size(25);

        let a = chunker.chunk(&text, &meta("github", "5"));
        let b = chunker.chunk(&text, &meta("github", "5"));
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(b.iter()) {
            assert_eq!(left.id, right.id);
            assert_eq!(left.text, right.text);
        }
    }
}
