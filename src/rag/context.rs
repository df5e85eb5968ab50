//! Prompt assembly and the extractive fallback.
//!
//! Retrieved chunks are formatted into a context block where every entry
//! carries a stable ordinal (`Source N`) plus whatever citation metadata is
//! available, so both the generative answer and the fallback can cite the
//! same way.

use crate::store::ScoredChunk;

const SYSTEM_INSTRUCTION: &str = "You are Weaver, an assistant that answers questions about a \
software project from its issue tracker and chat history.\n\
\n\
Answer using ONLY the numbered sources below. Cite sources as \"Source N\". \
If the sources do not contain enough information to answer, say so \
explicitly. Be concise but thorough, and synthesize across sources when \
several are relevant.";

/// Assemble the full single-shot prompt for the answer provider.
pub fn build_prompt(question: &str, sources: &[ScoredChunk], max_context_chars: usize) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\nQuestion: {question}\n\nContext from the project knowledge base:\n{}\n\n\
         Provide a helpful answer based on the above context. If the context \
         is insufficient, say what information would be needed.",
        format_sources(sources, max_context_chars)
    )
}

/// Format retrieved chunks as numbered, cited context entries.
///
/// Entries are added in rank order until the character budget would be
/// exceeded; an empty result set renders an explicit no-context signal
/// rather than an empty block.
pub fn format_sources(sources: &[ScoredChunk], max_context_chars: usize) -> String {
    if sources.is_empty() {
        return "No relevant documents found in the knowledge base.".to_string();
    }

    let mut formatted = Vec::new();
    let mut used = 0usize;

    for (i, scored) in sources.iter().enumerate() {
        let header = citation_header(i + 1, scored);
        let entry = format!("{header}\n{}\n{}\n", "-".repeat(50), scored.chunk.text);
        if used + entry.len() > max_context_chars && !formatted.is_empty() {
            break;
        }
        used += entry.len();
        formatted.push(entry);
    }

    formatted.join("\n")
}

fn citation_header(ordinal: usize, scored: &ScoredChunk) -> String {
    let meta = &scored.chunk.metadata;
    let source = meta.get("source").map(String::as_str).unwrap_or("unknown");
    let kind = meta.get("type").map(String::as_str).unwrap_or("document");

    let mut parts = vec![format!("Source {ordinal} ({source} {kind})")];
    if let Some(title) = meta.get("title") {
        parts.push(format!("Title: {title}"));
    }
    if let Some(author) = meta.get("author") {
        parts.push(format!("Author: {author}"));
    }
    if let Some(url) = meta.get("url") {
        parts.push(format!("URL: {url}"));
    }
    parts.join(" | ")
}

/// Best-effort answer built directly from retrieved chunks, used when the
/// answer provider is unavailable: the top 3 chunks contribute their first
/// two sentences each, under a citation header.
pub fn extractive_answer(question: &str, sources: &[ScoredChunk]) -> String {
    if sources.is_empty() {
        return no_information_answer(question);
    }

    let mut parts = vec![format!(
        "Based on the available information in the knowledge base, here are \
         the most relevant findings for your question: '{question}'\n"
    )];

    for (i, scored) in sources.iter().take(3).enumerate() {
        let mut header = format!("Source {}", i + 1);
        if let Some(title) = scored.chunk.metadata.get("title") {
            header.push_str(&format!(" - {title}"));
        }
        if let Some(source) = scored.chunk.metadata.get("source") {
            header.push_str(&format!(" ({source})"));
        }

        parts.push(format!("{header}:\n{}\n", excerpt(&scored.chunk.text)));
    }

    parts.push(
        "Note: this is a direct extract from the retrieved sources; the \
         answer-generation service was not available."
            .to_string(),
    );
    parts.join("\n")
}

/// The answer for a query that retrieved nothing.
pub fn no_information_answer(question: &str) -> String {
    format!(
        "I couldn't find any relevant information in the knowledge base to \
         answer: '{question}'. Try rephrasing the question, or ingest the \
         relevant repositories or channels first."
    )
}

/// First two sentences of a chunk, with an ellipsis when truncated.
fn excerpt(text: &str) -> String {
    let sentences: Vec<&str> = text.split(". ").collect();
    if sentences.len() <= 2 {
        return text.to_string();
    }
    format!("{}...", sentences[..2].join(". "))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::ingest::Chunk;

    use super::*;

    fn scored(id: &str, text: &str, title: Option<&str>, score: f32) -> ScoredChunk {
        let mut metadata = BTreeMap::from([
            ("source".to_string(), "github".to_string()),
            ("type".to_string(), "issue".to_string()),
        ]);
        if let Some(title) = title {
            metadata.insert("title".to_string(), title.to_string());
        }
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                text: text.to_string(),
                chunk_index: 0,
                total_chunks: 1,
                metadata,
            },
            score,
        }
    }

    #[test]
    fn sources_get_stable_ordinals_and_citations() {
        let sources = vec![
            scored("a", "First chunk text.", Some("Login bug"), 0.9),
            scored("b", "Second chunk text.", None, 0.5),
        ];
        let block = format_sources(&sources, 10_000);
        assert!(block.contains("Source 1 (github issue) | Title: Login bug"));
        assert!(block.contains("Source 2 (github issue)"));
        assert!(block.contains("First chunk text."));
        let pos1 = block.find("Source 1").unwrap();
        let pos2 = block.find("Source 2").unwrap();
        assert!(pos1 < pos2);
    }

    #[test]
    fn empty_retrieval_renders_the_no_context_signal() {
        let block = format_sources(&[], 10_000);
        assert!(block.contains("No relevant documents"));
    }

    #[test]
    fn context_respects_the_character_budget() {
        let long = "x".repeat(400);
        let sources = vec![
            scored("a", &long, None, 0.9),
            scored("b", &long, None, 0.8),
            scored("c", &long, None, 0.7),
        ];
        let block = format_sources(&sources, 600);
        assert!(block.contains("Source 1"));
        assert!(!block.contains("Source 2"));
    }

    #[test]
    fn prompt_contains_instruction_question_and_context() {
        let sources = vec![scored("a", "Chunk text.", None, 0.9)];
        let prompt = build_prompt("why does login fail", &sources, 10_000);
        assert!(prompt.contains("ONLY the numbered sources"));
        assert!(prompt.contains("Question: why does login fail"));
        assert!(prompt.contains("Source 1"));
    }

    #[test]
    fn extractive_answer_takes_two_sentences_from_top_three() {
        let sources = vec![
            scored("a", "One. Two. Three. Four.", Some("T1"), 0.9),
            scored("b", "Alpha. Beta. Gamma.", None, 0.8),
            scored("c", "Only sentence.", None, 0.7),
            scored("d", "Never included.", None, 0.6),
        ];
        let answer = extractive_answer("q", &sources);
        assert!(answer.contains("One. Two..."));
        assert!(!answer.contains("Three"));
        assert!(answer.contains("Alpha. Beta..."));
        assert!(answer.contains("Source 1 - T1 (github)"));
        assert!(answer.contains("Only sentence."));
        assert!(!answer.contains("Never included"));
    }

    #[test]
    fn no_sources_yields_the_ingest_hint() {
        let answer = extractive_answer("where is the deploy doc", &[]);
        assert!(answer.contains("couldn't find any relevant information"));
        assert!(answer.contains("ingest"));
    }
}
