//! Fixed-budget chunking with a sliding overlap.
//!
//! Chunk boundaries come from `semchunk-rs`, which prefers sentence and word boundaries. Budgets
//! are measured either in characters (the default, 600 with a 75 overlap) or in `cl100k_base`
//! tokens via `tiktoken-rs`.
//!
//! semchunk is asked for segments of `chunk_size - overlap` units, leaving room for the overlap.
//! Its output can run a few units over when it rejoins splits, so every segment then passes
//! through `enforce_budget`, which re-splits oversized ones at word ends (characters as a last
//! resort) without dropping text. Each chunk but the first is finally prefixed with the tail of
//! its predecessor's segment. Tails start on a word boundary whenever one fits and shrink until
//! the joined chunk is within `chunk_size`.

use crate::config::ChunkUnit;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::cl100k_base;

use super::types::ChunkingError;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Size budget for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingSettings {
    /// Hard upper bound per chunk, in `unit`.
    pub chunk_size: usize,
    /// Requested overlap between neighbours, in `unit`. Clamped below `chunk_size`.
    pub overlap: usize,
    /// Unit of measure for both values.
    pub unit: ChunkUnit,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            overlap: 75,
            unit: ChunkUnit::Characters,
        }
    }
}

/// Reusable chunker; building the token counter once avoids reloading BPE tables per document.
#[derive(Clone)]
pub struct TextChunker {
    settings: ChunkingSettings,
    counter: TokenCounter,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Validate the settings and prepare the counter for the configured unit.
    pub fn new(settings: ChunkingSettings) -> Result<Self, ChunkingError> {
        if settings.chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        let counter = match settings.unit {
            ChunkUnit::Characters => char_counter(),
            ChunkUnit::Tokens => tiktoken_counter()?,
        };
        Ok(Self { settings, counter })
    }

    /// Settings this chunker was built with.
    pub fn settings(&self) -> ChunkingSettings {
        self.settings
    }

    /// Split `text` into overlapping chunks. Whitespace-only input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        chunk_text_with_counter(
            text,
            self.settings.chunk_size,
            self.settings.overlap,
            self.counter.clone(),
        )
    }
}

/// One-shot convenience wrapper around [`TextChunker`].
pub fn chunk_text(text: &str, settings: &ChunkingSettings) -> Result<Vec<String>, ChunkingError> {
    Ok(TextChunker::new(*settings)?.chunk(text))
}

fn char_counter() -> TokenCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn tiktoken_counter() -> Result<TokenCounter, ChunkingError> {
    let encoding = cl100k_base().map_err(|source| ChunkingError::Tokenizer {
        encoding: "cl100k_base".to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);
    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    token_counter: TokenCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    let segment_size = chunk_size.saturating_sub(effective_overlap).max(1);

    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        segment_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let segments = chunker
        .chunk(text)
        .into_iter()
        .filter(|chunk| !chunk.trim().is_empty());
    let segments = enforce_budget(segments, segment_size, &token_counter);
    apply_overlap(segments, chunk_size, effective_overlap, &token_counter)
}

/// Re-split any segment over `budget` so every returned piece fits it.
fn enforce_budget(
    segments: impl IntoIterator<Item = String>,
    budget: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let mut pieces = Vec::new();
    for segment in segments {
        if token_counter.as_ref()(&segment) <= budget {
            pieces.push(segment);
            continue;
        }
        let mut rest = segment.trim();
        while !rest.is_empty() {
            if token_counter.as_ref()(rest) <= budget {
                pieces.push(rest.to_string());
                break;
            }
            let cut = prefix_within_budget(rest, budget, token_counter);
            let (head, tail) = rest.split_at(cut);
            let head = head.trim_end();
            if !head.is_empty() {
                pieces.push(head.to_string());
            }
            rest = tail.trim_start();
        }
    }
    pieces
}

/// Byte length of the longest prefix of `text` within `budget`, ending on a word when possible.
/// Always covers at least one character so callers make progress.
fn prefix_within_budget(text: &str, budget: usize, token_counter: &TokenCounter) -> usize {
    let mut best_word_end = None;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                if token_counter.as_ref()(&text[..idx]) > budget {
                    break;
                }
                best_word_end = Some(idx);
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if let Some(end) = best_word_end {
        return end;
    }

    let mut best = text.chars().next().map_or(text.len(), char::len_utf8);
    for (idx, ch) in text.char_indices().skip(1) {
        let end = idx + ch.len_utf8();
        if token_counter.as_ref()(&text[..end]) > budget {
            break;
        }
        best = end;
    }
    best
}

/// Prefix each segment but the first with a tail of the previous segment, keeping the joined
/// chunk within `chunk_size`.
fn apply_overlap(
    segments: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    if segments.len() < 2 || overlap == 0 {
        return segments;
    }

    let mut overlapped = Vec::with_capacity(segments.len());
    let mut previous: Option<&str> = None;

    for current in &segments {
        let chunk = match previous {
            Some(prev) => build_overlapped_chunk(prev, current, overlap, chunk_size, token_counter),
            None => current.clone(),
        };
        overlapped.push(chunk);
        previous = Some(current.as_str());
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    token_counter: &TokenCounter,
) -> String {
    let mut tail_budget = overlap;
    while tail_budget > 0 {
        let tail = trim_front_to_budget(previous, tail_budget, token_counter);
        if tail.is_empty() {
            break;
        }
        let combined = join_with_tail(tail, current);
        if token_counter.as_ref()(&combined) <= chunk_size {
            return combined;
        }
        tail_budget = token_counter.as_ref()(tail).min(tail_budget).saturating_sub(1);
    }
    current.to_string()
}

fn join_with_tail(tail: &str, current: &str) -> String {
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);
    combined.push_str(tail);
    if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
        combined.push(' ');
    }
    combined.push_str(current);
    combined
}

/// Longest suffix of `text` that fits `budget`, preferring suffixes that start a word.
fn trim_front_to_budget<'a>(text: &'a str, budget: usize, token_counter: &TokenCounter) -> &'a str {
    if budget == 0 {
        return "";
    }

    let trimmed = text.trim_start();
    if token_counter.as_ref()(trimmed) <= budget {
        return trimmed;
    }

    let word_starts = text.char_indices().filter_map(|(idx, ch)| {
        let follows_space = text[..idx]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        (idx > 0 && follows_space && !ch.is_whitespace()).then_some(idx)
    });
    for start in word_starts {
        let candidate = &text[start..];
        if token_counter.as_ref()(candidate) <= budget {
            return candidate;
        }
    }

    for (start, _) in text.char_indices().skip(1) {
        let candidate = text[start..].trim_start();
        if token_counter.as_ref()(candidate) <= budget {
            return candidate;
        }
    }

    ""
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitespace_counter() -> TokenCounter {
        Arc::new(|segment: &str| {
            let tokens = segment.split_whitespace().count();
            if tokens == 0 && !segment.is_empty() {
                1
            } else {
                tokens
            }
        })
    }

    #[test]
    fn chunk_text_respects_chunk_size_whitespace_counter() {
        let text = "one two three four five";
        let chunks = chunk_text_with_counter(text, 2, 0, whitespace_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn overlap_carries_previous_tail() {
        let text = "one two three four five";
        let counter = whitespace_counter();
        let chunks = chunk_text_with_counter(text, 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two", "two three four", "four five"]);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 3);
        }
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let settings = ChunkingSettings {
            chunk_size: 0,
            ..ChunkingSettings::default()
        };
        let error = chunk_text("hello", &settings).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn whitespace_only_text_has_no_chunks() {
        let chunks = chunk_text(" \n\t ", &ChunkingSettings::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("A short note.", &ChunkingSettings::default()).unwrap();
        assert_eq!(chunks, vec!["A short note."]);
    }

    #[test]
    fn character_budget_holds_with_overlap() {
        let words = [
            "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota",
            "kappa", "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau",
        ];
        let text = words.join(" ");
        let settings = ChunkingSettings {
            chunk_size: 24,
            overlap: 8,
            unit: ChunkUnit::Characters,
        };
        let chunks = chunk_text(&text, &settings).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 24, "chunk too long: {chunk:?}");
        }
        for word in words {
            assert!(
                chunks.iter().any(|chunk| chunk.split(' ').any(|w| w == word)),
                "word {word} lost"
            );
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|n| format!("word{n}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Length in bytes of the longest suffix of `previous` that `current` starts with.
    fn shared_prefix_len(previous: &str, current: &str) -> usize {
        (1..=previous.len())
            .rev()
            .filter(|&len| previous.is_char_boundary(previous.len() - len))
            .find(|&len| current.starts_with(&previous[previous.len() - len..]))
            .unwrap_or(0)
    }

    #[test]
    fn default_settings_overlap_every_full_chunk() {
        let text = numbered_words(700);
        let chunks = chunk_text(&text, &ChunkingSettings::default()).unwrap();
        assert!(chunks.len() > 5, "expected many chunks, got {}", chunks.len());

        for pair in chunks.windows(2) {
            let shared = shared_prefix_len(&pair[0], &pair[1]);
            assert!(
                shared >= 40,
                "only {shared} bytes carried over between {:?} and {:?}",
                &pair[0][pair[0].len().saturating_sub(30)..],
                &pair[1][..30.min(pair[1].len())]
            );
            assert!(shared <= 75);
        }
    }

    #[test]
    fn character_budget_holds_at_realistic_sizes() {
        let text = numbered_words(700);
        for chunk_size in [100, 200, 300, 600] {
            for overlap in [0, chunk_size / 8] {
                let settings = ChunkingSettings {
                    chunk_size,
                    overlap,
                    unit: ChunkUnit::Characters,
                };
                let chunks = chunk_text(&text, &settings).unwrap();
                let longest = chunks.iter().map(|c| c.chars().count()).max().unwrap();
                assert!(
                    longest <= chunk_size,
                    "size {chunk_size} overlap {overlap}: longest chunk {longest}"
                );
                let last = chunks.last().unwrap();
                assert!(last.ends_with("word699"));
            }
        }
    }

    #[test]
    fn no_overlap_keeps_every_word_once() {
        let text = numbered_words(300);
        let settings = ChunkingSettings {
            chunk_size: 100,
            overlap: 0,
            unit: ChunkUnit::Characters,
        };
        let chunks = chunk_text(&text, &settings).unwrap();
        let chunk_words: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original_words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunk_words, original_words);
    }

    #[test]
    fn enforce_budget_resplits_oversized_segments() {
        let counter = char_counter();
        let segments = vec![
            "fits".to_string(),
            "alpha beta gamma delta".to_string(),
            "abcdefghijkl".to_string(),
        ];
        let pieces = enforce_budget(segments, 11, &counter);
        assert_eq!(
            pieces,
            vec!["fits", "alpha beta", "gamma delta", "abcdefghijk", "l"]
        );
    }

    #[test]
    fn overlap_is_clamped_below_chunk_size() {
        let counter = whitespace_counter();
        let chunks = chunk_text_with_counter("a b c d e f", 2, 10, counter.clone());
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 2);
        }
        assert_eq!(chunks[..2], ["a", "a b"]);
    }

    #[test]
    fn trim_front_prefers_word_boundaries() {
        let counter = char_counter();
        assert_eq!(trim_front_to_budget("hello brave world", 11, &counter), "brave world");
        assert_eq!(trim_front_to_budget("hello brave world", 9, &counter), "world");
        assert_eq!(trim_front_to_budget("hello brave world", 3, &counter), "rld");
        assert_eq!(trim_front_to_budget("short", 10, &counter), "short");
        assert_eq!(trim_front_to_budget("anything", 0, &counter), "");
    }

    #[test]
    fn token_unit_uses_tiktoken_budget() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let settings = ChunkingSettings {
            chunk_size: 5,
            overlap: 0,
            unit: ChunkUnit::Tokens,
        };
        let chunks = chunk_text(text, &settings).expect("chunking succeeded");
        let counter = tiktoken_counter().unwrap();
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 5);
        }
        let chunk_words: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original_words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunk_words, original_words);
    }
}
