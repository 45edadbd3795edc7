//! Text chunking for TTS processing.

use super::TextChunk;
use super::normalizer::normalize;

/// Default maximum chunk size in characters (the speech endpoint accepts 4096).
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 4000;

/// How far back from a window's end a boundary is searched for.
pub const BOUNDARY_SEARCH_WINDOW: usize = 200;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

/// Where to end the current window.
#[derive(Debug, PartialEq, Eq)]
enum Cut {
    /// Keep up to and including the terminator at this index.
    Sentence(usize),
    /// Keep everything before the whitespace at this index.
    Whitespace(usize),
    /// No boundary in range; cut at the window edge.
    Hard,
}

/// Split text into TTS-friendly chunks of at most `max_length` characters.
///
/// The text is normalized first. Cuts prefer the last sentence terminator in
/// the final 200 characters of each window, then the last whitespace there,
/// and split a word only when neither exists.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let text = normalize(text);

    if text.is_empty() {
        return Vec::new();
    }

    let max_length = max_length.max(1);
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= max_length {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut cursor = 0;

    while cursor < chars.len() {
        let end = (cursor + max_length).min(chars.len());
        let window = &chars[cursor..end];

        let (piece, advance) = if end < chars.len() {
            match find_cut(window) {
                Cut::Sentence(i) => (&window[..=i], i + 1),
                Cut::Whitespace(i) => (&window[..i], i + 1),
                Cut::Hard => (window, window.len()),
            }
        } else {
            (window, window.len())
        };

        cursor += advance;

        let chunk: String = piece.iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }

    chunks
}

/// Pick a cut point inside the tail of a full window.
fn find_cut(window: &[char]) -> Cut {
    let search_start = window.len().saturating_sub(BOUNDARY_SEARCH_WINDOW);
    let tail = &window[search_start..];

    let last_terminator = tail
        .iter()
        .rposition(|c| SENTENCE_TERMINATORS.contains(c))
        .map(|i| i + search_start)
        .filter(|&i| i > 0);
    if let Some(i) = last_terminator {
        return Cut::Sentence(i);
    }

    let last_space = tail
        .iter()
        .rposition(|c| c.is_whitespace())
        .map(|i| i + search_start)
        .filter(|&i| i > 0);
    if let Some(i) = last_space {
        return Cut::Whitespace(i);
    }

    Cut::Hard
}

/// Shorten text to at most `cap` characters for a backend with a hard limit.
///
/// Backs up to the last whitespace within the final 200 characters of the
/// cap so words stay whole; cuts mid-word only when there is none.
pub fn truncate_to_limit(text: &str, cap: usize) -> &str {
    let cap = cap.max(1);

    let Some((cut, _)) = text.char_indices().nth(cap) else {
        return text;
    };
    let head = &text[..cut];

    let boundary = head
        .char_indices()
        .rev()
        .take(BOUNDARY_SEARCH_WINDOW)
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .filter(|&i| i > 0);

    match boundary {
        Some(i) => {
            let trimmed = head[..i].trim_end();
            if trimmed.is_empty() { head } else { trimmed }
        }
        None => head,
    }
}

/// Normalize and chunk a document into indexed `TextChunk`s.
pub fn split_into_chunks(text: &str, max_length: usize) -> Vec<TextChunk> {
    chunk_text(text, max_length)
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk::new(index, text))
        .collect()
}
