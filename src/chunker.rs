//! Text chunker — splits arbitrary-length input into model-sized pieces.
//!
//! The acoustic model only accepts a bounded number of characters per call,
//! so every utterance is cut into chunks of at most
//! [`ChunkerConfig::max_length`] characters (Unicode scalar values, not bytes)
//! before it is sent to the preprocessing API.
//!
//! ## Boundary-priority mode (default)
//!
//! 1. Sentence-ending marks (`.` `;` `։` `․`) are rewritten to the strong
//!    marker, comma-like marks (`՝` `` ` ``) to the weak marker.
//! 2. While the remaining text is longer than the limit, the split point is
//!    the *last* occurrence inside the first `max_length` characters of, in
//!    order of preference: the strong marker, the weak marker, whitespace.
//!    A whitespace split appends the weak marker so the model still pauses.
//! 3. A single run longer than the limit with none of the above is hard-cut
//!    at `max_length`.
//!
//! ## Character-class mode
//!
//! Splits directly after every separator character.  Segments that are still
//! too long are re-packed word by word while the piece stays under half the
//! limit; no pause markers are inserted.
//!
//! Both modes trim every chunk and never emit a blank one.  A piece made
//! only of punctuation (`"..."` normalises to `":::"`) is not a chunk of its
//! own: it lends one mark to the previous chunk when that fits, otherwise it
//! is dropped.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Deserialize;

/// Model-imposed chunk length for the stock `arm-gor` model.
pub const DEFAULT_MAX_LENGTH: usize = 140;

/// Full stop, semicolon, Armenian full stop (U+0589) and one-dot leader (U+2024).
static RE_FULL_STOPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;։․.]").unwrap());
/// Armenian comma (U+055D) and backtick, which is commonly typed in its place.
static RE_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[՝`]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    #[default]
    BoundaryPriority,
    CharacterClass,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub mode: ChunkMode,
    /// Upper bound on chunk length in characters.  Zero is treated as one.
    pub max_length: usize,
    /// Canonical sentence boundary the model was trained on.
    pub strong_marker: char,
    /// Canonical phrase boundary, also appended after whitespace splits.
    pub weak_marker: char,
    /// Split characters for [`ChunkMode::CharacterClass`].
    pub separators: Vec<char>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            mode: ChunkMode::BoundaryPriority,
            max_length: DEFAULT_MAX_LENGTH,
            strong_marker: ':',
            weak_marker: ',',
            separators: vec!['.', '։', '․', ':', ';', ',', '՝', '`', '!', '?', '\n'],
        }
    }
}

/// Stateless splitter; [`Chunker::chunk`] is a pure function of its input.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

/// Split `text` with the default boundary-priority rules.
pub fn chunk(text: &str, max_length: usize) -> Vec<String> {
    Chunker::new(ChunkerConfig { max_length, ..Default::default() }).chunk(text)
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    fn max_length(&self) -> usize {
        self.config.max_length.max(1)
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        match self.config.mode {
            ChunkMode::BoundaryPriority => self.split_by_boundaries(text),
            ChunkMode::CharacterClass => self.split_by_separators(text),
        }
    }

    /// Rewrite punctuation variants to the two canonical markers.
    pub fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let strong = self.config.strong_marker.to_string();
        let weak = self.config.weak_marker.to_string();
        match RE_FULL_STOPS.replace_all(text, NoExpand(&strong)) {
            Cow::Borrowed(t) => RE_COMMAS.replace_all(t, NoExpand(&weak)),
            Cow::Owned(t) => Cow::Owned(RE_COMMAS.replace_all(&t, NoExpand(&weak)).into_owned()),
        }
    }

    fn split_by_boundaries(&self, text: &str) -> Vec<String> {
        let max = self.max_length();
        let strong = self.config.strong_marker;
        let weak = self.config.weak_marker;
        let is_mark = move |c: char| c == strong || c == weak;
        let normalized = self.normalize(text);

        let mut chunks = Vec::new();
        let mut rest = normalized.trim_start();
        while !rest.is_empty() {
            // Byte offset of the first character past the window.
            let Some((limit, _)) = rest.char_indices().nth(max) else {
                push_piece(&mut chunks, rest, max, is_mark);
                break;
            };
            let window = &rest[..limit];

            let (head, tail): (Cow<'_, str>, &str) =
                if let Some(i) = window.rfind(strong) {
                    let end = i + strong.len_utf8();
                    (Cow::Borrowed(&rest[..end]), &rest[end..])
                } else if let Some(i) = window.rfind(weak) {
                    let end = i + weak.len_utf8();
                    (Cow::Borrowed(&rest[..end]), &rest[end..])
                } else if let Some((i, ws)) = last_whitespace(window) {
                    let head = rest[..i].trim();
                    let head = if head.is_empty() {
                        Cow::Borrowed(head)
                    } else {
                        Cow::Owned(format!("{head}{weak}"))
                    };
                    (head, &rest[i + ws.len_utf8()..])
                } else {
                    log::debug!("no boundary within {max} characters, hard-cutting");
                    (Cow::Borrowed(window), &rest[limit..])
                };

            push_piece(&mut chunks, &head, max, is_mark);
            rest = tail.trim_start();
        }
        chunks
    }

    fn split_by_separators(&self, text: &str) -> Vec<String> {
        let max = self.max_length();
        let half = (max / 2).max(1);
        let separators = &self.config.separators;
        let is_mark = |c: char| separators.contains(&c);

        let mut chunks = Vec::new();
        for segment in text.split_inclusive(is_mark) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if segment.chars().count() <= max {
                push_piece(&mut chunks, segment, max, is_mark);
                continue;
            }

            let mut current = String::new();
            let mut current_len = 0;
            for word in segment.split_whitespace() {
                let word_len = word.chars().count();
                if word_len > max {
                    flush(&mut chunks, &mut current, &mut current_len);
                    hard_cut(&mut chunks, word, max);
                    continue;
                }
                if current_len > 0 && current_len + 1 + word_len >= half {
                    flush(&mut chunks, &mut current, &mut current_len);
                }
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.push_str(word);
                current_len += word_len;
            }
            flush(&mut chunks, &mut current, &mut current_len);
        }
        chunks
    }
}

/// Push `piece` trimmed.  Punctuation-only pieces are folded into the
/// previous chunk as a single mark, or dropped when there is no room.
fn push_piece(
    chunks: &mut Vec<String>,
    piece: &str,
    max: usize,
    is_mark: impl Fn(char) -> bool,
) {
    let piece = piece.trim();
    if piece.is_empty() {
        return;
    }
    if !piece.chars().all(&is_mark) {
        chunks.push(piece.to_string());
        return;
    }
    match chunks.last_mut() {
        Some(prev)
            if !prev.chars().last().is_some_and(&is_mark) && prev.chars().count() < max =>
        {
            prev.extend(piece.chars().next());
        }
        _ => log::debug!("dropping punctuation-only piece {piece:?}"),
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    if *current_len > 0 {
        chunks.push(std::mem::take(current));
        *current_len = 0;
    }
}

fn hard_cut(chunks: &mut Vec<String>, word: &str, max: usize) {
    let chars: Vec<char> = word.chars().collect();
    chunks.extend(chars.chunks(max).map(|piece| piece.iter().collect::<String>()));
}

/// Byte index and value of the last whitespace character in `s`.
fn last_whitespace(s: &str) -> Option<(usize, char)> {
    s.char_indices().rev().find(|(_, c)| c.is_whitespace())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
