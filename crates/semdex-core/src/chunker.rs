//! Deterministic text chunking.
//!
//! Text is split on a separator into sections which are packed into chunks of
//! at most `size` characters. Sections that are too large on their own are
//! broken at sentence boundaries, and sentences that are still too large are
//! cut at character boundaries. With `overlap > 0` every chunk after the first
//! starts with the trailing words (up to `overlap` characters) of the chunk
//! before it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Chunk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Maximum chunk length in characters.
    pub size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub overlap: usize,
    pub separator: String,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self { size: 1000, overlap: 0, separator: "\n\n".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    Separator,
    Space,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    opts: ChunkOptions,
}

impl Chunker {
    pub fn new(opts: ChunkOptions) -> Result<Self> {
        if opts.size == 0 {
            return Err(Error::InvalidConfig("chunk size must be greater than zero".into()));
        }
        if opts.overlap >= opts.size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                opts.overlap, opts.size
            )));
        }
        if opts.separator.is_empty() {
            return Err(Error::InvalidConfig("chunk separator must not be empty".into()));
        }
        Ok(Self { opts })
    }

    pub fn options(&self) -> &ChunkOptions {
        &self.opts
    }

    /// Split `text` into ordered, non-empty chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.opts.size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut buf = String::new();
        for (unit, joiner) in self.units(text) {
            if buf.is_empty() {
                buf = unit;
                continue;
            }
            let joiner = self.joiner_str(joiner);
            if char_len(&buf) + char_len(joiner) + char_len(&unit) <= self.opts.size {
                buf.push_str(joiner);
                buf.push_str(&unit);
                continue;
            }
            let seed = self.overlap_tail(&buf);
            push_chunk(&mut chunks, &buf);
            buf = match seed {
                Some(seed) if char_len(&seed) + 1 + char_len(&unit) <= self.opts.size => format!("{seed} {unit}"),
                _ => unit,
            };
        }
        push_chunk(&mut chunks, &buf);
        chunks
    }

    /// Chunk `text` and annotate every chunk with its position.
    pub fn chunk_document(&self, text: &str) -> Vec<Chunk> {
        let pieces = self.chunk(text);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk { text, index, total })
            .collect()
    }

    fn joiner_str(&self, joiner: Joiner) -> &str {
        match joiner {
            Joiner::Separator => &self.opts.separator,
            Joiner::Space => " ",
        }
    }

    fn units(&self, text: &str) -> Vec<(String, Joiner)> {
        let mut units = Vec::new();
        for section in text.split(self.opts.separator.as_str()) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }
            if char_len(section) <= self.opts.size {
                units.push((section.to_string(), Joiner::Separator));
                continue;
            }
            let mut joiner = Joiner::Separator;
            for sentence in split_sentences(section) {
                for part in hard_split(sentence, self.opts.size) {
                    units.push((part, joiner));
                    joiner = Joiner::Space;
                }
            }
        }
        units
    }

    /// Trailing words of `chunk` spanning at most `overlap` characters.
    fn overlap_tail(&self, chunk: &str) -> Option<String> {
        if self.opts.overlap == 0 {
            return None;
        }
        let (start, _) = chunk.char_indices().rev().nth(self.opts.overlap - 1)?;
        if start == 0 {
            return None;
        }
        let tail = &chunk[start..];
        let tail = if chunk[..start].ends_with(char::is_whitespace) {
            tail
        } else {
            &tail[tail.find(char::is_whitespace)?..]
        };
        let tail = tail.trim();
        (!tail.is_empty()).then(|| tail.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_chunk(chunks: &mut Vec<String>, buf: &str) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Sentences end after `.`, `!` or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, c) in text.char_indices() {
        if prev_terminal && c.is_whitespace() {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i;
        }
        prev_terminal = matches!(c, '.' | '!' | '?');
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn hard_split(text: &str, size: usize) -> Vec<String> {
    if char_len(text) <= size {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|c| c.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
