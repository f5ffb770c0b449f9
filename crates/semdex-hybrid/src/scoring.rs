//! Lexical keyword scoring and the hybrid blend.

use std::cmp::Ordering;

use crate::types::RankedResult;

/// Average keyword hits at which the keyword score saturates.
pub const KEYWORD_CAP: f32 = 5.0;

/// Lowercase whitespace-separated keywords of `query`.
pub fn keywords(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Occurrences of every keyword in `text` (case-insensitive), averaged over
/// the keyword count, capped at [`KEYWORD_CAP`] and scaled into [0, 1].
#[allow(clippy::cast_precision_loss)]
pub fn keyword_score(keywords: &[String], text: &str) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let hits: usize = keywords.iter().map(|k| haystack.matches(k.as_str()).count()).sum();
    let average = hits as f32 / keywords.len() as f32;
    average.min(KEYWORD_CAP) / KEYWORD_CAP
}

/// Re-score `candidates` as `similarity * weight + keyword * (1 - weight)`,
/// sort by the blend (stable) and keep the best `limit`.
pub fn blend(query: &str, mut candidates: Vec<RankedResult>, semantic_weight: f32, limit: usize) -> Vec<RankedResult> {
    let keywords = keywords(query);
    for result in &mut candidates {
        let keyword = keyword_score(&keywords, &result.text);
        result.keyword_score = Some(keyword);
        result.score = result.similarity * semantic_weight + keyword * (1.0 - semantic_weight);
    }
    sort_by_score(&mut candidates);
    candidates.truncate(limit);
    candidates
}

/// Descending by active score; equal scores keep their current order.
pub fn sort_by_score(results: &mut [RankedResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
