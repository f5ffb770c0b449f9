//! Exact cosine-similarity ranking over one in-memory collection.
//!
//! This is a linear O(n·d) scan with no index structure; it is meant for
//! collections up to the low hundreds of thousands of records.

use std::cmp::Ordering;

use semdex_core::types::{Collection, VectorRecord};
use semdex_core::{Error, Result};

/// A record paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub record: &'a VectorRecord,
    /// Position of the record in its collection.
    pub position: usize,
    pub score: f32,
}

/// Cosine similarity in [-1, 1]; 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    Ok(cosine_with_norm(a, norm(a), b))
}

/// Top `limit` records by similarity to `query`, highest first.
///
/// Ties keep collection order.
pub fn rank<'a>(query: &[f32], collection: &'a Collection, limit: usize) -> Result<Vec<Scored<'a>>> {
    if !collection.is_empty() && query.len() != collection.dimension() {
        return Err(Error::DimensionMismatch { expected: collection.dimension(), actual: query.len() });
    }
    let query_norm = norm(query);
    let mut scored: Vec<Scored<'a>> = collection
        .records()
        .iter()
        .enumerate()
        .map(|(position, record)| Scored {
            record,
            position,
            score: cosine_with_norm(query, query_norm, &record.embedding),
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

#[allow(clippy::cast_possible_truncation)]
fn cosine_with_norm(a: &[f32], a_norm: f64, b: &[f32]) -> f32 {
    let b_norm = norm(b);
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0) as f32
}
