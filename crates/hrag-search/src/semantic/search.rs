//! KNN scoring over stored document embeddings.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

/// A single semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: String,
    pub content: String,
    /// Cosine similarity mapped to `[0, 1]`.
    pub score: f32,
}

/// Score every stored row against `query_embedding` and keep the best
/// `limit`. Ties are broken by document id so ordering is stable.
///
/// Rows with a different dimension or an undecodable vector are skipped.
///
/// # Errors
///
/// Returns an error if the documents table cannot be read.
pub fn knn_search(
    db: &Connection,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<ScoredDocument>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = db
        .prepare("SELECT doc_id, content, embedding_json FROM documents")
        .context("failed to prepare semantic KNN query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("failed to execute semantic KNN query")?;

    let mut scored = Vec::new();
    for row in rows {
        let (doc_id, content, embedding_json) = row.context("failed to read semantic KNN row")?;
        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(value) => value,
            Err(err) => {
                debug!("skipping malformed embedding row for {doc_id}: {err}");
                continue;
            }
        };

        if embedding.len() != query_embedding.len() {
            debug!(
                "skipping embedding row for {doc_id} due to dimension {}",
                embedding.len()
            );
            continue;
        }

        let Some(cosine) = cosine_similarity(query_embedding, &embedding) else {
            continue;
        };
        let score = ((cosine + 1.0) * 0.5).clamp(0.0, 1.0);
        scored.push(ScoredDocument {
            doc_id,
            content,
            score,
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    scored.truncate(limit);

    Ok(scored)
}

/// `None` when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
