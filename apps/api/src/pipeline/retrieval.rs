//! Semantic selection of accomplishments.
//!
//! Long accomplishment files are split into overlapping chunks, embedded along with
//! the job description, and only the closest chunks are handed to the resume prompt.
//! Short files pass through untouched.

use tracing::{info, warn};

use crate::llm_client::LlmClient;

pub const CHUNK_CHARS: usize = 1000;
pub const CHUNK_OVERLAP_CHARS: usize = 200;

/// Splits text into chunks of at most `chunk_chars` characters on line boundaries.
/// Consecutive chunks share up to `overlap_chars` of trailing lines. A single line
/// longer than a chunk is cut on character boundaries.
pub fn chunk_text(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let chunk_chars = chunk_chars.max(1);
    let pieces: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .flat_map(|line| split_long_line(line, chunk_chars))
        .collect();

    // Each piece costs its length plus the newline joining it to the next.
    let cost = |piece: &str| piece.chars().count() + 1;
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut used = 0;

    for piece in pieces {
        if !window.is_empty() && used + cost(piece) > chunk_chars + 1 {
            chunks.push(window.join("\n"));

            let mut start = window.len();
            let mut kept = 0;
            while start > 0 && kept + cost(window[start - 1]) <= overlap_chars {
                kept += cost(window[start - 1]);
                start -= 1;
            }
            window.drain(..start);
            used = kept;
            while !window.is_empty() && used + cost(piece) > chunk_chars + 1 {
                used -= cost(window.remove(0));
            }
        }
        used += cost(piece);
        window.push(piece);
    }
    if !window.is_empty() {
        chunks.push(window.join("\n"));
    }
    chunks
}

fn split_long_line(line: &str, max_chars: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = line;
    while rest.chars().count() > max_chars {
        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        parts.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    parts.push(rest);
    parts
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denominator = norm(a) * norm(b);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Keeps the `top_k` accomplishment chunks closest to the job description, in their
/// original order, joined by blank lines. Returns the text unchanged when it already
/// fits in `top_k` chunks or when the embedding call fails.
pub async fn select_relevant_accomplishments(
    llm: &LlmClient,
    accomplishments: &str,
    job_description: &str,
    top_k: usize,
) -> String {
    let chunks = chunk_text(accomplishments, CHUNK_CHARS, CHUNK_OVERLAP_CHARS);
    if top_k == 0 || chunks.len() <= top_k {
        return accomplishments.to_string();
    }

    let mut inputs = chunks.clone();
    inputs.push(format!("Job description: {job_description}"));
    let vectors = match llm.embed(&inputs).await {
        Ok(vectors) => vectors,
        Err(e) => {
            warn!("Accomplishment search failed, using every accomplishment: {e}");
            return accomplishments.to_string();
        }
    };
    let Some((query, chunk_vectors)) = vectors.split_last() else {
        return accomplishments.to_string();
    };

    let mut ranked: Vec<(usize, f32)> = chunk_vectors
        .iter()
        .map(|vector| cosine_similarity(vector, query))
        .enumerate()
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut keep: Vec<usize> = ranked.into_iter().take(top_k).map(|(i, _)| i).collect();
    keep.sort_unstable();

    info!(
        "Selected {} of {} accomplishment chunks for the job description",
        keep.len(),
        chunks.len()
    );
    keep.iter()
        .map(|&i| chunks[i].as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
