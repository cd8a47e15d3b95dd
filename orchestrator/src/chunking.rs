//! Text chunking and stable content ids for provenance and indexing.

use sha2::{Digest, Sha256};

pub const CHUNK_SIZE: usize = 1500;
pub const CHUNK_OVERLAP: usize = 200;
const ID_LEN: usize = 32;

/// Stable document id derived from locator and title.
pub fn stable_doc_id(url: &str, title: &str) -> String {
    short_hash(&format!("{url}::{title}"))
}

/// Stable chunk id derived from normalized content, parent doc and position.
pub fn chunk_id(chunk_text: &str, doc_id: &str, position: usize) -> String {
    let normalized = chunk_text.split_whitespace().collect::<Vec<_>>().join(" ");
    short_hash(&format!("{normalized}::{doc_id}::{position}"))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..ID_LEN].to_string()
}

/// Split text into overlapping character windows, breaking on whitespace
/// where possible so words stay intact.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![];
    }
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            // back up to the nearest whitespace, within reason
            let window_start = end.saturating_sub(100).max(start + 1);
            if let Some(ws) = (window_start..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }
        chunks.push(chars[start..end].iter().collect::<String>().trim().to_string());
        if end >= chars.len() {
            break;
        }
        start = (start + step).min(end);
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}
