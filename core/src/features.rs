//! Hashing-trick feature map.
//!
//! Page text becomes a fixed `DIMENSION`-wide term-frequency vector plus a
//! short keyword list. Distinct tokens are folded into buckets with a 32-bit
//! polynomial string hash; collisions accumulate.

use crate::tokenizer::{keyword_tokens, tokenize};
use std::collections::HashMap;

pub const DIMENSION: usize = 100;
/// Number of distinct tokens folded into the vector unless configured otherwise.
pub const DEFAULT_TOKEN_CAP: usize = 50;
pub const MAX_KEYWORDS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PageFeatures {
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
}

impl PageFeatures {
    pub fn empty() -> Self {
        Self { embedding: vec![0.0; DIMENSION], keywords: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    token_cap: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self { Self::new(DEFAULT_TOKEN_CAP) }
}

impl FeatureExtractor {
    /// `token_cap` bounds how many distinct tokens reach the vector. Tokens are
    /// taken in first-occurrence order, so for pages with more distinct tokens
    /// than the cap the result depends on where words appear, not only which.
    pub fn new(token_cap: usize) -> Self { Self { token_cap } }

    pub fn token_cap(&self) -> usize { self.token_cap }

    /// Total over all inputs: blank text yields the zero vector and no keywords.
    pub fn extract(&self, text: &str) -> PageFeatures {
        PageFeatures { embedding: self.embed(text), keywords: keywords(text) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; DIMENSION];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return embedding;
        }
        let total = tokens.len() as f32;
        for (token, count) in counts_in_order(tokens).into_iter().take(self.token_cap) {
            embedding[bucket(&token)] += count as f32 / total;
        }
        embedding
    }
}

pub fn extract(text: &str) -> PageFeatures {
    FeatureExtractor::default().extract(text)
}

/// Up to `MAX_KEYWORDS` keyword tokens, most frequent first; ties keep first-occurrence order.
pub fn keywords(text: &str) -> Vec<String> {
    let mut counted = counts_in_order(keyword_tokens(text));
    // sort_by is stable, which preserves encounter order among equal counts
    counted.sort_by(|a, b| b.1.cmp(&a.1));
    counted.into_iter().take(MAX_KEYWORDS).map(|(token, _)| token).collect()
}

/// Bucket in `[0, DIMENSION)` for a token: `h = h * 31 + unit` over UTF-16
/// code units, wrapped to a signed 32-bit integer, then `|h| mod DIMENSION`.
pub fn bucket(token: &str) -> usize {
    let mut hash: i32 = 0;
    for unit in token.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    // widen before abs so i32::MIN does not overflow
    ((hash as i64).abs() % DIMENSION as i64) as usize
}

/// Distinct tokens with occurrence counts, in first-occurrence order.
fn counts_in_order(tokens: Vec<String>) -> Vec<(String, u32)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut counted: Vec<(String, u32)> = Vec::new();
    for token in tokens {
        match slots.get(&token) {
            Some(&slot) => counted[slot].1 += 1,
            None => {
                slots.insert(token.clone(), counted.len());
                counted.push((token, 1));
            }
        }
    }
    counted
}
