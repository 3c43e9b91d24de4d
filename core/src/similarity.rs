use std::collections::HashSet;

pub const VECTOR_WEIGHT: f32 = 0.7;
pub const KEYWORD_WEIGHT: f32 = 0.3;

/// Cosine of the angle between `a` and `b`; zero when either vector has no magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Shared keywords over the size of the larger list.
pub fn keyword_overlap(a: &[String], b: &[String]) -> f32 {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    let shared = left.intersection(&right).count();
    shared as f32 / a.len().max(b.len()).max(1) as f32
}

pub fn score(vec_a: &[f32], vec_b: &[f32], keywords_a: &[String], keywords_b: &[String]) -> f32 {
    VECTOR_WEIGHT * cosine(vec_a, vec_b) + KEYWORD_WEIGHT * keyword_overlap(keywords_a, keywords_b)
}
