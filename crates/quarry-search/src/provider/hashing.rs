//! Deterministic offline embedder based on feature hashing.
//!
//! Each lowercased alphanumeric token, and each adjacent token pair, is
//! hashed (FNV-1a, 64-bit) into one of [`EMBEDDING_DIM`] buckets with a
//! hash-derived sign. The result is L2-normalized, so texts sharing
//! vocabulary have a high cosine similarity. Output depends only on the
//! input text, never on process state.

use quarry_core::error::ProviderError;
use quarry_core::model::EMBEDDING_DIM;

use super::EmbeddingProvider;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashingProvider;

impl HashingProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidInput);
        }
        Ok(hash_embedding(text))
    }
}

fn hash_embedding(text: &str) -> Vec<f32> {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut vector = vec![0.0_f32; EMBEDDING_DIM];
    if tokens.is_empty() {
        add_feature(&mut vector, text.as_bytes(), 1.0);
    } else {
        for token in &tokens {
            add_feature(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            add_feature(&mut vector, joined.as_bytes(), BIGRAM_WEIGHT);
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn add_feature(vector: &mut [f32], feature: &[u8], weight: f32) {
    let hash = fnv1a(feature);
    let bucket = usize::try_from(hash % EMBEDDING_DIM as u64).unwrap_or(0);
    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign * weight;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn output_is_unit_length_and_full_dimension() {
        let v = HashingProvider.embed("machine learning basics").unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn deterministic_across_calls() {
        let a = HashingProvider.embed("Quarry indexes text").unwrap();
        let b = HashingProvider::new().embed("Quarry indexes text").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let a = HashingProvider.embed("Machine Learning!").unwrap();
        let b = HashingProvider.embed("machine, learning").unwrap();
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let query = HashingProvider.embed("machine learning").unwrap();
        let related = HashingProvider
            .embed("machine learning basics and gradient descent")
            .unwrap();
        let unrelated = HashingProvider
            .embed("a history of the printing press")
            .unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
        assert!(cosine(&query, &related) > 0.3);
    }

    #[test]
    fn symbol_only_text_still_embeds() {
        let v = HashingProvider.embed("?!?").unwrap();
        assert!(v.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn blank_input_is_rejected() {
        assert_eq!(HashingProvider.embed(" \t\n"), Err(ProviderError::InvalidInput));
    }

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
