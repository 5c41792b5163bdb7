//! Embedding providers.
//!
//! A provider turns text into a [`EMBEDDING_DIM`]-dimensional vector. It
//! makes at most one outbound call per request and never retries; callers
//! decide what a failure means.

mod hashing;
mod openai;

pub use hashing::HashingProvider;
pub use openai::OpenAiProvider;

use quarry_core::config::{EmbeddingConfig, ProviderKind};
use quarry_core::error::ProviderError;
use quarry_core::model::EMBEDDING_DIM;
use std::sync::Arc;
use tracing::debug;

/// Text → vector.
///
/// Implementations are shared across concurrent requests.
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Embed one non-blank text.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidInput`] for blank text, otherwise any provider
    /// failure.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts. Blank entries are dropped; the output lines up
    /// with the non-blank inputs in order.
    ///
    /// The default makes one [`EmbeddingProvider::embed`] call per text.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidInput`] when every entry is blank, otherwise
    /// the first provider failure.
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        non_blank(texts)?
            .into_iter()
            .map(|text| self.embed(text))
            .collect()
    }
}

/// Build the provider named by `config`.
#[must_use]
pub fn build_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    debug!(provider = ?config.provider, model = %config.model, "building embedding provider");
    match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)),
        ProviderKind::Hashing => Arc::new(HashingProvider::new()),
    }
}

/// Trimmed, non-blank entries of `texts`.
///
/// # Errors
///
/// [`ProviderError::InvalidInput`] when nothing remains.
pub fn non_blank<'a>(texts: &[&'a str]) -> Result<Vec<&'a str>, ProviderError> {
    let kept: Vec<&str> = texts
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect();
    if kept.is_empty() {
        return Err(ProviderError::InvalidInput);
    }
    Ok(kept)
}

/// Reject vectors of the wrong size or with non-finite components.
///
/// # Errors
///
/// [`ProviderError::Response`] describing the defect.
pub fn check_vector(vector: Vec<f32>) -> Result<Vec<f32>, ProviderError> {
    if vector.len() != EMBEDDING_DIM {
        return Err(ProviderError::Response(format!(
            "expected {EMBEDDING_DIM} dimensions, got {}",
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(ProviderError::Response(
            "embedding contains non-finite values".into(),
        ));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut v = vec![0.0; EMBEDDING_DIM];
            v[0] = text.len() as f32;
            Ok(v)
        }
    }

    #[test]
    fn non_blank_drops_whitespace_entries() {
        assert_eq!(non_blank(&["a", "  ", "\n", " b "]).unwrap(), vec!["a", "b"]);
        assert_eq!(non_blank(&["", "   "]), Err(ProviderError::InvalidInput));
        assert_eq!(non_blank(&[]), Err(ProviderError::InvalidInput));
    }

    #[test]
    fn default_embed_many_preserves_order() {
        let provider = Counting {
            calls: AtomicUsize::new(0),
        };
        let out = provider.embed_many(&["x", "", "xyz"]).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0][0] - 1.0).abs() < f32::EPSILON);
        assert!((out[1][0] - 3.0).abs() < f32::EPSILON);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn check_vector_rejects_bad_shapes() {
        assert!(check_vector(vec![0.0; EMBEDDING_DIM]).is_ok());
        assert!(matches!(
            check_vector(vec![0.0; 3]),
            Err(ProviderError::Response(_))
        ));
        let mut nan = vec![0.0; EMBEDDING_DIM];
        nan[7] = f32::NAN;
        assert!(matches!(check_vector(nan), Err(ProviderError::Response(_))));
    }

    #[test]
    fn build_provider_honours_kind() {
        let config = EmbeddingConfig {
            provider: ProviderKind::Hashing,
            ..EmbeddingConfig::default()
        };
        assert_eq!(build_provider(&config).name(), "hashing");

        let config = EmbeddingConfig::default();
        assert_eq!(build_provider(&config).name(), "openai");
    }
}
