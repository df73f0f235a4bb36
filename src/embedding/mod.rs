//! Embedding generation behind a pluggable provider trait
//!
//! Providers are remote services: every call may block on network I/O, so
//! batch helpers enforce a minimum inter-call delay and an optional bounded
//! worker pool to respect provider rate limits.

mod http_provider;

pub use http_provider::HttpEmbeddingProvider;

use crate::error::EmbeddingError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Reject vectors whose shape or values the store must never see
pub fn validate_vector(vector: &[f32], dimension: usize) -> Result<(), EmbeddingError> {
    if vector.len() != dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFiniteVector);
    }
    Ok(())
}

/// Embed a batch sequentially with a minimum inter-call delay
///
/// Per-item failures are returned in place; one failed text never aborts
/// the rest of the batch.
pub async fn embed_batch(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    rate_limit_delay: Duration,
) -> Vec<Result<Vec<f32>, EmbeddingError>> {
    let mut results = Vec::with_capacity(texts.len());

    for (i, text) in texts.iter().enumerate() {
        if i > 0 && !rate_limit_delay.is_zero() {
            tokio::time::sleep(rate_limit_delay).await;
        }
        results.push(provider.embed(text).await);
    }

    results
}

/// Embed a batch through a bounded worker pool, preserving input order
///
/// The pool increases throughput for independent calls; the provider's
/// rate ceiling is still shared across workers via the inter-call delay
/// each worker observes before its request.
pub async fn embed_batch_parallel(
    provider: Arc<dyn EmbeddingProvider>,
    texts: Vec<String>,
    concurrency: usize,
    rate_limit_delay: Duration,
) -> Vec<Result<Vec<f32>, EmbeddingError>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(texts.len());

    for text in texts {
        let provider = provider.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("embedding semaphore closed");
            if !rate_limit_delay.is_zero() {
                tokio::time::sleep(rate_limit_delay).await;
            }
            provider.embed(&text).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => results.push(Err(EmbeddingError::RequestFailed(format!(
                "embedding task panicked: {}",
                e
            )))),
        }
    }

    results
}


#[cfg(test)]
mod tests {
    use super::test_support::MockEmbeddingProvider;
    use super::*;

    #[test]
    fn test_validate_vector_accepts_well_formed() {
        assert!(validate_vector(&[0.1, 0.2, 0.3], 3).is_ok());
    }

    #[test]
    fn test_validate_vector_rejects_wrong_dimension() {
        let err = validate_vector(&[0.1, 0.2], 3).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_validate_vector_rejects_non_finite() {
        let err = validate_vector(&[0.1, f32::NAN, 0.3], 3).unwrap_err();
        assert!(matches!(err, EmbeddingError::NonFiniteVector));

        let err = validate_vector(&[0.1, f32::INFINITY, 0.3], 3).unwrap_err();
        assert!(matches!(err, EmbeddingError::NonFiniteVector));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order_and_isolates_failures() {
        let provider = MockEmbeddingProvider::failing_on(8, "bad");
        let texts = vec![
            "first".to_string(),
            "bad chunk".to_string(),
            "third".to_string(),
        ];

        let results = embed_batch(&provider, &texts, Duration::ZERO).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_embed_batch_deterministic() {
        let provider = MockEmbeddingProvider::new(8);
        let texts = vec!["same text".to_string()];

        let a = embed_batch(&provider, &texts, Duration::ZERO).await;
        let b = embed_batch(&provider, &texts, Duration::ZERO).await;
        assert_eq!(a[0].as_ref().unwrap(), b[0].as_ref().unwrap());
    }

    #[tokio::test]
    async fn test_embed_batch_parallel_preserves_order() {
        let provider = Arc::new(MockEmbeddingProvider::new(4));
        let texts: Vec<String> = (0..16).map(|i| format!("text {}", i)).collect();

        let sequential = embed_batch(provider.as_ref(), &texts, Duration::ZERO).await;
        let parallel = embed_batch_parallel(provider.clone(), texts, 4, Duration::ZERO).await;

        assert_eq!(sequential.len(), parallel.len());
        for (s, p) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(s.as_ref().unwrap(), p.as_ref().unwrap());
        }
    }
}
