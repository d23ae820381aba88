use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::llm::{EmbeddingProvider, OracleError};

const HASH_DIMENSIONS: usize = 512;

/// Deterministic bag-of-words embedder.
///
/// Tokens are split on anything that is not alphanumeric and hashed into a
/// fixed number of buckets, so texts sharing words score closer.
#[derive(Clone, Debug, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; HASH_DIMENSIONS];
        for token in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = blake3::hash(token.to_lowercase().as_bytes());
            let mut bucket = [0_u8; 8];
            bucket.copy_from_slice(&digest.as_bytes()[..8]);
            let index = (u64::from_le_bytes(bucket) % HASH_DIMENSIONS as u64) as usize;
            vector[index] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model(&self) -> &str {
        "hash-bag-of-words"
    }

    async fn embed(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, OracleError> {
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }
        Ok(inputs.iter().map(|input| Self::vector(input)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::HashEmbedder;

    #[test]
    fn same_text_yields_same_vector() {
        assert_eq!(HashEmbedder::vector("general cleaning"), HashEmbedder::vector("General_Cleaning"));
        let total: f32 = HashEmbedder::vector("post renovation, cleaning!").iter().sum();
        assert_eq!(total, 3.0);
    }
}
