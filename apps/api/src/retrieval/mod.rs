// Retrieval: embeddings, similarity ranking and the role-scoped question views.

pub mod availability;
pub mod embeddings;
pub mod handlers;
pub mod similarity;

use crate::errors::AppError;
use embeddings::EmbeddingError;

impl From<EmbeddingError> for AppError {
    fn from(e: EmbeddingError) -> Self {
        AppError::Embedding(e.to_string())
    }
}
