// Index Evaluator
// Raw detection of explicitly chosen corpus sentences, no scoring

use super::{EvaluationError, InputError};
use crate::models::DetectionResponse;
use crate::services::corpus::Corpus;
use crate::services::detection_client::LanguageDetector;

/// Parse a comma-joined list of corpus indices.
pub fn parse_index_list(text: &str) -> Result<Vec<usize>, InputError> {
    text.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<usize>()
                .map_err(|_| InputError::InvalidIndex(part.to_string()))
        })
        .collect()
}

pub fn validate_indices(indices: &[usize], corpus_len: usize) -> Result<(), InputError> {
    match indices.iter().find(|&&i| i >= corpus_len) {
        Some(&index) => Err(InputError::IndexOutOfRange { index, len: corpus_len }),
        None => Ok(()),
    }
}

/// Detect the sentences at `indices` in the given order and return the raw result.
pub async fn detect_by_indices<D: LanguageDetector>(
    corpus: &Corpus,
    detector: &D,
    indices: &[usize],
) -> Result<DetectionResponse, EvaluationError> {
    validate_indices(indices, corpus.len())?;
    let batch = corpus.normalized_sentences(indices)?;
    Ok(detector.detect(&batch).await?)
}
