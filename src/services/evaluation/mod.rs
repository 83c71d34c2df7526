// Evaluation Module
// Measures the external detector against the labeled corpus:
// - scoring: reconciles detected ISO codes with ground truth labels
// - sampling: random draw with replacement, then scoring
// - indices: raw detection of explicitly chosen corpus sentences

pub mod indices;
pub mod sampling;
pub mod scoring;

use thiserror::Error;

use super::corpus::CorpusError;
use super::detection_client::DetectionError;

pub use indices::{detect_by_indices, parse_index_list, validate_indices};
pub use sampling::{draw_indices, evaluate_sample, parse_sample_size};
pub use scoring::{evaluate_indices, score_detections, ScoringPolicy};

/// Caller mistakes, rejected before any external call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid corpus index '{0}'")]
    InvalidIndex(String),
    #[error("corpus index {index} out of range [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("sample size '{0}' is not a number")]
    InvalidSampleSize(String),
    #[error("sample size must be positive, got {0}")]
    NonPositiveSampleSize(i64),
    #[error("sample size {requested} exceeds the limit of {max}")]
    SampleSizeTooLarge { requested: usize, max: usize },
    #[error("corpus is empty")]
    EmptyCorpus,
}

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::models::{DetectedDocument, DetectedLanguage, DetectionResponse};
    use crate::services::detection_client::{DetectionError, LanguageDetector};
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub fn response_from_codes(codes: &[&str]) -> DetectionResponse {
        DetectionResponse {
            documents: codes
                .iter()
                .enumerate()
                .map(|(id, code)| DetectedDocument {
                    id: id.to_string(),
                    detected_language: DetectedLanguage {
                        iso6391_name: Some(code.to_string()),
                        ..Default::default()
                    },
                    extra: Default::default(),
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Answers from a sentence -> ISO code table; unknown sentences get `(Unknown)`.
    pub struct TableDetector {
        pub table: HashMap<String, String>,
        pub batches: Mutex<Vec<Vec<String>>>,
    }

    impl TableDetector {
        pub fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                table: pairs.iter().map(|(s, c)| (s.to_string(), c.to_string())).collect(),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageDetector for TableDetector {
        async fn detect(&self, sentences: &[String]) -> Result<DetectionResponse, DetectionError> {
            self.batches.lock().unwrap().push(sentences.to_vec());
            let codes: Vec<&str> = sentences
                .iter()
                .map(|s| self.table.get(s).map(String::as_str).unwrap_or("(Unknown)"))
                .collect();
            Ok(response_from_codes(&codes))
        }
    }

    /// Always fails with the given status.
    pub struct FailingDetector(pub u16);

    impl LanguageDetector for FailingDetector {
        async fn detect(&self, _sentences: &[String]) -> Result<DetectionResponse, DetectionError> {
            Err(DetectionError::ApiError {
                status: self.0,
                message: "unavailable".into(),
            })
        }
    }
}
