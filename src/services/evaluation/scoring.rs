// Scoring
// Reconciles detected ISO codes against ground truth labels

use std::collections::VecDeque;
use tracing::{debug, info};

use super::{EvaluationError, InputError};
use crate::models::{DetectionResponse, EvaluationOutcome, LanguageExample, UNKNOWN_LANGUAGE};
use crate::services::config_store::EvaluationConfig;
use crate::services::corpus::Corpus;
use crate::services::detection_client::LanguageDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Count unknown or unmapped detections as failures instead of skipping them.
    pub count_unscored_as_failure: bool,
    /// How many of the most recent successes and failures to keep.
    pub examples_retained: usize,
    /// Largest sample a single evaluation may draw.
    pub max_sample_size: usize,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            count_unscored_as_failure: false,
            examples_retained: 1,
            max_sample_size: 1000,
        }
    }
}

impl From<&EvaluationConfig> for ScoringPolicy {
    fn from(cfg: &EvaluationConfig) -> Self {
        Self {
            count_unscored_as_failure: cfg.count_unscored_as_failure,
            examples_retained: cfg.examples_retained.max(1),
            max_sample_size: cfg.max_sample_size.max(1),
        }
    }
}

enum Verdict {
    Success(String),
    Failure(String),
    Unscored(String),
}

struct ExampleRing {
    capacity: usize,
    items: VecDeque<LanguageExample>,
}

impl ExampleRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, example: LanguageExample) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(example);
    }

    fn into_vec(self) -> Vec<LanguageExample> {
        self.items.into()
    }
}

/// Score a detection response whose batch position `c` holds corpus sentence `drawn[c]`.
///
/// The percentage is always taken over `drawn.len()`, so entries skipped as
/// unscored lower it without being counted as failures.
pub fn score_detections(
    corpus: &Corpus,
    drawn: &[usize],
    response: &DetectionResponse,
    policy: &ScoringPolicy,
) -> Result<EvaluationOutcome, EvaluationError> {
    if drawn.is_empty() {
        return Err(InputError::NonPositiveSampleSize(0).into());
    }

    let mapping = corpus.mapping();
    let mut success_count = 0;
    let mut failure_count = 0;
    let mut unscored_count = 0;
    let mut successes = ExampleRing::new(policy.examples_retained);
    let mut failures = ExampleRing::new(policy.examples_retained);

    for (position, &index) in drawn.iter().enumerate() {
        let verdict = match response.language_at(position) {
            None => Verdict::Unscored(UNKNOWN_LANGUAGE.to_string()),
            Some(lang) if lang.is_unknown() => Verdict::Unscored(UNKNOWN_LANGUAGE.to_string()),
            Some(lang) => match mapping.label_for(lang.iso_code()) {
                None => Verdict::Unscored(lang.iso_code().to_string()),
                Some(label) => {
                    if label == corpus.label(index)? {
                        Verdict::Success(label.to_string())
                    } else {
                        Verdict::Failure(label.to_string())
                    }
                }
            },
        };

        let verdict = match verdict {
            Verdict::Unscored(code) if policy.count_unscored_as_failure => Verdict::Failure(code),
            other => other,
        };

        match verdict {
            Verdict::Success(predicted) => {
                success_count += 1;
                successes.push(LanguageExample {
                    corpus_index: index,
                    predicted,
                    real: corpus.label(index)?.to_string(),
                });
            }
            Verdict::Failure(predicted) => {
                failure_count += 1;
                failures.push(LanguageExample {
                    corpus_index: index,
                    predicted,
                    real: corpus.label(index)?.to_string(),
                });
            }
            Verdict::Unscored(code) => {
                debug!(position, index, code = %code, "evaluation.unscored");
                unscored_count += 1;
            }
        }
    }

    let sample_size = drawn.len();
    let success_percentage = 100.0 * success_count as f64 / sample_size as f64;

    info!(
        sample_size,
        success_count,
        failure_count,
        unscored_count,
        success_percentage,
        "evaluation.scored"
    );

    Ok(EvaluationOutcome {
        sample_size,
        success_count,
        failure_count,
        unscored_count,
        success_percentage,
        success_examples: successes.into_vec(),
        failure_examples: failures.into_vec(),
    })
}

/// Detect the given corpus sentences in one batch and score the result.
pub async fn evaluate_indices<D: LanguageDetector>(
    corpus: &Corpus,
    detector: &D,
    indices: &[usize],
    policy: &ScoringPolicy,
) -> Result<EvaluationOutcome, EvaluationError> {
    if indices.is_empty() {
        return Err(InputError::NonPositiveSampleSize(0).into());
    }
    super::validate_indices(indices, corpus.len())?;

    let batch = corpus.normalized_sentences(indices)?;
    let response = detector.detect(&batch).await?;
    score_detections(corpus, indices, &response, policy)
}
