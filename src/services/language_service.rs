// Language Service
// Entry point shared by the HTTP routes and the command line

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::corpus::CorpusStore;
use super::detection_client::{split_joined, LanguageDetector};
use super::evaluation::{
    detect_by_indices, evaluate_sample, parse_index_list, parse_sample_size, EvaluationError,
    ScoringPolicy,
};
use crate::models::{DetectionResponse, EvaluationOutcome};

pub struct LanguageService<D> {
    corpus: CorpusStore,
    detector: D,
    policy: ScoringPolicy,
    seed: Option<u64>,
}

impl<D: LanguageDetector> LanguageService<D> {
    pub fn new(corpus: CorpusStore, detector: D, policy: ScoringPolicy) -> Self {
        Self {
            corpus,
            detector,
            policy,
            seed: None,
        }
    }

    /// Fix the sampling seed so every evaluation draws the same indices.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Detect a comma-joined list of sentences.
    pub async fn detect_text(&self, text: &str) -> Result<DetectionResponse, EvaluationError> {
        let sentences = split_joined(text);
        info!(sentences = sentences.len(), "service.detect_text");
        Ok(self.detector.detect(&sentences).await?)
    }

    /// Detect the corpus sentences named by a comma-joined index list.
    pub async fn detect_indices_text(&self, text: &str) -> Result<DetectionResponse, EvaluationError> {
        let indices = parse_index_list(text)?;
        self.detect_indices(&indices).await
    }

    pub async fn detect_indices(&self, indices: &[usize]) -> Result<DetectionResponse, EvaluationError> {
        let corpus = self.corpus.get()?;
        info!(indices = indices.len(), "service.detect_indices");
        detect_by_indices(&corpus, &self.detector, indices).await
    }

    /// Evaluate a sample whose size is given as text.
    pub async fn evaluate_text(&self, nb: &str) -> Result<EvaluationOutcome, EvaluationError> {
        let sample_size = parse_sample_size(nb)?;
        self.evaluate(sample_size).await
    }

    pub async fn evaluate(&self, sample_size: usize) -> Result<EvaluationOutcome, EvaluationError> {
        let corpus = self.corpus.get()?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        evaluate_sample(&corpus, &self.detector, sample_size, &self.policy, &mut rng).await
    }
}
