// Sampling Evaluator
// Random draw with replacement over the whole corpus, then one scored batch

use rand::Rng;
use tracing::info;

use super::scoring::{evaluate_indices, ScoringPolicy};
use super::{EvaluationError, InputError};
use crate::models::EvaluationOutcome;
use crate::services::corpus::Corpus;
use crate::services::detection_client::LanguageDetector;

/// Parse a requested sample size, rejecting non-numeric and non-positive values.
pub fn parse_sample_size(text: &str) -> Result<usize, InputError> {
    let trimmed = text.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| InputError::InvalidSampleSize(trimmed.to_string()))?;
    if value <= 0 {
        return Err(InputError::NonPositiveSampleSize(value));
    }
    usize::try_from(value).map_err(|_| InputError::InvalidSampleSize(trimmed.to_string()))
}

/// Draw `sample_size` indices uniformly from `[0, corpus_len)`, duplicates allowed.
pub fn draw_indices<R: Rng + ?Sized>(
    rng: &mut R,
    corpus_len: usize,
    sample_size: usize,
) -> Result<Vec<usize>, InputError> {
    if sample_size == 0 {
        return Err(InputError::NonPositiveSampleSize(0));
    }
    if corpus_len == 0 {
        return Err(InputError::EmptyCorpus);
    }
    Ok((0..sample_size).map(|_| rng.gen_range(0..corpus_len)).collect())
}

pub async fn evaluate_sample<D, R>(
    corpus: &Corpus,
    detector: &D,
    sample_size: usize,
    policy: &ScoringPolicy,
    rng: &mut R,
) -> Result<EvaluationOutcome, EvaluationError>
where
    D: LanguageDetector,
    R: Rng + ?Sized,
{
    if sample_size > policy.max_sample_size {
        return Err(InputError::SampleSizeTooLarge {
            requested: sample_size,
            max: policy.max_sample_size,
        }
        .into());
    }
    let drawn = draw_indices(rng, corpus.len(), sample_size)?;
    info!(sample_size, corpus_len = corpus.len(), "evaluation.sample_drawn");
    evaluate_indices(corpus, detector, &drawn, policy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::corpus::CodeMapping;
    use crate::services::evaluation::testing::{FailingDetector, TableDetector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labeled_corpus() -> Corpus {
        Corpus::new(
            vec!["Hello, world".into(), "Bonjour le monde".into(), "Hallo Welt".into()],
            vec!["eng".into(), "fra".into(), "deu".into()],
            CodeMapping::from_pairs([("en", "eng"), ("fr", "fra"), ("de", "deu")]),
        )
    }

    #[test]
    fn test_parse_sample_size() {
        assert_eq!(parse_sample_size(" 12 "), Ok(12));
        assert_eq!(parse_sample_size("0"), Err(InputError::NonPositiveSampleSize(0)));
        assert_eq!(parse_sample_size("-4"), Err(InputError::NonPositiveSampleSize(-4)));
        assert_eq!(parse_sample_size("ten"), Err(InputError::InvalidSampleSize("ten".into())));
    }

    #[test]
    fn test_draw_allows_more_than_corpus() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = draw_indices(&mut rng, 3, 50).unwrap();
        assert_eq!(drawn.len(), 50);
        assert!(drawn.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_draw_rejects_empty_inputs() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(draw_indices(&mut rng, 3, 0), Err(InputError::NonPositiveSampleSize(0)));
        assert_eq!(draw_indices(&mut rng, 0, 2), Err(InputError::EmptyCorpus));
    }

    #[test]
    fn test_draw_is_reproducible_with_seed() {
        let a = draw_indices(&mut StdRng::seed_from_u64(42), 100, 20).unwrap();
        let b = draw_indices(&mut StdRng::seed_from_u64(42), 100, 20).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_sample_bounds_and_percentage() {
        let corpus = labeled_corpus();
        // German is never recognised, so the rate stays below 100% for most draws.
        let detector = TableDetector::new(&[("Hello  world", "en"), ("Bonjour le monde", "it")]);
        let policy = ScoringPolicy::default();

        for (seed, n) in [(1u64, 1usize), (2, 5), (3, 17), (4, 40)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = evaluate_sample(&corpus, &detector, n, &policy, &mut rng).await.unwrap();
            assert_eq!(outcome.sample_size, n);
            assert!(outcome.success_count <= n);
            assert_eq!(
                outcome.success_count + outcome.failure_count + outcome.unscored_count,
                n
            );
            assert_eq!(outcome.success_percentage, 100.0 * outcome.success_count as f64 / n as f64);
        }

        // Commas were stripped before the batch was built.
        let batches = detector.batches.lock().unwrap();
        assert!(batches.iter().flatten().all(|s| !s.contains(',')));
    }

    #[tokio::test]
    async fn test_oversized_sample_rejected_before_drawing() {
        let corpus = labeled_corpus();
        let detector = TableDetector::new(&[]);
        let policy = ScoringPolicy {
            max_sample_size: 10,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let n = parse_sample_size("9223372036854775807").unwrap();
        let err = evaluate_sample(&corpus, &detector, n, &policy, &mut rng).await.unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Input(InputError::SampleSizeTooLarge { max: 10, .. })
        ));

        let outcome = evaluate_sample(&corpus, &detector, 10, &policy, &mut rng).await.unwrap();
        assert_eq!(outcome.sample_size, 10);
        assert_eq!(detector.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detector_error_propagates() {
        let corpus = labeled_corpus();
        let mut rng = StdRng::seed_from_u64(1);
        let err = evaluate_sample(&corpus, &FailingDetector(503), 2, &ScoringPolicy::default(), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Detection(_)));
    }
}
