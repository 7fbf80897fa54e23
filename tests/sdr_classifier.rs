use htm_classifier::core::{
    error::ClassifierError,
    params::SDRClassifierParams,
    sdr_classifier::{ClassifierResult, SDRClassifier},
    softmax::argmax,
};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

const TOLERANCE: f64 = 1e-6;

/// One `compute` call worth of input.
struct Sample {
    record: u32,
    pattern: Vec<usize>,
    buckets: Vec<usize>,
    values: Vec<f64>,
    learn: bool,
    infer: bool,
}

/// Generates a reproducible stream of samples with occasional gaps and multi-label records.
fn random_samples(seed: u64, count: usize) -> Vec<Sample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut record = 0u32;

    (0..count)
        .map(|_| {
            record += if rng.random_bool(0.1) { 2 } else { 1 };

            let mut pattern = index::sample(&mut rng, 512, 20).into_vec();
            pattern.sort_unstable();

            let labels = if rng.random_bool(0.2) { 2 } else { 1 };
            let buckets: Vec<usize> = (0..labels).map(|_| rng.random_range(0..12)).collect();
            let values = buckets
                .iter()
                .map(|&bucket| bucket as f64 * 10.0 + rng.random_range(0.0..5.0))
                .collect();

            Sample {
                record,
                pattern,
                buckets,
                values,
                learn: rng.random_bool(0.9),
                infer: rng.random_bool(0.5),
            }
        })
        .collect()
}

fn run(classifier: &mut SDRClassifier, samples: &[Sample]) -> Vec<ClassifierResult> {
    samples
        .iter()
        .map(|sample| {
            classifier
                .compute(
                    sample.record,
                    &sample.pattern,
                    &sample.buckets,
                    &sample.values,
                    false,
                    sample.learn,
                    sample.infer,
                )
                .unwrap()
        })
        .collect()
}

#[test]
fn test_end_to_end_scenario() {
    let mut classifier = SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap();

    let result = classifier
        .compute(0, &[1, 3], &[0], &[0.0], false, true, false)
        .unwrap();
    assert!(result.is_empty());
    assert!(classifier.weights().matrix(1).unwrap().is_empty());
    assert_eq!(classifier.actual_values().get(0), Some(0.0));

    let result = classifier
        .compute(1, &[2, 4], &[1], &[1.0], false, true, true)
        .unwrap();

    for bit in [1, 3] {
        assert!((classifier.weights().read(1, bit, 0) - 0.1 * -0.5).abs() < TOLERANCE);
        assert!((classifier.weights().read(1, bit, 1) - 0.1 * 0.5).abs() < TOLERANCE);
    }

    let pdf = result.prediction(1).unwrap();
    assert_eq!(pdf.len(), 2);
    assert!(pdf.iter().all(|&p| (p - 0.5).abs() < TOLERANCE));
    assert_eq!(result.classification(1), Some(0));
    assert_eq!(result.actual_values(), Some(&[0.0, 1.0][..]));
}

#[test]
fn test_pdfs_sum_to_one() {
    let mut classifier = SDRClassifier::new(vec![1, 2, 5], 0.05, 0.3, 0).unwrap();
    let results = run(&mut classifier, &random_samples(1, 300));

    let mut checked = 0;
    for result in results.iter().filter(|result| !result.is_empty()) {
        assert_eq!(result.predictions().count(), 3);
        for (_, pdf) in result.predictions() {
            if pdf.is_empty() {
                continue;
            }
            let total: f64 = pdf.iter().sum();
            assert!((total - 1.0).abs() < TOLERANCE);
            assert!(pdf.iter().all(|&p| (0.0..=1.0).contains(&p)));
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_deterministic() {
    let samples = random_samples(42, 250);

    let mut first = SDRClassifier::new(vec![1, 3], 0.1, 0.3, 0).unwrap();
    let mut second = SDRClassifier::new(vec![1, 3], 0.1, 0.3, 0).unwrap();

    let first_results = run(&mut first, &samples);
    let second_results = run(&mut second, &samples);

    assert_eq!(first, second);
    assert_eq!(first_results, second_results);
}

#[test]
fn test_round_trip_after_learning() {
    let mut classifier = SDRClassifier::new(vec![1, 4], 0.1, 0.25, 0).unwrap();
    run(&mut classifier, &random_samples(7, 150));

    let mut buffer = Vec::new();
    classifier.save(&mut buffer).unwrap();

    let restored = SDRClassifier::from_reader(buffer.as_slice()).unwrap();
    assert_eq!(restored, classifier);

    // The restored classifier keeps behaving identically.
    let mut original = classifier;
    let mut restored = restored;
    let continuation = random_samples(8, 40)
        .into_iter()
        .map(|mut sample| {
            sample.record += 1_000;
            sample
        })
        .collect::<Vec<_>>();
    assert_eq!(
        run(&mut original, &continuation),
        run(&mut restored, &continuation)
    );
    assert_eq!(original, restored);
}

#[test]
fn test_round_trip_through_file() {
    let mut classifier = SDRClassifier::new(vec![2], 0.1, 0.3, 1).unwrap();
    run(&mut classifier, &random_samples(3, 30));

    let path = std::env::temp_dir().join(format!(
        "htm-classifier-round-trip-{}.bin",
        std::process::id()
    ));
    classifier.save_to_file(&path).unwrap();
    let restored = SDRClassifier::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored, classifier);
}

#[test]
fn test_loading_missing_file_fails() {
    let path = std::env::temp_dir().join("htm-classifier-does-not-exist.bin");
    assert!(SDRClassifier::load_from_file(path).is_err());
}

#[test]
fn test_corrupted_stream_is_rejected() {
    let mut classifier = SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap();
    run(&mut classifier, &random_samples(5, 20));

    let mut buffer = Vec::new();
    classifier.save(&mut buffer).unwrap();
    buffer[..4].copy_from_slice(&u32::MAX.to_le_bytes());

    let mut target = SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap();
    let err = target.load(buffer.as_slice()).unwrap_err();
    let err = err.downcast_ref::<ClassifierError>().unwrap();
    assert!(err.is_format_error());
    assert_eq!(target, SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap());
}

#[test]
fn test_history_stays_bounded() {
    let mut classifier = SDRClassifier::new(vec![1, 3], 0.1, 0.3, 0).unwrap();

    for record in 0..20u32 {
        classifier
            .compute(record, &[record as usize], &[0], &[0.0], false, true, false)
            .unwrap();
        assert!(classifier.history_len() <= 4);
    }

    assert_eq!(classifier.history_len(), 4);
}

#[test]
fn test_actual_value_decay() {
    let mut classifier = SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap();
    classifier
        .compute(0, &[1], &[2], &[10.0], false, true, false)
        .unwrap();
    let result = classifier
        .compute(1, &[1], &[2], &[20.0], false, true, true)
        .unwrap();

    let actual = result.actual_values().unwrap();
    assert_eq!(actual.len(), 3);
    assert!((actual[2] - 13.0).abs() < TOLERANCE);
}

#[test]
fn test_categories_use_the_same_arithmetic() {
    let mut classifier = SDRClassifier::new(vec![1], 0.1, 0.5, 0).unwrap();
    classifier
        .compute(0, &[1], &[0], &[4.0], true, true, false)
        .unwrap();
    classifier
        .compute(1, &[1], &[0], &[8.0], true, true, false)
        .unwrap();

    assert_eq!(classifier.actual_values().get(0), Some(6.0));
}

#[test]
fn test_multi_step_prediction() {
    let params = SDRClassifierParams {
        steps: vec![1, 2],
        alpha: 0.2,
        act_value_alpha: 0.3,
        verbosity: 0,
    };
    let mut classifier = SDRClassifier::from_params(&params).unwrap();

    // A repeating sequence of three patterns, each mapping to its own bucket.
    let patterns: [&[usize]; 3] = [&[0, 1, 2], &[10, 11, 12], &[20, 21, 22]];

    for record in 0..600u32 {
        let position = (record % 3) as usize;
        classifier
            .compute(
                record,
                patterns[position],
                &[position],
                &[position as f64],
                false,
                true,
                false,
            )
            .unwrap();
    }

    for (position, pattern) in patterns.iter().enumerate() {
        let result = classifier.infer(pattern);
        assert_eq!(result.classification(1), Some((position + 1) % 3));
        assert_eq!(result.classification(2), Some((position + 2) % 3));
    }
}

#[test]
fn test_growth_with_unseen_indices() {
    let mut classifier = SDRClassifier::new(vec![1], 0.1, 0.3, 0).unwrap();
    classifier
        .compute(0, &[5], &[1], &[1.0], false, true, false)
        .unwrap();

    let result = classifier
        .compute(1, &[5000], &[300], &[3.0], false, true, true)
        .unwrap();

    assert_eq!(classifier.max_input_idx(), Some(5000));
    assert_eq!(classifier.max_bucket_idx(), Some(300));
    assert_eq!(result.prediction(1).unwrap().len(), 301);
    assert_eq!(result.actual_values().unwrap().len(), 301);
}

#[test]
fn test_argmax_ties() {
    assert_eq!(argmax(&[0.5, 0.5, 0.0]), Some(0));
}

#[test]
fn test_classifier_is_send() {
    fn assert_send<T: Send + Sync>() {}
    assert_send::<SDRClassifier>();
}
