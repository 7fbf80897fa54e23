//! This example demonstrates how to use the SDR Classifier to predict a sine wave one and five
//! records ahead. A simple bucket encoder turns each sample into an SDR of consecutive active bits,
//! the classifier learns from the stream and its predictions are decoded back into values using the
//! actual value estimates of the predicted buckets.
//!
//! Run with `RUST_LOG=debug` to see the classifier's own log output for the last records.

use htm_classifier::core::{params::SDRClassifierParams, sdr_classifier::SDRClassifier};

const NUM_BUCKETS: usize = 40;
const ACTIVE_BITS: usize = 11;
const PERIOD: usize = 64;

/// Maps `value` in [-1, 1] to a bucket and the bucket to a run of `ACTIVE_BITS` active bits.
fn encode(value: f64) -> (usize, Vec<usize>) {
    let scaled = (value + 1.0) / 2.0 * (NUM_BUCKETS - 1) as f64;
    let bucket = scaled.round().clamp(0.0, (NUM_BUCKETS - 1) as f64) as usize;
    (bucket, (bucket..bucket + ACTIVE_BITS).collect())
}

fn sample(record: usize) -> f64 {
    (record as f64 * 2.0 * std::f64::consts::PI / PERIOD as f64).sin()
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp(None).init();

    let params = SDRClassifierParams {
        steps: vec![1, 5],
        alpha: 0.1,
        act_value_alpha: 0.3,
        verbosity: 0,
    };

    println!("Initializing Classifier with steps {:?}...", params.steps);

    let mut classifier = SDRClassifier::from_params(&params)?;

    let training_len = PERIOD * 50;
    println!("Training Classifier on {} records...", training_len);

    for record in 0..training_len {
        let value = sample(record);
        let (bucket, pattern) = encode(value);
        classifier.compute(record as u32, &pattern, &[bucket], &[value], false, true, false)?;
    }

    let mut buffer = Vec::new();
    classifier.save(&mut buffer)?;
    println!("Saved classifier state ({} bytes).", buffer.len());

    let mut restored = SDRClassifier::from_reader(buffer.as_slice())?;
    assert!(restored == classifier, "restored classifier differs");
    restored.set_verbosity(1);

    println!("Testing restored Classifier on {} records...", PERIOD);

    let mut error_sum = [0.0; 2];
    let mut correct = [0; 2];

    for record in training_len..training_len + PERIOD {
        let value = sample(record);
        let (bucket, pattern) = encode(value);
        let result =
            restored.compute(record as u32, &pattern, &[bucket], &[value], false, false, true)?;

        for (i, &step) in restored.steps().iter().enumerate() {
            let expected = sample(record + step as usize);
            let (expected_bucket, _) = encode(expected);

            if result.classification(step) == Some(expected_bucket) {
                correct[i] += 1;
            }
            if let Some(predicted) = result.most_likely_value(step) {
                error_sum[i] += (predicted - expected).abs();
            }
        }
    }

    for (i, &step) in restored.steps().iter().enumerate() {
        println!(
            "Step {}: {:.2}% buckets correct, mean absolute error {:.4}",
            step,
            correct[i] as f64 / PERIOD as f64 * 100.0,
            error_sum[i] / PERIOD as f64
        );
    }

    Ok(())
}
