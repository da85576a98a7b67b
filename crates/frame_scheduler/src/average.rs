/// Incremental mean: folds `sample` into an average of `passes_completed`
/// earlier samples. Equivalent to `(previous * n + sample) / (n + 1)` without
/// the growing product, so a constant input stays exact for any `n`.
pub fn running_average(previous: f32, sample: f32, passes_completed: u32) -> f32 {
    if passes_completed == 0 {
        return sample;
    }
    let weight = 1.0 / (passes_completed as f64 + 1.0);
    (previous as f64 + (sample as f64 - previous as f64) * weight) as f32
}

/// Applies [`running_average`] per channel. `settled` and `incoming` are
/// row-major RGBA of equal length; the result lands in `incoming`, which
/// becomes the next settled image.
pub fn accumulate_rgba(settled: &[[f32; 4]], incoming: &mut [[f32; 4]], passes_completed: u32) {
    assert_eq!(
        settled.len(),
        incoming.len(),
        "accumulation images must have equal pixel counts"
    );
    if passes_completed == 0 {
        return;
    }
    for (previous, sample) in settled.iter().zip(incoming.iter_mut()) {
        for channel in 0..4 {
            sample[channel] = running_average(previous[channel], sample[channel], passes_completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_samples_average_to_themselves() {
        for value in [0.0_f32, 0.25, 1.0, 3.5e-3, 1234.5] {
            let mut average = value;
            for passes_completed in 0..5000 {
                average = running_average(average, value, passes_completed);
                assert!(
                    (average - value).abs() <= f32::EPSILON * value.abs().max(1.0),
                    "average drifted to {average} for {value} after {passes_completed} passes"
                );
            }
        }
    }

    #[test]
    fn running_average_matches_arithmetic_mean() {
        let samples = [0.1_f32, 0.9, 0.4, 0.6, 0.5, 0.0, 1.0];
        let mut average = 0.0;
        for (passes_completed, sample) in samples.iter().enumerate() {
            average = running_average(average, *sample, passes_completed as u32);
        }
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!((average - mean).abs() < 1e-6);
    }

    #[test]
    fn first_pass_overwrites_undefined_settled_content() {
        let settled = [[f32::NAN; 4]];
        let mut incoming = [[0.5, 0.25, 0.0, 1.0]];
        accumulate_rgba(&settled, &mut incoming, 0);
        assert_eq!(incoming, [[0.5, 0.25, 0.0, 1.0]]);
    }

    #[test]
    fn accumulate_rgba_weights_by_completed_passes() {
        let settled = [[1.0, 0.0, 0.5, 1.0]];
        let mut incoming = [[0.0, 1.0, 0.5, 1.0]];
        accumulate_rgba(&settled, &mut incoming, 3);
        assert_eq!(incoming, [[0.75, 0.25, 0.5, 1.0]]);
    }
}
