//! Temporal Derivative Distribution Repair for motion artifacts
//!
//! Iteratively reweighted robust smoothing of the low-frequency derivative;
//! spikes get near-zero weight and are flattened out of the slow component
//! while the high-frequency residual passes through unchanged.

use crate::filters::{butter_lowpass_sos, sosfiltfilt};
use crate::stage::TableStage;
use nirs_core::{NirsResult, SampleTable, WarningLog};

/// Cutoff of the slow/fast split (Hz)
const LOWPASS_CUTOFF_HZ: f64 = 0.5;
/// Order of the slow/fast split filter
const LOWPASS_ORDER: usize = 3;
/// Tukey biweight tuning constant
const TUNE: f64 = 4.685;
/// Consistency factor relating MAD to the standard deviation
const MAD_SCALE: f64 = 1.4826;
/// Fixed iteration count of the reweighting loop
const ITERATIONS: usize = 50;

/// Median of a sample; NaN when empty. Averages the middle pair for even
/// counts. NaN inputs sort last and poison the result, matching the NaN
/// propagation contract.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Repair one channel's signal. Output length equals input length.
pub fn tddr(signal: &[f64], sample_rate: f64) -> NirsResult<Vec<f64>> {
    let n = signal.len();
    if n < 3 {
        return Ok(signal.to_vec());
    }

    let mean = signal.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = signal.iter().map(|v| v - mean).collect();

    let sections = butter_lowpass_sos(LOWPASS_ORDER, LOWPASS_CUTOFF_HZ, sample_rate)?;
    let slow = sosfiltfilt(&sections, &centered);
    let fast: Vec<f64> = centered.iter().zip(&slow).map(|(x, s)| x - s).collect();

    let deriv: Vec<f64> = slow.windows(2).map(|w| w[1] - w[0]).collect();

    let mut weights = vec![1.0; deriv.len()];
    let mut mu = 0.0;
    for _ in 0..ITERATIONS {
        let weight_sum: f64 = weights.iter().sum();
        mu = weights
            .iter()
            .zip(&deriv)
            .map(|(w, d)| w * d)
            .sum::<f64>()
            / weight_sum;
        let dev: Vec<f64> = deriv.iter().map(|d| (d - mu).abs()).collect();
        let sigma = MAD_SCALE * median(&dev);
        if sigma == 0.0 {
            // Already consistent (e.g. constant derivative); the current
            // weights stand and the correction degenerates to the identity.
            break;
        }
        for (w, dv) in weights.iter_mut().zip(&dev) {
            let r = dv / (sigma * TUNE);
            *w = if r < 1.0 {
                let t = 1.0 - r * r;
                t * t
            } else {
                0.0
            };
        }
    }

    let corrected_deriv: Vec<f64> = weights
        .iter()
        .zip(&deriv)
        .map(|(w, d)| w * (d - mu))
        .collect();

    // Rebuild the slow component; the leading zero preserves length
    let mut slow_corrected = Vec::with_capacity(n);
    let mut acc = 0.0;
    slow_corrected.push(acc);
    for d in &corrected_deriv {
        acc += d;
        slow_corrected.push(acc);
    }

    Ok(slow_corrected
        .iter()
        .zip(&fast)
        .map(|(s, h)| s + h + mean)
        .collect())
}

/// TDDR stage applied independently to every signal column
pub struct TddrStage {
    sample_rate: f64,
}

impl TddrStage {
    pub fn new(sample_rate: f64) -> Self {
        TddrStage { sample_rate }
    }
}

impl TableStage for TddrStage {
    fn name(&self) -> &str {
        "tddr"
    }

    fn apply(&self, input: &SampleTable, _warnings: &mut WarningLog) -> NirsResult<SampleTable> {
        input.map_columns(|_, values| tddr(values, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_signal_stays_zero() {
        let x = vec![0.0; 100];
        let y = tddr(&x, 10.0).unwrap();
        assert_eq!(y.len(), 100);
        for v in &y {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let x = vec![3.5; 80];
        let y = tddr(&x, 10.0).unwrap();
        for v in &y {
            assert!((v - 3.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_spike_is_attenuated() {
        let mut x = vec![0.0; 200];
        x[100] = 10.0;
        let y = tddr(&x, 10.0).unwrap();
        assert_eq!(y.len(), x.len());

        let peak_in = x.iter().fold(0.0f64, |a, &b| a.max(b.abs()));
        let peak_out = y.iter().fold(0.0f64, |a, &b| a.max(b.abs()));
        assert!(
            peak_out < peak_in,
            "corrected peak {} not below original {}",
            peak_out,
            peak_in
        );
    }

    #[test]
    fn test_short_input_passthrough() {
        let x = vec![1.0, 2.0];
        assert_eq!(tddr(&x, 10.0).unwrap(), x);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());
    }
}
