//! Digital filters: Butterworth sections and the zero-phase FIR band-pass

use crate::stage::TableStage;
use nirs_core::{NirsError, NirsResult, SampleTable, WarningLog};
use num_complex::Complex64;
use realfft::RealFftPlanner;
use std::f64::consts::PI;

/// Single biquad section (2nd order, direct form II transposed)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Causal single-pass filtering with zero initial state
    pub fn filter(&self, x: &[f64]) -> Vec<f64> {
        let mut z1 = 0.0;
        let mut z2 = 0.0;
        x.iter()
            .map(|&xi| {
                let y = self.b0 * xi + z1;
                z1 = self.b1 * xi - self.a1 * y + z2;
                z2 = self.b2 * xi - self.a2 * y;
                y
            })
            .collect()
    }
}

/// Design a Butterworth lowpass as cascaded second-order sections.
///
/// Analog prototype poles mapped through the bilinear transform with
/// frequency pre-warping; odd orders get one first-order section.
pub fn butter_lowpass_sos(order: usize, cutoff: f64, fs: f64) -> NirsResult<Vec<Biquad>> {
    if order == 0 {
        return Err(NirsError::Config {
            reason: "filter order must be at least 1".to_string(),
        });
    }
    if !(cutoff > 0.0 && cutoff < fs / 2.0) {
        return Err(NirsError::Config {
            reason: format!(
                "cutoff {} Hz must lie below the Nyquist frequency {} Hz",
                cutoff,
                fs / 2.0
            ),
        });
    }

    // Pre-warp the cutoff for the bilinear transform
    let warped = 2.0 * fs * (PI * cutoff / fs).tan();
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let n = order;
    let mut sections = Vec::with_capacity((n + 1) / 2);

    // Conjugate pole pairs of the analog prototype
    for k in 0..n / 2 {
        let theta = PI * (2 * k + n + 1) as f64 / (2 * n) as f64;
        let pole = Complex64::new(theta.cos(), theta.sin()) * warped;
        let z = (fs2 + pole) / (fs2 - pole);
        let a1 = -2.0 * z.re;
        let a2 = z.norm_sqr();
        // Zeros at Nyquist, unity gain at DC
        let g = (1.0 + a1 + a2) / 4.0;
        sections.push(Biquad {
            b0: g,
            b1: 2.0 * g,
            b2: g,
            a1,
            a2,
        });
    }

    if n % 2 == 1 {
        // Remaining real pole
        let z = (2.0 * fs - warped) / (2.0 * fs + warped);
        let a1 = -z;
        let g = (1.0 + a1) / 2.0;
        sections.push(Biquad {
            b0: g,
            b1: g,
            b2: 0.0,
            a1,
            a2: 0.0,
        });
    }

    Ok(sections)
}

/// Extend a signal by odd reflection on both ends
fn odd_ext(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        ext.push(2.0 * x[0] - x[i]);
    }
    ext.extend_from_slice(x);
    for i in 0..padlen {
        ext.push(2.0 * x[n - 1] - x[n - 2 - i]);
    }
    ext
}

/// Zero-phase forward-backward filtering through cascaded sections.
///
/// Pads by odd reflection; the pad length is clamped for short signals so
/// the call never raises.
pub fn sosfiltfilt(sections: &[Biquad], x: &[f64]) -> Vec<f64> {
    if x.len() < 2 {
        return x.to_vec();
    }
    let padlen = (3 * (2 * sections.len() + 1)).min(x.len() - 1);
    let mut y = odd_ext(x, padlen);
    for s in sections {
        y = s.filter(&y);
    }
    y.reverse();
    for s in sections {
        y = s.filter(&y);
    }
    y.reverse();
    y[padlen..padlen + x.len()].to_vec()
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// FFT-based full convolution, truncated to the causal filter output length
fn fft_lfilter(taps: &[f64], x: &[f64]) -> NirsResult<Vec<f64>> {
    let full = x.len() + taps.len() - 1;
    let size = full.next_power_of_two();

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(size);
    let c2r = planner.plan_fft_inverse(size);

    let mut xa = vec![0.0; size];
    xa[..x.len()].copy_from_slice(x);
    let mut ha = vec![0.0; size];
    ha[..taps.len()].copy_from_slice(taps);

    let mut xs = r2c.make_output_vec();
    let mut hs = r2c.make_output_vec();
    r2c.process(&mut xa, &mut xs)
        .map_err(|e| NirsError::Config { reason: format!("fft forward failed: {}", e) })?;
    r2c.process(&mut ha, &mut hs)
        .map_err(|e| NirsError::Config { reason: format!("fft forward failed: {}", e) })?;

    for (a, b) in xs.iter_mut().zip(hs.iter()) {
        *a *= *b;
    }

    let mut out = c2r.make_output_vec();
    c2r.process(&mut xs, &mut out)
        .map_err(|e| NirsError::Config { reason: format!("fft inverse failed: {}", e) })?;

    let scale = 1.0 / size as f64;
    Ok(out[..x.len()].iter().map(|v| v * scale).collect())
}

/// Windowed-sinc FIR band-pass applied zero-phase (forward-backward).
///
/// The hemodynamic-response defaults are order 1000 over 0.01-0.1 Hz.
#[derive(Debug, Clone)]
pub struct FirBandpass {
    pub order: usize,
    pub low: f64,
    pub high: f64,
}

impl FirBandpass {
    pub fn new(order: usize, low: f64, high: f64) -> NirsResult<Self> {
        if order < 2 {
            return Err(NirsError::Config {
                reason: format!("FIR order {} is too small", order),
            });
        }
        if !(low > 0.0 && low < high) {
            return Err(NirsError::Config {
                reason: format!("invalid pass-band [{}, {}] Hz", low, high),
            });
        }
        Ok(FirBandpass { order, low, high })
    }

    /// Hemodynamic response band
    pub fn hemodynamic() -> Self {
        FirBandpass {
            order: 1000,
            low: 0.01,
            high: 0.1,
        }
    }

    /// Hamming-windowed sinc taps, normalized to unity gain at the
    /// pass-band centre.
    pub fn design_taps(&self, fs: f64) -> NirsResult<Vec<f64>> {
        if self.high >= fs / 2.0 {
            return Err(NirsError::Config {
                reason: format!(
                    "high cutoff {} Hz must be less than the Nyquist frequency {} Hz",
                    self.high,
                    fs / 2.0
                ),
            });
        }

        let ntaps = self.order + 1;
        let m = self.order as f64 / 2.0;
        let fl = self.low / fs;
        let fh = self.high / fs;

        let mut taps = Vec::with_capacity(ntaps);
        for i in 0..ntaps {
            let k = i as f64 - m;
            let ideal = 2.0 * fh * sinc(2.0 * fh * k) - 2.0 * fl * sinc(2.0 * fl * k);
            let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / self.order as f64).cos();
            taps.push(ideal * window);
        }

        // Unity gain at the centre of the pass-band
        let wc = 2.0 * PI * 0.5 * (fl + fh);
        let gain: f64 = taps
            .iter()
            .enumerate()
            .map(|(i, &h)| h * (wc * (i as f64 - m)).cos())
            .sum();
        if gain.abs() < f64::EPSILON {
            return Err(NirsError::Config {
                reason: "degenerate pass-band: zero gain at band centre".to_string(),
            });
        }
        for h in taps.iter_mut() {
            *h /= gain;
        }
        Ok(taps)
    }

    /// Zero-phase filtering with odd-reflection padding.
    ///
    /// Refuses signals not longer than 3x the filter order.
    pub fn filtfilt(&self, x: &[f64], fs: f64) -> NirsResult<Vec<f64>> {
        let required = 3 * self.order;
        if x.len() <= required {
            return Err(NirsError::DataTooShort {
                samples: x.len(),
                required,
            });
        }

        // A non-finite sample poisons the whole zero-phase convolution;
        // returning the poisoned output directly keeps NaN propagation
        // from tripping the FFT input checks.
        if x.iter().any(|v| !v.is_finite()) {
            return Ok(vec![f64::NAN; x.len()]);
        }

        let taps = self.design_taps(fs)?;
        let padlen = required;
        let ext = odd_ext(x, padlen);

        let mut y = fft_lfilter(&taps, &ext)?;
        y.reverse();
        let mut y = fft_lfilter(&taps, &y)?;
        y.reverse();

        Ok(y[padlen..padlen + x.len()].to_vec())
    }
}

/// Band-pass stage over every signal column of the table
pub struct BandpassStage {
    filter: FirBandpass,
    sample_rate: f64,
}

impl BandpassStage {
    pub fn new(filter: FirBandpass, sample_rate: f64) -> Self {
        BandpassStage {
            filter,
            sample_rate,
        }
    }
}

impl TableStage for BandpassStage {
    fn name(&self) -> &str {
        "bandpass"
    }

    fn apply(&self, input: &SampleTable, warnings: &mut WarningLog) -> NirsResult<SampleTable> {
        input.map_columns(|id, values| {
            if values.iter().any(|v| !v.is_finite()) {
                warnings.push(
                    "bandpass",
                    format!("column {} contains non-finite values; output is NaN", id),
                );
            }
            self.filter.filtfilt(values, self.sample_rate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_butter_dc_gain() {
        let sections = butter_lowpass_sos(3, 0.5, 10.0).unwrap();
        assert_eq!(sections.len(), 2);

        let x = vec![1.0; 400];
        let y = sosfiltfilt(&sections, &x);
        assert_eq!(y.len(), x.len());
        // Constant input passes through a lowpass untouched; stay clear of
        // the start-up transients when checking
        for v in &y[150..250] {
            assert!((v - 1.0).abs() < 1e-6, "got {}", v);
        }
    }

    #[test]
    fn test_butter_attenuates_fast_oscillation() {
        let fs = 10.0;
        let sections = butter_lowpass_sos(3, 0.5, fs).unwrap();
        // 4 Hz tone, far above the 0.5 Hz cutoff
        let x: Vec<f64> = (0..500)
            .map(|i| (2.0 * PI * 4.0 * i as f64 / fs).sin())
            .collect();
        let y = sosfiltfilt(&sections, &x);
        assert!(rms(&y[100..400]) < 0.05 * rms(&x[100..400]));
    }

    #[test]
    fn test_butter_rejects_bad_cutoff() {
        assert!(butter_lowpass_sos(3, 6.0, 10.0).is_err());
        assert!(butter_lowpass_sos(0, 0.5, 10.0).is_err());
    }

    #[test]
    fn test_fir_refuses_short_signal() {
        let filter = FirBandpass::hemodynamic();
        let x = vec![0.0; 1500];
        let err = filter.filtfilt(&x, 50.0).unwrap_err();
        assert_eq!(
            err,
            NirsError::DataTooShort {
                samples: 1500,
                required: 3000
            }
        );
    }

    #[test]
    fn test_fir_passband_and_dc() {
        // Normalized-band layout: fs = 1 Hz, band 0.01-0.1
        let fs = 1.0;
        let filter = FirBandpass::new(600, 0.01, 0.1).unwrap();
        let n = 2000;

        // In-band tone at 0.05 cycles/sample survives
        let tone: Vec<f64> = (0..n).map(|i| (2.0 * PI * 0.05 * i as f64).sin()).collect();
        let filtered = filter.filtfilt(&tone, fs).unwrap();
        assert_eq!(filtered.len(), n);
        let mid = 500..1500;
        let err: f64 = tone[mid.clone()]
            .iter()
            .zip(&filtered[mid.clone()])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(err < 0.15, "passband distortion {}", err);

        // Constant offset is rejected
        let dc = vec![5.0; n];
        let filtered = filter.filtfilt(&dc, fs).unwrap();
        let peak = filtered[mid].iter().fold(0.0f64, |a, &b| a.max(b.abs()));
        assert!(peak < 0.25, "DC leak {}", peak);
    }

    #[test]
    fn test_fir_nan_input_propagates() {
        let filter = FirBandpass::new(10, 0.01, 0.1).unwrap();
        let mut x = vec![1.0; 100];
        x[50] = f64::NAN;
        let y = filter.filtfilt(&x, 1.0).unwrap();
        assert_eq!(y.len(), 100);
        assert!(y.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_odd_ext_shape() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let ext = odd_ext(&x, 2);
        assert_eq!(ext, vec![-1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
