//! Power spectral density and spectrogram estimation.
//!
//! Both estimators match their `scipy.signal` counterparts with default
//! options:
//!
//! ```text
//! psd          welch(x, fs, nperseg)          periodic Hann, 50 % overlap
//! spectrogram  spectrogram(x, fs, window, noverlap)   explicit window
//! ```
//!
//! Each segment is mean-detrended, windowed, transformed, and scaled to a
//! one-sided density (V²/Hz): `|X[k]|² / (fs · Σw²)`, doubled for every bin
//! except DC and (for even lengths) Nyquist.
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{s, Array2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;

use crate::error::{LfpError, Result};

/// One-sided PSD: `power[i]` at `frequencies[i]` Hz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Psd {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
}

impl Psd {
    /// Keep only bins with `f <= max_freq`.
    pub fn restrict(&self, max_freq: f64) -> Psd {
        let n = count_up_to(&self.frequencies, max_freq);
        Psd {
            frequencies: self.frequencies[..n].to_vec(),
            power: self.power[..n].to_vec(),
        }
    }

    /// Highest frequency on the axis (`fs / 2` for [`psd`] output).
    pub fn max_frequency(&self) -> Option<f64> {
        self.frequencies.last().copied()
    }
}

/// Short-time PSD; `power` is indexed `(frequency, time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub frequencies: Vec<f64>,
    /// Segment centres in seconds.
    pub times: Vec<f64>,
    pub power: Array2<f64>,
}

impl Spectrogram {
    /// Keep only frequency rows with `f <= max_freq`.
    pub fn restrict(&self, max_freq: f64) -> Spectrogram {
        let n = count_up_to(&self.frequencies, max_freq);
        Spectrogram {
            frequencies: self.frequencies[..n].to_vec(),
            times: self.times.clone(),
            power: self.power.slice(s![..n, ..]).to_owned(),
        }
    }
}

/// Hann window of length `n`.
///
/// `symmetric = true` gives the filter-design form (`cos(2πi / (n−1))`,
/// `scipy.signal.windows.hann(n)`); `false` the periodic form used for
/// spectral analysis (`cos(2πi / n)`, `get_window('hann', n)`).
pub fn hann(n: usize, symmetric: bool) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![1.0],
        _ => {
            let denom = if symmetric { (n - 1) as f64 } else { n as f64 };
            (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
                .collect()
        }
    }
}

/// Welch PSD of a 1-D signal.
///
/// Segments of `segment_len` samples (shrunk to the signal length when the
/// signal is shorter) with 50 % overlap are averaged.  The frequency axis
/// runs from 0 to `fs / 2` in steps of `fs / segment_len`.
///
/// # Errors
///
/// [`LfpError::InvalidParameter`] for an empty signal, a zero segment
/// length, or a non-positive `fs`.
pub fn psd(signal: &[f64], fs: f64, segment_len: usize) -> Result<Psd> {
    check_common(signal, fs)?;
    if segment_len == 0 {
        return Err(LfpError::InvalidParameter("PSD segment length must be > 0".into()));
    }
    let nperseg = segment_len.min(signal.len());
    let step = nperseg - nperseg / 2;

    let mut est = Periodogram::new(hann(nperseg, false), fs);
    let mut accum = vec![0.0; nperseg / 2 + 1];
    let starts = segment_starts(signal.len(), nperseg, step);
    for &start in &starts {
        let density = est.density(&signal[start..start + nperseg]);
        accum.iter_mut().zip(density).for_each(|(a, d)| *a += d);
    }
    let inv = 1.0 / starts.len() as f64;
    accum.iter_mut().for_each(|v| *v *= inv);

    Ok(Psd { frequencies: onesided_freqs(nperseg, fs), power: accum })
}

/// Spectrogram of a 1-D signal with an explicit `window` and `overlap`.
///
/// Frames are `window.len()` samples long and advance by
/// `window.len() − overlap`; only complete frames are used.
///
/// # Errors
///
/// [`LfpError::InvalidParameter`] when the window is empty or longer than
/// the signal, or when `overlap >= window.len()`.
pub fn spectrogram(signal: &[f64], fs: f64, window: &[f64], overlap: usize) -> Result<Spectrogram> {
    check_common(signal, fs)?;
    let nperseg = window.len();
    if nperseg == 0 || overlap >= nperseg {
        return Err(LfpError::InvalidParameter(format!(
            "overlap {overlap} must be smaller than window length {nperseg}"
        )));
    }
    if nperseg > signal.len() {
        return Err(LfpError::InvalidParameter(format!(
            "window of {nperseg} samples is longer than the {}-sample signal",
            signal.len()
        )));
    }
    let step = nperseg - overlap;

    let starts = segment_starts(signal.len(), nperseg, step);
    let mut est = Periodogram::new(window.to_vec(), fs);
    let mut power = Array2::<f64>::zeros((nperseg / 2 + 1, starts.len()));
    for (t, &start) in starts.iter().enumerate() {
        let density = est.density(&signal[start..start + nperseg]);
        power.column_mut(t).iter_mut().zip(density).for_each(|(p, d)| *p = d);
    }

    let half = nperseg as f64 / 2.0;
    let times = starts.iter().map(|&start| (start as f64 + half) / fs).collect();

    Ok(Spectrogram { frequencies: onesided_freqs(nperseg, fs), times, power })
}

/// Linearly interpolate `psd` onto the grid `0, w, 2w, … <= max_freq`
/// (clipped to the last frequency of `psd`).
pub fn interpolate_bins(psd: &Psd, bin_width: f64, max_freq: f64) -> Result<Psd> {
    if !(bin_width.is_finite() && bin_width > 0.0) {
        return Err(LfpError::InvalidParameter(format!("bin width must be > 0, got {bin_width}")));
    }
    let (f, p) = (&psd.frequencies, &psd.power);
    let Some(&f_last) = f.last() else {
        return Ok(Psd { frequencies: vec![], power: vec![] });
    };
    let ceiling = max_freq.min(f_last);

    let mut frequencies = Vec::new();
    let mut power = Vec::new();
    let mut j = 0;
    let mut k = 0usize;
    loop {
        let target = k as f64 * bin_width;
        if target > ceiling + 1e-9 * bin_width {
            break;
        }
        while j + 1 < f.len() && f[j + 1] < target {
            j += 1;
        }
        let value = if j + 1 >= f.len() || f[j + 1] == f[j] {
            p[j]
        } else {
            let frac = ((target - f[j]) / (f[j + 1] - f[j])).clamp(0.0, 1.0);
            p[j] + frac * (p[j + 1] - p[j])
        };
        frequencies.push(target);
        power.push(value);
        k += 1;
    }
    Ok(Psd { frequencies, power })
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Windowed, detrended, density-scaled one-sided periodogram of fixed length.
struct Periodogram {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    scale: f64,
    buf: Vec<Complex<f64>>,
}

impl Periodogram {
    fn new(window: Vec<f64>, fs: f64) -> Self {
        let n = window.len();
        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let win_s2: f64 = window.iter().map(|w| w * w).sum();
        Self {
            fft: planner.plan_fft_forward(n),
            scale: 1.0 / (fs * win_s2),
            window,
            buf: vec![Complex::default(); n],
        }
    }

    fn density(&mut self, segment: &[f64]) -> Vec<f64> {
        let n = self.window.len();
        let mean = segment.iter().sum::<f64>() / n as f64;
        for ((b, &x), &w) in self.buf.iter_mut().zip(segment).zip(&self.window) {
            *b = Complex { re: (x - mean) * w, im: 0.0 };
        }
        self.fft.process(&mut self.buf);

        let n_freq = n / 2 + 1;
        let nyquist_bin = if n % 2 == 0 { Some(n / 2) } else { None };
        (0..n_freq)
            .map(|k| {
                let v = self.buf[k].norm_sqr() * self.scale;
                if k == 0 || Some(k) == nyquist_bin { v } else { 2.0 * v }
            })
            .collect()
    }
}

fn check_common(signal: &[f64], fs: f64) -> Result<()> {
    if signal.is_empty() {
        return Err(LfpError::InvalidParameter("empty signal".into()));
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(LfpError::InvalidParameter(format!("sampling rate must be > 0, got {fs}")));
    }
    Ok(())
}

/// Start offsets of every complete `nperseg` segment advancing by `step`.
fn segment_starts(len: usize, nperseg: usize, step: usize) -> Vec<usize> {
    (0..=len - nperseg).step_by(step).collect()
}

fn onesided_freqs(nfft: usize, fs: f64) -> Vec<f64> {
    (0..nfft / 2 + 1).map(|k| k as f64 * fs / nfft as f64).collect()
}

fn count_up_to(frequencies: &[f64], max_freq: f64) -> usize {
    frequencies.iter().take_while(|&&f| f <= max_freq).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_forms() {
        let sym = hann(5, true);
        approx::assert_abs_diff_eq!(sym[0], 0.0, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(sym[2], 1.0, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(sym[4], 0.0, epsilon = 1e-15);
        let per = hann(4, false);
        assert_eq!(per.len(), 4);
        approx::assert_abs_diff_eq!(per[2], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn segment_count_matches_welch() {
        // (2000 − 256) / 128 + 1 = 14
        assert_eq!(segment_starts(2000, 256, 128).len(), 14);
        // one-sample hop: 2000 − 256 + 1 frames
        assert_eq!(segment_starts(2000, 256, 1).len(), 1745);
    }

    #[test]
    fn constant_signal_has_no_power() {
        let out = psd(&[2.5; 1024], 1000.0, 256).unwrap();
        for p in out.power {
            approx::assert_abs_diff_eq!(p, 0.0, epsilon = 1e-20);
        }
    }

    #[test]
    fn restrict_keeps_bins_at_or_below_ceiling() {
        let out = psd(&vec![0.0; 512], 1000.0, 100).unwrap();
        let r = out.restrict(200.0);
        assert_eq!(r.frequencies.last().copied(), Some(200.0));
        assert_eq!(r.frequencies.len(), r.power.len());
    }

    #[test]
    fn interpolation_hits_grid_points() {
        let psd = Psd { frequencies: vec![0.0, 10.0, 20.0], power: vec![0.0, 10.0, 30.0] };
        let binned = interpolate_bins(&psd, 5.0, 15.0).unwrap();
        assert_eq!(binned.frequencies, vec![0.0, 5.0, 10.0, 15.0]);
        assert_eq!(binned.power, vec![0.0, 5.0, 10.0, 20.0]);
    }

    #[test]
    fn overlap_not_below_window_rejected() {
        let w = hann(8, true);
        assert!(spectrogram(&[0.0; 64], 100.0, &w, 8).is_err());
    }
}
