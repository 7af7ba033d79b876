//! IIR low-pass design matching `scipy.signal.butter(order, Wn, 'low')`.
//!
//! For a cutoff `cutoff_hz` at sampling rate `fs`:
//!   • `Wn = cutoff_hz / (fs / 2)`, must lie in `(0, 1)`
//!   • analog Butterworth prototype: `order` poles on the left unit semicircle
//!   • pre-warp `ω = 4 · tan(π · Wn / 2)` and scale poles / gain by `ω`
//!   • bilinear transform (`fs = 2` normalisation): `z = (4 + s) / (4 − s)`,
//!     all `order` zeros land on `z = −1`
//!   • expand zeros / poles into the `(b, a)` polynomials
//!
//! The expanded denominator is re-checked with a Schur–Cohn step-down test,
//! so a design that only loses stability through coefficient rounding (very
//! low `Wn` at high order) is rejected as well.
use std::f64::consts::PI;

use rustfft::num_complex::Complex;

use crate::error::{LfpError, Result};

/// Transfer-function coefficients `H(z) = B(z) / A(z)`.
///
/// `b` and `a` always have the same length and `a[0] == 1`.  Designed once
/// and shared read-only by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl FilterCoefficients {
    /// Build from arbitrary `(b, a)`: zero-pads the shorter polynomial and
    /// normalises by `a[0]`.
    pub fn new(mut b: Vec<f64>, mut a: Vec<f64>) -> Result<Self> {
        if b.is_empty() || a.is_empty() {
            return Err(LfpError::FilterDesign("empty coefficient vector".into()));
        }
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(LfpError::FilterDesign(format!("leading denominator coefficient is {a0}")));
        }
        let n = b.len().max(a.len());
        b.resize(n, 0.0);
        a.resize(n, 0.0);
        b.iter_mut().for_each(|v| *v /= a0);
        a.iter_mut().for_each(|v| *v /= a0);
        Ok(Self { b, a })
    }

    /// Number of taps of each polynomial (`order + 1` for a designed filter).
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Filter order.
    pub fn order(&self) -> usize {
        self.a.len().saturating_sub(1)
    }

    /// Magnitude response `|H(e^{jω})|` at `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / fs;
        let eval = |c: &[f64]| -> Complex<f64> {
            c.iter()
                .enumerate()
                .map(|(k, &v)| Complex::from_polar(v, -w * k as f64))
                .sum()
        };
        (eval(&self.b) / eval(&self.a)).norm()
    }
}

/// Design a digital Butterworth low-pass filter.
///
/// # Errors
///
/// [`LfpError::FilterDesign`] when `order == 0`, when the normalised cutoff
/// is outside `(0, 1)`, or when the resulting filter is not stable.
pub fn design_lowpass(fs: f64, cutoff_hz: f64, order: usize) -> Result<FilterCoefficients> {
    if order == 0 {
        return Err(LfpError::FilterDesign("filter order must be >= 1".into()));
    }
    let wn = cutoff_hz / (fs / 2.0);
    if !(wn.is_finite() && wn > 0.0 && wn < 1.0) {
        return Err(LfpError::FilterDesign(format!(
            "cutoff {cutoff_hz} Hz is not strictly between 0 and Nyquist ({} Hz)",
            fs / 2.0
        )));
    }

    let (zeros, poles, gain) = butter_zpk(order, wn);
    if let Some(p) = poles.iter().find(|p| p.norm() >= 1.0) {
        return Err(LfpError::FilterDesign(format!("pole {p} outside the unit circle")));
    }

    let b: Vec<f64> = poly(&zeros).iter().map(|c| c.re * gain).collect();
    let a: Vec<f64> = poly(&poles).iter().map(|c| c.re).collect();

    if b.iter().chain(a.iter()).any(|v| !v.is_finite()) {
        return Err(LfpError::FilterDesign("non-finite coefficients".into()));
    }
    if !is_stable(&a) {
        return Err(LfpError::FilterDesign(format!(
            "order {order} at Wn = {wn:.3e} is numerically unstable in transfer-function form"
        )));
    }

    log::debug!("designed order-{order} Butterworth low-pass, Wn = {wn:.4}");
    FilterCoefficients::new(b, a)
}

/// Analog Butterworth prototype poles (unit cutoff, no zeros, unit gain).
pub fn buttap(order: usize) -> Vec<Complex<f64>> {
    let n = order as f64;
    (0..order)
        .map(|i| {
            let m = 2.0 * i as f64 - (n - 1.0);
            -Complex::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Digital zeros, poles and gain of a Butterworth low-pass at `wn`
/// (fraction of Nyquist).
pub fn butter_zpk(order: usize, wn: f64) -> (Vec<Complex<f64>>, Vec<Complex<f64>>, f64) {
    // Bilinear transform with fs = 2, so 2·fs = 4.
    let fs2 = 4.0;
    let warped = fs2 * (PI * wn / 2.0).tan();

    let analog: Vec<Complex<f64>> = buttap(order).into_iter().map(|p| p * warped).collect();
    let k_analog = warped.powi(order as i32);

    let poles: Vec<Complex<f64>> = analog.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let zeros = vec![Complex::new(-1.0, 0.0); order];
    let denom: Complex<f64> = analog.iter().map(|&p| fs2 - p).product();
    let gain = k_analog / denom.re;

    (zeros, poles, gain)
}

/// Monic polynomial with the given roots, highest power first.
pub fn poly(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut c = vec![Complex::new(1.0, 0.0)];
    for &r in roots {
        c.push(Complex::new(0.0, 0.0));
        for j in (1..c.len()).rev() {
            let prev = c[j - 1];
            c[j] -= r * prev;
        }
    }
    c
}

/// Schur–Cohn step-down test: `true` when every root of the monic
/// polynomial `a` lies strictly inside the unit circle.
pub fn is_stable(a: &[f64]) -> bool {
    if a.is_empty() || a[0] == 0.0 {
        return false;
    }
    let mut p: Vec<f64> = a.iter().map(|&v| v / a[0]).collect();
    for m in (1..p.len()).rev() {
        let k = p[m];
        if !(k.abs() < 1.0) {
            return false;
        }
        let denom = 1.0 - k * k;
        let next: Vec<f64> = (0..m).map(|i| (p[i] - k * p[m - i]) / denom).collect();
        p = next;
    }
    true
}
