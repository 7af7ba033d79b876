//! Forward-backward (zero-phase) IIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, a, x)` with its defaults:
//!   • odd-reflection padding of `3 · max(len(a), len(b))` samples per side
//!   • steady-state initial conditions (`lfilter_zi`) scaled by the first
//!     sample of each pass
//!   • forward pass, time reversal, second pass, reversal, padding stripped
//!
//! The output has exactly the input length and no group delay, so samples
//! stay aligned with the stimulus onset/offset indices of the raw trials.
use ndarray::{Array2, ArrayView1};

use super::design::FilterCoefficients;
use crate::error::{LfpError, Result};

/// Filter every trial (row) of `trials` independently; returns a new matrix
/// of the same shape.
pub fn apply_zero_phase(trials: &Array2<f64>, coeffs: &FilterCoefficients) -> Result<Array2<f64>> {
    let mut out = trials.clone();
    apply_zero_phase_inplace(&mut out, coeffs)?;
    Ok(out)
}

/// In-place variant of [`apply_zero_phase`].
pub fn apply_zero_phase_inplace(data: &mut Array2<f64>, coeffs: &FilterCoefficients) -> Result<()> {
    for mut row in data.rows_mut() {
        let x: Vec<f64> = row.to_vec();
        let y = filtfilt(&x, coeffs)?;
        row.assign(&ArrayView1::from(&y));
    }
    Ok(())
}

/// Zero-phase filter a single 1-D signal.
///
/// # Errors
///
/// [`LfpError::MalformedInput`] when `x` is not longer than the edge padding.
pub fn filtfilt(x: &[f64], coeffs: &FilterCoefficients) -> Result<Vec<f64>> {
    let n_x = x.len();
    let n_edge = padlen(coeffs);
    if n_x <= n_edge {
        return Err(LfpError::MalformedInput(format!(
            "signal of {n_x} samples must be longer than the {n_edge}-sample filter padding"
        )));
    }

    let zi = lfilter_zi(coeffs)?;
    let ext = odd_pad(x, n_edge);

    // Forward pass.
    let z0: Vec<f64> = zi.iter().map(|&z| z * ext[0]).collect();
    let mut y = lfilter(coeffs, &ext, Some(&z0));

    // Backward pass.
    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|&z| z * y[0]).collect();
    let mut y = lfilter(coeffs, &y, Some(&z0));
    y.reverse();

    Ok(y[n_edge..n_edge + n_x].to_vec())
}

/// Edge padding used by [`filtfilt`]: `3 · max(len(a), len(b))`.
pub fn padlen(coeffs: &FilterCoefficients) -> usize {
    3 * coeffs.b.len().max(coeffs.a.len())
}

/// Causal IIR filter, direct form II transposed.
///
/// `zi` is the initial delay-line state (`len - 1` values); `None` starts
/// from rest.
pub fn lfilter(coeffs: &FilterCoefficients, x: &[f64], zi: Option<&[f64]>) -> Vec<f64> {
    let (b, a) = (&coeffs.b, &coeffs.a);
    let n = a.len();
    let mut z: Vec<f64> = match zi {
        Some(zi) => zi.to_vec(),
        None => vec![0.0; n.saturating_sub(1)],
    };

    x.iter()
        .map(|&xn| {
            if n == 1 {
                return b[0] * xn;
            }
            let yn = b[0] * xn + z[0];
            for i in 0..n - 2 {
                z[i] = b[i + 1] * xn + z[i + 1] - a[i + 1] * yn;
            }
            z[n - 2] = b[n - 1] * xn - a[n - 1] * yn;
            yn
        })
        .collect()
}

/// Delay-line state of [`lfilter`] in steady state for a unit step input.
///
/// With `y∞ = Σb / Σa`, the transposed form gives
/// `z[k] = Σ_{j>k} (b[j] − a[j] · y∞)`.
pub fn lfilter_zi(coeffs: &FilterCoefficients) -> Result<Vec<f64>> {
    let (b, a) = (&coeffs.b, &coeffs.a);
    let a_sum: f64 = a.iter().sum();
    if a_sum == 0.0 {
        return Err(LfpError::FilterDesign("pole at z = 1, no step steady state".into()));
    }
    let y_ss = b.iter().sum::<f64>() / a_sum;

    let n = a.len();
    let mut zi = vec![0.0; n.saturating_sub(1)];
    let mut acc = 0.0;
    for k in (0..n.saturating_sub(1)).rev() {
        acc += b[k + 1] - a[k + 1] * y_ss;
        zi[k] = acc;
    }
    Ok(zi)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Odd-reflection padding of `n` samples on each side (`n < x.len()`).
///
/// Left:  `pad[i] = 2*x[0] - x[i]`        for i in n..=1
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]`  for i in 1..=n
pub(crate) fn odd_pad(x: &[f64], n: usize) -> Vec<f64> {
    let n_x = x.len();
    debug_assert!(n < n_x, "odd_pad needs n < signal length");

    let mut out = Vec::with_capacity(n_x + 2 * n);

    let first = x[0];
    for i in (1..=n).rev() {
        out.push(2.0 * first - x[i]);
    }

    out.extend_from_slice(x);

    let last = x[n_x - 1];
    for i in 1..=n {
        out.push(2.0 * last - x[n_x - 1 - i]);
    }

    out
}
