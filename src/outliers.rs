//! Baseline-window trial rejection with robust statistics.
//!
//! For every trial the population standard deviation (`ddof = 0`) of the
//! pre-stimulus samples `[0, baseline_end)` is computed.  Across trials:
//!
//! ```text
//!   median = median(baseline_std)
//!   mad    = median(|baseline_std − median|)
//!   thr    = median + k · mad        (mad > 0)
//!          = 1.5 · median            (mad == 0)
//!   keep   = baseline_std <= thr
//! ```
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LfpError, Result};

/// One entry per original trial, `true` = kept.  Order is the trial order.
pub type KeepMask = Vec<bool>;

/// Summary of one rejection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    /// Median of the per-trial baseline standard deviations.
    pub median: f64,
    /// Median absolute deviation of the same values.
    pub mad: f64,
    /// Acceptance threshold actually applied.
    pub threshold: f64,
    /// Trial count before rejection.
    pub n_before: usize,
    /// Trial count after rejection.
    pub n_after: usize,
}

impl OutlierReport {
    pub fn n_rejected(&self) -> usize {
        self.n_before - self.n_after
    }
}

/// Classify the trials of `raw` ([trials, samples]) as kept or rejected.
///
/// # Errors
///
/// * [`LfpError::MalformedInput`] when `raw` has no trials.
/// * [`LfpError::BaselineOutOfRange`] when `baseline_end` is zero or exceeds
///   the trial length.  The window is never silently truncated.
pub fn detect(raw: &Array2<f64>, baseline_end: usize, k: f64) -> Result<(KeepMask, OutlierReport)> {
    let (n_trials, n_samples) = raw.dim();
    if n_trials == 0 {
        return Err(LfpError::MalformedInput("trial matrix has no trials".into()));
    }
    if baseline_end == 0 || baseline_end > n_samples {
        return Err(LfpError::BaselineOutOfRange { baseline_end, n_samples });
    }

    let stds = baseline_std(raw, baseline_end).to_vec();
    let med = median(&stds);
    let deviations: Vec<f64> = stds.iter().map(|&v| (v - med).abs()).collect();
    let mad = median(&deviations);

    let threshold = if mad == 0.0 {
        log::warn!("baseline MAD is zero, falling back to 1.5 × median = {}", 1.5 * med);
        1.5 * med
    } else {
        med + k * mad
    };

    let keep: KeepMask = stds.iter().map(|&v| v <= threshold).collect();
    let n_after = keep.iter().filter(|&&kept| kept).count();

    log::debug!(
        "outliers: median={med:.4e} mad={mad:.4e} thr={threshold:.4e} kept {n_after}/{n_trials}"
    );

    Ok((
        keep,
        OutlierReport { median: med, mad, threshold, n_before: n_trials, n_after },
    ))
}

/// Per-trial population standard deviation over `[0, baseline_end)`.
pub fn baseline_std(raw: &Array2<f64>, baseline_end: usize) -> Array1<f64> {
    raw.slice(s![.., ..baseline_end])
        .rows()
        .into_iter()
        .map(|row| {
            let n = row.len() as f64;
            let mean = row.sum() / n;
            let var = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect()
}

/// Median of `values`; the mean of the two middle values for even counts.
///
/// `values` must be non-empty.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Rows of `raw` whose mask entry is `true`, in original order.
pub fn kept_trials(raw: &Array2<f64>, keep: &[bool]) -> Array2<f64> {
    raw.select(Axis(0), &kept_indices(keep))
}

/// Original indices of kept trials, strictly ascending.
pub fn kept_indices(keep: &[bool]) -> Vec<usize> {
    keep.iter()
        .enumerate()
        .filter_map(|(i, &kept)| kept.then_some(i))
        .collect()
}
