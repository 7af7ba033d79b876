//! Analysis configuration.
//!
//! [`LfpConfig`] holds every tunable parameter of the session pipeline.  All
//! fields have defaults matching the two-tone mouse LFP recordings (10 kHz,
//! 200 trials per session, tone onset at 100 ms).
use serde::{Deserialize, Serialize};

use crate::error::{LfpError, Result};

/// Configuration for the per-session LFP pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use lfp::LfpConfig;
///
/// let cfg = LfpConfig {
///     cutoff_hz: 500.0,   // stronger low-pass
///     outlier_k: 3.0,     // stricter rejection
///     ..LfpConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// The struct also deserializes from JSON; missing keys fall back to the
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfpConfig {
    /// Sampling rate in Hz.
    ///
    /// Sets the Nyquist frequency used by the filter design and the time and
    /// frequency axes of every spectral product.
    ///
    /// Default: `10000.0` Hz.
    pub fs: f64,

    /// Low-pass cutoff in Hz (the −3 dB point of the Butterworth response).
    ///
    /// Default: `1000.0` Hz.
    pub cutoff_hz: f64,

    /// Butterworth filter order.
    ///
    /// Applied forward and backward, so the effective magnitude response is
    /// the square of a filter of this order.
    ///
    /// Default: `10`.
    pub filter_order: usize,

    /// Spacing of the PSD comparison grid built by
    /// [`crate::spectral::interpolate_bins`].
    ///
    /// Default: `5.0` Hz.
    pub bin_width_hz: f64,

    /// Frequency ceiling for display and comparison of PSD / spectrogram
    /// outputs.
    ///
    /// Default: `200.0` Hz.
    pub max_freq_hz: f64,

    /// Expected number of sessions in a recording. Only a validation hint.
    ///
    /// Default: `4`.
    pub num_sessions: usize,

    /// Expected number of trials per session. Only a validation hint.
    ///
    /// Default: `200`.
    pub num_trials: usize,

    /// Sample index of stimulus onset; `[0, stim_onset_sample)` is the
    /// baseline window used for outlier rejection.
    ///
    /// Default: `1000` (100 ms at 10 kHz).
    pub stim_onset_sample: usize,

    /// Sample index of stimulus offset.
    ///
    /// Default: `1500` (150 ms at 10 kHz).
    pub stim_offset_sample: usize,

    /// MAD multiplier of the rejection threshold `median + k · MAD`.
    ///
    /// Default: `5.0`.
    pub outlier_k: f64,

    /// Welch segment length in samples.
    ///
    /// Default: `256`.
    pub psd_segment_len: usize,

    /// Spectrogram Hann window length in samples.
    ///
    /// Default: `256`.
    pub spectrogram_window_len: usize,

    /// Spectrogram overlap in samples.  `window_len - 1` gives a one-sample
    /// hop.
    ///
    /// Default: `255`.
    pub spectrogram_overlap: usize,
}

impl Default for LfpConfig {
    fn default() -> Self {
        Self {
            fs: 10_000.0,
            cutoff_hz: 1_000.0,
            filter_order: 10,
            bin_width_hz: 5.0,
            max_freq_hz: 200.0,
            num_sessions: 4,
            num_trials: 200,
            stim_onset_sample: 1_000,
            stim_offset_sample: 1_500,
            outlier_k: 5.0,
            psd_segment_len: 256,
            spectrogram_window_len: 256,
            spectrogram_overlap: 255,
        }
    }
}

impl LfpConfig {
    /// Nyquist frequency, `fs / 2`.
    pub fn nyquist(&self) -> f64 {
        self.fs / 2.0
    }

    /// Cutoff as a fraction of Nyquist, the `Wn` of the filter design.
    ///
    /// ```
    /// use lfp::LfpConfig;
    /// assert_eq!(LfpConfig::default().normalized_cutoff(), 0.2);
    /// ```
    pub fn normalized_cutoff(&self) -> f64 {
        self.cutoff_hz / self.nyquist()
    }

    /// Stimulus onset in milliseconds.
    pub fn stim_onset_ms(&self) -> f64 {
        self.stim_onset_sample as f64 / self.fs * 1000.0
    }

    /// Stimulus offset in milliseconds.
    pub fn stim_offset_ms(&self) -> f64 {
        self.stim_offset_sample as f64 / self.fs * 1000.0
    }

    /// Check parameter ranges that would otherwise surface deep inside a
    /// session.  Filter stability is checked separately by the design step.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(LfpError::InvalidParameter(msg)) };

        if !(self.fs.is_finite() && self.fs > 0.0) {
            return invalid(format!("fs must be positive, got {}", self.fs));
        }
        if self.stim_onset_sample == 0 {
            return invalid("stim_onset_sample must be > 0 (empty baseline)".into());
        }
        if self.stim_offset_sample < self.stim_onset_sample {
            return invalid(format!(
                "stim_offset_sample {} precedes stim_onset_sample {}",
                self.stim_offset_sample, self.stim_onset_sample
            ));
        }
        if !(self.outlier_k.is_finite() && self.outlier_k >= 0.0) {
            return invalid(format!("outlier_k must be >= 0, got {}", self.outlier_k));
        }
        if !(self.bin_width_hz.is_finite() && self.bin_width_hz > 0.0) {
            return invalid(format!("bin_width_hz must be > 0, got {}", self.bin_width_hz));
        }
        if !(self.max_freq_hz.is_finite() && self.max_freq_hz > 0.0) {
            return invalid(format!("max_freq_hz must be > 0, got {}", self.max_freq_hz));
        }
        if self.psd_segment_len == 0 {
            return invalid("psd_segment_len must be > 0".into());
        }
        if self.spectrogram_window_len == 0
            || self.spectrogram_overlap >= self.spectrogram_window_len
        {
            return invalid(format!(
                "spectrogram overlap {} must be smaller than window {}",
                self.spectrogram_overlap, self.spectrogram_window_len
            ));
        }
        Ok(())
    }
}
