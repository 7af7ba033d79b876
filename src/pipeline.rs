//! Per-session orchestration.
//!
//! [`Pipeline`] designs the low-pass filter once and then turns each
//! [`Session`] into an independent [`ProcessedSession`]:
//!
//! ```text
//! Session { trials [N, T], tones [N] }
//!   │
//!   ├─ outliers::detect       baseline [0, stim_onset) robust threshold
//!   ├─ filter (kept only)     Butterworth low-pass, forward-backward
//!   ├─ tones::aggregate       low / high rows via kept-index ranks → means
//!   └─ spectral::psd          Welch PSD of each mean trace
//! ```
//!
//! The pipeline holds only immutable state, so sessions can be processed on
//! any number of threads; [`Pipeline::process_all`] does this with rayon and
//! returns results in session order.
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::LfpConfig;
use crate::error::{LfpError, Result};
use crate::filter::{apply_zero_phase, design_lowpass, FilterCoefficients};
use crate::outliers::{self, KeepMask, OutlierReport};
use crate::spectral::{self, Psd, Spectrogram};
use crate::tones::{self, ToneCondition, ToneValues};

/// Raw input of one session.
#[derive(Debug, Clone)]
pub struct Session {
    /// `[trials, samples]` raw amplitudes in acquisition order.
    pub trials: Array2<f64>,
    /// One tone label per trial, same order as `trials` rows.
    pub tones: Array1<f64>,
}

impl Session {
    /// Pair a trial matrix with its labels.
    ///
    /// # Errors
    ///
    /// [`LfpError::MalformedInput`] when the trial and label counts differ.
    pub fn new(trials: Array2<f64>, tones: Array1<f64>) -> Result<Self> {
        if trials.nrows() != tones.len() {
            return Err(LfpError::MalformedInput(format!(
                "{} trials but {} tone labels",
                trials.nrows(),
                tones.len()
            )));
        }
        Ok(Self { trials, tones })
    }

    pub fn n_trials(&self) -> usize {
        self.trials.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.trials.ncols()
    }
}

/// All sessions of one recording, in session order.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub sessions: Vec<Session>,
}

impl Recording {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session `index`, or [`LfpError::MalformedInput`] when out of range.
    pub fn session(&self, index: usize) -> Result<&Session> {
        self.sessions.get(index).ok_or_else(|| {
            LfpError::MalformedInput(format!(
                "session index {index} out of range ({} sessions)",
                self.sessions.len()
            ))
        })
    }
}

/// Per-condition output of one session.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    pub condition: ToneCondition,
    /// Tone label value of this condition.
    pub value: f64,
    /// Trials of this condition that survived rejection.
    pub n_trials: usize,
    /// Mean of the filtered trials, one value per sample.
    #[serde(skip)]
    pub mean: Array1<f64>,
    #[serde(skip)]
    pub psd: Psd,
}

/// Result of one session.  Never mutated after construction.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedSession {
    pub session_index: usize,
    pub report: OutlierReport,
    #[serde(skip)]
    pub keep_mask: KeepMask,
    pub tone_values: ToneValues,
    pub low: ConditionResult,
    pub high: ConditionResult,
}

impl ProcessedSession {
    pub fn condition(&self, condition: ToneCondition) -> &ConditionResult {
        match condition {
            ToneCondition::Low => &self.low,
            ToneCondition::High => &self.high,
        }
    }
}

/// Session processor sharing one filter design across all sessions.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: LfpConfig,
    coeffs: FilterCoefficients,
}

impl Pipeline {
    /// Validate `config` and design the low-pass filter.
    ///
    /// # Errors
    ///
    /// [`LfpError::InvalidParameter`] for out-of-range settings,
    /// [`LfpError::FilterDesign`] when the filter cannot be designed stably.
    pub fn new(config: LfpConfig) -> Result<Self> {
        config.validate()?;
        let coeffs = design_lowpass(config.fs, config.cutoff_hz, config.filter_order)?;
        log::info!(
            "pipeline ready: fs={} Hz, order-{} low-pass at {} Hz, baseline [0, {})",
            config.fs,
            config.filter_order,
            config.cutoff_hz,
            config.stim_onset_sample
        );
        Ok(Self { config, coeffs })
    }

    pub fn config(&self) -> &LfpConfig {
        &self.config
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    /// Run the full chain on one session.  `session` is not modified.
    pub fn process_session(&self, session: &Session, session_index: usize) -> Result<ProcessedSession> {
        let cfg = &self.config;
        if session.n_trials() != session.tones.len() {
            return Err(LfpError::MalformedInput(format!(
                "session {session_index}: {} trials but {} tone labels",
                session.n_trials(),
                session.tones.len()
            )));
        }
        if session.n_trials() != cfg.num_trials {
            log::warn!(
                "session {session_index}: {} trials, expected {}",
                session.n_trials(),
                cfg.num_trials
            );
        }

        // 1. Outlier rejection on the raw baseline.
        let (keep_mask, report) =
            outliers::detect(&session.trials, cfg.stim_onset_sample, cfg.outlier_k)?;

        // 2. Tone groups on the original trial order.
        let labels = session.tones.to_vec();
        let groups = tones::tone_groups(&labels)?;

        // 3. Low-pass the kept trials only.
        let kept = outliers::kept_indices(&keep_mask);
        let raw_kept = outliers::kept_trials(&session.trials, &keep_mask);
        let filtered = apply_zero_phase(&raw_kept, &self.coeffs)?;

        // 4. + 5. Per-condition mean trace and PSD.
        let condition = |c: ToneCondition| -> Result<ConditionResult> {
            let agg = tones::aggregate(&filtered, &kept, &groups, c)?;
            let psd = spectral::psd(&agg.mean.to_vec(), cfg.fs, cfg.psd_segment_len)?;
            Ok(ConditionResult {
                condition: c,
                value: agg.value,
                n_trials: agg.trials.nrows(),
                mean: agg.mean,
                psd,
            })
        };
        let low = condition(ToneCondition::Low)?;
        let high = condition(ToneCondition::High)?;

        log::info!(
            "session {session_index}: kept {}/{} trials ({} low, {} high)",
            report.n_after,
            report.n_before,
            low.n_trials,
            high.n_trials
        );

        Ok(ProcessedSession {
            session_index,
            report,
            keep_mask,
            tone_values: groups.values,
            low,
            high,
        })
    }

    /// Process session `index` of `recording`.
    ///
    /// # Errors
    ///
    /// [`LfpError::MalformedInput`] when `index` is out of range, otherwise
    /// whatever [`Pipeline::process_session`] returns.
    pub fn process_recording(&self, recording: &Recording, index: usize) -> Result<ProcessedSession> {
        self.process_session(recording.session(index)?, index)
    }

    /// Process every session concurrently.  One result per session, in
    /// session order; a failing session does not affect the others.
    pub fn process_all(&self, recording: &Recording) -> Vec<Result<ProcessedSession>> {
        if recording.len() != self.config.num_sessions {
            log::warn!(
                "recording has {} sessions, expected {}",
                recording.len(),
                self.config.num_sessions
            );
        }
        recording
            .sessions
            .par_iter()
            .enumerate()
            .map(|(i, session)| self.process_session(session, i))
            .collect()
    }

    /// Low- and high-tone spectrograms of a processed session's mean traces,
    /// using the configured symmetric Hann window and overlap.
    pub fn spectrograms(&self, processed: &ProcessedSession) -> Result<(Spectrogram, Spectrogram)> {
        let cfg = &self.config;
        let window = spectral::hann(cfg.spectrogram_window_len, true);
        let run = |mean: &Array1<f64>| {
            spectral::spectrogram(&mean.to_vec(), cfg.fs, &window, cfg.spectrogram_overlap)
        };
        Ok((run(&processed.low.mean)?, run(&processed.high.mean)?))
    }
}
