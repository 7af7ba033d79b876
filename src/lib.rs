//! # lfp: two-tone LFP trial analysis in pure Rust
//!
//! `lfp` conditions local-field-potential recordings made across several
//! sessions of a two-tone auditory paradigm and characterises the response
//! to each tone in the time and frequency domain.  Every DSP step follows
//! its `scipy.signal` counterpart (`butter`, `filtfilt`, `welch`,
//! `spectrogram`).
//!
//! ## Pipeline overview
//!
//! ```text
//! Session { trials [N, T], tones [N] }
//!   │
//!   ├─ outliers::detect()      baseline std → median + k·MAD threshold
//!   ├─ filter                  order-10 Butterworth LP, forward-backward
//!   ├─ tones::aggregate()      low / high groups re-indexed onto kept rows
//!   ├─ mean trace              elementwise mean over trials
//!   └─ spectral::psd()         Welch, 256-sample Hann segments
//!        │
//!        └─→ ProcessedSession  (OutlierReport, keep mask, means, PSDs)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use lfp::{LfpConfig, Pipeline, Session};
//! use ndarray::{Array1, Array2};
//!
//! // 200 trials of 2000 samples at 10 kHz, tones 1 / 2
//! let trials: Array2<f64> = Array2::zeros((200, 2000));
//! let tones = Array1::from_iter((0..200).map(|i| if i % 2 == 0 { 1.0 } else { 2.0 }));
//! let session = Session::new(trials, tones).unwrap();
//!
//! let pipeline = Pipeline::new(LfpConfig::default()).unwrap();
//! let result = pipeline.process_session(&session, 0).unwrap();
//!
//! println!("kept {}/{}", result.report.n_after, result.report.n_before);
//! println!("low-tone PSD bins: {}", result.low.psd.frequencies.len());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use lfp::filter::{design_lowpass, apply_zero_phase};
//! use lfp::outliers::{detect, kept_trials};
//! use lfp::spectral::{hann, psd, spectrogram};
//! use ndarray::Array2;
//!
//! let raw: Array2<f64> = Array2::zeros((10, 2000));
//! let (keep, report) = detect(&raw, 1000, 5.0).unwrap();
//! let coeffs = design_lowpass(10_000.0, 1_000.0, 10).unwrap();
//! let filtered = apply_zero_phase(&kept_trials(&raw, &keep), &coeffs).unwrap();
//!
//! let trace = filtered.row(0).to_vec();
//! let p = psd(&trace, 10_000.0, 256).unwrap();
//! let s = spectrogram(&trace, 10_000.0, &hann(256, true), 255).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod outliers;
pub mod pipeline;
pub mod spectral;
pub mod tones;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config / errors
pub use config::LfpConfig;
pub use error::{LfpError, Result};

// filter
pub use filter::{apply_zero_phase, design_lowpass, filtfilt, FilterCoefficients};

// outliers
pub use outliers::{detect, KeepMask, OutlierReport};

// tones
pub use tones::{kept_rows, mean_trace, tone_groups, ToneCondition, ToneGroups, ToneValues};

// spectral
pub use spectral::{hann, interpolate_bins, psd, spectrogram, Psd, Spectrogram};

// pipeline
pub use pipeline::{ConditionResult, Pipeline, ProcessedSession, Recording, Session};

/// Run every session of `recording` with a freshly designed pipeline.
///
/// The outer `Result` fails only when `cfg` is invalid or the filter cannot
/// be designed; each session then succeeds or fails on its own, in session
/// order.
///
/// ```no_run
/// use lfp::{analyze, LfpConfig, Recording};
///
/// let recording = Recording::default();
/// for (s, result) in analyze(&recording, &LfpConfig::default()).unwrap().iter().enumerate() {
///     match result {
///         Ok(p) => println!("session {s}: {} trials kept", p.report.n_after),
///         Err(e) => eprintln!("session {s}: {e}"),
///     }
/// }
/// ```
pub fn analyze(recording: &Recording, cfg: &LfpConfig) -> Result<Vec<Result<ProcessedSession>>> {
    let pipeline = Pipeline::new(cfg.clone())?;
    Ok(pipeline.process_all(recording))
}
