//! IIR filter design and application.
//!
//! - [`design`]: Butterworth low-pass design, matching
//!   `scipy.signal.butter(order, Wn, btype='low')`.
//! - [`apply`]: forward-backward zero-phase filtering, matching
//!   `scipy.signal.filtfilt` with odd padding.

pub mod apply;
pub mod design;

pub use apply::{apply_zero_phase, apply_zero_phase_inplace, filtfilt, lfilter, lfilter_zi, padlen};
pub use design::{buttap, butter_zpk, design_lowpass, is_stable, poly, FilterCoefficients};
