//! Error type for the analysis core.
//!
//! Every variant aborts the session being processed and nothing else; the
//! caller iterating sessions decides whether to skip or stop.
use thiserror::Error;

use crate::tones::ToneCondition;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LfpError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("baseline window [0, {baseline_end}) does not fit a trial of {n_samples} samples")]
    BaselineOutOfRange { baseline_end: usize, n_samples: usize },

    #[error("filter design failed: {0}")]
    FilterDesign(String),

    #[error("no {condition} trials (tone {value}) survive outlier rejection")]
    InsufficientData { condition: ToneCondition, value: f64 },

    #[error("expected exactly 2 distinct tone labels, found {found}")]
    UnsupportedToneCardinality { found: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, LfpError>;
