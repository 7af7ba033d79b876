//! Tone-condition partitioning and per-condition mean traces.
//!
//! Tone labels index the **original** trial order.  After outlier rejection
//! the filtered matrix only holds kept trials, so each group is mapped onto
//! filtered rows by intersecting it with the kept indices and taking the
//! rank of every surviving index within the (ascending) kept list.
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LfpError, Result};

/// Stimulus identity of a trial group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneCondition {
    Low,
    High,
}

impl fmt::Display for ToneCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneCondition::Low => f.write_str("low-tone"),
            ToneCondition::High => f.write_str("high-tone"),
        }
    }
}

/// Label values of the two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneValues {
    pub low: f64,
    pub high: f64,
}

/// Original-order trial indices of each condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneGroups {
    pub low_indices: Vec<usize>,
    pub high_indices: Vec<usize>,
    pub values: ToneValues,
}

impl ToneGroups {
    pub fn indices(&self, condition: ToneCondition) -> &[usize] {
        match condition {
            ToneCondition::Low => &self.low_indices,
            ToneCondition::High => &self.high_indices,
        }
    }

    pub fn value(&self, condition: ToneCondition) -> f64 {
        match condition {
            ToneCondition::Low => self.values.low,
            ToneCondition::High => self.values.high,
        }
    }
}

/// Partition trials by tone label: the smaller value is the low tone, the
/// larger the high tone.
///
/// # Errors
///
/// * [`LfpError::MalformedInput`] for non-finite labels.
/// * [`LfpError::UnsupportedToneCardinality`] unless exactly two distinct
///   values are present.
pub fn tone_groups(labels: &[f64]) -> Result<ToneGroups> {
    if let Some(i) = labels.iter().position(|v| !v.is_finite()) {
        return Err(LfpError::MalformedInput(format!("tone label {i} is {}", labels[i])));
    }

    let mut distinct: Vec<f64> = labels.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() != 2 {
        return Err(LfpError::UnsupportedToneCardinality { found: distinct.len() });
    }
    let (low, high) = (distinct[0], distinct[1]);

    let positions = |value: f64| -> Vec<usize> {
        labels
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| (v == value).then_some(i))
            .collect()
    };

    Ok(ToneGroups {
        low_indices: positions(low),
        high_indices: positions(high),
        values: ToneValues { low, high },
    })
}

/// Map original-order `group` indices onto rows of the kept-only matrix.
///
/// `kept` must be strictly ascending (rejection preserves trial order); the
/// row of a kept trial is its rank in `kept`.  Group members that were
/// rejected are dropped.  The result is ascending.
///
/// # Panics
///
/// When `kept` is not strictly ascending.  [`crate::outliers::kept_indices`]
/// always produces a valid list.
pub fn kept_rows(kept: &[usize], group: &[usize]) -> Vec<usize> {
    assert!(
        kept.windows(2).all(|w| w[0] < w[1]),
        "kept trial indices must be strictly ascending"
    );

    let mut group: Vec<usize> = group.to_vec();
    group.sort_unstable();
    group.dedup();

    // Ordered-set intersection by merge; `rank` is the position in `kept`.
    let mut rows = Vec::with_capacity(group.len().min(kept.len()));
    let (mut rank, mut g) = (0, 0);
    while rank < kept.len() && g < group.len() {
        match kept[rank].cmp(&group[g]) {
            std::cmp::Ordering::Less => rank += 1,
            std::cmp::Ordering::Greater => g += 1,
            std::cmp::Ordering::Equal => {
                rows.push(rank);
                rank += 1;
                g += 1;
            }
        }
    }
    rows
}

/// Copy the given rows of `matrix`, in the given order.
pub fn select_rows(matrix: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), rows)
}

/// Elementwise mean over trials (rows).
///
/// # Errors
///
/// [`LfpError::InsufficientData`] when `trials` has no rows; the caller's
/// condition and label are carried into the error.
pub fn mean_trace(trials: &Array2<f64>, condition: ToneCondition, value: f64) -> Result<Array1<f64>> {
    trials
        .mean_axis(Axis(0))
        .ok_or(LfpError::InsufficientData { condition, value })
}

/// Filtered rows of one condition plus their mean trace.
#[derive(Debug, Clone)]
pub struct ConditionTrials {
    pub condition: ToneCondition,
    pub value: f64,
    pub trials: Array2<f64>,
    pub mean: Array1<f64>,
}

/// Select `condition`'s rows from the kept-only `filtered` matrix and
/// average them.
pub fn aggregate(
    filtered: &Array2<f64>,
    kept: &[usize],
    groups: &ToneGroups,
    condition: ToneCondition,
) -> Result<ConditionTrials> {
    let rows = kept_rows(kept, groups.indices(condition));
    let trials = select_rows(filtered, &rows);
    let value = groups.value(condition);
    let mean = mean_trace(&trials, condition, value)?;
    Ok(ConditionTrials { condition, value, trials, mean })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_low_high() {
        let g = tone_groups(&[1.0, 1.0, 2.0, 2.0, 1.0]).unwrap();
        assert_eq!(g.low_indices, vec![0, 1, 4]);
        assert_eq!(g.high_indices, vec![2, 3]);
        assert_eq!(g.values, ToneValues { low: 1.0, high: 2.0 });
    }

    #[test]
    fn three_tones_unsupported() {
        let err = tone_groups(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, LfpError::UnsupportedToneCardinality { found: 3 });
    }

    #[test]
    fn single_tone_unsupported() {
        let err = tone_groups(&[4.0, 4.0]).unwrap_err();
        assert_eq!(err, LfpError::UnsupportedToneCardinality { found: 1 });
    }

    #[test]
    fn nan_label_is_malformed() {
        assert!(matches!(tone_groups(&[1.0, f64::NAN]), Err(LfpError::MalformedInput(_))));
    }

    #[test]
    fn rows_are_ranks_in_kept_list() {
        // Trial 3 rejected: kept = [0,1,2,4,5]; group [1,3,5] → rows [1,4].
        let kept = [0, 1, 2, 4, 5];
        assert_eq!(kept_rows(&kept, &[1, 3, 5]), vec![1, 4]);
        assert_eq!(kept_rows(&kept, &[3]), Vec::<usize>::new());
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn unsorted_kept_list_panics() {
        kept_rows(&[2, 1], &[1]);
    }

    #[test]
    fn mean_of_rows() {
        let m = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 3.0, 4.0, 5.0]).unwrap();
        let mean = mean_trace(&m, ToneCondition::Low, 1.0).unwrap();
        assert_eq!(mean.to_vec(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn empty_group_is_insufficient_data() {
        let m = Array2::<f64>::zeros((0, 3));
        let err = mean_trace(&m, ToneCondition::High, 2.0).unwrap_err();
        assert_eq!(err, LfpError::InsufficientData { condition: ToneCondition::High, value: 2.0 });
    }
}
