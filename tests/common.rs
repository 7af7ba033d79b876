/// Shared synthetic sessions for integration tests.
use lfp::{LfpConfig, Session};
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

pub const FS: f64 = 10_000.0;
pub const N_SAMPLES: usize = 2_000;
pub const BASELINE_END: usize = 1_000;

/// Default analysis settings sized for the ten-trial fixtures below.
#[allow(unused)]
pub fn small_config() -> LfpConfig {
    LfpConfig { num_trials: 10, num_sessions: 1, ..LfpConfig::default() }
}

/// Sine of `freq` Hz sampled at [`FS`].
#[allow(unused)]
pub fn sine(freq: f64, amplitude: f64, n: usize) -> Vec<f64> {
    (0..n).map(|t| amplitude * (2.0 * PI * freq * t as f64 / FS).sin()).collect()
}

#[allow(unused)]
/// One trial with baseline amplitude scale `a`.
///
/// The baseline holds whole cycles of 20 Hz and 40 Hz only, so its
/// population std is exactly proportional to `a`.  An evoked burst follows
/// stimulus onset: 60 Hz for the low tone, 150 Hz for the high tone.
pub fn trial(a: f64, high_tone: bool) -> Vec<f64> {
    let evoked = if high_tone { 150.0 } else { 60.0 };
    (0..N_SAMPLES)
        .map(|t| {
            let x = t as f64 / FS;
            let mut v = a * (2.0 * PI * 40.0 * x).sin() + 0.3 * a * (2.0 * PI * 20.0 * x).sin();
            if (1_000..1_500).contains(&t) {
                v += 0.5 * (2.0 * PI * evoked * x).sin();
            }
            v
        })
        .collect()
}

#[allow(unused)]
/// Session of `labels.len()` trials; trial `i` has scale `1 + 0.01·i`, and
/// every index in `outliers` is amplified tenfold.  Label `> 1` = high tone.
pub fn session_with(labels: &[f64], outliers: &[usize]) -> Session {
    let n = labels.len();
    let mut data = Vec::with_capacity(n * N_SAMPLES);
    for (i, &label) in labels.iter().enumerate() {
        let mut a = 1.0 + 0.01 * i as f64;
        if outliers.contains(&i) {
            a *= 10.0;
        }
        data.extend(trial(a, label > 1.0));
    }
    let trials = Array2::from_shape_vec((n, N_SAMPLES), data).unwrap();
    Session::new(trials, Array1::from_vec(labels.to_vec())).unwrap()
}

/// Labels `[1]*5 + [2]*5`.
#[allow(unused)]
pub fn two_tone_labels() -> Vec<f64> {
    let mut labels = vec![1.0; 5];
    labels.extend([2.0; 5]);
    labels
}

/// Ten trials, tones `[1]*5 + [2]*5`, trial 3 (low tone) amplified tenfold.
#[allow(unused)]
pub fn session_with_outlier() -> Session {
    session_with(&two_tone_labels(), &[3])
}

/// Root-mean-square of `x`.
#[allow(unused)]
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

/// Maximum absolute difference between two slices.
#[allow(unused)]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}
