//! Safetensors / JSON I/O around the analysis core.
//!
//! Input recording layout (one file, any number of sessions):
//!
//! ```text
//!   trials_{s}   [n_trials, n_samples]   F32 | F64
//!   tones_{s}    [n_trials]              F32 | F64 | I32 | I64
//! ```
//!
//! Sessions are read for `s = 0, 1, …` until `trials_{s}` is missing.
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::LfpConfig;
use crate::pipeline::{ProcessedSession, Recording, Session};
use crate::spectral::{interpolate_bins, Spectrogram};

// ── Low-level safetensors parser ─────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let n = u64::from_le_bytes(bytes[..8].try_into()?);
    let end = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(8))
        .filter(|&end| end <= bytes.len())
        .with_context(|| format!("safetensors header length {n} exceeds file size"))?;
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry without 'shape'")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("non-integer shape dimension"))
        .collect()
}

/// Decode one tensor to `f64`, whatever its numeric dtype.
fn read_tensor_f64(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f64>> {
    let offsets = entry["data_offsets"].as_array().context("tensor entry without 'data_offsets'")?;
    ensure!(offsets.len() == 2, "malformed data_offsets");
    let absolute = |v: &serde_json::Value| -> Option<usize> {
        usize::try_from(v.as_u64()?).ok()?.checked_add(data_start)
    };
    let (start, end) = absolute(&offsets[0])
        .zip(absolute(&offsets[1]))
        .filter(|&(start, end)| start <= end && end <= bytes.len())
        .context("tensor data out of bounds")?;
    let raw = &bytes[start..end];

    let dtype = entry["dtype"].as_str().context("tensor entry without 'dtype'")?;
    let vals = match dtype {
        "F32" => raw.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64).collect(),
        "F64" => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "I32" => raw.chunks_exact(4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64).collect(),
        "I64" => raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
            .collect(),
        "U8" => raw.iter().map(|&b| b as f64).collect(),
        other => bail!("unsupported dtype {other}"),
    };
    Ok(vals)
}

// ── Recording reader ─────────────────────────────────────────────────────────

/// Read every session of a recording file.
pub fn load_recording(path: &Path) -> Result<Recording> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let mut sessions = Vec::new();
    for s in 0usize.. {
        let Some(trials_entry) = header.get(&format!("trials_{s}")) else { break };
        let tones_entry = header
            .get(&format!("tones_{s}"))
            .with_context(|| format!("session {s}: missing 'tones_{s}'"))?;

        let shape = shape_of(trials_entry)?;
        ensure!(shape.len() == 2, "session {s}: trials must be 2-D, got shape {shape:?}");
        let trials = Array2::from_shape_vec(
            (shape[0], shape[1]),
            read_tensor_f64(&bytes, data_start, trials_entry)?,
        )
        .with_context(|| format!("session {s}: trial data does not match shape {shape:?}"))?;
        let tones = Array1::from_vec(read_tensor_f64(&bytes, data_start, tones_entry)?);

        sessions.push(Session::new(trials, tones).with_context(|| format!("session {s}"))?);
    }
    ensure!(!sessions.is_empty(), "{}: no 'trials_0' tensor", path.display());

    log::info!("loaded {} sessions from {}", sessions.len(), path.display());
    Ok(Recording::new(sessions))
}

/// Write `recording` in the layout read by [`load_recording`] (F64).
pub fn write_recording(recording: &Recording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    for (s, session) in recording.sessions.iter().enumerate() {
        w.add_f64_arr2(&format!("trials_{s}"), &session.trials);
        w.add_f64(&format!("tones_{s}"), &session.tones.to_vec(), &[session.tones.len()]);
    }
    w.write(path)
}

/// Load an [`LfpConfig`] from a JSON file; absent keys keep their defaults.
pub fn load_config(path: &Path) -> Result<LfpConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: LfpConfig = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

// ── Safetensors writer ───────────────────────────────────────────────────────

/// Little-endian tensor payload awaiting [`StWriter::write`].
struct PendingTensor {
    name: String,
    dtype: &'static str,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

/// Collects F64 / U8 tensors in insertion order and writes them as one
/// safetensors file.  The JSON header is space-padded to 8-byte alignment.
///
/// ```rust,no_run
/// use lfp::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[3]);
/// w.add_u8("mask", &[1, 0, 1], &[3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    tensors: Vec<PendingTensor>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, dtype: &'static str, shape: &[usize], bytes: Vec<u8>) {
        debug_assert_eq!(
            shape.iter().product::<usize>() * if dtype == "F64" { 8 } else { 1 },
            bytes.len(),
            "tensor '{name}' payload does not match its shape"
        );
        self.tensors.push(PendingTensor { name: name.to_owned(), dtype, shape: shape.to_vec(), bytes });
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        self.push(name, "F64", shape, data.iter().flat_map(|v| v.to_le_bytes()).collect());
    }

    /// Row-major copy of a 2-D array, whatever its memory layout.
    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let bytes = arr.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(name, "F64", &[arr.nrows(), arr.ncols()], bytes);
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8], shape: &[usize]) {
        self.push(name, "U8", shape, data.to_vec());
    }

    fn header(&self) -> Result<Vec<u8>> {
        let mut offset = 0usize;
        let entries: serde_json::Map<String, serde_json::Value> = self
            .tensors
            .iter()
            .map(|t| {
                let span = [offset, offset + t.bytes.len()];
                offset = span[1];
                let entry = serde_json::json!({ "dtype": t.dtype, "shape": t.shape, "data_offsets": span });
                (t.name.clone(), entry)
            })
            .collect();
        let mut header = serde_json::to_vec(&entries)?;
        header.resize(header.len().next_multiple_of(8), b' ');
        Ok(header)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let header = self.header()?;
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = std::io::BufWriter::new(file);
        out.write_all(&(header.len() as u64).to_le_bytes())?;
        out.write_all(&header)?;
        for t in &self.tensors {
            out.write_all(&t.bytes)?;
        }
        out.flush().with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

// ── Result writers ────────────────────────────────────────────────────────────

/// Write one session's arrays to `path`.
///
/// Keys: `keep_mask` (U8), `mean_low`, `mean_high`, `f_low`, `pxx_low`,
/// `f_high`, `pxx_high`, `band_f`, `band_low`, `band_high` (PSD on the
/// `0:bin_width:max_freq` grid) and, when `spectrograms` is given, `spec_f`,
/// `spec_t`, `spec_low`, `spec_high` restricted to `max_freq_hz`.
pub fn write_session_results(
    processed: &ProcessedSession,
    spectrograms: Option<&(Spectrogram, Spectrogram)>,
    cfg: &LfpConfig,
    path: &Path,
) -> Result<()> {
    let mut w = StWriter::new();

    let mask: Vec<u8> = processed.keep_mask.iter().map(|&k| k as u8).collect();
    w.add_u8("keep_mask", &mask, &[mask.len()]);

    for (tag, cond) in [("low", &processed.low), ("high", &processed.high)] {
        w.add_f64(&format!("mean_{tag}"), &cond.mean.to_vec(), &[cond.mean.len()]);
        w.add_f64(&format!("f_{tag}"), &cond.psd.frequencies, &[cond.psd.frequencies.len()]);
        w.add_f64(&format!("pxx_{tag}"), &cond.psd.power, &[cond.psd.power.len()]);

        let band = interpolate_bins(&cond.psd, cfg.bin_width_hz, cfg.max_freq_hz)?;
        if tag == "low" {
            w.add_f64("band_f", &band.frequencies, &[band.frequencies.len()]);
        }
        w.add_f64(&format!("band_{tag}"), &band.power, &[band.power.len()]);
    }

    if let Some((low, high)) = spectrograms {
        let low = low.restrict(cfg.max_freq_hz);
        let high = high.restrict(cfg.max_freq_hz);
        w.add_f64("spec_f", &low.frequencies, &[low.frequencies.len()]);
        w.add_f64("spec_t", &low.times, &[low.times.len()]);
        w.add_f64_arr2("spec_low", &low.power);
        w.add_f64_arr2("spec_high", &high.power);
    }

    w.write(path)
}

/// One entry of the JSON session report.
///
/// `session` is the 1-based number used in log lines and result file names
/// (`session{session}_results.safetensors`); `session_index` is the 0-based
/// position in the recording.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionSummary<'a> {
    Ok {
        session: usize,
        #[serde(flatten)]
        result: &'a ProcessedSession,
    },
    Failed { session: usize, session_index: usize, error: String },
}

impl<'a> SessionSummary<'a> {
    pub fn ok(result: &'a ProcessedSession) -> Self {
        SessionSummary::Ok { session: result.session_index + 1, result }
    }

    pub fn failed(session_index: usize, error: impl ToString) -> Self {
        SessionSummary::Failed { session: session_index + 1, session_index, error: error.to_string() }
    }
}

/// File name of the result tensors of the session at 0-based `session_index`.
pub fn results_file_name(session_index: usize) -> String {
    format!("session{}_results.safetensors", session_index + 1)
}

/// Write the per-session summaries as a pretty-printed JSON array.
pub fn write_report(summaries: &[SessionSummary<'_>], path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(summaries)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_shorter_than_prefix_rejected() {
        assert!(parse_header(&[0u8; 4]).is_err());
    }

    #[test]
    fn header_length_beyond_file_rejected() {
        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(parse_header(&bytes).is_err());
    }

    #[test]
    fn header_length_near_u64_max_rejected() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(parse_header(&bytes).is_err());
    }

    #[test]
    fn data_offsets_near_u64_max_rejected() {
        let entry = serde_json::json!({ "dtype": "F64", "shape": [1], "data_offsets": [0, u64::MAX] });
        assert!(read_tensor_f64(&[0u8; 16], 8, &entry).is_err());
        let entry = serde_json::json!({ "dtype": "F64", "shape": [1], "data_offsets": [u64::MAX, u64::MAX] });
        assert!(read_tensor_f64(&[0u8; 16], 8, &entry).is_err());
    }

    #[test]
    fn recording_with_huge_offsets_is_an_error() {
        let header = serde_json::json!({
            "trials_0": { "dtype": "F64", "shape": [1, 1], "data_offsets": [0, u64::MAX] },
            "tones_0": { "dtype": "F64", "shape": [1], "data_offsets": [0, 8] },
        });
        let hdr = serde_json::to_vec(&header).unwrap();
        let mut bytes = (hdr.len() as u64).to_le_bytes().to_vec();
        bytes.extend(hdr);
        bytes.extend([0u8; 8]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.safetensors");
        std::fs::write(&path, bytes).unwrap();
        let err = load_recording(&path).unwrap_err();
        assert!(format!("{err:#}").contains("out of bounds"), "{err:#}");
    }
}
