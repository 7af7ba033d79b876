mod common;
use common::{session_with, session_with_outlier, small_config, two_tone_labels};
use lfp::io::{
    load_config, load_recording, results_file_name, write_recording, write_report, write_session_results,
    SessionSummary, StWriter,
};
use lfp::{Pipeline, Recording};
use std::collections::HashMap;
use std::path::Path;

/// Header of a safetensors file: tensor name → (dtype, shape).
fn read_header(path: &Path) -> HashMap<String, (String, Vec<usize>)> {
    let bytes = std::fs::read(path).unwrap();
    let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    let header: serde_json::Value = serde_json::from_slice(&bytes[8..8 + n]).unwrap();
    header
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| {
            let dtype = v["dtype"].as_str().unwrap().to_string();
            let shape = v["shape"].as_array().unwrap().iter().map(|d| d.as_u64().unwrap() as usize).collect();
            (k.clone(), (dtype, shape))
        })
        .collect()
}

#[test]
fn recording_roundtrip_preserves_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.safetensors");
    let rec = Recording::new(vec![session_with_outlier(), session_with(&two_tone_labels(), &[])]);

    write_recording(&rec, &path).unwrap();
    let back = load_recording(&path).unwrap();

    assert_eq!(back.len(), 2);
    for (a, b) in rec.sessions.iter().zip(&back.sessions) {
        assert_eq!(a.trials, b.trials);
        assert_eq!(a.tones, b.tones);
    }
}

#[test]
fn f32_trials_and_integer_tones_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.safetensors");

    // Hand-built file: F32 trials [2, 3], I64 tones [2].
    let trials: Vec<u8> = [0.5f32, 1.0, 1.5, 2.0, 2.5, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let tones: Vec<u8> = [1i64, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
    let header = serde_json::json!({
        "trials_0": { "dtype": "F32", "shape": [2, 3], "data_offsets": [0, trials.len()] },
        "tones_0": { "dtype": "I64", "shape": [2], "data_offsets": [trials.len(), trials.len() + tones.len()] },
    });
    let hdr = serde_json::to_vec(&header).unwrap();
    let mut bytes = (hdr.len() as u64).to_le_bytes().to_vec();
    bytes.extend(hdr);
    bytes.extend(trials);
    bytes.extend(tones);
    std::fs::write(&path, bytes).unwrap();

    let rec = load_recording(&path).unwrap();
    assert_eq!(rec.len(), 1);
    let s = rec.session(0).unwrap();
    assert_eq!(s.trials.dim(), (2, 3));
    assert_eq!(s.trials[[1, 2]], 3.0);
    assert_eq!(s.tones.to_vec(), vec![1.0, 2.0]);
}

#[test]
fn file_without_sessions_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.safetensors");
    let mut w = StWriter::new();
    w.add_f64("something_else", &[1.0], &[1]);
    w.write(&path).unwrap();
    assert!(load_recording(&path).is_err());
}

#[test]
fn missing_tones_tensor_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_tones.safetensors");
    let mut w = StWriter::new();
    w.add_f64("trials_0", &[0.0; 4], &[2, 2]);
    w.write(&path).unwrap();
    let err = load_recording(&path).unwrap_err();
    assert!(format!("{err:#}").contains("tones_0"), "{err:#}");
}

#[test]
fn session_results_contain_expected_tensors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session1_results.safetensors");
    let cfg = small_config();
    let pl = Pipeline::new(cfg.clone()).unwrap();
    let p = pl.process_session(&session_with_outlier(), 0).unwrap();
    let specs = pl.spectrograms(&p).unwrap();

    write_session_results(&p, Some(&specs), &cfg, &path).unwrap();
    let h = read_header(&path);

    assert_eq!(h["keep_mask"], ("U8".to_string(), vec![10]));
    assert_eq!(h["mean_low"].1, vec![2_000]);
    assert_eq!(h["pxx_high"].1, vec![129]);
    assert_eq!(h["band_f"].1, vec![41]);
    assert_eq!(h["band_low"].1, vec![41]);
    assert_eq!(h["spec_f"].1, vec![6]);
    assert_eq!(h["spec_low"].1, vec![6, 1_745]);
    assert_eq!(h["spec_t"].1, vec![1_745]);
}

#[test]
fn spectrograms_are_optional() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.safetensors");
    let cfg = small_config();
    let p = Pipeline::new(cfg.clone()).unwrap().process_session(&session_with_outlier(), 0).unwrap();

    write_session_results(&p, None, &cfg, &path).unwrap();
    let h = read_header(&path);
    assert!(h.contains_key("mean_high"));
    assert!(!h.contains_key("spec_low"));
}

#[test]
fn report_lists_successes_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session_report.json");
    let p = Pipeline::new(small_config()).unwrap().process_session(&session_with_outlier(), 0).unwrap();

    let summaries = [SessionSummary::ok(&p), SessionSummary::failed(1, "boom")];
    write_report(&summaries, &path).unwrap();

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["report"]["n_after"], 9);
    assert_eq!(arr[0]["low"]["condition"], "low");
    assert_eq!(arr[0]["low"]["n_trials"], 4);
    assert!(arr[0]["low"].get("mean").is_none());
    assert_eq!(arr[1]["session_index"], 1);
    assert_eq!(arr[1]["error"], "boom");
}

#[test]
fn report_numbers_sessions_like_result_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session_report.json");
    let p = Pipeline::new(small_config()).unwrap().process_session(&session_with_outlier(), 0).unwrap();

    write_report(&[SessionSummary::ok(&p), SessionSummary::failed(1, "boom")], &path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(v[0]["session"], 1);
    assert_eq!(v[0]["session_index"], 0);
    assert_eq!(v[1]["session"], 2);
    assert_eq!(v[1]["session_index"], 1);
    assert_eq!(results_file_name(0), "session1_results.safetensors");
    assert_eq!(results_file_name(1), "session2_results.safetensors");
}

#[test]
fn config_file_overrides_selected_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, r#"{ "outlier_k": 3.0, "num_trials": 10 }"#).unwrap();

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.outlier_k, 3.0);
    assert_eq!(cfg.num_trials, 10);
    assert_eq!(cfg.fs, 10_000.0);
    assert_eq!(cfg.psd_segment_len, 256);
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(load_config(&path).is_err());
}
