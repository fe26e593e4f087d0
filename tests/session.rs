mod common;

use common::{classifier_spec, embedding_spec};
use ndarray::array;
use std::fs;
use std::path::PathBuf;
use technotaggr::model::{AudioAnalysisRecord, ModelResult, PredictionRecord, SessionRecord};
use technotaggr::results::ResultAggregator;
use tempfile::TempDir;

fn record(path: &str, classifier: &str) -> AudioAnalysisRecord {
    let embedding = embedding_spec("msd-musicnn-1");
    let spec = classifier_spec(classifier, &["dark", "bright"], &embedding);
    let matrix = array![[0.25f32, 0.75], [0.75, 0.25], [0.5, 0.5]];
    AudioAnalysisRecord {
        audio_path: PathBuf::from(path),
        duration_seconds: 12.34567,
        sample_rate_hz: 16000,
        predictions: vec![PredictionRecord::from_matrix(&spec, &matrix)],
    }
}

#[test]
fn test_snapshot_counts_and_order() {
    let mut aggregator = ResultAggregator::new(PathBuf::from("/out"), Some(PathBuf::from("/music")));
    aggregator.append(record("/music/b.wav", "mood_dark"));
    aggregator.append_failure(&PathBuf::from("/music/broken.wav"), "decode failed");
    aggregator.append(record("/music/a.wav", "danceability"));

    let session = aggregator.snapshot();
    assert_eq!(session.total_files, 3);
    assert_eq!(session.successful_files, 2);
    assert_eq!(session.failed_files, 1);
    assert_eq!(session.classifiers_used, vec!["danceability", "mood_dark"]);
    assert_eq!(session.input_directory, "/music");
    assert_eq!(session.output_directory, "/out");

    // insertion order, not sorted
    assert_eq!(session.results[0].audio_file, "/music/b.wav");
    assert_eq!(session.results[1].audio_file, "/music/a.wav");
    assert_eq!(session.results[0].audio_duration_seconds, 12.346);
}

#[test]
fn test_snapshot_has_no_side_effects() {
    let mut aggregator = ResultAggregator::new(PathBuf::from("/out"), None);
    aggregator.append(record("/music/a.wav", "mood_dark"));

    let first = aggregator.snapshot();
    let second = aggregator.snapshot();
    assert_eq!(first, second);
    assert_eq!(first.input_directory, "");
}

#[test]
fn test_persist_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut aggregator = ResultAggregator::new(dir.path().to_path_buf(), None);
    aggregator.append(record("/music/a.wav", "mood_dark"));
    aggregator.append_failure(&PathBuf::from("/music/x.wav"), "boom");

    let path = dir.path().join("session.json");
    aggregator.persist(&path).unwrap();

    let loaded = SessionRecord::load(&path).unwrap();
    assert_eq!(loaded, aggregator.snapshot());

    let model = &loaded.results[0].models[0];
    assert!(matches!(model, ModelResult::Raw(_)));
    let raw = model.raw();
    assert_eq!(raw.num_segments, 3);
    assert_eq!(raw.segment_predictions[0], vec![0.25, 0.75]);
    assert_eq!(raw.classes, vec!["dark", "bright"]);
    assert_eq!(raw.aggregated_predictions.get("dark"), Some(0.5));
    assert!(loaded.results[0].bpm.is_none());

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_persisted_json_layout() {
    let dir = TempDir::new().unwrap();
    let mut aggregator = ResultAggregator::new(dir.path().to_path_buf(), None);
    aggregator.append(record("/music/a.wav", "mood_dark"));

    let path = dir.path().join("session.json");
    aggregator.persist(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["total_files"], 1);
    let model = &json["results"][0]["models"][0];
    assert_eq!(model["model_name"], "mood_dark");
    assert_eq!(model["embedding_model"], "msd-musicnn-1");
    assert!(model.get("bar_predictions").is_none());

    let keys: Vec<&String> = model["aggregated_predictions"].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2);
}

#[test]
fn test_save_uses_timestamped_default_name() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results");
    let aggregator = ResultAggregator::new(output.clone(), None);

    let path = aggregator.save(None).unwrap();
    assert_eq!(path.parent().unwrap(), output);
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("results_"));
    assert!(name.ends_with(".json"));
    // results_YYYYmmdd_HHMMSS.json
    assert_eq!(name.len(), "results_20240101_120000.json".len());

    let named = aggregator.save(Some("custom.json")).unwrap();
    assert_eq!(named, output.join("custom.json"));
    assert!(named.exists());
}

#[test]
fn test_load_rejects_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(SessionRecord::load(&path).is_err());
}
