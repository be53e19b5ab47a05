//! End-to-end coverage of the classification pipeline.

mod support;

use std::sync::Arc;

use sonavis::audio::Normalizer;
use sonavis::catalog::ModelCatalog;
use sonavis::error::ClassifyError;
use sonavis::model::registry::ModelRegistry;
use sonavis::pipeline::{ChunkRequest, FileRequest, Pipeline};
use sonavis::sink::SqliteRecognitionSink;
use sonavis::taxonomy::{SqliteTaxonomy, TaxonomyLookup};

use support::{
    content_sensitive_model, drone_leaning_model, pcm_chunk, tone_samples, wav_bytes,
    write_artifact, write_catalog,
};

struct Harness {
    _dir: tempfile::TempDir,
    spool_dir: std::path::PathBuf,
    taxonomy: Arc<SqliteTaxonomy>,
    sink: Arc<SqliteRecognitionSink>,
    pipeline: Pipeline,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("create test dir");
    write_artifact(&dir.path().join("baseline.json"), &drone_leaning_model());
    write_artifact(&dir.path().join("contrastive.json"), &content_sensitive_model());
    let catalog_path = write_catalog(
        dir.path(),
        &[("4", "baseline.json"), ("5", "contrastive.json")],
    );
    let catalog = ModelCatalog::load(&catalog_path).expect("load catalog");
    let registry = Arc::new(ModelRegistry::new(&catalog));

    let taxonomy = Arc::new(SqliteTaxonomy::open_in_memory().expect("open taxonomy"));
    for (name, description) in [
        ("drone", "small unmanned aircraft"),
        ("airplane", "fixed wing"),
        ("helicopter", "rotary wing"),
    ] {
        taxonomy.register(name, Some(description)).expect("seed taxonomy");
    }
    let sink = Arc::new(SqliteRecognitionSink::open_in_memory().expect("open sink"));

    let spool_dir = dir.path().join("spool");
    std::fs::create_dir_all(&spool_dir).expect("create spool dir");
    let pipeline = Pipeline::new(registry, taxonomy.clone(), sink.clone())
        .with_normalizer(Normalizer::with_temp_dir(&spool_dir));
    Harness {
        _dir: dir,
        spool_dir,
        taxonomy,
        sink,
        pipeline,
    }
}

#[test]
fn drone_fixture_classifies_as_drone_with_persisted_category() {
    let h = harness();
    let bytes = wav_bytes(&tone_samples(180.0, 2.0));
    let report = h
        .pipeline
        .classify_file(FileRequest {
            bytes: &bytes,
            extension: "wav",
            model_id: "4",
            user_id: 11,
        })
        .expect("classification succeeds");

    assert_eq!(report.label, "drone");
    assert!(report.confidence > 0.5);
    let drone_id = h
        .taxonomy
        .find_category_id("drone")
        .unwrap()
        .expect("drone category seeded");
    assert_eq!(report.category_id, Some(drone_id));
    assert!((report.confidence_percent - report.confidence * 100.0).abs() < 0.01);
    assert_eq!(h.sink.record_count().unwrap(), 1);
}

#[test]
fn corrupt_wav_fails_without_leaving_temp_files() {
    let h = harness();
    let mut truncated = wav_bytes(&tone_samples(180.0, 1.0));
    truncated.truncate(60);
    let err = h
        .pipeline
        .classify_file(FileRequest {
            bytes: &truncated,
            extension: "wav",
            model_id: "4",
            user_id: 11,
        })
        .expect_err("truncated container must fail");

    assert!(matches!(err, ClassifyError::CorruptAudio { .. }));
    let leftovers = std::fs::read_dir(&h.spool_dir).unwrap().count();
    assert_eq!(leftovers, 0, "spool directory must be empty after failure");
    assert_eq!(h.sink.record_count().unwrap(), 0);
}

#[test]
fn garbage_compressed_container_is_unsupported() {
    let h = harness();
    let err = h
        .pipeline
        .classify_file(FileRequest {
            bytes: b"these are not mp3 frames",
            extension: "mp3",
            model_id: "4",
            user_id: 11,
        })
        .expect_err("garbage container must fail");
    assert!(matches!(err, ClassifyError::UnsupportedFormat { .. }));
}

#[test]
fn silent_clip_fails_feature_extraction_not_decode() {
    let h = harness();
    let bytes = wav_bytes(&vec![0.0_f32; 22_050]);
    let err = h
        .pipeline
        .classify_file(FileRequest {
            bytes: &bytes,
            extension: "wav",
            model_id: "4",
            user_id: 11,
        })
        .expect_err("silent clip must fail");
    assert!(matches!(err, ClassifyError::FeatureExtraction { .. }));
}

#[test]
fn byte_identical_uploads_classify_identically() {
    let h = harness();
    let bytes = wav_bytes(&tone_samples(440.0, 1.5));
    let request = FileRequest {
        bytes: &bytes,
        extension: "wav",
        model_id: "5",
        user_id: 11,
    };
    let first = h.pipeline.classify_file(request).unwrap();
    let second = h.pipeline.classify_file(request).unwrap();
    assert_eq!(first.label, second.label);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.scores, second.scores);
    assert_eq!(first.category_id, second.category_id);
}

#[test]
fn concurrent_chunks_match_their_sequential_results() {
    let h = harness();
    let low = pcm_chunk(&tone_samples(150.0, 1.0));
    let high = pcm_chunk(&tone_samples(2_500.0, 1.0));

    let sequential_low = h
        .pipeline
        .classify_chunk(ChunkRequest {
            pcm: &low,
            model_id: "5",
            user_id: 11,
        })
        .unwrap();
    let sequential_high = h
        .pipeline
        .classify_chunk(ChunkRequest {
            pcm: &high,
            model_id: "5",
            user_id: 11,
        })
        .unwrap();

    let pipeline = Arc::new(h.pipeline);
    let low_thread = {
        let pipeline = Arc::clone(&pipeline);
        let low = low.clone();
        std::thread::spawn(move || {
            pipeline
                .classify_chunk(ChunkRequest {
                    pcm: &low,
                    model_id: "5",
                    user_id: 11,
                })
                .unwrap()
        })
    };
    let high_thread = {
        let pipeline = Arc::clone(&pipeline);
        let high = high.clone();
        std::thread::spawn(move || {
            pipeline
                .classify_chunk(ChunkRequest {
                    pcm: &high,
                    model_id: "5",
                    user_id: 11,
                })
                .unwrap()
        })
    };

    let concurrent_low = low_thread.join().unwrap();
    let concurrent_high = high_thread.join().unwrap();
    assert_eq!(concurrent_low.scores, sequential_low.scores);
    assert_eq!(concurrent_high.scores, sequential_high.scores);
    assert_eq!(concurrent_low.label, sequential_low.label);
    assert_eq!(concurrent_high.label, sequential_high.label);
}

#[test]
fn streaming_chunks_record_realtime_source() {
    let h = harness();
    let chunk = pcm_chunk(&tone_samples(300.0, 0.5));
    let report = h
        .pipeline
        .classify_chunk(ChunkRequest {
            pcm: &chunk,
            model_id: "4",
            user_id: 11,
        })
        .unwrap();
    assert_eq!(report.label, "drone");
    assert!(report.category_id.is_some());
    assert_eq!(h.sink.record_count().unwrap(), 1);
}

#[test]
fn unknown_model_is_rejected_for_both_paths() {
    let h = harness();
    let bytes = wav_bytes(&tone_samples(440.0, 0.5));
    let err = h
        .pipeline
        .classify_file(FileRequest {
            bytes: &bytes,
            extension: "wav",
            model_id: "99",
            user_id: 11,
        })
        .unwrap_err();
    assert!(matches!(err, ClassifyError::UnknownModel { ref id } if id == "99"));

    let chunk = pcm_chunk(&tone_samples(440.0, 0.5));
    let err = h
        .pipeline
        .classify_chunk(ChunkRequest {
            pcm: &chunk,
            model_id: "99",
            user_id: 11,
        })
        .unwrap_err();
    assert!(matches!(err, ClassifyError::UnknownModel { .. }));
}
