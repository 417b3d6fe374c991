//! Integration tests for the extract → index pipeline.
//!
//! Audio fixtures are synthetic WAV files written with `hound`; nothing here
//! talks to Freesound.

use std::f32::consts::PI;
use std::path::Path;

use soundseek_core::model::Sample;
use soundseek_core::schema::Database;
use soundseek_etl::{build_local_pipeline, build_pipeline, Config, SampleBatch};
use soundseek_search::{evaluate_retrieval, Normalization, SearchEngine};
use tempfile::TempDir;
use treadle::WorkItem;

fn write_tone(path: &Path, freq: f32, secs: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..(secs * 22050.0) as usize {
        let v = (2.0 * PI * freq * i as f32 / 22050.0).sin() * 0.4;
        writer.write_sample((v * f32::from(i16::MAX)) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

/// Test that both pipelines can be built and wired correctly
#[test]
fn test_pipeline_construction() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);

    assert!(build_local_pipeline(&config).is_ok());

    config.freesound_api_key = Some("test-key".to_string());
    assert!(build_pipeline(&config, "pad", 10, None).is_ok());
}

/// Test work item creation
#[test]
fn test_sample_batch_work_item() {
    let batch = SampleBatch::for_query("kick drum");
    assert_eq!(batch.id(), "fetch-kick-drum");
    assert_eq!(batch.query.as_deref(), Some("kick drum"));
}

/// Run extract and index over synthetic tones, then search and evaluate.
#[tokio::test]
async fn test_local_pipeline_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let layout = config.layout();
    std::fs::create_dir_all(&layout.audio_dir).unwrap();

    let tones = [
        (1, "low_a", 110.0, "bass"),
        (2, "low_b", 123.0, "bass"),
        (3, "high_a", 3520.0, "lead"),
        (4, "high_b", 3951.0, "lead"),
    ];

    let db = Database::open(config.database_path()).unwrap();
    for (id, name, freq, tag) in tones {
        let mut sample = Sample::new(id, name);
        let path = layout.audio_dir.join(format!("{id}_{name}.wav"));
        write_tone(&path, freq, 1.0);
        sample.tags = vec![tag.to_string()];
        sample.file_path = Some(path);
        db.upsert_sample(&sample).unwrap();
    }
    drop(db);

    let workflow = build_local_pipeline(&config).unwrap();
    let mut store = treadle::SqliteStateStore::open(&temp_dir.path().join("pipeline.db"))
        .await
        .unwrap();
    workflow
        .advance(&SampleBatch::fresh(None), &mut store)
        .await
        .unwrap();

    assert!(layout.features_path.exists());
    assert!(layout.index_path.exists());

    let db = Database::open(config.database_path()).unwrap();
    assert_eq!(db.count_features().unwrap(), 4);
    assert!(db.list_samples_missing_features().unwrap().is_empty());

    let engine =
        SearchEngine::open(&layout.features_path, &layout.index_path, Normalization::None).unwrap();
    assert_eq!(engine.len(), 4);

    let hits = engine.query_by_sample("1_low_a.wav", 1).unwrap();
    assert_eq!(hits[0].file_name, "2_low_b.wav");

    let report = evaluate_retrieval(&engine, &db.tag_labels().unwrap(), 1).unwrap();
    assert_eq!(report.queries, 4);
    assert_eq!(report.mrr, 1.0);
}
