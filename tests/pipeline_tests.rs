//! Integration tests for sensor-align
//!
//! The tests are organized into categories:
//! 1. Bounded merge
//! 2. Stream aligner
//! 3. Window segmenter
//! 4. Label windows
//! 5. CSV logs on disk

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sensor_align::*;
use std::io::Write;
use std::path::Path;

// ============================================================================
// Helper Functions
// ============================================================================

fn dm(epoch: f64) -> Record {
    Record::device_motion(epoch, DeviceMotion::default())
}

fn acc(epoch: f64) -> Record {
    Record::accelerometer(epoch, Vector3::default())
}

fn source_with(files: Vec<(&str, Vec<Record>)>) -> SharedSource {
    let mut source = MemorySource::new();
    for (name, records) in files {
        source.insert(name, records);
    }
    source.into_shared()
}

fn ids(names: &[&str]) -> Vec<FileId> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Sorted epochs 0..n, shuffled inside consecutive chunks of `chunk` records
fn chunk_shuffled(n: usize, chunk: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut epochs: Vec<f64> = (0..n).map(|i| i as f64 * 0.02).collect();
    for part in epochs.chunks_mut(chunk) {
        part.shuffle(rng);
    }
    epochs
}

/// The two fixture files of the worked example: device motion
/// `[100, 101, 102, 105, 104]` and accelerometer `[100.5, 103]`
fn example_source() -> SharedSource {
    source_with(vec![
        ("sensor_data_1", vec![dm(100.0), acc(100.5), dm(101.0), dm(102.0)]),
        ("sensor_data_2", vec![acc(103.0), dm(105.0), dm(104.0)]),
    ])
}

// ============================================================================
// Bounded Merge Tests
// ============================================================================

#[test]
fn test_example_window_one_fails_at_104() {
    let spec = StreamSpec::of_type(
        RecordType::DeviceMotion,
        ids(&["sensor_data_1", "sensor_data_2"]),
    );
    let mut merge = SortedMerge::new(example_source(), spec, 1).unwrap();

    let mut emitted = Vec::new();
    let err = loop {
        match merge.pop() {
            Ok(Some(record)) => emitted.push(record.epoch),
            Ok(None) => panic!("expected an ordering violation"),
            Err(e) => break e,
        }
    };
    assert_eq!(emitted, vec![100.0, 101.0, 102.0, 105.0]);
    assert!(matches!(
        err,
        SensorAlignError::WindowTooSmall { epoch, last_epoch, .. }
            if epoch == 104.0 && last_epoch == 105.0
    ));
}

#[test]
fn test_example_window_two_sorts() {
    let spec = StreamSpec::of_type(
        RecordType::DeviceMotion,
        ids(&["sensor_data_1", "sensor_data_2"]),
    );
    let merge = SortedMerge::new(example_source(), spec, 2).unwrap();
    let epochs: Vec<f64> = merge.map(|r| r.unwrap().epoch).collect();
    assert_eq!(epochs, vec![100.0, 101.0, 102.0, 104.0, 105.0]);
}

#[test]
fn test_large_enough_window_emits_everything_in_order() {
    let mut rng = StdRng::seed_from_u64(7);
    for chunk in [1, 2, 5, 17] {
        let epochs = chunk_shuffled(500, chunk, &mut rng);
        let (first, second) = epochs.split_at(240);
        let source = source_with(vec![
            ("a", first.iter().map(|&e| acc(e)).collect()),
            ("b", second.iter().map(|&e| acc(e)).collect()),
        ]);

        for window in [chunk, chunk + 3, 600] {
            let spec = StreamSpec::new("acc", ids(&["a", "b"]));
            let merge = SortedMerge::new(source.clone(), spec, window).unwrap();
            let out: Vec<f64> = merge.map(|r| r.unwrap().epoch).collect();

            let mut expected = epochs.clone();
            expected.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(out, expected, "chunk {} window {}", chunk, window);
        }
    }
}

#[test]
fn test_small_window_fails_without_emitting_older_records() {
    for chunk in [2, 4, 9] {
        // Reversed chunks are `chunk - 1` positions out of place
        let mut epochs: Vec<f64> = (0..60).map(|i| i as f64).collect();
        for part in epochs.chunks_mut(chunk) {
            part.reverse();
        }
        let source = source_with(vec![("a", epochs.iter().map(|&e| acc(e)).collect())]);

        for window in 1..chunk {
            let spec = StreamSpec::new("acc", ids(&["a"]));
            let merge = SortedMerge::new(source.clone(), spec, window).unwrap();
            let mut last = f64::MIN;
            let mut failed = false;
            for item in merge {
                match item {
                    Ok(record) => {
                        assert!(record.epoch >= last);
                        last = record.epoch;
                    }
                    Err(e) => {
                        assert!(e.is_window_too_small());
                        failed = true;
                    }
                }
            }
            assert!(failed, "chunk {} window {} did not fail", chunk, window);
        }
    }
}

#[test]
fn test_peek_never_advances_cursor() {
    let source = source_with(vec![("a", vec![acc(3.0), acc(1.0), acc(2.0), acc(4.0)])]);
    let mut merge = SortedMerge::new(source, StreamSpec::new("acc", ids(&["a"])), 2).unwrap();

    for _ in 0..10 {
        assert_eq!(merge.peek().unwrap().map(|r| r.epoch), Some(1.0));
    }
    assert_eq!(merge.buffered(), 2);
    assert_eq!(merge.emitted(), 0);

    let popped = merge.pop().unwrap().unwrap();
    assert_eq!(popped.epoch, 1.0);
    assert_eq!(merge.peek().unwrap().map(|r| r.epoch), Some(2.0));
}

#[test]
fn test_independent_iterators_over_same_files() {
    let source = example_source();
    let files = ids(&["sensor_data_1", "sensor_data_2"]);
    let dms = SortedMerge::new(
        source.clone(),
        StreamSpec::of_type(RecordType::DeviceMotion, files.clone()),
        2,
    )
    .unwrap();
    let accs = SortedMerge::new(
        source,
        StreamSpec::of_type(RecordType::Accelerometer, files),
        2,
    )
    .unwrap();

    assert_eq!(dms.count(), 5);
    let acc_epochs: Vec<f64> = accs.map(|r| r.unwrap().epoch).collect();
    assert_eq!(acc_epochs, vec![100.5, 103.0]);
}

#[test]
fn test_cached_source_behaves_like_inner() {
    let plain = example_source();
    let cached: SharedSource = std::sync::Arc::new(CachedSource::new(example_source()));
    let files = ids(&["sensor_data_1", "sensor_data_2"]);

    let collect = |source: SharedSource| -> Vec<f64> {
        let spec = StreamSpec::of_type(RecordType::DeviceMotion, files.clone());
        SortedMerge::new(source, spec, 2)
            .unwrap()
            .map(|r| r.unwrap().epoch)
            .collect()
    };
    assert_eq!(collect(plain), collect(cached.clone()));
    assert_eq!(collect(cached.clone()), collect(cached));
}

// ============================================================================
// Stream Aligner Tests
// ============================================================================

#[test]
fn test_aligner_example() {
    let source = source_with(vec![(
        "s",
        vec![
            dm(100.0),
            dm(102.0),
            Record::accelerometer(101.0, Vector3::new(1.0, 0.0, 0.0)),
            Record::accelerometer(103.0, Vector3::new(2.0, 0.0, 0.0)),
            dm(104.0),
        ],
    )]);
    let aligner = StreamAligner::new(source, AlignerConfig::watch(ids(&["s"]), 3)).unwrap();
    let states: Vec<_> = aligner.map(|s| s.unwrap()).collect();

    let secondary_x: Vec<Option<f64>> = states
        .iter()
        .map(|s| match s.secondary(0).map(|r| &r.payload) {
            Some(Payload::Accelerometer(v)) => Some(v.x),
            _ => None,
        })
        .collect();
    assert_eq!(secondary_x, vec![None, Some(1.0), Some(2.0)]);
}

#[test]
fn test_aligner_carry_forward_law() {
    let mut rng = StdRng::seed_from_u64(11);
    // Primary on even, secondary on odd epochs so no tick ties
    let primary: Vec<f64> = (0..400).map(|i| (i * 2) as f64).collect();
    let secondary: Vec<f64> = (0..400)
        .filter(|_| rng.gen_bool(0.2))
        .map(|i| (i * 2 + 1) as f64)
        .collect();

    let mut records: Vec<Record> = primary.iter().map(|&e| dm(e)).collect();
    records.extend(secondary.iter().map(|&e| acc(e)));
    // Interleave by time, then disturb locally
    records.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
    for part in records.chunks_mut(3) {
        part.shuffle(&mut rng);
    }

    let source = source_with(vec![("s", records)]);
    let config = AlignerConfig {
        window_size: 3,
        primary: StreamSpec::of_type(RecordType::DeviceMotion, ids(&["s"])),
        secondaries: vec![StreamSpec::of_type(RecordType::Accelerometer, ids(&["s"]))],
    };
    let aligner = StreamAligner::new(source, config).unwrap();

    let mut count = 0;
    for state in aligner {
        let state = state.unwrap();
        let expected = secondary.iter().copied().filter(|&e| e < state.epoch).last();
        assert_eq!(state.secondary(0).map(|r| r.epoch), expected);
        count += 1;
    }
    assert_eq!(count, primary.len());
}

#[test]
fn test_aligner_reports_violating_stream() {
    let source = source_with(vec![("s", vec![dm(1.0), dm(3.0), dm(2.0)])]);
    let mut aligner = StreamAligner::new(source, AlignerConfig::watch(ids(&["s"]), 1)).unwrap();
    aligner.next().unwrap().unwrap();
    aligner.next().unwrap().unwrap();
    match aligner.next() {
        Some(Err(SensorAlignError::WindowTooSmall { stream, .. })) => {
            assert_eq!(stream, "device_motion")
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(aligner.next().is_none());
}

// ============================================================================
// Window Segmenter Tests
// ============================================================================

#[test]
fn test_segmenter_example() {
    let source = source_with(vec![("s", vec![dm(5.0), dm(65.0), dm(125.0)])]);
    let config = SegmenterConfig {
        order_window_size: 2,
        time_window_size: 60.0,
        streams: vec![StreamSpec::of_type(RecordType::DeviceMotion, ids(&["s"]))],
    };
    let buckets: Vec<TimeBucket> = WindowSegmenter::new(source, config)
        .unwrap()
        .map(|b| b.unwrap())
        .collect();

    let summary: Vec<(f64, f64, Vec<f64>)> = buckets
        .iter()
        .map(|b| {
            (
                b.start_epoch,
                b.end_epoch,
                b.get("device_motion").unwrap().iter().map(|r| r.epoch).collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (5.0, 65.0, vec![5.0]),
            (65.0, 125.0, vec![65.0]),
            (125.0, 185.0, vec![125.0]),
        ]
    );
}

#[test]
fn test_segmenter_tiles_timeline_and_keeps_every_record() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut data = Vec::new();
    let mut epoch = 1000.0;
    for _ in 0..300 {
        // Occasional long gaps produce empty buckets
        epoch += if rng.gen_bool(0.05) { 400.0 } else { rng.gen_range(0.1..5.0) };
        data.push(if rng.gen_bool(0.7) { dm(epoch) } else { acc(epoch) });
    }
    let responses = vec![Record::response(995.0, "Cook"), Record::response(epoch, "Eat")];
    let total = data.len() + responses.len();

    let source = source_with(vec![("data", data), ("resp", responses)]);
    let config = SegmenterConfig::watch(ids(&["data"]), ids(&["resp"]), 4, 30.0, None);
    let buckets: Vec<TimeBucket> = WindowSegmenter::new(source, config)
        .unwrap()
        .map(|b| b.unwrap())
        .collect();

    assert_eq!(buckets[0].start_epoch, 995.0);
    for pair in buckets.windows(2) {
        assert_eq!(pair[0].end_epoch, pair[1].start_epoch);
    }
    for bucket in &buckets {
        approx::assert_relative_eq!(bucket.duration(), 30.0, epsilon = 1e-9);
        for stream in &bucket.streams {
            for record in &stream.records {
                assert!(record.epoch >= bucket.start_epoch && record.epoch < bucket.end_epoch);
            }
        }
    }
    assert!(buckets.iter().any(|b| b.is_empty()));
    assert_eq!(buckets.iter().map(|b| b.total_records()).sum::<usize>(), total);
    assert!(!buckets.last().unwrap().is_empty());
}

#[test]
fn test_segmenter_downsamples_high_rate_streams() {
    let mut records = Vec::new();
    for i in 0..20 {
        records.push(dm(i as f64));
        records.push(Record::location(i as f64 + 0.5, Location::default()));
    }
    let source = source_with(vec![("data", records), ("resp", vec![])]);
    let config = SegmenterConfig::watch(ids(&["data"]), ids(&["resp"]), 4, 100.0, Some(5));
    let buckets: Vec<TimeBucket> = WindowSegmenter::new(source, config)
        .unwrap()
        .map(|b| b.unwrap())
        .collect();

    assert_eq!(buckets.len(), 1);
    let dm_epochs: Vec<f64> = buckets[0]
        .get("device_motion")
        .unwrap()
        .iter()
        .map(|r| r.epoch)
        .collect();
    assert_eq!(dm_epochs, vec![4.0, 9.0, 14.0, 19.0]);
    assert_eq!(buckets[0].count("location"), 20);
}

// ============================================================================
// Label Window Tests
// ============================================================================

#[test]
fn test_label_windows_over_aligned_states() {
    let mut data = Vec::new();
    for i in 0..200 {
        data.push(dm(i as f64));
        if i % 10 == 5 {
            data.push(acc(i as f64 + 0.25));
        }
    }
    let responses = vec![Record::response(100.0, "Work"), Record::response(190.0, "Eat")];
    let source = source_with(vec![("data", data), ("resp", responses)]);

    let aligner =
        StreamAligner::new(source.clone(), AlignerConfig::watch(ids(&["data"]), 4)).unwrap();
    let responses = SortedMerge::new(
        source,
        StreamSpec::of_type(RecordType::Response, ids(&["resp"])),
        4,
    )
    .unwrap();
    let windows: Vec<LabeledWindow> =
        LabelWindows::new(responses, aligner, LabelWindowConfig::default())
            .unwrap()
            .map(|w| w.unwrap())
            .collect();

    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].label(), Some("Work"));
    assert_eq!(windows[0].states.len(), 31);
    assert_eq!(windows[0].states.first().unwrap().epoch, 40.0);
    assert_eq!(windows[0].states.last().unwrap().epoch, 70.0);
    // Accelerometer at 65.25 is carried into 66..70
    assert_eq!(
        windows[0].states.last().unwrap().secondary(0).map(|r| r.epoch),
        Some(65.25)
    );
    assert_eq!(windows[1].label(), Some("Eat"));
    assert_eq!(windows[1].states.first().unwrap().epoch, 130.0);
}

// ============================================================================
// CSV Logs On Disk
// ============================================================================

fn write_log(path: &Path, lines: &[&str]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = std::fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

#[test]
fn test_discovered_csv_logs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let device = dir.path().join("week1").join("watch001");
    write_log(
        &device.join("sensor_data_20190613_165634.csv"),
        &[
            "100,device_motion,0,0,0,0,0,0,0,0,0,0,0,1",
            "100.5,accelerometer,0,0,1",
            "101,device_motion,0,0,0,0,0,0,0,0,0,0,0,1",
            "102,device_motion,0,0,0,0,0,0,0,0,0,0,0,1",
        ],
    );
    write_log(
        &device.join("sensor_data_20190613_170014.csv"),
        &[
            "103,accelerometer,0,0,1",
            "105,device_motion,0,0,0,0,0,0,0,0,0,0,0,1",
            "104,device_motion,0,0,0,0,0,0,0,0,0,0,0,1",
        ],
    );
    write_log(&device.join("responses_20190613_170415.csv"), &["104.5,response,Cook"]);

    let data = discover(dir.path(), 1, FileKind::SensorData).unwrap();
    let responses = discover(dir.path(), 1, FileKind::Responses).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(responses.len(), 1);

    let source: SharedSource = std::sync::Arc::new(CachedSource::new(CsvSource::new()));

    let aligner =
        StreamAligner::new(source.clone(), AlignerConfig::watch(data.clone(), 2)).unwrap();
    let epochs: Vec<f64> = aligner.map(|s| s.unwrap().epoch).collect();
    assert_eq!(epochs, vec![100.0, 101.0, 102.0, 104.0, 105.0]);

    let too_small =
        StreamAligner::new(source.clone(), AlignerConfig::watch(data.clone(), 1)).unwrap();
    let results: Vec<_> = too_small.collect();
    assert!(results.last().unwrap().as_ref().unwrap_err().is_window_too_small());

    let config = SegmenterConfig::watch(data, responses, 2, 60.0, None);
    let buckets: Vec<TimeBucket> = WindowSegmenter::new(source, config)
        .unwrap()
        .map(|b| b.unwrap())
        .collect();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].count("device_motion"), 5);
    assert_eq!(buckets[0].count("accelerometer"), 2);
    assert_eq!(buckets[0].count("response"), 1);
}

#[test]
fn test_unsupported_type_in_csv_log_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_data_1.csv");
    write_log(&path, &["1,device_motion,0,0,0,0,0,0,0,0,0,0,0,1", "2,magnetometer,1,2,3"]);

    let source: SharedSource = std::sync::Arc::new(CsvSource::new());
    let spec = StreamSpec::of_type(
        RecordType::DeviceMotion,
        vec![path.to_str().unwrap().to_string()],
    );
    let mut merge = SortedMerge::new(source, spec, 1).unwrap();
    assert_eq!(
        merge.pop().unwrap_err(),
        SensorAlignError::UnsupportedRecordType("magnetometer".to_string())
    );
}

#[test]
fn test_pipeline_config_from_json() {
    let json = r#"{ "order_window_size": 10, "downsample": 5 }"#;
    let config: PipelineConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.order_window_size, 10);
    assert_eq!(config.downsample, Some(5));
    assert_eq!(config.time_window_size, 60.0);

    let round = serde_json::to_string(&config).unwrap();
    let back: PipelineConfig = serde_json::from_str(&round).unwrap();
    assert_eq!(back, config);
}
