use polars::prelude::*;
use tempfile::tempdir;

use crate::linear::step_1_dataset_split::SplitDataset;
use crate::util::file_utils;
use crate::util::time_series::TimeSeriesTable;

fn write_file(path: &std::path::Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_are_frames_equivalent() {
    let a = df!("a" => &[1i64, 2, 3], "b" => &[4i64, 5, 6]).unwrap();
    let b = df!("a" => &[7i64, 8, 9], "b" => &[1i64, 2, 3]).unwrap();
    let extra_column = df!("a" => &[1i64], "b" => &[2i64], "c" => &[3i64]).unwrap();
    let dtype_drift = df!("a" => &[1.0f64, 2.0, 3.0], "b" => &[4i64, 5, 6]).unwrap();

    assert!(file_utils::are_frames_equivalent(&[a.clone(), b]));
    assert!(!file_utils::are_frames_equivalent(&[a.clone(), extra_column]));
    assert!(!file_utils::are_frames_equivalent(&[a, dtype_drift]));
    assert!(!file_utils::are_frames_equivalent(&[]));
}

#[test]
fn test_load_merge_raw_frames() {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join("meter_a.csv"),
        "CREATED_AT,VALUE\n01/01/2020 00:00,1\n01/01/2020 00:05,2\n",
    );
    write_file(
        &dir.path().join("meter_b.csv"),
        "CREATED_AT,VALUE\n01/01/2020 00:10,3\n",
    );
    // Non-CSV clutter is ignored.
    write_file(&dir.path().join("notes.txt"), "not data");

    let merged = file_utils::load_merge_raw_frames(dir.path()).unwrap();
    assert_eq!(merged.height(), 3);
    assert_eq!(merged.width(), 2);
}

#[test]
fn test_load_merge_rejects_schema_drift() {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join("meter_a.csv"),
        "CREATED_AT,VALUE\n01/01/2020 00:00,1\n",
    );
    write_file(
        &dir.path().join("meter_b.csv"),
        "CREATED_AT,VALUE,EXTRA\n01/01/2020 00:05,2,3\n",
    );

    let err = file_utils::load_merge_raw_frames(dir.path()).unwrap_err();
    assert!(err.to_string().contains("schema mismatch"));
}

#[test]
fn test_load_merge_requires_input_files() {
    let dir = tempdir().unwrap();
    assert!(file_utils::load_merge_raw_frames(dir.path()).is_err());
}

#[test]
fn test_dataset_directory_round_trip() {
    let dir = tempdir().unwrap();
    let table = |offset: i64, n: usize| {
        let timestamps: Vec<i64> = (0..n as i64).map(|i| (offset + i) * 300).collect();
        let values: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        TimeSeriesTable::new(timestamps, vec!["VALUE".into()], values).unwrap()
    };
    let dataset = SplitDataset {
        train: table(0, 7),
        val: table(7, 2),
        test: table(9, 1),
    };

    file_utils::write_dataset(&dataset, dir.path()).unwrap();
    let loaded = file_utils::load_dataset(dir.path()).unwrap();
    assert_eq!(loaded.train, dataset.train);
    assert_eq!(loaded.val, dataset.val);
    assert_eq!(loaded.test, dataset.test);
}

#[test]
fn test_read_csv_missing_file() {
    let result = file_utils::read_csv("does_not_exist.csv");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}
