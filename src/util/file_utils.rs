// External crates
use anyhow::{bail, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

// Internal modules
use crate::error::PipelineError;
use crate::linear::step_1_dataset_split::SplitDataset;
use crate::util::time_series::TimeSeriesTable;

/// Read a CSV file into a DataFrame
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
///
/// # Returns
///
/// Returns a DataFrame containing the CSV data
pub fn read_csv<P: AsRef<Path>>(file_path: P) -> Result<DataFrame> {
    let file_path = file_path.as_ref();
    if !file_path.exists() {
        bail!("file not found: {}", file_path.display());
    }
    let file = File::open(file_path)
        .with_context(|| format!("failed to open {}", file_path.display()))?;
    let df = CsvReader::new(file).finish()?;
    Ok(df)
}

/// Write a DataFrame to a CSV file, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = File::create(file_path)
        .with_context(|| format!("failed to create {}", file_path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Checks if all frames in a list are equivalent: same column names and
/// dtypes (values are not checked). An empty list is not equivalent.
pub fn are_frames_equivalent(frames: &[DataFrame]) -> bool {
    let Some(first) = frames.first() else {
        return false;
    };
    frames.iter().all(|df| {
        df.get_column_names() == first.get_column_names() && df.dtypes() == first.dtypes()
    })
}

/// Loads every `*.csv` under a directory and merges them into one frame.
/// Fails fast, before any merge, when the files are not schema-equivalent.
pub fn load_merge_raw_frames(raw_data_dir: &Path) -> Result<DataFrame> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(raw_data_dir)
        .with_context(|| format!("failed to read {}", raw_data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no csv files found in {}", raw_data_dir.display());
    }

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        frames.push(read_csv(path)?);
    }
    if !are_frames_equivalent(&frames) {
        return Err(PipelineError::SchemaMismatch(
            "raw input files should have the same columns and dtypes, check your data".into(),
        )
        .into());
    }

    let mut merged = frames.remove(0);
    for frame in frames {
        merged = merged.vstack(&frame)?;
    }
    Ok(merged)
}

/// Loads the train, val and test tables from a dataset directory.
pub fn load_dataset(dataset_dir: &Path) -> Result<SplitDataset> {
    let load = |name: &str| -> Result<TimeSeriesTable> {
        let df = read_csv(dataset_dir.join(name))?;
        TimeSeriesTable::from_dataframe(&df)
            .with_context(|| format!("failed to load {name} from {}", dataset_dir.display()))
    };
    Ok(SplitDataset {
        train: load("train.csv")?,
        val: load("val.csv")?,
        test: load("test.csv")?,
    })
}

/// Writes the train, val and test tables into a dataset directory.
pub fn write_dataset(dataset: &SplitDataset, dataset_dir: &Path) -> Result<()> {
    for (name, table) in [
        ("train.csv", &dataset.train),
        ("val.csv", &dataset.val),
        ("test.csv", &dataset.test),
    ] {
        let mut df = table.to_dataframe()?;
        write_csv(&mut df, &dataset_dir.join(name))?;
    }
    Ok(())
}
