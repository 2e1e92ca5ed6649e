// External crates
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};

// Internal modules
use crate::error::PipelineError;
use crate::linear::step_1_dataset_split::SplitDataset;
use crate::util::time_series::TimeSeriesTable;

/// Frames a flat, scaled, chronologically ordered multivariate series as
/// supervised (input, label) tensor pairs.
///
/// One example spans `total_window_size = input_width + shift` consecutive
/// rows: the first `input_width` rows feed the model and the last
/// `label_width` rows (`[total_window_size - label_width, total_window_size)`)
/// are the regression target, projected onto the label columns. When
/// `shift < input_width` the two slices overlap.
///
/// The window slides across the table with step 1, so a table of `N` rows
/// yields `max(0, N - total_window_size + 1)` examples. The same generator is
/// applied to the independently held train, val and test tables, which keeps
/// their batches directly comparable.
#[derive(Debug, Clone)]
pub struct WindowGenerator {
    input_width: usize,
    label_width: usize,
    shift: usize,
    columns: Vec<String>,
    label_indices: Vec<usize>,
}

impl WindowGenerator {
    /// Builds a generator for tables with the given column schema.
    ///
    /// `label_columns` selects the forecast targets; an empty list means
    /// every column. Unknown label columns are a configuration error here,
    /// at construction, not later during iteration.
    pub fn new(
        input_width: usize,
        label_width: usize,
        shift: usize,
        columns: &[String],
        label_columns: &[String],
    ) -> Result<Self, PipelineError> {
        if input_width == 0 || label_width == 0 || shift == 0 {
            return Err(PipelineError::InvalidWindow(format!(
                "input_width, label_width and shift must all be positive, \
                 got ({input_width}, {label_width}, {shift})"
            )));
        }
        if label_width > input_width + shift {
            return Err(PipelineError::InvalidWindow(format!(
                "label_width {label_width} does not fit a window of {} rows",
                input_width + shift
            )));
        }

        let label_indices = if label_columns.is_empty() {
            (0..columns.len()).collect()
        } else {
            label_columns
                .iter()
                .map(|name| {
                    columns
                        .iter()
                        .position(|c| c == name)
                        .ok_or_else(|| PipelineError::UnknownLabelColumn(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            input_width,
            label_width,
            shift,
            columns: columns.to_vec(),
            label_indices,
        })
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn label_width(&self) -> usize {
        self.label_width
    }

    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Number of consecutive rows consumed by one example.
    pub fn total_window_size(&self) -> usize {
        self.input_width + self.shift
    }

    /// First row of the label slice, relative to the window start.
    pub fn label_start(&self) -> usize {
        self.total_window_size() - self.label_width
    }

    /// How many examples a table of `rows` rows yields.
    pub fn num_windows(&self, rows: usize) -> usize {
        (rows + 1).saturating_sub(self.total_window_size())
    }

    /// Positions of the label columns within the full column set.
    pub fn label_indices(&self) -> &[usize] {
        &self.label_indices
    }

    pub fn label_columns(&self) -> Vec<&str> {
        self.label_indices
            .iter()
            .map(|&idx| self.columns[idx].as_str())
            .collect()
    }

    /// Every (input, label) pair of a split, as batchable tensors of shape
    /// `[num_windows, input_width, num_features]` and
    /// `[num_windows, label_width, num_label_columns]`.
    ///
    /// A split shorter than one window is surfaced as an insufficient-data
    /// error, never as an empty or negative-size tensor.
    pub fn windows<B: Backend>(
        &self,
        table: &TimeSeriesTable,
        device: &B::Device,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 3>), PipelineError> {
        self.check_schema(table)?;
        let total = self.total_window_size();
        let count = self.num_windows(table.height());
        if count == 0 {
            return Err(PipelineError::InsufficientData {
                rows: table.height(),
                required: total,
            });
        }

        let num_features = self.columns.len();
        let num_labels = self.label_indices.len();
        let mut input_buffer = Vec::with_capacity(count * self.input_width * num_features);
        let mut label_buffer = Vec::with_capacity(count * self.label_width * num_labels);
        for start in 0..count {
            for row in start..start + self.input_width {
                for &v in table.row(row) {
                    input_buffer.push(v as f32);
                }
            }
            for row in start + self.label_start()..start + total {
                let values = table.row(row);
                for &col in &self.label_indices {
                    label_buffer.push(values[col] as f32);
                }
            }
        }

        let inputs = Tensor::<B, 1>::from_floats(input_buffer.as_slice(), device)
            .reshape(Shape::new([count, self.input_width, num_features]));
        let labels = Tensor::<B, 1>::from_floats(label_buffer.as_slice(), device)
            .reshape(Shape::new([count, self.label_width, num_labels]));
        Ok((inputs, labels))
    }

    /// Windows for all three roles, produced with identical parameters from
    /// independently held tables.
    pub fn split_windows<B: Backend>(
        &self,
        splits: &SplitDataset,
        device: &B::Device,
    ) -> Result<SplitWindows<B>, PipelineError> {
        Ok(SplitWindows {
            train: self.windows(&splits.train, device)?,
            val: self.windows(&splits.val, device)?,
            test: self.windows(&splits.test, device)?,
        })
    }

    /// The single inference window: exactly the most recent `input_width`
    /// rows, shaped `[1, input_width, num_features]`, with no label.
    pub fn inference_input<B: Backend>(
        &self,
        table: &TimeSeriesTable,
        device: &B::Device,
    ) -> Result<Tensor<B, 3>, PipelineError> {
        self.check_schema(table)?;
        if table.height() < self.input_width {
            return Err(PipelineError::InsufficientData {
                rows: table.height(),
                required: self.input_width,
            });
        }

        let num_features = self.columns.len();
        let start = table.height() - self.input_width;
        let mut buffer = Vec::with_capacity(self.input_width * num_features);
        for row in start..table.height() {
            for &v in table.row(row) {
                buffer.push(v as f32);
            }
        }
        Ok(Tensor::<B, 1>::from_floats(buffer.as_slice(), device)
            .reshape(Shape::new([1, self.input_width, num_features])))
    }

    fn check_schema(&self, table: &TimeSeriesTable) -> Result<(), PipelineError> {
        if table.columns() != self.columns.as_slice() {
            return Err(PipelineError::SchemaMismatch(format!(
                "window generator built for {:?}, table has {:?}",
                self.columns,
                table.columns()
            )));
        }
        Ok(())
    }
}

/// (input, label) tensor pairs for the three dataset roles.
pub struct SplitWindows<B: Backend> {
    pub train: (Tensor<B, 3>, Tensor<B, 3>),
    pub val: (Tensor<B, 3>, Tensor<B, 3>),
    pub test: (Tensor<B, 3>, Tensor<B, 3>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Table where column `c` at row `r` holds `1000 * c + r`, so any tensor
    /// entry identifies its source cell.
    fn indexed_table(rows: usize, cols: &[&str]) -> TimeSeriesTable {
        let timestamps: Vec<i64> = (0..rows as i64).map(|i| i * 300).collect();
        let mut values = Vec::with_capacity(rows * cols.len());
        for row in 0..rows {
            for col in 0..cols.len() {
                values.push(1000.0 * col as f64 + row as f64);
            }
        }
        TimeSeriesTable::new(timestamps, columns(cols), values).unwrap()
    }

    fn tensor_values<const D: usize>(tensor: Tensor<NdArray, D>) -> Vec<f32> {
        tensor
            .to_data()
            .convert::<f32>()
            .as_slice::<f32>()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_window_count_matches_table_length() {
        let cols = columns(&["VALUE"]);
        let generator = WindowGenerator::new(288, 288, 288, &cols, &[]).unwrap();
        assert_eq!(generator.total_window_size(), 576);
        assert_eq!(generator.num_windows(1000), 425);
        assert_eq!(generator.num_windows(576), 1);
        assert_eq!(generator.num_windows(575), 0);
        assert_eq!(generator.num_windows(0), 0);
    }

    #[test]
    fn test_thousand_row_table_yields_425_windows() {
        let device = NdArrayDevice::default();
        let table = indexed_table(1000, &["VALUE", "aux"]);
        let cols = columns(&["VALUE", "aux"]);
        let generator = WindowGenerator::new(288, 288, 288, &cols, &[]).unwrap();

        let (inputs, labels) = generator.windows::<NdArray>(&table, &device).unwrap();
        assert_eq!(inputs.dims(), [425, 288, 2]);
        assert_eq!(labels.dims(), [425, 288, 2]);

        // First window: input rows [0, 288), labels rows [288, 576).
        let first_input = tensor_values(inputs.narrow(0, 0, 1));
        assert_eq!(first_input[0], 0.0); // row 0, VALUE
        assert_eq!(first_input[1], 1000.0); // row 0, aux
        assert_eq!(first_input[287 * 2], 287.0); // row 287, VALUE

        let first_label = tensor_values(labels.narrow(0, 0, 1));
        assert_eq!(first_label[0], 288.0); // row 288, VALUE
        assert_eq!(first_label[287 * 2 + 1], 1575.0); // row 575, aux
    }

    #[test]
    fn test_short_table_surfaces_insufficient_data() {
        let device = NdArrayDevice::default();
        let table = indexed_table(575, &["VALUE"]);
        let cols = columns(&["VALUE"]);
        let generator = WindowGenerator::new(288, 288, 288, &cols, &[]).unwrap();

        let err = generator.windows::<NdArray>(&table, &device).unwrap_err();
        match err {
            PipelineError::InsufficientData { rows, required } => {
                assert_eq!(rows, 575);
                assert_eq!(required, 576);
            }
            other => panic!("expected InsufficientData, got {other}"),
        }
    }

    #[test]
    fn test_label_projection_selects_source_columns() {
        let device = NdArrayDevice::default();
        let table = indexed_table(10, &["VALUE", "aux", "extra"]);
        let cols = columns(&["VALUE", "aux", "extra"]);
        let generator =
            WindowGenerator::new(4, 2, 3, &cols, &columns(&["extra", "VALUE"])).unwrap();

        assert_eq!(generator.label_columns(), vec!["extra", "VALUE"]);
        let (_, labels) = generator.windows::<NdArray>(&table, &device).unwrap();
        // total = 7, label slice rows [5, 7) of each window.
        assert_eq!(labels.dims(), [4, 2, 2]);
        let first = tensor_values(labels.narrow(0, 0, 1));
        assert_eq!(first, vec![2005.0, 5.0, 2006.0, 6.0]);
    }

    #[test]
    fn test_overlapping_label_slice() {
        let device = NdArrayDevice::default();
        let table = indexed_table(8, &["VALUE"]);
        let cols = columns(&["VALUE"]);
        // shift < input_width: labels overlap the tail of the input slice.
        let generator = WindowGenerator::new(6, 4, 2, &cols, &[]).unwrap();
        assert_eq!(generator.total_window_size(), 8);
        assert_eq!(generator.label_start(), 4);

        let (inputs, labels) = generator.windows::<NdArray>(&table, &device).unwrap();
        assert_eq!(inputs.dims(), [1, 6, 1]);
        assert_eq!(tensor_values(labels), vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_unknown_label_column_fails_at_construction() {
        let cols = columns(&["VALUE"]);
        let err = WindowGenerator::new(4, 2, 2, &cols, &columns(&["missing"])).unwrap_err();
        match err {
            PipelineError::UnknownLabelColumn(name) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownLabelColumn, got {other}"),
        }
    }

    #[test]
    fn test_zero_widths_are_rejected() {
        let cols = columns(&["VALUE"]);
        assert!(WindowGenerator::new(0, 1, 1, &cols, &[]).is_err());
        assert!(WindowGenerator::new(1, 0, 1, &cols, &[]).is_err());
        assert!(WindowGenerator::new(1, 1, 0, &cols, &[]).is_err());
        // Labels wider than the whole window cannot be sliced out of it.
        assert!(WindowGenerator::new(2, 5, 2, &cols, &[]).is_err());
    }

    #[test]
    fn test_inference_input_takes_most_recent_rows() {
        let device = NdArrayDevice::default();
        let table = indexed_table(10, &["VALUE", "aux"]);
        let cols = columns(&["VALUE", "aux"]);
        let generator = WindowGenerator::new(4, 4, 4, &cols, &[]).unwrap();

        let input = generator.inference_input::<NdArray>(&table, &device).unwrap();
        assert_eq!(input.dims(), [1, 4, 2]);
        assert_eq!(
            tensor_values(input),
            vec![6.0, 1006.0, 7.0, 1007.0, 8.0, 1008.0, 9.0, 1009.0]
        );

        let short = indexed_table(3, &["VALUE", "aux"]);
        assert!(generator.inference_input::<NdArray>(&short, &device).is_err());
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let device = NdArrayDevice::default();
        let cols = columns(&["VALUE", "aux"]);
        let generator = WindowGenerator::new(2, 2, 2, &cols, &[]).unwrap();
        let other = indexed_table(10, &["aux", "VALUE"]);
        assert!(generator.windows::<NdArray>(&other, &device).is_err());
    }

    #[test]
    fn test_identical_parameters_across_splits() {
        let device = NdArrayDevice::default();
        let cols = columns(&["VALUE"]);
        let generator = WindowGenerator::new(3, 2, 2, &cols, &[]).unwrap();
        let splits = SplitDataset {
            train: indexed_table(20, &["VALUE"]),
            val: indexed_table(10, &["VALUE"]),
            test: indexed_table(6, &["VALUE"]),
        };
        let windows = generator.split_windows::<NdArray>(&splits, &device).unwrap();
        assert_eq!(windows.train.0.dims(), [16, 3, 1]);
        assert_eq!(windows.val.0.dims(), [6, 3, 1]);
        assert_eq!(windows.test.0.dims(), [2, 3, 1]);
        assert_eq!(windows.test.1.dims(), [2, 2, 1]);
    }
}
