/// Test modules for the forecasting pipeline
///
/// * `pipeline_tests` - End-to-end coverage of the clean -> feature ->
///   split -> scale -> window -> train -> predict flow
/// * `file_utils_tests` - CSV ingestion, schema equivalence and dataset
///   directory round trips
pub mod file_utils_tests;
