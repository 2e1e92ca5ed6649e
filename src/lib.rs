pub mod constants;
pub mod error;
pub mod linear {
    pub mod step_1_dataset_split;
    pub mod step_2_scaling;
    pub mod step_3_window_generator;
    pub mod step_4_linear_model_arch;
    pub mod step_5_train_model;
    pub mod step_6_prediction;
    pub mod step_7_model_serialization;
}
#[cfg(test)]
pub mod test;
pub mod util {
    pub mod feature_engineering;
    pub mod file_utils;
    pub mod pre_processor;
    pub mod time_parser;
    pub mod time_series;
}
