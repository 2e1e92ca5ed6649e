// External imports
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

/// Multi-step linear baseline for sequence-to-sequence forecasting.
///
/// The model looks only at the last observed time step and projects it to the
/// whole forecast horizon in a single affine map, emitting every feature
/// channel. Weights start at zero, so an untrained model predicts a flat
/// zero sequence.
#[derive(Module, Debug)]
pub struct MultiStepLinear<B: Backend> {
    output_steps: usize,
    num_features: usize,
    projection: Linear<B>,
}

impl<B: Backend> MultiStepLinear<B> {
    /// Create a new multi-step linear model.
    pub fn new(output_steps: usize, num_features: usize, device: &B::Device) -> Self {
        let projection = LinearConfig::new(num_features, output_steps * num_features)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self {
            output_steps,
            num_features,
            projection,
        }
    }

    pub fn output_steps(&self) -> usize {
        self.output_steps
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Forward pass: [batch, time, features] -> [batch, output_steps, features].
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, time, features] = x.dims();
        let last_step = x.narrow(1, time - 1, 1).reshape([batch, features]);
        let projected = self.projection.forward(last_step);
        projected.reshape([batch, self.output_steps, self.num_features])
    }
}
