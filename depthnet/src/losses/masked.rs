//! Masked mean squared and mean absolute errors.

use burn::prelude::*;

use super::{masked_mean, valid_mask};

/// Configuration for masked MSE loss.
#[derive(Config, Debug)]
pub struct MaskedMseLossConfig {
    #[config(default = 1.0)]
    pub weight: f32,
}

/// Mean squared error over pixels with a positive target.
#[derive(Module, Debug)]
pub struct MaskedMseLoss<B: Backend> {
    pub weight: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl MaskedMseLossConfig {
    /// Initialize a new masked MSE loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> MaskedMseLoss<B> {
        MaskedMseLoss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for MaskedMseLoss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> MaskedMseLoss<B> {
    pub fn new() -> Self {
        MaskedMseLossConfig::new().init()
    }

    /// Calculate the loss for `[batch, 1, height, width]` prediction and target maps.
    pub fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        assert_eq!(pred.dims(), target.dims(), "inconsistent dimensions");

        let mask = valid_mask(&target);
        let diff = (target - pred) * mask.clone();

        masked_mean(diff.powf_scalar(2.0).sum(), mask.sum()) * self.weight
    }
}

/// Configuration for masked L1 loss.
#[derive(Config, Debug)]
pub struct MaskedL1LossConfig {
    #[config(default = 1.0)]
    pub weight: f32,
}

/// Mean absolute error over pixels with a positive target.
#[derive(Module, Debug)]
pub struct MaskedL1Loss<B: Backend> {
    pub weight: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl MaskedL1LossConfig {
    /// Initialize a new masked L1 loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> MaskedL1Loss<B> {
        MaskedL1Loss {
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for MaskedL1Loss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> MaskedL1Loss<B> {
    pub fn new() -> Self {
        MaskedL1LossConfig::new().init()
    }

    /// Calculate the loss for `[batch, 1, height, width]` prediction and target maps.
    pub fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        assert_eq!(pred.dims(), target.dims(), "inconsistent dimensions");

        let mask = valid_mask(&target);
        let diff = (target - pred) * mask.clone();

        masked_mean(diff.abs().sum(), mask.sum()) * self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn sample(device: &<TestBackend as Backend>::Device) -> (Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        let pred = Tensor::from_floats([[[[1.0, 2.0], [3.0, 4.0]]]], device);
        // The zero at (0, 0) is a missing measurement.
        let target = Tensor::from_floats([[[[0.0, 3.0], [3.0, 6.0]]]], device);
        (pred, target)
    }

    #[test]
    fn mse_ignores_missing_targets() {
        let device = Default::default();
        let (pred, target) = sample(&device);

        let loss = MaskedMseLoss::<TestBackend>::new().forward(pred, target).into_scalar();

        assert!((loss - 5.0 / 3.0).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn l1_ignores_missing_targets() {
        let device = Default::default();
        let (pred, target) = sample(&device);

        let loss = MaskedL1Loss::<TestBackend>::new().forward(pred, target).into_scalar();

        assert!((loss - 1.0).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn weight_scales_the_loss() {
        let device = Default::default();
        let (pred, target) = sample(&device);

        let loss = MaskedL1LossConfig::new()
            .with_weight(0.5)
            .init::<TestBackend>()
            .forward(pred, target)
            .into_scalar();

        assert!((loss - 0.5).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn no_valid_pixels_gives_zero() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::ones([2, 1, 3, 3], &device);
        let target = Tensor::<TestBackend, 4>::zeros([2, 1, 3, 3], &device);

        assert_eq!(MaskedMseLoss::new().forward(pred.clone(), target.clone()).into_scalar(), 0.0);
        assert_eq!(MaskedL1Loss::new().forward(pred, target).into_scalar(), 0.0);
    }

    #[test]
    #[should_panic(expected = "inconsistent dimensions")]
    fn mismatched_shapes_panic() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let target = Tensor::<TestBackend, 4>::ones([1, 1, 2, 3], &device);

        let _ = MaskedMseLoss::new().forward(pred, target);
    }
}
