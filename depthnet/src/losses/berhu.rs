//! Reverse Huber (berHu) loss.

use burn::{prelude::*, tensor::ElementConversion};

use super::{masked_mean, valid_mask};

/// Configuration for berHu loss.
#[derive(Config, Debug)]
pub struct BerHuLossConfig {
    /// Fraction of the largest overestimate `max(pred - target)` used as threshold.
    #[config(default = 0.2)]
    pub threshold_ratio: f32,
    #[config(default = 1.0)]
    pub weight: f32,
}

/// Reverse Huber loss over pixels with a positive target.
///
/// With `d = |target - pred|` on valid pixels and threshold `c`, every `d` contributes
/// once and every `d > c` contributes `d^2` once more; the loss is the mean over all
/// contributions.
#[derive(Module, Debug)]
pub struct BerHuLoss<B: Backend> {
    pub threshold_ratio: f32,
    pub weight: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl BerHuLossConfig {
    /// Initialize a new berHu loss with the given configuration.
    pub const fn init<B: Backend>(&self) -> BerHuLoss<B> {
        BerHuLoss {
            threshold_ratio: self.threshold_ratio,
            weight: self.weight,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for BerHuLoss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> BerHuLoss<B> {
    pub fn new() -> Self {
        BerHuLossConfig::new().init()
    }

    /// Calculate the loss for `[batch, 1, height, width]` prediction and target maps.
    pub fn forward(&self, pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        assert_eq!(pred.dims(), target.dims(), "inconsistent dimensions");

        // Taken over every pixel, valid or not.
        let max_overestimate = (pred.clone() - target.clone()).max().into_scalar();
        let threshold = max_overestimate.elem::<f32>() * self.threshold_ratio;

        let mask = valid_mask(&target);
        let diff = (target - pred).abs() * mask.clone();
        let huber_mask = diff.clone().greater_elem(threshold).float() * mask.clone();

        let sum = diff.clone().sum() + (diff.powf_scalar(2.0) * huber_mask.clone()).sum();
        let count = mask.sum() + huber_mask.sum();

        masked_mean(sum, count) * self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn squares_only_large_residuals() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 2.0], [3.0, 4.0]]]], &device);
        let target = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 3.0], [3.0, 6.0]]]], &device);

        // threshold = 0.2 * max(pred - target) = 0.2
        // residuals 1, 0, 2 -> [1, 0, 2] ++ [1, 4]
        let loss = BerHuLoss::new().forward(pred, target).into_scalar();

        assert!((loss - 8.0 / 5.0).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn small_residuals_stay_linear() {
        let device = Default::default();
        let target = Tensor::<TestBackend, 4>::from_floats([[[[2.0, 2.0, 2.0, 2.0]]]], &device);
        let pred = Tensor::<TestBackend, 4>::from_floats([[[[3.0, 2.0, 2.0, 1.875]]]], &device);

        // threshold = 0.2; only the 1.0 residual is squared: [1, 0, 0, 0.125] ++ [1]
        let loss = BerHuLoss::new().forward(pred, target).into_scalar();

        assert!((loss - 2.125 / 5.0).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn no_valid_pixels_gives_zero() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);
        let target = Tensor::<TestBackend, 4>::zeros([1, 1, 4, 4], &device);

        assert_eq!(BerHuLoss::new().forward(pred, target).into_scalar(), 0.0);
    }
}
