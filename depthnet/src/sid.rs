//! Spacing-increasing discretization between metric depth and ordinal labels.
//!
//! The range `[alpha, beta]` is split into `k` bins of equal width in log space, so near
//! depths get finer bins than far ones.

use burn::prelude::*;

use crate::error::{DepthNetError, DepthNetResult};

/// Configuration for the `Sid` discretizer.
#[derive(Config, Debug)]
pub struct SidConfig {
    /// Smallest representable depth.
    pub alpha: f64,
    /// Largest representable depth.
    pub beta: f64,
    /// Number of bins.
    pub k: usize,
}

impl SidConfig {
    /// KITTI range: 0.001 to 80 meters in 71 bins.
    pub fn kitti() -> Self {
        Self::new(0.001, 80.0, 71)
    }

    /// NYU Depth v2 range: 0.02 to 10 meters in 68 bins.
    pub fn nyu() -> Self {
        Self::new(0.02, 10.0, 68)
    }

    pub fn validate(&self) -> DepthNetResult<()> {
        let ordered = self.alpha > 0.0 && self.alpha < self.beta && self.beta.is_finite();
        if !ordered {
            return Err(DepthNetError::InvalidConfiguration {
                reason: format!(
                    "SID range must satisfy 0 < alpha < beta, got alpha={} beta={}",
                    self.alpha, self.beta
                ),
            });
        }

        if self.k == 0 {
            return Err(DepthNetError::InvalidConfiguration {
                reason: "SID needs at least one bin".to_string(),
            });
        }

        Ok(())
    }

    pub fn init(&self) -> DepthNetResult<Sid> {
        self.validate()?;

        Ok(Sid {
            alpha: self.alpha,
            log_alpha: self.alpha.ln(),
            log_ratio: (self.beta / self.alpha).ln(),
            k: self.k as f64,
        })
    }
}

/// Converts depth maps to ordinal labels and back.
#[derive(Debug, Clone)]
pub struct Sid {
    alpha: f64,
    log_alpha: f64,
    log_ratio: f64,
    k: f64,
}

impl Sid {
    /// `k * ln(depth / alpha) / ln(beta / alpha)`, truncated toward zero.
    pub fn labels<B: Backend, const D: usize>(&self, depth: Tensor<B, D>) -> Tensor<B, D, Int> {
        depth
            .div_scalar(self.alpha)
            .log()
            .mul_scalar(self.k / self.log_ratio)
            .int()
    }

    /// `exp(ln alpha + ln(beta / alpha) * labels / k)`, the lower edge of each bin.
    pub fn depth<B: Backend, const D: usize>(&self, labels: Tensor<B, D, Int>) -> Tensor<B, D> {
        labels
            .float()
            .mul_scalar(self.log_ratio / self.k)
            .add_scalar(self.log_alpha)
            .exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn range_ends_map_to_first_and_last_label() {
        let device = Default::default();
        let sid = SidConfig::kitti().init().unwrap();

        let labels = sid.labels(Tensor::<TestBackend, 1>::from_floats([0.001, 0.0011], &device));
        assert_eq!(labels.into_data().to_vec::<i64>().unwrap(), vec![0, 0]);

        let depth = sid
            .depth(Tensor::<TestBackend, 1, Int>::from_ints([71], &device))
            .into_scalar();
        assert!((depth - 80.0).abs() < 1e-3, "{depth}");
    }

    #[test]
    fn labels_bracket_the_original_depth() {
        let device = Default::default();
        let sid = SidConfig::nyu().init().unwrap();
        let depths = [0.5f32, 1.0, 3.7, 9.9];

        let labels = sid.labels(Tensor::<TestBackend, 1>::from_floats(depths, &device));
        let lower = sid.depth(labels.clone()).into_data().to_vec::<f32>().unwrap();
        let upper = sid.depth(labels.add_scalar(1)).into_data().to_vec::<f32>().unwrap();

        for ((depth, lower), upper) in depths.iter().zip(lower).zip(upper) {
            assert!(lower <= depth * (1.0 + 1e-5), "{lower} > {depth}");
            assert!(upper > *depth, "{upper} <= {depth}");
        }
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        for config in [
            SidConfig::new(0.0, 10.0, 68),
            SidConfig::new(10.0, 0.02, 68),
            SidConfig::new(0.02, 10.0, 0),
        ] {
            match config.init() {
                Err(DepthNetError::InvalidConfiguration { .. }) => {}
                other => panic!("Expected InvalidConfiguration error, got {other:?}"),
            }
        }
    }
}
