//! Depth regression losses.
//!
//! Ground-truth depth maps mark missing measurements with zero, so every loss here
//! only looks at pixels whose target is positive. A batch without a single valid pixel
//! yields a loss of zero.

mod berhu;
mod masked;

pub use berhu::{BerHuLoss, BerHuLossConfig};
pub use masked::{MaskedL1Loss, MaskedL1LossConfig, MaskedMseLoss, MaskedMseLossConfig};

use burn::prelude::*;

/// `1.0` where the target holds a measurement, `0.0` elsewhere.
pub fn valid_mask<B: Backend>(target: &Tensor<B, 4>) -> Tensor<B, 4> {
    target.clone().greater_elem(0.0).float()
}

/// `sum / count`, or zero when nothing was counted.
fn masked_mean<B: Backend>(sum: Tensor<B, 1>, count: Tensor<B, 1>) -> Tensor<B, 1> {
    sum / count.clamp_min(1.0)
}
