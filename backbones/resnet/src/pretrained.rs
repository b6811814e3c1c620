//! Sources of ResNet weights for the depth encoder.

use burn::prelude::*;

use crate::{ResNet, ResNetDepth, ResNetResult};

/// Supplies a full ResNet classifier for a given depth.
pub trait PretrainedProvider<B: Backend> {
    /// Build (or load) the classifier.
    fn resnet(&self, depth: ResNetDepth, device: &Device<B>) -> ResNetResult<ResNet<B>>;

    /// Whether the returned weights were trained rather than freshly sampled.
    fn is_pretrained(&self) -> bool;
}

/// Freshly initialized weights, torchvision style.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInit;

impl<B: Backend> PretrainedProvider<B> for RandomInit {
    fn resnet(&self, depth: ResNetDepth, device: &Device<B>) -> ResNetResult<ResNet<B>> {
        Ok(ResNet::new(depth, device))
    }

    fn is_pretrained(&self) -> bool {
        false
    }
}

impl ResNetDepth {
    /// File name of the torchvision ImageNet checkpoint for this depth.
    pub const fn torchvision_file(&self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18-f37072fd.pth",
            Self::ResNet34 => "resnet34-b627a593.pth",
            Self::ResNet50 => "resnet50-0676ba61.pth",
            Self::ResNet101 => "resnet101-63fe2227.pth",
            Self::ResNet152 => "resnet152-394f9c45.pth",
        }
    }
}

#[cfg(feature = "pretrained")]
pub use torchvision::TorchvisionWeights;

#[cfg(feature = "pretrained")]
mod torchvision {
    use std::path::{Path, PathBuf};

    use burn::{
        nn::{conv::Conv2d, BatchNorm, Linear},
        prelude::*,
        record::{FullPrecisionSettings, Recorder},
    };
    use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

    use super::PretrainedProvider;
    use crate::{
        BasicBlock, Bottleneck, Downsample, LayerBlock, ResNet, ResNetDepth, ResNetError,
        ResNetResult, ResidualBlock,
    };

    /// Loads torchvision `.pth` checkpoints from a directory.
    #[derive(Debug, Clone)]
    pub struct TorchvisionWeights {
        dir: PathBuf,
    }

    impl TorchvisionWeights {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        /// The directory torch hub downloads into: `$TORCH_HOME/hub/checkpoints`, falling
        /// back to `~/.cache/torch/hub/checkpoints`.
        pub fn from_cache_dir() -> ResNetResult<Self> {
            let torch_home = match std::env::var_os("TORCH_HOME") {
                Some(home) => PathBuf::from(home),
                None => dirs::cache_dir()
                    .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
                    .ok_or_else(|| ResNetError::WeightLoading {
                        reason: "could not determine a cache directory".to_string(),
                    })?
                    .join("torch"),
            };

            Ok(Self::new(torch_home.join("hub").join("checkpoints")))
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        pub fn weights_path(&self, depth: &ResNetDepth) -> PathBuf {
            self.dir.join(depth.torchvision_file())
        }
    }

    impl<B: Backend> PretrainedProvider<B> for TorchvisionWeights {
        fn resnet(&self, depth: ResNetDepth, device: &Device<B>) -> ResNetResult<ResNet<B>> {
            let path = self.weights_path(&depth);
            if !path.is_file() {
                return Err(ResNetError::WeightLoading {
                    reason: format!("{} not found", path.display()),
                });
            }

            let load_args = LoadArgs::new(path.clone())
                .with_key_remap(r"downsample\.0", "downsample.conv")
                .with_key_remap(r"downsample\.1", "downsample.bn");
            let record: ResNetStubRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::new()
                .load(load_args, device)
                .map_err(|e| ResNetError::WeightLoading {
                    reason: format!("{}: {e}", path.display()),
                })?;

            let model = record.copy_into(ResNet::new(depth.clone(), device))?;
            tracing::info!(model = %depth.name(), path = %path.display(), "loaded torchvision weights");

            Ok(model)
        }

        fn is_pretrained(&self) -> bool {
            true
        }
    }

    // Checkpoint-shaped mirrors of the ResNet modules. Stateless layers (ReLU, pooling)
    // leave no trace in a `.pth` file, so records are read into these and then copied
    // onto a freshly built model.

    #[derive(Module, Debug)]
    #[allow(dead_code)]
    struct ResNetStub<B: Backend> {
        conv1: Conv2d<B>,
        bn1: BatchNorm<B, 2>,
        layer1: Vec<ResidualBlockStub<B>>,
        layer2: Vec<ResidualBlockStub<B>>,
        layer3: Vec<ResidualBlockStub<B>>,
        layer4: Vec<ResidualBlockStub<B>>,
        fc: Linear<B>,
    }

    #[derive(Module, Debug)]
    #[allow(dead_code, clippy::large_enum_variant)]
    enum ResidualBlockStub<B: Backend> {
        Bottleneck(BottleneckStub<B>),
        Basic(BasicBlockStub<B>),
    }

    #[derive(Module, Debug)]
    #[allow(dead_code)]
    struct BasicBlockStub<B: Backend> {
        conv1: Conv2d<B>,
        bn1: BatchNorm<B, 2>,
        conv2: Conv2d<B>,
        bn2: BatchNorm<B, 2>,
        downsample: Option<DownsampleStub<B>>,
    }

    #[derive(Module, Debug)]
    #[allow(dead_code)]
    struct BottleneckStub<B: Backend> {
        conv1: Conv2d<B>,
        bn1: BatchNorm<B, 2>,
        conv2: Conv2d<B>,
        bn2: BatchNorm<B, 2>,
        conv3: Conv2d<B>,
        bn3: BatchNorm<B, 2>,
        downsample: Option<DownsampleStub<B>>,
    }

    #[derive(Module, Debug)]
    #[allow(dead_code)]
    struct DownsampleStub<B: Backend> {
        conv: Conv2d<B>,
        bn: BatchNorm<B, 2>,
    }

    impl<B: Backend> ResNetStubRecord<B> {
        fn copy_into(self, mut target: ResNet<B>) -> ResNetResult<ResNet<B>> {
            target.stem.conv1 = target.stem.conv1.load_record(self.conv1);
            target.stem.bn1 = target.stem.bn1.load_record(self.bn1);
            target.layer1 = copy_layer("layer1", self.layer1, target.layer1)?;
            target.layer2 = copy_layer("layer2", self.layer2, target.layer2)?;
            target.layer3 = copy_layer("layer3", self.layer3, target.layer3)?;
            target.layer4 = copy_layer("layer4", self.layer4, target.layer4)?;
            target.head.fc = target.head.fc.load_record(self.fc);

            Ok(target)
        }
    }

    fn copy_layer<B: Backend>(
        name: &str,
        stubs: Vec<ResidualBlockStubRecord<B>>,
        target: LayerBlock<B>,
    ) -> ResNetResult<LayerBlock<B>> {
        if stubs.len() != target.len() {
            return Err(ResNetError::WeightLoading {
                reason: format!(
                    "{name} has {} blocks in the checkpoint, the model has {}",
                    stubs.len(),
                    target.len()
                ),
            });
        }

        let blocks = stubs
            .into_iter()
            .zip(target.blocks)
            .map(|(stub, block)| match (stub, block) {
                (ResidualBlockStubRecord::Basic(stub), ResidualBlock::Basic(block)) => {
                    Ok(ResidualBlock::Basic(copy_basic(stub, block)))
                }
                (ResidualBlockStubRecord::Bottleneck(stub), ResidualBlock::Bottleneck(block)) => {
                    Ok(ResidualBlock::Bottleneck(copy_bottleneck(stub, block)))
                }
                _ => Err(ResNetError::WeightLoading {
                    reason: format!("{name}: checkpoint block type does not match the model"),
                }),
            })
            .collect::<ResNetResult<Vec<_>>>()?;

        Ok(LayerBlock { blocks })
    }

    fn copy_basic<B: Backend>(stub: BasicBlockStubRecord<B>, mut block: BasicBlock<B>) -> BasicBlock<B> {
        block.conv1 = block.conv1.load_record(stub.conv1);
        block.bn1 = block.bn1.load_record(stub.bn1);
        block.conv2 = block.conv2.load_record(stub.conv2);
        block.bn2 = block.bn2.load_record(stub.bn2);
        block.downsample = copy_downsample(stub.downsample, block.downsample);
        block
    }

    fn copy_bottleneck<B: Backend>(
        stub: BottleneckStubRecord<B>,
        mut block: Bottleneck<B>,
    ) -> Bottleneck<B> {
        block.conv1 = block.conv1.load_record(stub.conv1);
        block.bn1 = block.bn1.load_record(stub.bn1);
        block.conv2 = block.conv2.load_record(stub.conv2);
        block.bn2 = block.bn2.load_record(stub.bn2);
        block.conv3 = block.conv3.load_record(stub.conv3);
        block.bn3 = block.bn3.load_record(stub.bn3);
        block.downsample = copy_downsample(stub.downsample, block.downsample);
        block
    }

    // A shortcut only exists where the block changes shape, identically in both trees.
    fn copy_downsample<B: Backend>(
        stub: Option<DownsampleStubRecord<B>>,
        target: Option<Downsample<B>>,
    ) -> Option<Downsample<B>> {
        match (stub, target) {
            (Some(stub), Some(target)) => Some(Downsample {
                conv: target.conv.load_record(stub.conv),
                bn: target.bn.load_record(stub.bn),
            }),
            (_, target) => target,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn random_init_builds_requested_depth() {
        let device = Default::default();
        let model: ResNet<TestBackend> = RandomInit.resnet(ResNetDepth::ResNet34, &device).unwrap();

        assert_eq!(model.layer3.len(), 6);
        assert_eq!(model.stem.in_channels(), 3);
        assert!(!PretrainedProvider::<TestBackend>::is_pretrained(&RandomInit));
    }

    #[test]
    fn torchvision_file_names_follow_depth() {
        assert_eq!(ResNetDepth::ResNet18.torchvision_file(), "resnet18-f37072fd.pth");
        assert_eq!(ResNetDepth::ResNet152.torchvision_file(), "resnet152-394f9c45.pth");
    }
}
