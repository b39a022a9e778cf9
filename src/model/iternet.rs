use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use super::{
    Segmenter,
    blocks::{
        ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock,
        EncoderBlockConfig,
    },
    unet::{UNet, UNetConfig},
};

/// Two-level U-Net used to refine the base network's feature map. The same
/// weights are applied at every refinement step.
#[derive(Module, Debug)]
pub struct MiniUNet<B: Backend> {
    encoder_block_1: EncoderBlock<B>,
    encoder_block_2: EncoderBlock<B>,
    bottleneck: ConvBlock<B>,
    decoder_block_1: DecoderBlock<B>,
    decoder_block_2: DecoderBlock<B>,
    fuse: Conv2d<B>,
    conv_1x1: Conv2d<B>,
}

impl<B: Backend> MiniUNet<B> {
    /// Returns the refined features and their probability map. `skip_features`
    /// are the first-level features of the base network.
    pub fn forward(
        &self,
        features: Tensor<B, 4>,
        skip_features: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let (x, skip_features_1) = self.encoder_block_1.forward(features);
        let (x, skip_features_2) = self.encoder_block_2.forward(x);

        let x = self.bottleneck.forward(x);

        let x = self.decoder_block_1.forward(x, skip_features_2);
        let x = self.decoder_block_2.forward(x, skip_features_1);

        let x = self.fuse.forward(Tensor::cat(vec![x, skip_features], 1));
        let probabilities = sigmoid(self.conv_1x1.forward(x.clone()));

        (x, probabilities)
    }
}

#[derive(Config, Debug)]
pub struct MiniUNetConfig {
    base_channels: usize,
    #[config(default = 0.2)]
    dropout: f64,
}

impl MiniUNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MiniUNet<B> {
        let base = self.base_channels;
        let conv_block = |input_channels, num_filters| {
            ConvBlockConfig::new(input_channels, num_filters).with_dropout(self.dropout)
        };

        MiniUNet {
            encoder_block_1: EncoderBlockConfig::new(conv_block(base, base)).init(device),
            encoder_block_2: EncoderBlockConfig::new(conv_block(base, base * 2)).init(device),
            bottleneck: conv_block(base * 2, base * 4).init(device),
            decoder_block_1: DecoderBlockConfig::new(
                base * 4,
                base * 2,
                conv_block(base * 4, base * 2),
            )
            .init(device),
            decoder_block_2: DecoderBlockConfig::new(base * 2, base, conv_block(base * 2, base))
                .init(device),
            fuse: Conv2dConfig::new([base * 2, base], [1, 1]).init(device),
            conv_1x1: Conv2dConfig::new([base, 1], [1, 1]).init(device),
        }
    }
}

/// IterNet: a U-Net followed by a fixed number of weight-shared mini U-Net
/// refinement steps. Every step emits its own probability map.
#[derive(Module, Debug)]
pub struct IterNet<B: Backend> {
    base: UNet<B>,
    refine: MiniUNet<B>,
    refinement_steps: usize,
}

#[derive(Config, Debug)]
pub struct IterNetConfig {
    #[config(default = 3)]
    input_channels: usize,
    #[config(default = 32)]
    base_channels: usize,
    #[config(default = 2)]
    refinement_steps: usize,
    #[config(default = 0.2)]
    dropout: f64,
}

impl IterNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> IterNet<B> {
        IterNet {
            base: UNetConfig::new()
                .with_input_channels(self.input_channels)
                .with_base_channels(self.base_channels)
                .with_dropout(self.dropout)
                .init(device),
            refine: MiniUNetConfig::new(self.base_channels)
                .with_dropout(self.dropout)
                .init(device),
            refinement_steps: self.refinement_steps,
        }
    }
}

impl<B: Backend> IterNet<B> {
    /// Probability maps of the base network and of every refinement step, in
    /// order. The last entry is the network's prediction.
    pub fn forward_stages(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let (mut features, skip_features) = self.base.forward_features(images);
        let mut stages = Vec::with_capacity(self.refinement_steps + 1);
        stages.push(self.base.classify(features.clone()));

        for _ in 0..self.refinement_steps {
            let (refined, probabilities) = self.refine.forward(features, skip_features.clone());
            features = refined;
            stages.push(probabilities);
        }

        stages
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let (mut features, skip_features) = self.base.forward_features(images);
        let mut probabilities = self.base.classify(features.clone());

        for _ in 0..self.refinement_steps {
            (features, probabilities) = self.refine.forward(features, skip_features.clone());
        }

        probabilities
    }
}

impl<B: Backend> Segmenter<B> for IterNet<B> {
    fn segment(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }

    fn segment_stages(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        self.forward_stages(images)
    }
}
