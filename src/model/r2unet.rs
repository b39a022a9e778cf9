use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use super::{
    Segmenter,
    blocks::{
        RrcnnBlock, RrcnnBlockConfig, RrcnnDecoderBlock, RrcnnDecoderBlockConfig,
        RrcnnEncoderBlock, RrcnnEncoderBlockConfig,
    },
};

/// Recurrent residual U-Net (R2U-Net): the U-Net layout with every double
/// convolution replaced by a recurrent residual unit.
#[derive(Module, Debug)]
pub struct R2UNet<B: Backend> {
    encoder_block_1: RrcnnEncoderBlock<B>,
    encoder_block_2: RrcnnEncoderBlock<B>,
    encoder_block_3: RrcnnEncoderBlock<B>,
    encoder_block_4: RrcnnEncoderBlock<B>,
    bottleneck: RrcnnBlock<B>,
    decoder_block_1: RrcnnDecoderBlock<B>,
    decoder_block_2: RrcnnDecoderBlock<B>,
    decoder_block_3: RrcnnDecoderBlock<B>,
    decoder_block_4: RrcnnDecoderBlock<B>,
    conv_1x1: Conv2d<B>,
}

#[derive(Config, Debug)]
pub struct R2UNetConfig {
    #[config(default = 3)]
    input_channels: usize,
    #[config(default = 64)]
    base_channels: usize,
    /// Number of recurrent steps in every recurrent block.
    #[config(default = 2)]
    steps: usize,
}

impl R2UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> R2UNet<B> {
        let base = self.base_channels;
        let encoder = |input_channels: usize, num_filters: usize| {
            RrcnnEncoderBlockConfig::new(
                RrcnnBlockConfig::new(input_channels, num_filters).with_steps(self.steps),
            )
            .init(device)
        };
        let decoder = |input_channels: usize, num_filters: usize| {
            RrcnnDecoderBlockConfig::new(input_channels, num_filters)
                .with_steps(self.steps)
                .init(device)
        };

        R2UNet {
            encoder_block_1: encoder(self.input_channels, base),
            encoder_block_2: encoder(base, base * 2),
            encoder_block_3: encoder(base * 2, base * 4),
            encoder_block_4: encoder(base * 4, base * 8),
            bottleneck: RrcnnBlockConfig::new(base * 8, base * 16)
                .with_steps(self.steps)
                .init(device),
            decoder_block_1: decoder(base * 16, base * 8),
            decoder_block_2: decoder(base * 8, base * 4),
            decoder_block_3: decoder(base * 4, base * 2),
            decoder_block_4: decoder(base * 2, base),
            conv_1x1: Conv2dConfig::new([base, 1], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> R2UNet<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let (x, skip_features_1) = self.encoder_block_1.forward(images);
        let (x, skip_features_2) = self.encoder_block_2.forward(x);
        let (x, skip_features_3) = self.encoder_block_3.forward(x);
        let (x, skip_features_4) = self.encoder_block_4.forward(x);

        let x = self.bottleneck.forward(x);

        let x = self.decoder_block_1.forward(x, skip_features_4);
        let x = self.decoder_block_2.forward(x, skip_features_3);
        let x = self.decoder_block_3.forward(x, skip_features_2);
        let x = self.decoder_block_4.forward(x, skip_features_1);

        sigmoid(self.conv_1x1.forward(x))
    }
}

impl<B: Backend> Segmenter<B> for R2UNet<B> {
    fn segment(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn keeps_input_resolution() {
        let device = Default::default();
        let model = R2UNetConfig::new()
            .with_base_channels(2)
            .with_steps(1)
            .init::<NdArray>(&device);

        let output = model.segment(Tensor::zeros([1, 3, 16, 16], &device));

        assert_eq!(output.dims(), [1, 1, 16, 16]);
        assert_eq!(model.segment_stages(Tensor::zeros([1, 3, 16, 16], &device)).len(), 1);
    }
}
