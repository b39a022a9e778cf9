use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use nn::PaddingConfig2d;

use super::{
    Segmenter,
    blocks::{
        ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock,
        EncoderBlockConfig,
    },
};

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoder_block_1: EncoderBlock<B>,
    encoder_block_2: EncoderBlock<B>,
    encoder_block_3: EncoderBlock<B>,
    encoder_block_4: EncoderBlock<B>,
    bottleneck: ConvBlock<B>,
    decoder_block_1: DecoderBlock<B>,
    decoder_block_2: DecoderBlock<B>,
    decoder_block_3: DecoderBlock<B>,
    decoder_block_4: DecoderBlock<B>,
    conv: Conv2d<B>,
    conv_1x1: Conv2d<B>,
}

#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = 3)]
    input_channels: usize,
    #[config(default = 64)]
    base_channels: usize,
    #[config(default = 0.2)]
    dropout: f64,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let base = self.base_channels;
        let conv_block = |input_channels, num_filters| {
            ConvBlockConfig::new(input_channels, num_filters).with_dropout(self.dropout)
        };
        let decoder = |input_channels: usize, num_filters: usize| {
            DecoderBlockConfig::new(
                input_channels,
                num_filters,
                conv_block(input_channels, num_filters),
            )
            .init(device)
        };

        UNet {
            encoder_block_1: EncoderBlockConfig::new(conv_block(self.input_channels, base))
                .init(device),
            encoder_block_2: EncoderBlockConfig::new(conv_block(base, base * 2)).init(device),
            encoder_block_3: EncoderBlockConfig::new(conv_block(base * 2, base * 4)).init(device),
            encoder_block_4: EncoderBlockConfig::new(conv_block(base * 4, base * 8)).init(device),
            bottleneck: conv_block(base * 8, base * 16).init(device),
            decoder_block_1: decoder(base * 16, base * 8),
            decoder_block_2: decoder(base * 8, base * 4),
            decoder_block_3: decoder(base * 4, base * 2),
            decoder_block_4: decoder(base * 2, base),
            conv: Conv2dConfig::new([base, base], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            conv_1x1: Conv2dConfig::new([base, 1], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> UNet<B> {
    /// Runs the encoder/decoder and returns the last feature map (before the
    /// 1x1 classifier) together with the first-level skip features.
    pub fn forward_features(&self, images: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let x = images;

        let (x, skip_features_1) = self.encoder_block_1.forward(x);
        let (x, skip_features_2) = self.encoder_block_2.forward(x);
        let (x, skip_features_3) = self.encoder_block_3.forward(x);
        let (x, skip_features_4) = self.encoder_block_4.forward(x);

        let x = self.bottleneck.forward(x);

        let x = self.decoder_block_1.forward(x, skip_features_4);
        let x = self.decoder_block_2.forward(x, skip_features_3);
        let x = self.decoder_block_3.forward(x, skip_features_2);
        let x = self.decoder_block_4.forward(x, skip_features_1.clone());

        (self.conv.forward(x), skip_features_1)
    }

    pub fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 4> {
        sigmoid(self.conv_1x1.forward(features))
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let (features, _) = self.forward_features(images);

        self.classify(features)
    }
}

impl<B: Backend> Segmenter<B> for UNet<B> {
    fn segment(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }
}
