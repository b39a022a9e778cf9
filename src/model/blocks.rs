use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::MaxPool2d,
    },
    prelude::*,
};
use nn::{PaddingConfig2d, pool::MaxPool2dConfig};

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    activation: Relu,
    dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);
        let x = self.conv2.forward(x);

        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "0.2")]
    dropout: f64,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        ConvBlock {
            conv1: Conv2dConfig::new([self.input_channels, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            conv2: Conv2dConfig::new([self.num_filters, self.num_filters], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    conv_block: ConvBlock<B>,
    max_pool: MaxPool2d,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip_features = self.conv_block.forward(x);
        let x = self.max_pool.forward(skip_features.clone());

        (x, skip_features)
    }
}

#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    conv_block: ConvBlockConfig,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            conv_block: self.conv_block.init(device),
            max_pool: max_pool_2x2(),
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    conv_transpose: ConvTranspose2d<B>,
    conv_block: ConvBlock<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip_features: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv_transpose.forward(x);
        let x = Tensor::cat(vec![x, skip_features], 1);

        self.conv_block.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
    conv_block: ConvBlockConfig,
}

impl DecoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            conv_transpose: up_conv_2x2([self.input_channels, self.num_filters], device),
            conv_block: self.conv_block.init(device),
        }
    }
}

/// Convolution applied `steps + 1` times, each time on the block input plus the
/// previous activation.
#[derive(Module, Debug)]
pub struct RecurrentBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    activation: Relu,
    steps: usize,
}

impl<B: Backend> RecurrentBlock<B> {
    fn unit(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        self.activation.forward(x)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut state = self.unit(x.clone());
        for _ in 0..self.steps {
            state = self.unit(x.clone() + state);
        }

        state
    }
}

#[derive(Config, Debug)]
pub struct RecurrentBlockConfig {
    channels: usize,
    #[config(default = "2")]
    steps: usize,
}

impl RecurrentBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentBlock<B> {
        RecurrentBlock {
            conv: Conv2dConfig::new([self.channels, self.channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            norm: BatchNormConfig::new(self.channels).init(device),
            activation: Relu::new(),
            steps: self.steps,
        }
    }
}

/// Recurrent residual convolutional unit: a 1x1 projection followed by two
/// recurrent blocks, with the projection added back as a residual.
#[derive(Module, Debug)]
pub struct RrcnnBlock<B: Backend> {
    projection: Conv2d<B>,
    recurrent_1: RecurrentBlock<B>,
    recurrent_2: RecurrentBlock<B>,
}

impl<B: Backend> RrcnnBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.projection.forward(x);
        let residual = self.recurrent_1.forward(x.clone());
        let residual = self.recurrent_2.forward(residual);

        x + residual
    }
}

#[derive(Config, Debug)]
pub struct RrcnnBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "2")]
    steps: usize,
}

impl RrcnnBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RrcnnBlock<B> {
        let recurrent = RecurrentBlockConfig::new(self.num_filters).with_steps(self.steps);

        RrcnnBlock {
            projection: Conv2dConfig::new([self.input_channels, self.num_filters], [1, 1])
                .init(device),
            recurrent_1: recurrent.init(device),
            recurrent_2: recurrent.init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct RrcnnEncoderBlock<B: Backend> {
    rrcnn: RrcnnBlock<B>,
    max_pool: MaxPool2d,
}

impl<B: Backend> RrcnnEncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip_features = self.rrcnn.forward(x);
        let x = self.max_pool.forward(skip_features.clone());

        (x, skip_features)
    }
}

#[derive(Config, Debug)]
pub struct RrcnnEncoderBlockConfig {
    rrcnn: RrcnnBlockConfig,
}

impl RrcnnEncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RrcnnEncoderBlock<B> {
        RrcnnEncoderBlock {
            rrcnn: self.rrcnn.init(device),
            max_pool: max_pool_2x2(),
        }
    }
}

#[derive(Module, Debug)]
pub struct RrcnnDecoderBlock<B: Backend> {
    conv_transpose: ConvTranspose2d<B>,
    rrcnn: RrcnnBlock<B>,
}

impl<B: Backend> RrcnnDecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip_features: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv_transpose.forward(x);
        let x = Tensor::cat(vec![skip_features, x], 1);

        self.rrcnn.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct RrcnnDecoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "2")]
    steps: usize,
}

impl RrcnnDecoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RrcnnDecoderBlock<B> {
        RrcnnDecoderBlock {
            conv_transpose: up_conv_2x2([self.input_channels, self.num_filters], device),
            rrcnn: RrcnnBlockConfig::new(self.num_filters * 2, self.num_filters)
                .with_steps(self.steps)
                .init(device),
        }
    }
}

fn max_pool_2x2() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()
}

fn up_conv_2x2<B: Backend>(channels: [usize; 2], device: &B::Device) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new(channels, [2, 2])
        .with_stride([2, 2])
        .init(device)
}
