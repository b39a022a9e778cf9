mod blocks;
mod iternet;
mod r2unet;
mod unet;

use std::str::FromStr;

use burn::prelude::*;
use thiserror::Error;

pub use blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
    RecurrentBlock, RecurrentBlockConfig, RrcnnBlock, RrcnnBlockConfig,
};

pub use iternet::{IterNet, IterNetConfig, MiniUNet, MiniUNetConfig};
pub use r2unet::{R2UNet, R2UNetConfig};
pub use unet::{UNet, UNetConfig};

/// A vessel segmentation network: `[batch, 3, height, width]` images in,
/// `[batch, 1, height, width]` vessel probabilities out.
pub trait Segmenter<B: Backend>: Module<B> {
    fn segment(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Every intermediate probability map the network supervises, last one
    /// being the prediction.
    fn segment_stages(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        vec![self.segment(images)]
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown model `{0}`, expected one of U-Net, R2U-Net, IterNet")]
    UnknownModel(String),
}

#[derive(Config, Debug, Copy, PartialEq, Eq)]
pub enum ModelKind {
    UNet,
    R2UNet,
    IterNet,
}

impl ModelKind {
    /// Name used on the command line and in checkpoint file names.
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::UNet => "U-Net",
            ModelKind::R2UNet => "R2U-Net",
            ModelKind::IterNet => "IterNet",
        }
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "U-Net" => Ok(ModelKind::UNet),
            "R2U-Net" => Ok(ModelKind::R2UNet),
            "IterNet" => Ok(ModelKind::IterNet),
            other => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }
}

#[derive(Config, Debug)]
pub struct NetworkConfig {
    pub kind: ModelKind,
    #[config(default = 64)]
    pub base_channels: usize,
    #[config(default = 3)]
    pub input_channels: usize,
    /// Recurrent steps per block (R2U-Net only).
    #[config(default = 2)]
    pub recurrent_steps: usize,
    /// Mini U-Net refinement steps (IterNet only).
    #[config(default = 2)]
    pub refinement_steps: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl NetworkConfig {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn init_unet<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        UNetConfig::new()
            .with_input_channels(self.input_channels)
            .with_base_channels(self.base_channels)
            .with_dropout(self.dropout)
            .init(device)
    }

    pub fn init_r2unet<B: Backend>(&self, device: &B::Device) -> R2UNet<B> {
        R2UNetConfig::new()
            .with_input_channels(self.input_channels)
            .with_base_channels(self.base_channels)
            .with_steps(self.recurrent_steps)
            .init(device)
    }

    pub fn init_iternet<B: Backend>(&self, device: &B::Device) -> IterNet<B> {
        IterNetConfig::new()
            .with_input_channels(self.input_channels)
            .with_base_channels(self.base_channels)
            .with_refinement_steps(self.refinement_steps)
            .with_dropout(self.dropout)
            .init(device)
    }

    /// Number of probability maps the configured network emits per forward pass.
    pub fn num_stages(&self) -> usize {
        match self.kind {
            ModelKind::IterNet => self.refinement_steps + 1,
            ModelKind::UNet | ModelKind::R2UNet => 1,
        }
    }
}

/// Runs `$body` with `$model` bound to the network selected by `$config`.
///
/// Each architecture is a distinct module type, so code that is generic over
/// [`Segmenter`] is instantiated once per arm.
#[macro_export]
macro_rules! with_network {
    ($config:expr, $device:expr, |$model:ident| $body:expr) => {{
        let config: &$crate::model::NetworkConfig = &$config;
        match config.kind {
            $crate::model::ModelKind::UNet => {
                let $model = config.init_unet($device);
                $body
            }
            $crate::model::ModelKind::R2UNet => {
                let $model = config.init_r2unet($device);
                $body
            }
            $crate::model::ModelKind::IterNet => {
                let $model = config.init_iternet($device);
                $body
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_line_names() {
        assert_eq!("U-Net".parse::<ModelKind>().unwrap(), ModelKind::UNet);
        assert_eq!("R2U-Net".parse::<ModelKind>().unwrap(), ModelKind::R2UNet);
        assert_eq!("IterNet".parse::<ModelKind>().unwrap(), ModelKind::IterNet);

        for kind in [ModelKind::UNet, ModelKind::R2UNet, ModelKind::IterNet] {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_model() {
        let err = NetworkConfig::from_name("SegNet").unwrap_err();

        assert!(matches!(err, ConfigError::UnknownModel(name) if name == "SegNet"));
        assert!("unet".parse::<ModelKind>().is_err());
    }

    #[test]
    fn iternet_supervises_every_refinement_step() {
        let config = NetworkConfig::new(ModelKind::IterNet);
        assert_eq!(config.num_stages(), 3);
        assert_eq!(NetworkConfig::new(ModelKind::UNet).num_stages(), 1);
    }
}
