use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod tasks;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Train,
    Test,
    Export,
    Infer,
}

#[derive(Parser)]
#[command(
    name = "burn-retina",
    about = "Retinal vessel segmentation with U-Net, R2U-Net and IterNet",
    author,
    version
)]
pub struct Cli {
    /// U-Net, R2U-Net or IterNet
    #[arg(long, default_value = "R2U-Net")]
    pub model: String,

    #[arg(long, value_enum, default_value_t = Mode::Train)]
    mode: Mode,

    /// DRIVE root containing training/, validation/ and testing/
    #[arg(long = "dataset_path", default_value = "./DRIVE/")]
    pub dataset_path: PathBuf,

    /// Where checkpoints, config.json, predictions and exports are written
    #[arg(long = "result_path", default_value = "./")]
    pub result_path: PathBuf,

    #[arg(long, default_value_t = 45)]
    pub epoch: usize,

    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    #[arg(long = "batch_size", default_value_t = 1)]
    pub batch_size: usize,

    /// Write an input / prediction / ground truth panel per test image
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub show: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Width of the first encoder level
    #[arg(long = "base_channels")]
    pub base_channels: Option<usize>,

    #[arg(long = "patch_size", default_value_t = 48)]
    pub patch_size: usize,

    #[arg(long = "patches_per_image", default_value_t = 1000)]
    pub patches_per_image: usize,

    /// Randomly flip training images horizontally and vertically
    #[arg(long, default_value_t = false)]
    pub augment: bool,

    #[arg(long = "num_workers", default_value_t = 0)]
    pub num_workers: usize,

    /// Checkpoint to export or compare against, defaults to the final one
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// -v for debug output, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to initialize logging")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.mode {
        Mode::Train => tasks::train::run(&cli),
        Mode::Test => tasks::test::run(&cli),
        Mode::Export => tasks::export::run(&cli),
        Mode::Infer => tasks::infer::run(&cli),
    }
}
