use anyhow::{Context, Result};
use burn_retina::export;

use super::{InferenceBackend, checkpoint, ensure_dir, inference_device, network_config};
use crate::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let network = network_config(cli)?;
    let checkpoint = checkpoint(cli, &network)?;
    ensure_dir(&cli.result_path)?;

    let artifact = export::export_checkpoint::<InferenceBackend>(
        &network,
        &checkpoint,
        &cli.result_path,
        &inference_device(),
    )
    .with_context(|| format!("Unable to export {}", checkpoint.display()))?;

    println!(
        "Exported {} to {} and {}",
        cli.model,
        artifact.graph_file.display(),
        artifact.params_file.display()
    );

    Ok(())
}
