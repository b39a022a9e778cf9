use anyhow::{Context, Result, bail};
use burn_retina::{
    InferenceArtifact,
    export::{self, INPUT_SIZE},
};
use tracing::info;

use super::{InferenceBackend, checkpoint, inference_device, network_config};
use crate::Cli;

/// Runs the exported artifact on a synthetic image. With `--checkpoint`, also
/// compares it with the live model.
pub fn run(cli: &Cli) -> Result<()> {
    let artifact = InferenceArtifact::in_dir(&cli.result_path);
    if !artifact.exists() {
        bail!(
            "No exported model in {}, run with --mode export first",
            cli.result_path.display()
        );
    }

    let device = inference_device();
    let metrics = export::infer_synthetic::<InferenceBackend>(&artifact, cli.seed, &device)
        .context("Static inference failed")?;
    println!("F1:{:.4}, AUC:{:.4}", metrics.f1, metrics.auc);

    if cli.checkpoint.is_some() {
        let network = network_config(cli)?;
        let checkpoint = checkpoint(cli, &network)?;

        let parity = export::run_parity_check::<InferenceBackend>(
            &network,
            &checkpoint,
            &artifact,
            INPUT_SIZE,
            cli.seed,
            &device,
        )
        .context("Parity check failed")?;

        info!("Exported model: {}", parity.metrics);
        println!(
            "max |live - exported| = {:.2e} (tolerance {:.0e}): {}",
            parity.max_abs_diff,
            parity.tolerance,
            if parity.within_tolerance() { "ok" } else { "MISMATCH" }
        );

        if !parity.within_tolerance() {
            bail!("Exported model diverges from {}", checkpoint.display());
        }
    }

    Ok(())
}
