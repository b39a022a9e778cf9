use burn::backend::NdArray;
use burn_retina::{
    ModelKind, NetworkConfig, Predictor,
    export::{self, INPUT_SIZE, InferenceArtifact},
    training::{checkpoint_path, save_checkpoint},
    with_network,
};

type TestBackend = NdArray;

#[test]
fn exported_models_match_their_checkpoint() {
    let device = Default::default();

    for kind in [ModelKind::UNet, ModelKind::R2UNet, ModelKind::IterNet] {
        let dir = tempfile::tempdir().unwrap();
        let network = NetworkConfig::new(kind).with_base_channels(2);
        let checkpoint = checkpoint_path(dir.path(), kind, None);
        with_network!(network, &device, |model| save_checkpoint::<TestBackend, _>(
            &model,
            &checkpoint
        )
        .unwrap());

        let artifact =
            export::export_checkpoint::<TestBackend>(&network, &checkpoint, dir.path(), &device)
                .unwrap();
        assert_eq!(artifact, InferenceArtifact::in_dir(dir.path()));
        assert!(artifact.exists());

        let report = export::run_parity_check::<TestBackend>(
            &network,
            &checkpoint,
            &artifact,
            INPUT_SIZE,
            7,
            &device,
        )
        .unwrap();

        assert!(
            report.within_tolerance(),
            "{} diverged by {}",
            kind.name(),
            report.max_abs_diff
        );
        assert!(report.metrics.is_finite());
    }
}

#[test]
fn predictor_runs_without_the_training_model() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let network = NetworkConfig::new(ModelKind::UNet).with_base_channels(2);
    export::export_model(network.init_unet::<TestBackend>(&device), &network, dir.path()).unwrap();

    let artifact = InferenceArtifact::in_dir(dir.path());
    let metrics = export::infer_synthetic::<TestBackend>(&artifact, 1, &device).unwrap();
    assert!(metrics.is_finite());

    let mut predictor = Predictor::<TestBackend>::load(&artifact, &device).unwrap();
    let (images, _) = export::synthetic_input::<TestBackend>(3, INPUT_SIZE, 3, &device);
    predictor.set_input("input", images.into_data()).unwrap();
    predictor.run().unwrap();

    let output = predictor.output("output").unwrap();
    assert_eq!(output.shape, vec![1, 1, INPUT_SIZE, INPUT_SIZE]);
    assert!(
        output
            .iter::<f32>()
            .all(|value| (0.0..=1.0).contains(&value))
    );
}
