use std::path::Path;

use burn::{prelude::*, tensor::DType};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    ExportError, INPUT_SIZE, InferenceArtifact, InferenceGraph, PARITY_TOLERANCE, ParamsRecorder,
};
use crate::{
    model::{IterNet, ModelKind, NetworkConfig, R2UNet, Segmenter, UNet},
    training::{ConfusionMatrix, MetricRecord, load_checkpoint},
    with_network,
};

enum Network<B: Backend> {
    UNet(UNet<B>),
    R2UNet(R2UNet<B>),
    IterNet(IterNet<B>),
}

impl<B: Backend> Network<B> {
    fn segment(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Network::UNet(model) => model.segment(images),
            Network::R2UNet(model) => model.segment(images),
            Network::IterNet(model) => model.segment(images),
        }
    }
}

/// Runs an exported artifact through named input and output handles.
pub struct Predictor<B: Backend> {
    graph: InferenceGraph,
    network: Network<B>,
    device: B::Device,
    input: Option<Tensor<B, 4>>,
    output: Option<Tensor<B, 4>>,
}

impl<B: Backend> Predictor<B> {
    pub fn load(artifact: &InferenceArtifact, device: &B::Device) -> Result<Self, ExportError> {
        Self::from_files(&artifact.graph_file, &artifact.params_file, device)
    }

    pub fn from_files(
        graph_file: &Path,
        params_file: &Path,
        device: &B::Device,
    ) -> Result<Self, ExportError> {
        let graph = InferenceGraph::load(graph_file)?;
        let recorder = ParamsRecorder::new();
        let params = params_file.to_path_buf();

        let network = match graph.network.kind {
            ModelKind::UNet => Network::UNet(graph.network.init_unet(device).load_file(
                params,
                &recorder,
                device,
            )?),
            ModelKind::R2UNet => Network::R2UNet(graph.network.init_r2unet(device).load_file(
                params,
                &recorder,
                device,
            )?),
            ModelKind::IterNet => Network::IterNet(graph.network.init_iternet(device).load_file(
                params,
                &recorder,
                device,
            )?),
        };

        Ok(Self {
            graph,
            network,
            device: device.clone(),
            input: None,
            output: None,
        })
    }

    pub fn graph(&self) -> &InferenceGraph {
        &self.graph
    }

    pub fn input_names(&self) -> Vec<&str> {
        vec![self.graph.input.name.as_str()]
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.graph.outputs.iter().map(String::as_str).collect()
    }

    /// Copies `data` into the named input. The data must be `float32` and match
    /// the declared shape.
    pub fn set_input(&mut self, name: &str, data: TensorData) -> Result<(), ExportError> {
        let spec = &self.graph.input;
        if name != spec.name {
            return Err(ExportError::UnknownInput(name.to_string()));
        }

        if data.dtype != DType::F32 || !spec.accepts(&data.shape) {
            return Err(ExportError::InputShape {
                name: spec.name.clone(),
                expected: spec.shape.clone(),
                dtype: spec.dtype.clone(),
                actual: data.shape.clone(),
            });
        }

        self.input = Some(Tensor::from_data(data.convert::<B::FloatElem>(), &self.device));
        self.output = None;

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), ExportError> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| ExportError::MissingInput(self.graph.input.name.clone()))?;

        self.output = Some(self.network.segment(input));

        Ok(())
    }

    /// Probabilities of the last `run()`, `[batch_size, 1, height, width]`.
    pub fn output(&self, name: &str) -> Result<TensorData, ExportError> {
        match &self.output {
            Some(output) if self.graph.outputs.iter().any(|declared| declared == name) => {
                Ok(output.to_data())
            }
            _ => Err(ExportError::MissingOutput(name.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParityReport {
    pub max_abs_diff: f32,
    pub tolerance: f32,
    /// Exported model scored against the synthetic target.
    pub metrics: MetricRecord,
}

impl ParityReport {
    pub fn within_tolerance(&self) -> bool {
        self.max_abs_diff <= self.tolerance
    }
}

/// A reproducible `[1, channels, size, size]` image in `[0, 1)` and a sparse
/// binary `[1, 1, size, size]` target.
pub fn synthetic_input<B: Backend>(
    channels: usize,
    size: usize,
    seed: u64,
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let mut rng = StdRng::seed_from_u64(seed);

    let image: Vec<f32> = (0..channels * size * size)
        .map(|_| rng.gen_range(0.0..1.0))
        .collect();
    let target: Vec<f32> = (0..size * size)
        .map(|_| if rng.gen_bool(0.1) { 1.0 } else { 0.0 })
        .collect();

    let image = TensorData::new(image, [1, channels, size, size]).convert::<B::FloatElem>();
    let target = TensorData::new(target, [1, 1, size, size]).convert::<B::FloatElem>();

    (
        Tensor::from_data(image, device),
        Tensor::from_data(target, device),
    )
}

/// Feeds `images` to both the live model and the predictor and compares their
/// outputs.
pub fn check_parity<B: Backend, M: Segmenter<B>>(
    model: &M,
    predictor: &mut Predictor<B>,
    images: Tensor<B, 4>,
    target: Tensor<B, 4>,
    tolerance: f32,
) -> Result<ParityReport, ExportError> {
    let input_name = predictor.graph.input.name.clone();
    let output_name = predictor
        .graph
        .outputs
        .first()
        .cloned()
        .unwrap_or_default();

    let expected = model.segment(images.clone());

    predictor.set_input(&input_name, images.into_data().convert::<f32>())?;
    predictor.run()?;
    let actual: Tensor<B, 4> = Tensor::from_data(
        predictor
            .output(&output_name)?
            .convert::<B::FloatElem>(),
        &predictor.device,
    );

    let max_abs_diff = (expected - actual.clone())
        .abs()
        .max()
        .into_scalar()
        .elem::<f32>();
    let matrix = ConfusionMatrix::from_predictions(actual, target.clone(), target.ones_like());

    Ok(ParityReport {
        max_abs_diff,
        tolerance,
        metrics: MetricRecord::from_confusion(&matrix),
    })
}

/// Runs the exported model alone on one synthetic image sized after its input
/// declaration and scores it against the synthetic target.
pub fn infer_synthetic<B: Backend>(
    artifact: &InferenceArtifact,
    seed: u64,
    device: &B::Device,
) -> Result<MetricRecord, ExportError> {
    let mut predictor = Predictor::<B>::load(artifact, device)?;
    let spec = predictor.graph.input.clone();
    let dim = |index: usize, default: usize| {
        spec.shape.get(index).copied().flatten().unwrap_or(default)
    };

    let (images, target) = synthetic_input::<B>(dim(1, 3), dim(2, INPUT_SIZE), seed, device);
    predictor.set_input(&spec.name, images.into_data().convert::<f32>())?;
    predictor.run()?;

    let output_name = predictor.output_names().first().map(|name| name.to_string());
    let output = predictor.output(&output_name.unwrap_or_default())?;
    let probabilities: Tensor<B, 4> =
        Tensor::from_data(output.convert::<B::FloatElem>(), device);

    let matrix =
        ConfusionMatrix::from_predictions(probabilities, target.clone(), target.ones_like());

    Ok(MetricRecord::from_confusion(&matrix))
}

/// Compares the checkpoint at `checkpoint` with the artifact exported from it
/// on one synthetic image.
pub fn run_parity_check<B: Backend>(
    network: &NetworkConfig,
    checkpoint: &Path,
    artifact: &InferenceArtifact,
    size: usize,
    seed: u64,
    device: &B::Device,
) -> Result<ParityReport, ExportError> {
    let mut predictor = Predictor::<B>::load(artifact, device)?;
    let (images, target) = synthetic_input::<B>(network.input_channels, size, seed, device);

    with_network!(network, device, |model| {
        let model = load_checkpoint::<B, _>(model, checkpoint, device)?;
        check_parity(&model, &mut predictor, images, target, PARITY_TOLERANCE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{InputSpec, export_model};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn exported(dir: &Path) -> (UNet<TestBackend>, Predictor<TestBackend>) {
        let device = Default::default();
        let network = NetworkConfig::new(ModelKind::UNet).with_base_channels(4);
        let model = network.init_unet::<TestBackend>(&device);
        let artifact = export_model(model.clone(), &network, dir).unwrap();

        (model, Predictor::load(&artifact, &device).unwrap())
    }

    #[test]
    fn exposes_named_handles() {
        let dir = tempfile::tempdir().unwrap();
        let (_, predictor) = exported(dir.path());

        assert_eq!(predictor.input_names(), vec!["input"]);
        assert_eq!(predictor.output_names(), vec!["output"]);
        assert_eq!(predictor.graph().input, InputSpec::image(3, 560));
    }

    #[test]
    fn rejects_inputs_outside_the_declared_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut predictor) = exported(dir.path());

        let wrong_size = TensorData::new(vec![0f32; 3 * 16 * 16], [1, 3, 16, 16]);
        let wrong_dtype = TensorData::new(vec![0f64; 3 * 560 * 560], [1, 3, 560, 560]);

        assert!(matches!(
            predictor.set_input("input", wrong_size),
            Err(ExportError::InputShape { .. })
        ));
        assert!(matches!(
            predictor.set_input("input", wrong_dtype),
            Err(ExportError::InputShape { .. })
        ));
        assert!(matches!(
            predictor.set_input("image", TensorData::new(vec![0f32; 4], [1, 1, 2, 2])),
            Err(ExportError::UnknownInput(_))
        ));
    }

    #[test]
    fn run_requires_an_input() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut predictor) = exported(dir.path());

        assert!(matches!(predictor.run(), Err(ExportError::MissingInput(_))));
        assert!(matches!(
            predictor.output("output"),
            Err(ExportError::MissingOutput(_))
        ));
    }

    #[test]
    fn synthetic_input_is_reproducible() {
        let device = Default::default();
        let (a, ta) = synthetic_input::<TestBackend>(3, 8, 5, &device);
        let (b, tb) = synthetic_input::<TestBackend>(3, 8, 5, &device);

        a.into_data().assert_eq(&b.into_data(), true);
        ta.into_data().assert_eq(&tb.into_data(), true);
    }
}
