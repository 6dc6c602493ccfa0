use super::tensor::TensorCodec;
use super::types::InpaintModel;
use crate::canvas::{Canvas, Mask};
use crate::config::{Device, EngineConfig};
use crate::padding::PaddingAdapter;
use anyhow::{ensure, Context, Result};
use ndarray::Ix4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

/// LaMa inpainting model running on ONNX Runtime
///
/// Inputs are mirror padded to a multiple of the block size before inference,
/// and the output is returned at that padded size.
pub struct LamaOnnx {
    session: Session,
    codec: TensorCodec,
    padding: PaddingAdapter,
    image_input: String,
    mask_input: String,
    output_name: String,
}

impl LamaOnnx {
    /// Load a LaMa export from an ONNX file
    ///
    /// The export must accept dynamic spatial dimensions that are multiples
    /// of 8.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let path = config.model_path.as_path();

        tracing::info!("Loading LaMa model from {} on {}", path.display(), config.device);

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?;

        match config.device {
            Device::Cpu => {}
            #[cfg(feature = "cuda")]
            Device::Cuda(id) => {
                let mut providers = Vec::new();
                #[cfg(feature = "tensorrt")]
                providers.push(
                    ort::execution_providers::TensorRTExecutionProvider::default()
                        .with_device_id(id as i32)
                        .build(),
                );
                providers.push(
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(id as i32)
                        .build(),
                );
                builder = builder.with_execution_providers(providers)?;
            }
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => {
                anyhow::bail!("device {} requires a build with the `cuda` feature", config.device)
            }
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        ensure!(
            input_names.contains(&config.image_input.as_str())
                && input_names.contains(&config.mask_input.as_str()),
            "model inputs {:?} do not include `{}` and `{}`",
            input_names,
            config.image_input,
            config.mask_input
        );

        tracing::info!("LaMa model loaded successfully");

        Ok(Self {
            session,
            codec: TensorCodec::new(config.mask_threshold, config.output_range),
            padding: config.padding,
            image_input: config.image_input.clone(),
            mask_input: config.mask_input.clone(),
            output_name: config.output_name.clone(),
        })
    }
}

impl InpaintModel for LamaOnnx {
    fn name(&self) -> &'static str {
        "lama-onnx"
    }

    fn infer(&mut self, image: &Canvas, mask: &Mask) -> Result<Canvas> {
        let _span = tracing::debug_span!("lama_infer").entered();

        let image = self.padding.pad_canvas(image)?;
        let mask = self.padding.pad_mask(mask)?;

        let image_tensor = Tensor::from_array(self.codec.image_tensor(&image))?;
        let mask_tensor = Tensor::from_array(self.codec.mask_tensor(&mask))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![
                self.image_input.as_str() => image_tensor,
                self.mask_input.as_str() => mask_tensor,
            ])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .context("model output is not an f32 tensor")?
            .into_dimensionality::<Ix4>()
            .context("model output is not 4-dimensional")?;

        self.codec.output_canvas(output)
    }
}
