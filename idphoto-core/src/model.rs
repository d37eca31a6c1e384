use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModel, InferenceModelExt, IntoTensor, SimplePlan, Tensor,
    TypedFact, TypedOp, tvec,
};

use crate::preprocess::InputSize;

pub(crate) type RunnableModel =
    SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const STRIDES: [usize; 3] = [8, 16, 32];
const OUTPUTS_PER_STRIDE: usize = 4; // cls, obj, bbox, kps
pub(crate) const OUTPUT_COLS: usize = 15; // bbox (4) + landmarks (10) + score (1)

/// Load an ONNX graph and make it runnable, preferring the fully optimized plan.
///
/// Some exported graphs trip tract's optimizer; those fall back to the decluttered plan,
/// which is slower but numerically identical. `input_shape` pins the first input when the
/// file declares symbolic dimensions.
pub(crate) fn load_runnable(
    path: &Path,
    label: &str,
    input_shape: Option<[usize; 4]>,
) -> Result<RunnableModel> {
    anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

    match build_runnable(path, input_shape, true) {
        Ok(model) => {
            debug!("{label} model {} optimized successfully", path.display());
            Ok(model)
        }
        Err(opt_err) => {
            let optimize_msg = format!("{opt_err}");
            let mut chain_msg = String::new();
            for cause in opt_err.chain() {
                let _ = writeln!(&mut chain_msg, "  - {cause}");
            }
            warn!(
                "{label} model {} failed optimized load ({}); falling back to decluttered graph.\nError chain:\n{}",
                path.display(),
                optimize_msg,
                chain_msg.trim_end()
            );
            let decluttered = build_runnable(path, input_shape, false).with_context(|| {
                format!("fallback to decluttered {label} graph failed after optimize error: {optimize_msg}")
            })?;
            debug!("{label} model {} running in decluttered mode", path.display());
            Ok(decluttered)
        }
    }
}

fn build_runnable(
    path: &Path,
    input_shape: Option<[usize; 4]>,
    optimized: bool,
) -> Result<RunnableModel> {
    let mut model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if let Some(shape) = input_shape {
        model = pin_input_shape(model, shape)?;
    }

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    }
}

fn pin_input_shape(model: InferenceModel, shape: [usize; 4]) -> Result<InferenceModel> {
    use tract_onnx::prelude::*;
    model
        .with_input_fact(0, f32::fact(shape).into())
        .map_err(|e| anyhow::anyhow!("unable to set input shape {shape:?}: {e}"))
}

/// Run `model` on a single input tensor and collect its outputs.
pub(crate) fn run_runnable(model: &RunnableModel, label: &str, input: Tensor) -> Result<Vec<Tensor>> {
    let outputs = model
        .run(tvec![input.into()])
        .map_err(|e| anyhow::anyhow!("{label} execution failed: {e}"))?;
    Ok(outputs
        .into_iter()
        .map(|value| value.into_tensor())
        .collect())
}

/// Wrapper around the YuNet ONNX runnable model.
#[derive(Debug)]
pub struct YuNetModel {
    runnable: RunnableModel,
    input_size: InputSize,
}

impl YuNetModel {
    /// Load and optimize the YuNet ONNX graph for a specific input size.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: InputSize) -> Result<Self> {
        let runnable = load_runnable(model_path.as_ref(), "YuNet", None)?;
        Ok(Self {
            runnable,
            input_size,
        })
    }

    /// Execute YuNet with a preprocessed tensor and return decoded detections.
    ///
    /// The resulting tensor has shape `[N, 15]` where each row is
    /// `[x, y, w, h, re_x, re_y, le_x, le_y, nt_x, nt_y, rcm_x, rcm_y, lcm_x, lcm_y, score]`
    /// in the resized input coordinate space.
    pub fn run(&self, input: Tensor) -> Result<Tensor> {
        let mut tensors = run_runnable(&self.runnable, "YuNet", input)?;

        match tensors.len() {
            0 => anyhow::bail!("YuNet model produced no outputs"),
            1 => tensors
                .pop()
                .ok_or_else(|| anyhow::anyhow!("YuNet model produced no outputs")),
            len if len == STRIDES.len() * OUTPUTS_PER_STRIDE => {
                decode_yunet_outputs(&tensors, self.input_size)
            }
            other => anyhow::bail!(
                "unexpected number of YuNet outputs: expected 1 or {}, got {}",
                STRIDES.len() * OUTPUTS_PER_STRIDE,
                other
            ),
        }
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }
}

/// Fuse the per-stride `cls`/`obj`/`bbox`/`kps` heads into `[N, 15]` rows.
///
/// Scores are `sqrt(cls * obj)`; boxes are decoded from the anchor-free grid
/// (`center = (cell + delta) * stride`, `size = exp(delta) * stride`).
pub(crate) fn decode_yunet_outputs(outputs: &[Tensor], input_size: InputSize) -> Result<Tensor> {
    anyhow::ensure!(
        outputs.len() == STRIDES.len() * OUTPUTS_PER_STRIDE,
        "YuNet decode expects {} tensors, got {}",
        STRIDES.len() * OUTPUTS_PER_STRIDE,
        outputs.len()
    );

    let pad_w = align_to(input_size.width as usize, 32);
    let pad_h = align_to(input_size.height as usize, 32);
    let total_cells: usize = STRIDES
        .iter()
        .map(|&stride| (pad_w / stride) * (pad_h / stride))
        .sum();
    let mut fused = Vec::with_capacity(total_cells * OUTPUT_COLS);

    for (stride_index, &stride) in STRIDES.iter().enumerate() {
        let cols = pad_w / stride;
        let rows = pad_h / stride;
        let cell_count = rows * cols;
        let stride_f = stride as f32;

        let heads = STRIDES.len();
        let cls = head_slice(outputs, stride_index, "cls", cell_count, stride)?;
        let obj = head_slice(outputs, stride_index + heads, "obj", cell_count, stride)?;
        let bbox = head_slice(outputs, stride_index + heads * 2, "bbox", cell_count * 4, stride)?;
        let kps = head_slice(outputs, stride_index + heads * 3, "kps", cell_count * 10, stride)?;

        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;
                let mut score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
                if !score.is_finite() {
                    score = 0.0;
                }

                let b = &bbox[idx * 4..idx * 4 + 4];
                let cx = (col as f32 + b[0]) * stride_f;
                let cy = (row as f32 + b[1]) * stride_f;
                let w = b[2].exp() * stride_f;
                let h = b[3].exp() * stride_f;
                fused.extend_from_slice(&[
                    (-0.5f32).mul_add(w, cx),
                    (-0.5f32).mul_add(h, cy),
                    w,
                    h,
                ]);

                let k = &kps[idx * 10..idx * 10 + 10];
                for lm in 0..5 {
                    fused.push((k[lm * 2] + col as f32) * stride_f);
                    fused.push((k[lm * 2 + 1] + row as f32) * stride_f);
                }

                fused.push(score);
            }
        }
    }

    let rows = fused.len() / OUTPUT_COLS;
    Tensor::from_shape(&[rows, OUTPUT_COLS], &fused)
        .map_err(|e| anyhow::anyhow!("failed to build fused YuNet tensor: {e}"))
}

fn head_slice<'a>(
    outputs: &'a [Tensor],
    index: usize,
    name: &str,
    expected: usize,
    stride: usize,
) -> Result<&'a [f32]> {
    let slice = outputs[index]
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("{name} output not f32: {e}"))?;
    anyhow::ensure!(
        slice.len() == expected,
        "{name} length mismatch at stride {stride}: expected {expected}, got {}",
        slice.len()
    );
    Ok(slice)
}

fn align_to(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor) * divisor
}
