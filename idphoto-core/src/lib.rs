//! Geometric framing and print-sheet layout for ID photos.
//!
//! This crate turns one portrait into passport and stamp photos, tiles them onto print
//! sheets, and packages everything as JPEGs, a one-page PDF and a zip. Face landmarks and
//! subject mattes come from pluggable backends; YuNet and U²-Net ONNX implementations run
//! through `tract-onnx`.

/// Face anchor derivation from normalized landmarks.
pub mod anchor;
/// Flat-color background compositing.
pub mod background;
/// JPEG/PDF encoding and the zip archive.
pub mod bundle;
/// Crop rectangle planning for a target aspect ratio.
pub mod cropper;
/// YuNet face detection runner.
pub mod detector;
/// Error type for every framing and layout stage.
pub mod error;
/// Crop-and-resize on pixels.
pub mod framing;
/// Salient-object matting backend.
pub mod matting;
/// ONNX model loading and execution.
pub mod model;
/// Portrait-to-bundle orchestration.
pub mod pipeline;
/// Detection post-processing (NMS, score filtering).
pub mod postprocess;
/// Image pre-processing for YuNet.
pub mod preprocess;
/// Standard photo and sheet sizes.
pub mod presets;
/// Lazily initialized process-wide detector.
pub mod shared;
/// Print sheet tiling.
pub mod sheet;

pub use anchor::{
    AnchorMargins, AnchorRect, LandmarkDetector, NoFaceDetector, NormalizedLandmark,
    anchor_from_landmarks, resolve_anchor,
};
pub use background::{SubjectSegmenter, composite_over, replace_background};
pub use bundle::{ExportBundle, bundle, bundle_with_quality, encode_single_page_pdf};
pub use cropper::{CropPlan, CropRect, CropStrategy, TargetSize, plan_crop};
pub use detector::{DetectionOutput, YuNetDetector};
pub use error::PhotoError;
pub use framing::{crop_and_resize, crop_and_resize_with_anchor};
pub use matting::OnnxMatting;
pub use model::YuNetModel;
pub use pipeline::{PhotoPipeline, PipelineConfig, PipelineOutput};
pub use postprocess::{BoundingBox, Detection, Landmark, PostprocessConfig, apply_postprocess};
pub use preprocess::{InputSize, PreprocessConfig, PreprocessOutput, preprocess_dynamic_image};
pub use presets::{SizePreset, photo_presets, sheet_presets};
pub use shared::SharedDetector;
pub use sheet::{LayoutSpec, SheetGrid, SheetSize, compute_grid, layout};
