//! End-to-end processing of one portrait into the printable asset bundle.
//!
//! Stage order: auto-enhance, background replacement, face anchor, passport and stamp
//! crops, the small and large sheets, then encoding. Background replacement is the only
//! stage allowed to fail softly; its failure is logged and the enhanced photo is used as is.

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};

use crate::{
    anchor::{AnchorRect, LandmarkDetector, resolve_anchor},
    background::{SubjectSegmenter, parse_background_color, replace_background},
    bundle::{
        DEFAULT_JPEG_QUALITY, ExportBundle, PASSPORT_ASSET, STAMP_ASSET, bundle_with_quality,
        pdf_asset_name, sheet_asset_name,
    },
    error::PhotoError,
    framing::crop_and_resize_with_anchor,
    presets::{A4_300DPI, PASSPORT, STAMP, SizePreset},
    sheet::{LayoutSpec, SheetSize, layout},
};
use idphoto_utils::{
    AppSettings, EnhancementSettings, RgbaColor, auto_enhance, decode_image, timing_guard,
};

/// Everything the pipeline needs to know besides the collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// `#RRGGBB` color laid behind the subject.
    pub background_color: String,
    /// When false the segmenter is never called.
    pub replace_background: bool,
    /// `None` skips auto-enhance.
    pub enhancement: Option<EnhancementSettings>,
    pub passport: SizePreset,
    pub stamp: SizePreset,
    pub sheet: SheetSize,
    pub margin: u32,
    pub columns: u32,
    pub small_copies: u32,
    /// Copy count of the sheet that is also rendered as PDF.
    pub large_copies: u32,
    pub fill: RgbaColor,
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            background_color: "#FFFFFF".to_string(),
            replace_background: true,
            enhancement: Some(EnhancementSettings::default()),
            passport: PASSPORT,
            stamp: STAMP,
            sheet: A4_300DPI.sheet(),
            margin: 100,
            columns: 3,
            small_copies: 3,
            large_copies: 6,
            fill: RgbaColor::WHITE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PipelineConfig {
    /// Map persisted settings onto a pipeline configuration.
    pub fn from_settings(settings: &AppSettings) -> Self {
        let output = &settings.output;
        let sheet = &settings.sheet;
        Self {
            background_color: settings.background.color.clone(),
            replace_background: settings.matting.enabled,
            enhancement: settings.enhance.enhancement(),
            passport: SizePreset {
                width: output.passport.width,
                height: output.passport.height,
                ..PASSPORT
            },
            stamp: SizePreset {
                width: output.stamp.width,
                height: output.stamp.height,
                ..STAMP
            },
            sheet: SheetSize {
                width: sheet.width,
                height: sheet.height,
            },
            margin: sheet.margin,
            columns: sheet.columns,
            small_copies: sheet.small_copies,
            large_copies: sheet.large_copies,
            fill: sheet.fill,
            jpeg_quality: output.jpeg_quality,
        }
    }

    fn layout_spec(&self, copies: u32) -> LayoutSpec {
        LayoutSpec {
            copies,
            columns: self.columns,
            sheet: self.sheet,
            margin: self.margin,
            fill: self.fill,
        }
    }

    /// Reject anything that would fail midway, before any pixel work starts.
    pub fn validate(&self) -> Result<(), PhotoError> {
        parse_background_color(&self.background_color)?;
        self.passport.target()?;
        self.stamp.target()?;
        if self.columns == 0 {
            return Err(PhotoError::InvalidLayout("columns must be at least 1".into()));
        }
        if self.small_copies == 0 || self.large_copies == 0 {
            return Err(PhotoError::InvalidLayout("copies must be at least 1".into()));
        }
        if self.small_copies == self.large_copies {
            return Err(PhotoError::InvalidLayout(format!(
                "small and large sheets both hold {} copies",
                self.small_copies
            )));
        }
        if self.sheet.width == 0 || self.sheet.height == 0 {
            return Err(PhotoError::InvalidLayout(format!(
                "sheet {}x{} has no area",
                self.sheet.width, self.sheet.height
            )));
        }
        Ok(())
    }
}

/// What one run produced, beyond the encoded assets.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub bundle: ExportBundle,
    /// Face anchor used for both crops; `None` means centered crops.
    pub anchor: Option<AnchorRect>,
    /// False when the segmenter was skipped or failed.
    pub background_replaced: bool,
    pub passport: RgbImage,
    pub stamp: RgbImage,
}

/// Portrait-to-bundle pipeline over a landmark detector and an optional segmenter.
///
/// Collaborators are held in `Arc`, so one pipeline can serve requests on several threads.
pub struct PhotoPipeline {
    detector: Arc<dyn LandmarkDetector>,
    segmenter: Option<Arc<dyn SubjectSegmenter>>,
    config: PipelineConfig,
}

impl PhotoPipeline {
    pub fn new(
        detector: Arc<dyn LandmarkDetector>,
        segmenter: Option<Arc<dyn SubjectSegmenter>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            segmenter,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode `bytes` and [`run`](Self::run) on the result.
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<PipelineOutput, PhotoError> {
        self.config.validate()?;
        let image = decode_image(bytes).map_err(PhotoError::Decode)?;
        self.run(&image)
    }

    /// Process one portrait.
    pub fn run(&self, image: &DynamicImage) -> Result<PipelineOutput, PhotoError> {
        let _guard = timing_guard("idphoto_core::pipeline", log::Level::Info);
        let config = &self.config;
        config.validate()?;
        let passport_target = config.passport.target()?;
        let stamp_target = config.stamp.target()?;

        let enhanced = match &config.enhancement {
            Some(settings) => {
                let _guard = timing_guard("idphoto_core::enhance", log::Level::Debug);
                DynamicImage::ImageRgb8(auto_enhance(image, settings))
            }
            None => DynamicImage::ImageRgb8(image.to_rgb8()),
        };

        let (subject, background_replaced) = self.composite(enhanced)?;

        let anchor = resolve_anchor(self.detector.as_ref(), &subject)?;
        if anchor.is_none() {
            info!("No face found; using centered crops");
        }

        let passport = crop_and_resize_with_anchor(&subject, anchor, passport_target)?;
        let stamp = crop_and_resize_with_anchor(&subject, anchor, stamp_target)?;

        let (small_sheet, large_sheet) = {
            let _guard = timing_guard("idphoto_core::sheets", log::Level::Debug);
            (
                layout(&passport, &config.layout_spec(config.small_copies))?,
                layout(&passport, &config.layout_spec(config.large_copies))?,
            )
        };

        let small_name = sheet_asset_name(config.small_copies);
        let large_name = sheet_asset_name(config.large_copies);
        let pdf_name = pdf_asset_name(config.large_copies);
        let bundle = bundle_with_quality(
            &[
                (PASSPORT_ASSET, &passport),
                (STAMP_ASSET, &stamp),
                (small_name.as_str(), &small_sheet),
                (large_name.as_str(), &large_sheet),
            ],
            Some((pdf_name.as_str(), &large_sheet)),
            config.jpeg_quality,
        )?;
        info!(
            "Produced {} assets ({} bytes)",
            bundle.len(),
            bundle.total_bytes()
        );

        Ok(PipelineOutput {
            bundle,
            anchor,
            background_replaced,
            passport,
            stamp,
        })
    }

    fn composite(&self, enhanced: DynamicImage) -> Result<(DynamicImage, bool), PhotoError> {
        let config = &self.config;
        let attempt = match (&self.segmenter, config.replace_background) {
            (Some(segmenter), true) => {
                replace_background(&enhanced, segmenter.as_ref(), &config.background_color)
            }
            (None, true) => Err(PhotoError::BackgroundReplacementFailed(
                "no segmenter available".into(),
            )),
            (_, false) => {
                debug!("Background replacement disabled");
                return Ok((enhanced, false));
            }
        };

        match attempt {
            Ok(rgb) => Ok((DynamicImage::ImageRgb8(rgb), true)),
            Err(err) if err.is_recoverable() => {
                warn!("{err}; keeping the original background");
                Ok((enhanced, false))
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for PhotoPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoPipeline")
            .field("segmenter", &self.segmenter.is_some())
            .field("config", &self.config)
            .finish()
    }
}
