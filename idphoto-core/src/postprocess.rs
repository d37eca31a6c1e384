use anyhow::Result;
use std::cmp::Ordering;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use crate::model::OUTPUT_COLS;
use idphoto_utils::config::DetectorSettings;

/// Score filtering and suppression parameters for raw YuNet rows.
#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// IoU above which a lower-scored box is suppressed.
    pub nms_threshold: f32,
    /// The maximum number of candidates kept before suppression.
    pub top_k: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

impl From<&DetectorSettings> for PostprocessConfig {
    fn from(settings: &DetectorSettings) -> Self {
        PostprocessConfig {
            score_threshold: settings.score_threshold,
            nms_threshold: settings.nms_threshold,
            top_k: settings.top_k,
        }
    }
}

/// Axis-aligned bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.width.max(0.0)) * (self.height.max(0.0))
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Landmark; 4] {
        let (r, b) = (self.x + self.width, self.y + self.height);
        [
            Landmark { x: self.x, y: self.y },
            Landmark { x: r, y: self.y },
            Landmark { x: r, y: b },
            Landmark { x: self.x, y: b },
        ]
    }
}

/// Facial landmark coordinate (x, y) in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// A single face: box, five keypoints and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Right eye, left eye, nose tip, right mouth corner, left mouth corner.
    pub landmarks: [Landmark; 5],
    pub score: f32,
}

impl Detection {
    /// Box corners followed by the five keypoints, in source pixels.
    pub fn outline_points(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.bbox.corners().into_iter().chain(self.landmarks)
    }
}

/// Turn raw `[N, 15]` YuNet rows into scored, scaled, suppressed detections.
///
/// Rows below `score_threshold` or with a non-positive box are dropped, coordinates are
/// scaled back to the source image, and the survivors are sorted by score, truncated to
/// `top_k` and passed through greedy non-maximum suppression.
pub fn apply_postprocess(
    output: &Tensor,
    scale_x: f32,
    scale_y: f32,
    config: &PostprocessConfig,
) -> Result<Vec<Detection>> {
    let rows = detection_rows(output)?;

    let mut detections = Vec::with_capacity(rows.nrows());
    for row in rows.rows() {
        let score = row[14];
        if !score.is_finite() || score < config.score_threshold {
            continue;
        }

        let bbox = BoundingBox {
            x: row[0] * scale_x,
            y: row[1] * scale_y,
            width: row[2] * scale_x,
            height: row[3] * scale_y,
        };
        if bbox.width <= 0.0 || bbox.height <= 0.0 {
            continue;
        }

        let landmarks = std::array::from_fn(|i| Landmark {
            x: row[4 + i * 2] * scale_x,
            y: row[5 + i * 2] * scale_y,
        });

        detections.push(Detection {
            bbox,
            landmarks,
            score,
        });
    }

    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    if config.top_k > 0 && detections.len() > config.top_k {
        detections.truncate(config.top_k);
    }

    if config.nms_threshold > 0.0 && detections.len() > 1 {
        detections = non_max_suppression(detections, config.nms_threshold);
    }

    Ok(detections)
}

fn detection_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let rows = match output.shape() {
        [rows, OUTPUT_COLS] => *rows,
        [1, rows, OUTPUT_COLS] => *rows,
        other => anyhow::bail!(
            "YuNet output must have shape [N, 15] or [1, N, 15] (got {:?})",
            other
        ),
    };

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("YuNet output is not f32: {e}"))?;

    ArrayView2::from_shape((rows, OUTPUT_COLS), slice)
        .map_err(|_| anyhow::anyhow!("YuNet output data is not contiguous"))
}

fn non_max_suppression(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        if kept
            .iter()
            .all(|other| detection.bbox.iou(&other.bbox) <= threshold)
        {
            kept.push(detection);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_from_rows(rows: &[[f32; 15]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_shape(&[rows.len(), 15], &flat).unwrap()
    }

    #[test]
    fn filters_by_score_and_scales_coordinates() {
        let tensor = tensor_from_rows(&[
            [
                10.0, 20.0, 30.0, 40.0, // bbox
                12.0, 22.0, // landmarks...
                18.0, 25.0, //
                25.0, 30.0, //
                15.0, 35.0, //
                20.0, 28.0, //
                0.95, // score
            ],
            [
                5.0, 5.0, 10.0, 10.0, 6.0, 6.0, 7.0, 7.0, 8.0, 8.0, 9.0, 9.0, 10.0, 10.0, 0.2,
            ],
        ]);

        let detections = apply_postprocess(
            &tensor,
            2.0,
            0.5,
            &PostprocessConfig {
                score_threshold: 0.3,
                ..Default::default()
            },
        )
        .expect("postprocess should succeed");

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.score, 0.95);
        assert_eq!((det.bbox.x, det.bbox.y), (20.0, 10.0));
        assert_eq!((det.bbox.width, det.bbox.height), (60.0, 20.0));
        assert_eq!((det.landmarks[0].x, det.landmarks[0].y), (24.0, 11.0));
        assert_eq!((det.landmarks[4].x, det.landmarks[4].y), (40.0, 14.0));
    }

    #[test]
    fn applies_non_max_suppression() {
        let tensor = tensor_from_rows(&[
            [
                0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.95,
            ],
            [
                1.0, 1.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.99,
            ],
        ]);

        let detections =
            apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default()).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].score, 0.99, "highest score survives");
    }

    #[test]
    fn handles_batched_output_shape() {
        let tensor = Tensor::from_shape(
            &[1, 1, 15],
            &[
                0.0f32, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.95,
            ],
        )
        .unwrap();

        let detections = apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default())
            .expect("postprocess should succeed");
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        let tensor = Tensor::from_shape(&[2, 3], &[0.0f32; 6]).unwrap();
        assert!(apply_postprocess(&tensor, 1.0, 1.0, &PostprocessConfig::default()).is_err());
    }

    #[test]
    fn outline_has_corners_then_keypoints() {
        let det = Detection {
            bbox: BoundingBox {
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 40.0,
            },
            landmarks: [Landmark { x: 25.0, y: 35.0 }; 5],
            score: 0.99,
        };
        let points: Vec<_> = det.outline_points().collect();
        assert_eq!(points.len(), 9);
        assert_eq!(points[2], Landmark { x: 40.0, y: 60.0 });
        assert_eq!(points[8], Landmark { x: 25.0, y: 35.0 });
    }

    #[test]
    fn converts_detector_settings_into_config() {
        let settings = DetectorSettings {
            score_threshold: 0.75,
            nms_threshold: 0.25,
            top_k: 123,
            ..DetectorSettings::default()
        };
        let config = PostprocessConfig::from(&settings);
        assert_eq!(config.score_threshold, 0.75);
        assert_eq!(config.nms_threshold, 0.25);
        assert_eq!(config.top_k, 123);
    }
}
