pub mod model_blazeface;
pub mod model_mesh;

use ndarray::{Array4, ArrayViewD};

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use crate::Point2;

use self::model_blazeface::{BlazefaceDetector, DetectedBox};
use self::model_mesh::MeshModel;

/// Buffer-typed output for one detected face.
///
/// Every field is a live buffer: `flag` holds the face-presence confidence,
/// `coords` the mesh in crop space, `scaled_coords` the mesh in original-image
/// pixel space, and `roi` the tracked region's corner points.
pub struct Prediction {
    pub flag: Tensor,
    pub coords: Tensor,
    pub scaled_coords: Tensor,
    pub roi: RoiTensors,
}

pub struct RoiTensors {
    pub start: Tensor,
    pub end: Tensor,
}

/// The two-stage detector+regressor facade the estimator drives.
///
/// `predict` decides internally whether to run full detection or reuse
/// tracked ROIs; callers never replicate that decision. `clear_tracked_rois`
/// is the invalidation side channel: idempotent, only ever clears.
#[allow(async_fn_in_trait)]
pub trait FacePipeline {
    async fn predict(&mut self, input: &Tensor) -> Result<Vec<Prediction>>;

    fn clear_tracked_rois(&mut self);
}

// a regressed mesh this confident refreshes its tracked roi; below it the
// previous roi is kept for the next pass
const ROI_REFRESH_MIN_CONFIDENCE: f32 = 0.5;

// tracked rois are grown around the detected box so the whole face survives
// the crop
const ROI_SCALE: f32 = 1.5;

/// Face region tracked across predict calls, in original-image pixel
/// coordinates.
#[derive(Debug, Clone, Copy)]
struct TrackedRoi {
    start: [f32; 2],
    end: [f32; 2],
}

impl TrackedRoi {
    fn width(&self) -> f32 {
        self.end[0] - self.start[0]
    }

    fn height(&self) -> f32 {
        self.end[1] - self.start[1]
    }

    /// Squarified, padded region around a detector box.
    fn from_detection(detection: &DetectedBox) -> Self {
        let cx = (detection.start.x + detection.end.x) / 2.0;
        let cy = (detection.start.y + detection.end.y) / 2.0;
        let half = detection.width().max(detection.height()) * 0.5 * ROI_SCALE;
        Self {
            start: [cx - half, cy - half],
            end: [cx + half, cy + half],
        }
    }

    /// Squarified region around a regressed mesh: bounding box of the points,
    /// extended to a square on the long side, re-centered.
    fn around(points: &[Point2]) -> Self {
        let mut x_min = f32::MAX;
        let mut y_min = f32::MAX;
        let mut x_max = f32::MIN;
        let mut y_max = f32::MIN;
        for p in points {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }

        let cx = (x_min + x_max) / 2.0;
        let cy = (y_min + y_max) / 2.0;
        let half = (x_max - x_min).max(y_max - y_min) / 2.0;
        Self {
            start: [cx - half, cy - half],
            end: [cx + half, cy + half],
        }
    }
}

/// Concrete two-stage pipeline: BlazeFace detection feeding per-ROI mesh
/// regression, with ROI reuse across calls bounded by `max_continuous_checks`.
pub struct MeshPipeline {
    detector: BlazefaceDetector,
    mesh: MeshModel,
    mesh_width: usize,
    mesh_height: usize,
    max_continuous_checks: usize,
    rois: Vec<TrackedRoi>,
    runs_without_detector: usize,
}

impl MeshPipeline {
    pub(crate) fn new(
        detector: BlazefaceDetector,
        mesh: MeshModel,
        mesh_width: usize,
        mesh_height: usize,
        max_continuous_checks: usize,
    ) -> Self {
        Self {
            detector,
            mesh,
            mesh_width,
            mesh_height,
            max_continuous_checks,
            rois: Vec::new(),
            runs_without_detector: 0,
        }
    }

    fn should_run_detector(&self) -> bool {
        self.rois.is_empty() || self.runs_without_detector >= self.max_continuous_checks
    }
}

impl FacePipeline for MeshPipeline {
    async fn predict(&mut self, input: &Tensor) -> Result<Vec<Prediction>> {
        let image = input.view();
        let shape = image.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[3] != 3 {
            return Err(Error::InputShape(shape.to_vec()));
        }

        if self.should_run_detector() {
            let detections = self.detector.run(&image)?;
            self.rois = detections.iter().map(TrackedRoi::from_detection).collect();
            self.runs_without_detector = 0;
            tracing::debug!(faces = self.rois.len(), "ran face detector");
        } else {
            self.runs_without_detector += 1;
            tracing::debug!(
                rois = self.rois.len(),
                runs = self.runs_without_detector,
                "reusing tracked rois"
            );
        }

        let mut predictions = Vec::with_capacity(self.rois.len());
        let mut refreshed = Vec::with_capacity(self.rois.len());
        for roi in &self.rois {
            let crop = sample_patch(
                &image,
                roi.start,
                [roi.width(), roi.height()],
                self.mesh_width,
                self.mesh_height,
            );
            let (confidence, coords) = self.mesh.run(crop)?;

            let sx = roi.width() / self.mesh_width as f32;
            let sy = roi.height() / self.mesh_height as f32;
            let scaled: Vec<Point2> = coords
                .iter()
                .map(|p| Point2::new(p.x * sx + roi.start[0], p.y * sy + roi.start[1]))
                .collect();

            refreshed.push(if confidence > ROI_REFRESH_MIN_CONFIDENCE {
                TrackedRoi::around(&scaled)
            } else {
                *roi
            });

            predictions.push(Prediction {
                flag: Tensor::scalar(confidence),
                coords: points_tensor(&coords)?,
                scaled_coords: points_tensor(&scaled)?,
                roi: RoiTensors {
                    start: Tensor::from_vec(&[2], roi.start.to_vec())?,
                    end: Tensor::from_vec(&[2], roi.end.to_vec())?,
                },
            });
        }
        self.rois = refreshed;

        Ok(predictions)
    }

    fn clear_tracked_rois(&mut self) {
        self.rois.clear();
        self.runs_without_detector = 0;
    }
}

/// Flatten a point list into an `[n, 2]` buffer.
pub(crate) fn points_tensor(points: &[Point2]) -> Result<Tensor> {
    let values: Vec<f32> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    Tensor::from_vec(&[points.len(), 2], values)
}

/// Nearest-neighbor sample of a rectangular patch out of a `[1, h, w, 3]`
/// image into a `[1, out_h, out_w, 3]` array. Source coordinates outside the
/// image clamp to the border.
pub(crate) fn sample_patch(
    image: &ArrayViewD<'_, f32>,
    start: [f32; 2],
    size: [f32; 2],
    out_w: usize,
    out_h: usize,
) -> Array4<f32> {
    let src_h = image.shape()[1];
    let src_w = image.shape()[2];

    let mut out = Array4::zeros((1, out_h, out_w, 3));
    for y in 0..out_h {
        let sy = start[1] + (y as f32 + 0.5) * size[1] / out_h as f32;
        let sy = (sy.floor().max(0.0) as usize).min(src_h - 1);
        for x in 0..out_w {
            let sx = start[0] + (x as f32 + 0.5) * size[0] / out_w as f32;
            let sx = (sx.floor().max(0.0) as usize).min(src_w - 1);
            for c in 0..3 {
                out[[0, y, x, c]] = image[[0, sy, sx, c]];
            }
        }
    }
    out
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
