use std::cmp::Ordering;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, ArrayView3, ArrayViewD, CowArray, Ix3};
use ndarray_npy::ReadNpyExt;
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};

use crate::error::{Error, Result};
use crate::pipeline::{sample_patch, sigmoid};
use crate::Point2;

pub(crate) const DETECTOR_INPUT_WIDTH: usize = 128;
pub(crate) const DETECTOR_INPUT_HEIGHT: usize = 128;

/// One detector hit, corners in original-image pixel coordinates.
#[derive(Debug, Clone)]
pub(crate) struct DetectedBox {
    pub start: Point2,
    pub end: Point2,
    pub score: f32,
}

impl DetectedBox {
    pub fn width(&self) -> f32 {
        self.end.x - self.start.x
    }

    pub fn height(&self) -> f32 {
        self.end.y - self.start.y
    }

    fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    fn iou(&self, other: &Self) -> f32 {
        let x1 = self.start.x.max(other.start.x);
        let y1 = self.start.y.max(other.start.y);
        let x2 = self.end.x.min(other.end.x);
        let y2 = self.end.y.min(other.end.y);

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
}

/// Anchor-based single-shot face detector.
///
/// The anchor grid comes from an `.npy` sidecar next to the model file,
/// shaped `[num_anchors, 4]` with normalized `(x_center, y_center, w, h)`
/// rows.
pub struct BlazefaceDetector {
    session: Session,
    anchors: Array2<f32>,
    max_faces: usize,
    iou_threshold: f32,
    score_threshold: f32,
}

impl BlazefaceDetector {
    pub(crate) async fn load(
        environment: &Arc<Environment>,
        model_path: &Path,
        anchors_path: &Path,
        max_faces: usize,
        iou_threshold: f32,
        score_threshold: f32,
    ) -> Result<Self> {
        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_intra_threads(5))
            .and_then(|builder| builder.with_model_from_file(model_path))
            .map_err(|source| Error::ModelLoad {
                path: model_path.to_path_buf(),
                source,
            })?;

        let file = File::open(anchors_path)?;
        let anchors: Array2<f64> =
            ReadNpyExt::read_npy(file).map_err(|source| Error::AnchorRead {
                path: anchors_path.to_path_buf(),
                source,
            })?;
        let anchors = anchors.map(|x| *x as f32);

        Ok(Self {
            session,
            anchors,
            max_faces,
            iou_threshold,
            score_threshold,
        })
    }

    /// Detect faces in a `[1, h, w, 3]` image. Returns at most `max_faces`
    /// boxes, strongest first, after score filtering and NMS.
    pub(crate) fn run(&self, image: &ArrayViewD<'_, f32>) -> Result<Vec<DetectedBox>> {
        let img_h = image.shape()[1] as f32;
        let img_w = image.shape()[2] as f32;

        let resized = sample_patch(
            image,
            [0.0, 0.0],
            [img_w, img_h],
            DETECTOR_INPUT_WIDTH,
            DETECTOR_INPUT_HEIGHT,
        );
        let array: CowArray<_, _> = resized.mapv_into(|v| v / 255.0).into_dyn().into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;
        if outputs.len() < 2 {
            return Err(Error::OutputShape(
                "detector must emit box regressors and scores".into(),
            ));
        }

        let boxes_t: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let boxes_holder = boxes_t.view();
        let raw_boxes = boxes_holder.deref().clone().into_dimensionality::<Ix3>()?;

        let scores_t: OrtOwnedTensor<f32, _> = outputs[1].try_extract()?;
        let scores_holder = scores_t.view();
        let raw_scores = scores_holder.deref();

        let normalized = decode_boxes(
            &raw_boxes,
            &self.anchors,
            DETECTOR_INPUT_WIDTH as f32,
            DETECTOR_INPUT_HEIGHT as f32,
        )?;
        if raw_scores.len() < normalized.len() {
            return Err(Error::OutputShape(format!(
                "detector emitted {} boxes but {} scores",
                normalized.len(),
                raw_scores.len()
            )));
        }

        let mut detections: Vec<DetectedBox> = normalized
            .into_iter()
            .zip(raw_scores.iter())
            .filter_map(|((start, end), &logit)| {
                let score = sigmoid(logit);
                if score < self.score_threshold {
                    return None;
                }
                Some(DetectedBox {
                    start: Point2::new(start.x * img_w, start.y * img_h),
                    end: Point2::new(end.x * img_w, end.y * img_h),
                    score,
                })
            })
            .collect();

        detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let mut detections = non_max_suppression(detections, self.iou_threshold);
        detections.truncate(self.max_faces);
        Ok(detections)
    }
}

/// Decode raw anchor-relative box regressions into normalized corner pairs.
fn decode_boxes(
    raw_boxes: &ArrayView3<'_, f32>,
    anchors: &Array2<f32>,
    x_scale: f32,
    y_scale: f32,
) -> Result<Vec<(Point2, Point2)>> {
    let shape = raw_boxes.shape();
    let num_boxes = shape[1];
    if shape[0] != 1 || shape[2] < 4 {
        return Err(Error::OutputShape(format!(
            "detector box output must be [1, n, >=4], got {shape:?}"
        )));
    }
    if anchors.nrows() != num_boxes {
        return Err(Error::OutputShape(format!(
            "{num_boxes} raw boxes but {} anchors",
            anchors.nrows()
        )));
    }

    let mut boxes = Vec::with_capacity(num_boxes);
    for i in 0..num_boxes {
        let x_center = raw_boxes[[0, i, 0]] / x_scale * anchors[[i, 2]] + anchors[[i, 0]];
        let y_center = raw_boxes[[0, i, 1]] / y_scale * anchors[[i, 3]] + anchors[[i, 1]];
        let w = raw_boxes[[0, i, 2]] / x_scale * anchors[[i, 2]];
        let h = raw_boxes[[0, i, 3]] / y_scale * anchors[[i, 3]];

        boxes.push((
            Point2::new(x_center - w / 2.0, y_center - h / 2.0),
            Point2::new(x_center + w / 2.0, y_center + h / 2.0),
        ));
    }
    Ok(boxes)
}

/// Greedy suppression: keep a detection unless it overlaps an already kept,
/// higher-scoring one past the threshold. Input must be sorted by score.
fn non_max_suppression(mut detections: Vec<DetectedBox>, threshold: f32) -> Vec<DetectedBox> {
    let mut kept: Vec<DetectedBox> = Vec::with_capacity(detections.len());
    for detection in detections.drain(..) {
        if !kept.iter().any(|k| detection.iou(k) > threshold) {
            kept.push(detection);
        }
    }
    kept
}
