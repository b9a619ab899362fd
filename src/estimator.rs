use ndarray::Axis;
use ort::{Environment, ExecutionProvider};

use crate::annotations;
use crate::config::{EstimatorConfig, ModelLocations};
use crate::error::{Error, Result};
use crate::pipeline::model_blazeface::BlazefaceDetector;
use crate::pipeline::model_mesh::MeshModel;
use crate::pipeline::{FacePipeline, MeshPipeline, Prediction};
use crate::tensor::Tensor;
use crate::transform::{flip_horizontal, FlipTarget};
use crate::Point2;

/// Image handed to [`FaceEstimator::estimate_faces`].
///
/// A pre-existing numeric buffer carries its width in the shape (axis 1 of
/// height x width x channel); a pixel source carries it in the raw width
/// field. The two must not be confused.
pub enum ImageInput<'a> {
    /// Height x width x channel single-precision buffer.
    Tensor(Tensor),
    /// Decoded pixel source.
    Pixels(&'a image::DynamicImage),
}

impl ImageInput<'_> {
    fn width(&self) -> Result<f32> {
        match self {
            ImageInput::Tensor(tensor) => {
                let shape = tensor.shape();
                if shape.len() != 3 {
                    return Err(Error::InputShape(shape.to_vec()));
                }
                Ok(shape[1] as f32)
            }
            ImageInput::Pixels(image) => Ok(image.width() as f32),
        }
    }

    /// Normalize into a batched `[1, h, w, 3]` float buffer owned by the
    /// current call.
    fn into_batched(self) -> Result<Tensor> {
        match self {
            ImageInput::Tensor(tensor) => {
                let shape = tensor.shape();
                if shape.len() != 3 {
                    return Err(Error::InputShape(shape.to_vec()));
                }
                Ok(Tensor::from_array(
                    tensor.into_array().insert_axis(Axis(0)),
                ))
            }
            ImageInput::Pixels(image) => {
                let rgb = image.to_rgb8();
                let (w, h) = (rgb.width() as usize, rgb.height() as usize);
                // integer pixels become floats here, explicitly
                let values: Vec<f32> = rgb
                    .pixels()
                    .flat_map(|p| p.0)
                    .map(|v| v as f32)
                    .collect();
                Tensor::from_vec(&[1, h, w, 3], values)
            }
        }
    }
}

/// Axis-aligned face box, corners labeled in source coordinate space.
///
/// After a horizontal flip the labels are preserved and only each corner's x
/// is remapped, so `top_left.x` may exceed `bottom_right.x` in mirrored
/// space. Callers index corners by label, not by extent.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub top_left: Point2,
    pub bottom_right: Point2,
}

/// Fully materialized per-face result.
#[derive(Debug, Clone)]
pub struct MaterializedFace {
    pub face_in_view_confidence: f32,
    pub bounding_box: BoundingBox,
    /// Mesh in crop space.
    pub mesh: Vec<Point2>,
    /// Mesh in original-image pixel space.
    pub scaled_mesh: Vec<Point2>,
    /// Named regions selected out of `scaled_mesh`, in annotation-table order.
    pub annotations: Vec<(&'static str, Vec<Point2>)>,
}

/// Buffer-typed per-face result; the embedded tensors belong to the caller.
pub struct RawFace {
    pub face_in_view_confidence: f32,
    pub bounding_box: RawBoundingBox,
    pub mesh: Tensor,
    pub scaled_mesh: Tensor,
}

pub struct RawBoundingBox {
    pub top_left: Tensor,
    pub bottom_right: Tensor,
}

/// Per-face estimate, tagged by representation. The tag is selected once per
/// call via the `return_raw_buffers` argument.
pub enum FaceEstimate {
    Materialized(MaterializedFace),
    Raw(RawFace),
}

impl FlipTarget for MaterializedFace {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        self.bounding_box.top_left.map_x(&mut *f);
        self.bounding_box.bottom_right.map_x(&mut *f);
        self.mesh.map_x(&mut *f);
        self.scaled_mesh.map_x(&mut *f);
        for (_, points) in &mut self.annotations {
            points.map_x(&mut *f);
        }
    }
}

impl FlipTarget for RawFace {
    fn map_x(&mut self, f: &mut dyn FnMut(f32) -> f32) {
        self.bounding_box.top_left.map_x(&mut *f);
        self.bounding_box.bottom_right.map_x(&mut *f);
        self.mesh.map_x(&mut *f);
        self.scaled_mesh.map_x(&mut *f);
    }
}

/// Orchestrates the two-stage pipeline into per-face annotated results.
pub struct FaceEstimator<P = MeshPipeline> {
    pipeline: P,
    detection_confidence: f32,
}

impl FaceEstimator<MeshPipeline> {
    /// Load both models and build a ready estimator.
    ///
    /// The detector and mesh model load concurrently; either failure is
    /// fatal and no estimator is produced.
    pub async fn load(config: EstimatorConfig, models: ModelLocations) -> Result<Self> {
        config.validate()?;

        let environment = Environment::builder()
            .with_execution_providers([ExecutionProvider::CPU(Default::default())])
            .build()?
            .into_arc();

        let (detector, mesh) = futures::try_join!(
            BlazefaceDetector::load(
                &environment,
                &models.detector_model,
                &models.detector_anchors,
                config.max_faces,
                config.iou_threshold,
                config.score_threshold,
            ),
            MeshModel::load(&environment, &models.mesh_model),
        )?;

        let pipeline = MeshPipeline::new(
            detector,
            mesh,
            config.mesh_width,
            config.mesh_height,
            config.max_continuous_checks,
        );
        Ok(Self::with_pipeline(pipeline, config.detection_confidence))
    }
}

impl<P: FacePipeline> FaceEstimator<P> {
    /// Build an estimator around an already constructed pipeline.
    pub fn with_pipeline(pipeline: P, detection_confidence: f32) -> Self {
        Self {
            pipeline,
            detection_confidence,
        }
    }

    /// Estimate faces in `input`.
    ///
    /// Returns `None` when the pipeline yields no predictions at all, which
    /// is distinct from a non-`None` but filtered-down result. With
    /// `return_raw_buffers` the per-face buffers are handed over live and no
    /// annotations are computed; otherwise everything is materialized and the
    /// scaled mesh is annotated. `flip` mirrors all spatial fields about the
    /// image's vertical centerline.
    pub async fn estimate_faces(
        &mut self,
        input: ImageInput<'_>,
        return_raw_buffers: bool,
        flip: bool,
    ) -> Result<Option<Vec<FaceEstimate>>> {
        let width = input.width()?;
        let batched = input.into_batched()?;

        let predictions = self.pipeline.predict(&batched).await?;
        batched.dispose();

        if predictions.is_empty() {
            tracing::debug!("pipeline yielded no predictions");
            return Ok(None);
        }
        tracing::debug!(faces = predictions.len(), "assembling face estimates");

        let mut estimates = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            let Prediction {
                flag,
                coords,
                scaled_coords,
                roi,
            } = prediction;

            let confidence = flag.read_scalar().await;
            flag.dispose();
            tracing::trace!(confidence, "face flag");
            if confidence < self.detection_confidence {
                tracing::debug!(
                    confidence,
                    threshold = self.detection_confidence,
                    "clearing tracked rois"
                );
                self.pipeline.clear_tracked_rois();
            }

            if return_raw_buffers {
                let mut face = RawFace {
                    face_in_view_confidence: confidence,
                    bounding_box: RawBoundingBox {
                        top_left: roi.start,
                        bottom_right: roi.end,
                    },
                    mesh: coords,
                    scaled_mesh: scaled_coords,
                };
                if flip {
                    flip_horizontal(&mut face, width);
                }
                estimates.push(FaceEstimate::Raw(face));
            } else {
                let (scaled_values, mesh_values, start_values, end_values) = futures::join!(
                    scaled_coords.read(),
                    coords.read(),
                    roi.start.read(),
                    roi.end.read(),
                );
                scaled_coords.dispose();
                coords.dispose();
                roi.start.dispose();
                roi.end.dispose();

                let mut face = MaterializedFace {
                    face_in_view_confidence: confidence,
                    bounding_box: BoundingBox {
                        top_left: corner_point(&start_values)?,
                        bottom_right: corner_point(&end_values)?,
                    },
                    mesh: to_points(&mesh_values),
                    scaled_mesh: to_points(&scaled_values),
                    annotations: Vec::new(),
                };
                if flip {
                    flip_horizontal(&mut face, width);
                }
                face.annotations = annotations::annotate(&face.scaled_mesh);
                estimates.push(FaceEstimate::Materialized(face));
            }
        }

        Ok(Some(estimates))
    }
}

fn corner_point(values: &[f32]) -> Result<Point2> {
    if values.len() < 2 {
        return Err(Error::OutputShape(format!(
            "box corner buffer holds {} values, need 2",
            values.len()
        )));
    }
    Ok(Point2::new(values[0], values[1]))
}

fn to_points(values: &[f32]) -> Vec<Point2> {
    values
        .chunks_exact(2)
        .map(|pair| Point2::new(pair[0], pair[1]))
        .collect()
}
