//! Two-stage face landmark pipeline.
//!
//! A coarse anchor-based detector finds face regions; a dense regressor
//! refines each region into a 468-point mesh. The [`FaceEstimator`]
//! orchestrates the two stages: tracked regions of interest are reused
//! across calls until a low-confidence face invalidates them, results can be
//! mirrored horizontally, and the mesh can be handed back either as plain
//! point lists (with named region annotations) or as live buffers whose
//! disposal transfers to the caller.
//!
//! ```no_run
//! use facemesh::{EstimatorConfig, FaceEstimator, ImageInput, ModelLocations};
//!
//! # fn main() -> facemesh::Result<()> {
//! let models = ModelLocations {
//!     detector_model: "models/face_detection.onnx".into(),
//!     detector_anchors: "models/anchors.npy".into(),
//!     mesh_model: "models/face_mesh.onnx".into(),
//! };
//! let mut estimator =
//!     pollster::block_on(FaceEstimator::load(EstimatorConfig::default(), models))?;
//!
//! let image = image::open("face.png")?;
//! let faces = pollster::block_on(estimator.estimate_faces(
//!     ImageInput::Pixels(&image),
//!     false,
//!     false,
//! ))?;
//! # let _ = faces;
//! # Ok(())
//! # }
//! ```

pub mod annotations;
pub mod config;
pub mod error;
pub mod estimator;
pub mod pipeline;
pub mod tensor;
pub mod transform;

pub use config::{EstimatorConfig, ModelLocations};
pub use error::{Error, Result};
pub use estimator::{
    BoundingBox, FaceEstimate, FaceEstimator, ImageInput, MaterializedFace, RawBoundingBox,
    RawFace,
};
pub use pipeline::{FacePipeline, MeshPipeline, Prediction, RoiTensors};
pub use tensor::Tensor;

pub type Point2 = nalgebra::Point2<f32>;
