use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array4, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};

use crate::annotations::NUM_LANDMARKS;
use crate::error::{Error, Result};
use crate::pipeline::sigmoid;
use crate::Point2;

/// Dense landmark regressor run on a per-face crop.
pub struct MeshModel {
    session: Session,
}

impl MeshModel {
    pub(crate) async fn load(environment: &Arc<Environment>, model_path: &Path) -> Result<Self> {
        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_intra_threads(5))
            .and_then(|builder| builder.with_model_from_file(model_path))
            .map_err(|source| Error::ModelLoad {
                path: model_path.to_path_buf(),
                source,
            })?;
        Ok(Self { session })
    }

    /// Regress the mesh on a `[1, h, w, 3]` crop.
    ///
    /// Returns the face-presence confidence and the crop-space points.
    pub(crate) fn run(&self, crop: Array4<f32>) -> Result<(f32, Vec<Point2>)> {
        let array: CowArray<_, _> = crop.mapv_into(|v| v / 255.0).into_dyn().into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;
        if outputs.len() < 2 {
            return Err(Error::OutputShape(
                "mesh model must emit coordinates and a face flag".into(),
            ));
        }

        let coords_t: OrtOwnedTensor<f32, _> = outputs[0].try_extract()?;
        let coords_holder = coords_t.view();
        let flat: Vec<f32> = coords_holder.deref().iter().copied().collect();

        let flag_t: OrtOwnedTensor<f32, _> = outputs[1].try_extract()?;
        let flag_holder = flag_t.view();
        let logit = flag_holder
            .deref()
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::OutputShape("empty face flag".into()))?;

        Ok((sigmoid(logit), unflatten_points(&flat)?))
    }
}

/// Split the flat coordinate buffer into mesh points.
///
/// The per-point stride is inferred from the buffer length; channels past
/// (x, y) are dropped.
fn unflatten_points(flat: &[f32]) -> Result<Vec<Point2>> {
    if flat.is_empty() || flat.len() % NUM_LANDMARKS != 0 {
        return Err(Error::OutputShape(format!(
            "coordinate buffer of length {} does not cover {NUM_LANDMARKS} landmarks",
            flat.len()
        )));
    }
    let stride = flat.len() / NUM_LANDMARKS;
    if stride < 2 {
        return Err(Error::OutputShape(format!(
            "coordinate stride {stride} is too small for 2-d points"
        )));
    }
    Ok(flat
        .chunks(stride)
        .map(|point| Point2::new(point[0], point[1]))
        .collect())
}
