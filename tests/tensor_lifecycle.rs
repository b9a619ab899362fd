//! Buffer accounting across estimate_faces calls.
//!
//! Lives in its own integration binary so the live-handle counter is not
//! disturbed by tensors created in unrelated concurrent tests; everything is
//! exercised from one test function for the same reason.

use std::collections::VecDeque;

use facemesh::annotations::NUM_LANDMARKS;
use facemesh::{
    tensor, FaceEstimate, FaceEstimator, FacePipeline, ImageInput, Prediction, RoiTensors, Tensor,
};

struct OneFacePipeline {
    batches: VecDeque<Vec<f32>>,
}

impl FacePipeline for OneFacePipeline {
    async fn predict(&mut self, _input: &Tensor) -> facemesh::Result<Vec<Prediction>> {
        let confidences = self.batches.pop_front().unwrap_or_default();
        confidences
            .into_iter()
            .map(|confidence| {
                let mesh = vec![1.0; NUM_LANDMARKS * 2];
                Ok(Prediction {
                    flag: Tensor::scalar(confidence),
                    coords: Tensor::from_vec(&[NUM_LANDMARKS, 2], mesh.clone())?,
                    scaled_coords: Tensor::from_vec(&[NUM_LANDMARKS, 2], mesh)?,
                    roi: RoiTensors {
                        start: Tensor::from_vec(&[2], vec![0.0, 0.0])?,
                        end: Tensor::from_vec(&[2], vec![10.0, 10.0])?,
                    },
                })
            })
            .collect()
    }

    fn clear_tracked_rois(&mut self) {}
}

fn input() -> ImageInput<'static> {
    ImageInput::Tensor(Tensor::from_vec(&[8, 8, 3], vec![0.0; 8 * 8 * 3]).unwrap())
}

#[test]
fn no_buffer_outlives_its_call() {
    let baseline = tensor::live_count();

    let pipeline = OneFacePipeline {
        batches: vec![vec![0.95], vec![0.95], vec![]].into(),
    };
    let mut estimator = FaceEstimator::with_pipeline(pipeline, 0.9);

    // materialized branch: every intermediate buffer is released before return
    let faces = pollster::block_on(estimator.estimate_faces(input(), false, false))
        .unwrap()
        .unwrap();
    assert_eq!(tensor::live_count(), baseline);
    drop(faces);

    // raw branch: exactly the four embedded buffers per face transfer out
    let faces = pollster::block_on(estimator.estimate_faces(input(), true, false))
        .unwrap()
        .unwrap();
    assert_eq!(tensor::live_count(), baseline + 4);

    let FaceEstimate::Raw(face) = faces.into_iter().next().unwrap() else {
        panic!("expected raw face");
    };
    face.mesh.dispose();
    face.scaled_mesh.dispose();
    face.bounding_box.top_left.dispose();
    face.bounding_box.bottom_right.dispose();
    assert_eq!(tensor::live_count(), baseline);

    // null-result path releases the input conversion buffers too
    let result = pollster::block_on(estimator.estimate_faces(input(), false, false)).unwrap();
    assert!(result.is_none());
    assert_eq!(tensor::live_count(), baseline);
}
