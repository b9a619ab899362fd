//! Estimator behavior against a scripted pipeline.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use approx::assert_relative_eq;

use facemesh::annotations::{mesh_annotations, NUM_LANDMARKS};
use facemesh::{
    FaceEstimate, FaceEstimator, FacePipeline, ImageInput, Prediction, RoiTensors, Tensor,
};

#[derive(Clone)]
struct FaceSpec {
    confidence: f32,
    mesh: Vec<[f32; 2]>,
    scaled_mesh: Vec<[f32; 2]>,
    box_start: [f32; 2],
    box_end: [f32; 2],
}

impl FaceSpec {
    /// A full-size mesh whose points interpolate from (10, 10) to (20, 20),
    /// boxed at (5, 5) - (25, 25).
    fn synthetic(confidence: f32) -> Self {
        let mesh: Vec<[f32; 2]> = (0..NUM_LANDMARKS)
            .map(|i| {
                let v = 10.0 + 10.0 * i as f32 / (NUM_LANDMARKS - 1) as f32;
                [v, v]
            })
            .collect();
        Self {
            confidence,
            scaled_mesh: mesh.clone(),
            mesh,
            box_start: [5.0, 5.0],
            box_end: [25.0, 25.0],
        }
    }

    fn into_prediction(self) -> Prediction {
        Prediction {
            flag: Tensor::scalar(self.confidence),
            coords: points_tensor(&self.mesh),
            scaled_coords: points_tensor(&self.scaled_mesh),
            roi: RoiTensors {
                start: Tensor::from_vec(&[2], self.box_start.to_vec()).unwrap(),
                end: Tensor::from_vec(&[2], self.box_end.to_vec()).unwrap(),
            },
        }
    }
}

fn points_tensor(points: &[[f32; 2]]) -> Tensor {
    let values: Vec<f32> = points.iter().flatten().copied().collect();
    Tensor::from_vec(&[points.len(), 2], values).unwrap()
}

struct ScriptedPipeline {
    batches: VecDeque<Vec<FaceSpec>>,
    clears: Rc<Cell<usize>>,
}

impl ScriptedPipeline {
    fn new(batches: Vec<Vec<FaceSpec>>) -> (Self, Rc<Cell<usize>>) {
        let clears = Rc::new(Cell::new(0));
        (
            Self {
                batches: batches.into(),
                clears: Rc::clone(&clears),
            },
            clears,
        )
    }
}

impl FacePipeline for ScriptedPipeline {
    async fn predict(&mut self, _input: &Tensor) -> facemesh::Result<Vec<Prediction>> {
        Ok(self
            .batches
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .map(FaceSpec::into_prediction)
            .collect())
    }

    fn clear_tracked_rois(&mut self) {
        self.clears.set(self.clears.get() + 1);
    }
}

fn estimator_for(
    batches: Vec<Vec<FaceSpec>>,
) -> (FaceEstimator<ScriptedPipeline>, Rc<Cell<usize>>) {
    let (pipeline, clears) = ScriptedPipeline::new(batches);
    (FaceEstimator::with_pipeline(pipeline, 0.9), clears)
}

/// 100x100 blank height x width x channel input buffer.
fn blank_input() -> ImageInput<'static> {
    ImageInput::Tensor(Tensor::from_vec(&[100, 100, 3], vec![0.0; 100 * 100 * 3]).unwrap())
}

fn wide_input(width: usize) -> ImageInput<'static> {
    ImageInput::Tensor(Tensor::from_vec(&[2, width, 3], vec![0.0; 2 * width * 3]).unwrap())
}

#[test]
fn returns_null_when_pipeline_yields_nothing() {
    let (mut estimator, _) = estimator_for(vec![vec![]]);
    let result = pollster::block_on(estimator.estimate_faces(blank_input(), false, false)).unwrap();
    assert!(result.is_none());
}

#[test]
fn confidence_below_threshold_clears_tracked_rois() {
    let (mut estimator, clears) = estimator_for(vec![vec![FaceSpec::synthetic(0.89)]]);
    pollster::block_on(estimator.estimate_faces(blank_input(), false, false)).unwrap();
    assert_eq!(clears.get(), 1);
}

#[test]
fn confidence_at_threshold_does_not_clear() {
    let (mut estimator, clears) = estimator_for(vec![vec![FaceSpec::synthetic(0.90)]]);
    pollster::block_on(estimator.estimate_faces(blank_input(), false, false)).unwrap();
    assert_eq!(clears.get(), 0);
}

#[test]
fn confidence_above_threshold_does_not_clear() {
    let (mut estimator, clears) = estimator_for(vec![vec![FaceSpec::synthetic(0.91)]]);
    pollster::block_on(estimator.estimate_faces(blank_input(), false, false)).unwrap();
    assert_eq!(clears.get(), 0);
}

#[test]
fn each_face_triggers_gating_independently() {
    let batch = vec![
        FaceSpec::synthetic(0.95),
        FaceSpec::synthetic(0.50),
        FaceSpec::synthetic(0.95),
    ];
    let (mut estimator, clears) = estimator_for(vec![batch]);
    pollster::block_on(estimator.estimate_faces(blank_input(), false, false)).unwrap();
    assert_eq!(clears.get(), 1);
}

#[test]
fn preserves_per_face_order() {
    let confidences = [0.91, 0.92, 0.93];
    let batch: Vec<FaceSpec> = confidences.iter().map(|&c| FaceSpec::synthetic(c)).collect();
    let (mut estimator, _) = estimator_for(vec![batch]);

    let faces = pollster::block_on(estimator.estimate_faces(blank_input(), false, false))
        .unwrap()
        .unwrap();
    assert_eq!(faces.len(), 3);
    for (face, &expected) in faces.iter().zip(&confidences) {
        let FaceEstimate::Materialized(face) = face else {
            panic!("expected materialized face");
        };
        assert_relative_eq!(face.face_in_view_confidence, expected);
    }
}

#[test]
fn single_face_roundtrip_keeps_box_and_populates_annotations() {
    // synthetic 100x100 single-face scenario: confidence 0.95, mesh
    // (10,10)..(20,20), box (5,5)-(25,25), no flip, materialized
    let (mut estimator, clears) = estimator_for(vec![vec![FaceSpec::synthetic(0.95)]]);

    let faces = pollster::block_on(estimator.estimate_faces(blank_input(), false, false))
        .unwrap()
        .unwrap();
    assert_eq!(faces.len(), 1);
    let FaceEstimate::Materialized(face) = &faces[0] else {
        panic!("expected materialized face");
    };

    assert_relative_eq!(face.bounding_box.top_left.x, 5.0);
    assert_relative_eq!(face.bounding_box.top_left.y, 5.0);
    assert_relative_eq!(face.bounding_box.bottom_right.x, 25.0);
    assert_relative_eq!(face.bounding_box.bottom_right.y, 25.0);
    assert_eq!(face.mesh.len(), NUM_LANDMARKS);
    assert_eq!(face.scaled_mesh.len(), NUM_LANDMARKS);
    assert!(!face.annotations.is_empty());
    assert_eq!(clears.get(), 0);
}

#[test]
fn annotations_cover_the_whole_table() {
    let (mut estimator, _) = estimator_for(vec![vec![FaceSpec::synthetic(0.95)]]);
    let faces = pollster::block_on(estimator.estimate_faces(blank_input(), false, false))
        .unwrap()
        .unwrap();
    let FaceEstimate::Materialized(face) = &faces[0] else {
        panic!("expected materialized face");
    };

    let table = mesh_annotations();
    assert_eq!(face.annotations.len(), table.len());
    for ((name, points), (table_name, indices)) in face.annotations.iter().zip(table) {
        assert_eq!(name, table_name);
        assert_eq!(points.len(), indices.len());
        for (point, &i) in points.iter().zip(*indices) {
            assert_relative_eq!(point.x, face.scaled_mesh[i].x);
            assert_relative_eq!(point.y, face.scaled_mesh[i].y);
        }
    }
}

#[test]
fn raw_buffers_skip_annotations_and_keep_tensors_live() {
    let (mut estimator, clears) = estimator_for(vec![vec![FaceSpec::synthetic(0.89)]]);
    let faces = pollster::block_on(estimator.estimate_faces(blank_input(), true, false))
        .unwrap()
        .unwrap();

    // invalidation still runs on the raw branch
    assert_eq!(clears.get(), 1);

    let FaceEstimate::Raw(face) = &faces[0] else {
        panic!("expected raw face");
    };
    assert_relative_eq!(face.face_in_view_confidence, 0.89);
    assert_eq!(face.mesh.shape(), &[NUM_LANDMARKS, 2]);
    assert_eq!(face.scaled_mesh.shape(), &[NUM_LANDMARKS, 2]);
    assert_eq!(face.bounding_box.top_left.shape(), &[2]);

    let start = pollster::block_on(face.bounding_box.top_left.read());
    assert_eq!(start, vec![5.0, 5.0]);
}

#[test]
fn flip_mirrors_materialized_results() {
    let mut spec = FaceSpec::synthetic(0.95);
    spec.scaled_mesh[0] = [100.0, 50.0];
    let (mut estimator, _) = estimator_for(vec![vec![spec]]);

    let faces = pollster::block_on(estimator.estimate_faces(wide_input(640), false, true))
        .unwrap()
        .unwrap();
    let FaceEstimate::Materialized(face) = &faces[0] else {
        panic!("expected materialized face");
    };

    assert_relative_eq!(face.scaled_mesh[0].x, 539.0);
    assert_relative_eq!(face.scaled_mesh[0].y, 50.0);
    // corner labels survive mirroring; only x is remapped
    assert_relative_eq!(face.bounding_box.top_left.x, 639.0 - 5.0);
    assert_relative_eq!(face.bounding_box.top_left.y, 5.0);
    assert_relative_eq!(face.bounding_box.bottom_right.x, 639.0 - 25.0);
    assert_relative_eq!(face.bounding_box.bottom_right.y, 25.0);
}

#[test]
fn flip_applies_identically_to_raw_buffers() {
    let mut spec = FaceSpec::synthetic(0.95);
    spec.scaled_mesh[0] = [100.0, 50.0];
    let (mut estimator, _) = estimator_for(vec![vec![spec]]);

    let faces = pollster::block_on(estimator.estimate_faces(wide_input(640), true, true))
        .unwrap()
        .unwrap();
    let FaceEstimate::Raw(face) = &faces[0] else {
        panic!("expected raw face");
    };

    let scaled = pollster::block_on(face.scaled_mesh.read());
    assert_relative_eq!(scaled[0], 539.0);
    assert_relative_eq!(scaled[1], 50.0);
    let start = pollster::block_on(face.bounding_box.top_left.read());
    assert_relative_eq!(start[0], 634.0);
    assert_relative_eq!(start[1], 5.0);
}

#[test]
fn annotations_follow_flipped_coordinates() {
    let (mut estimator, _) = estimator_for(vec![vec![FaceSpec::synthetic(0.95)]]);
    let faces = pollster::block_on(estimator.estimate_faces(blank_input(), false, true))
        .unwrap()
        .unwrap();
    let FaceEstimate::Materialized(face) = &faces[0] else {
        panic!("expected materialized face");
    };

    // annotation points are selected after the flip, so they match the
    // flipped scaled mesh exactly
    let (_, points) = &face.annotations[0];
    let indices = mesh_annotations()[0].1;
    assert_relative_eq!(points[0].x, face.scaled_mesh[indices[0]].x);
}

#[test]
fn rejects_non_rank3_tensor_input() {
    let (mut estimator, _) = estimator_for(vec![vec![]]);
    let input = ImageInput::Tensor(Tensor::from_vec(&[4, 4], vec![0.0; 16]).unwrap());
    let result = pollster::block_on(estimator.estimate_faces(input, false, false));
    assert!(result.is_err());
}
