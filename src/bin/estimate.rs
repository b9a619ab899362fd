use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use facemesh::{EstimatorConfig, FaceEstimate, FaceEstimator, ImageInput, ModelLocations};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        eprintln!("usage: estimate <detector.onnx> <anchors.npy> <mesh.onnx> <image>");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> facemesh::Result<()> {
    let models = ModelLocations {
        detector_model: args[1].clone().into(),
        detector_anchors: args[2].clone().into(),
        mesh_model: args[3].clone().into(),
    };

    let mut estimator =
        pollster::block_on(FaceEstimator::load(EstimatorConfig::default(), models))?;

    let image = image::open(&args[4])?;
    let faces = pollster::block_on(estimator.estimate_faces(
        ImageInput::Pixels(&image),
        false,
        false,
    ))?;

    match faces {
        None => println!("no faces detected"),
        Some(faces) => {
            for (i, face) in faces.iter().enumerate() {
                if let FaceEstimate::Materialized(face) = face {
                    println!(
                        "face {i}: confidence {:.3}, box ({:.1}, {:.1}) - ({:.1}, {:.1}), {} mesh points",
                        face.face_in_view_confidence,
                        face.bounding_box.top_left.x,
                        face.bounding_box.top_left.y,
                        face.bounding_box.bottom_right.x,
                        face.bounding_box.bottom_right.y,
                        face.scaled_mesh.len(),
                    );
                }
            }
        }
    }
    Ok(())
}
