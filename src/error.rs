use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ort::OrtError,
    },

    #[error("failed to read anchors {path}: {source}")]
    AnchorRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("onnx runtime error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("input must be a rank-3 height x width x channel buffer, got shape {0:?}")]
    InputShape(Vec<usize>),

    #[error("unexpected model output: {0}")]
    OutputShape(String),
}

pub type Result<T> = std::result::Result<T, Error>;
