//! Error type shared by every satsplit operation

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading a model or segmenting text
#[derive(Error, Debug)]
pub enum Error {
    /// Session creation or a forward pass failed inside ONNX Runtime
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    /// Loading `tokenizer.json` or encoding a text failed
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] tokenizers::Error),

    /// Reading a model or config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `config.json` is malformed
    #[error("Malformed model config: {0}")]
    Json(#[from] serde_json::Error),

    /// Model output has the wrong number of dimensions
    #[error("Unexpected logits layout: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Neither the given file nor a known model file inside the directory exists
    #[error("No ONNX model found at '{}'", .0.display())]
    ModelNotFound(PathBuf),

    /// Options or model metadata the windowing cannot work with
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The scoring backend failed or returned inconsistent results
    #[error("Inference error: {0}")]
    Inference(String),
}
