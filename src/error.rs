//! Error taxonomy for the capture-and-fusion service.
//!
//! One `thiserror`-derived enum per subsystem, matching the boundaries in
//! the error-handling design: a state-store lookup failure is a different
//! kind of problem than a device read failure or a shape mismatch in the
//! fusion engine, and each is recovered (or surfaced) at a different layer.

use thiserror::Error;

/// Failures raised by the shared-state store on `get`/`set`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("key '{0}' not found")]
    KeyMissing(String),

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("cannot descend into a non-container at '{0}'")]
    NotContainer(String),

    #[error("'{0}' is not a valid index")]
    BadIndex(String),

    #[error("path is empty")]
    EmptyPath,
}

/// Failures raised by the exposure-fusion engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("bracket images have mismatched shapes")]
    ShapeMismatch,

    #[error("bracket is empty")]
    EmptyBracket,

    #[error("bracket contains non-finite pixel values")]
    NonFiniteInput,

    #[error("JPEG encode failed: {0}")]
    EncodeFailed(String),
}

/// Failures raised by a camera device adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("failed to open device {0}")]
    OpenFailed(String),

    #[error("failed to read a frame from device {0}")]
    ReadFailed(String),
}

/// Failures surfaced by the HTTP control/serve surface.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error("unknown image type requested: {0}")]
    UnknownImageType(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}
