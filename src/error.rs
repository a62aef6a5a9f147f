// SoftGL
// copyright softgl contributors 2023~2025

//! Error taxonomy shared by the adapter and the windowing seam.
//! Construction-time failures unwind every partially acquired resource
//! before surfacing one of these; nothing here is retried.

use thiserror::Error;

/// Error codes reported by a windowing-layer implementation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("region out of surface bounds")]
    OutOfBounds,

    #[error("pixel storage size mismatch: need {need} pixels, got {got}")]
    SizeMismatch { need: usize, got: usize },

    #[error("unsupported pixel format for this operation")]
    UnsupportedFormat,

    #[error("surface has no flip extension point")]
    NoExtensionPoint,

    #[error("incompatible surface implementation")]
    Incompatible,

    #[error("surface destroyed")]
    Destroyed,
}

/// Adapter-level failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required argument was absent, or the instance is already destroyed.
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),

    /// The raster engine rejected the requested geometry or format.
    #[error("raster context init failed: {0}")]
    InitFailed(&'static str),

    /// Surface creation or sub-surface retrieval failed; carries the
    /// windowing-layer code.
    #[error("surface creation failed: {0}")]
    Creation(#[from] SurfaceError),

    /// Permanently unsupported operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
