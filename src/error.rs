//! Error types for nifti-fixup.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding, correcting, writing or reorienting a volume.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input path does not exist.
    #[error("input file {} does not exist", .0.display())]
    InputNotFound(PathBuf),

    /// `sizeof_hdr` or the magic string is not a NIfTI-1/NIfTI-2 value.
    #[error("invalid NIfTI magic bytes: {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// Header dimensions, offsets or sizes are inconsistent.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// The file is structurally valid NIfTI but not something we handle.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// Gzip stream could not be decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// The q-form quaternion or spacings cannot produce an affine.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// The micrometer/radian unit defect was found but TR was not the value it implies.
    #[error(
        "expected pixdim[4] (TR) of {expected} alongside micrometer/radian units, found {found}"
    )]
    UnexpectedRepetitionTime {
        /// TR the defect signature implies.
        expected: f64,
        /// TR stored in the header.
        found: f64,
    },

    /// The external reorientation step failed to launch or exited non-zero.
    #[error("reorientation failed: {0}")]
    Reorient(String),
}

/// Result type for nifti-fixup operations.
pub type Result<T> = std::result::Result<T, Error>;
