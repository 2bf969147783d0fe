//! `NIfTI` file format support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) is a standard format
//! for neuroimaging data. This module reads and writes `.nii` and `.nii.gz`
//! files while leaving every byte it does not model exactly as it found it.

pub(crate) mod header;
pub(crate) mod image;
pub mod io;

pub use header::{
    Affine, NiftiHeader, NiftiVersion, SpatialUnits, TemporalUnits, XformCode, XyztUnits,
};
pub use image::{affines_close, NiftiImage};
pub use io::{load, load_header, save};
