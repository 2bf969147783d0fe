//! # nifti-fixup
//!
//! Repairs NIfTI headers written by VISTASOFT so that AFNI reads them correctly.
//!
//! - [`correct`] holds the repair rules: template-aligned codes reset to
//!   scanner-aligned with the sform replaced by the qform, and the
//!   micrometer/radian unit defect (with its TR) fixed.
//! - [`nifti`] reads and writes `.nii`/`.nii.gz`, keeping every unmodelled
//!   header byte and the whole payload intact.
//! - [`fix`] runs one input/output pair end to end, including the AFNI
//!   reorientation step from [`reorient`].
//!
//! ```ignore
//! use nifti_fixup::{fix, reorient::Refit, HeaderCorrector};
//!
//! let options = fix::FixOptions::new("bold.nii.gz", "bold_fixed.nii.gz");
//! let outcome = fix::run(&options, &HeaderCorrector::default(), &Refit::default())?;
//! ```

#![deny(unsafe_code)]

pub mod correct;
pub mod error;
pub mod fix;
pub mod nifti;
pub mod orientation;
pub mod reorient;

pub use correct::{Correction, HeaderCorrector};
pub use error::{Error, Result};
pub use orientation::Orientation;
