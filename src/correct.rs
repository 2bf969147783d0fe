//! Repairs for headers written by VISTASOFT's NIfTI exporter.
//!
//! Two independent defects are fixed, both only for files whose `descrip`
//! names VISTASOFT:
//!
//! - **Alignment codes.** VISTASOFT writes `qform_code`/`sform_code` = 2
//!   ("aligned to template"), which AFNI takes to mean the volume is already
//!   aligned. Both codes are reset to 1 (scanner anatomical) and the sform,
//!   which these files get wrong, is replaced by the qform.
//! - **Units and TR.** A defective converter stores micrometers/radians in
//!   `xyzt_units` and a TR of 1. The units become millimeters/seconds and the
//!   TR becomes 2, the value from the acquisition protocol.

use crate::error::{Error, Result};
use crate::nifti::{
    affines_close, NiftiHeader, NiftiImage, SpatialUnits, TemporalUnits, XformCode,
};
use log::{debug, info, warn};

/// `descrip` value VISTASOFT writes into every header.
pub const VISTASOFT_DESCRIP: &str = "VISTASOFT";

/// What a correction pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Correction {
    /// qform/sform codes were reset and the affine replaced by the qform.
    pub alignment: bool,
    /// `xyzt_units` and TR were rewritten.
    pub units: bool,
}

impl Correction {
    /// Whether the output must be run through the reorientation step.
    ///
    /// Only an alignment repair moves the volume's declared orientation; a
    /// units repair does not.
    pub fn needs_reorient(&self) -> bool {
        self.alignment
    }

    /// True if anything was changed.
    pub fn any(&self) -> bool {
        self.alignment || self.units
    }
}

/// Applies the VISTASOFT header repairs.
#[derive(Debug, Clone)]
pub struct HeaderCorrector {
    /// Files whose `descrip` matches this exactly are corrected.
    pub provenance: String,
    /// TR that always accompanies the micrometer/radian unit defect.
    pub defective_tr: f64,
    /// TR written in its place.
    pub repaired_tr: f64,
}

impl Default for HeaderCorrector {
    fn default() -> Self {
        Self {
            provenance: VISTASOFT_DESCRIP.to_string(),
            defective_tr: 1.0,
            repaired_tr: 2.0,
        }
    }
}

impl HeaderCorrector {
    /// Corrector with the VISTASOFT defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Correct `image`, returning it together with what was changed.
    ///
    /// Images from other software are returned untouched. An error means the
    /// image matched a defect signature but violated its preconditions; the
    /// image is dropped so nothing half-corrected can be saved.
    pub fn correct(&self, mut image: NiftiImage) -> Result<(NiftiImage, Correction)> {
        if image.header().descrip != self.provenance {
            debug!(
                "descrip {:?} is not {:?}; leaving header alone",
                image.header().descrip,
                self.provenance
            );
            return Ok((image, Correction::default()));
        }

        let alignment = self.repair_alignment(&mut image)?;
        let units = self.repair_units(image.header_mut())?;
        Ok((image, Correction { alignment, units }))
    }

    /// Reset template-aligned codes to scanner-aligned and rebuild the affine
    /// from the qform. Returns whether anything changed.
    fn repair_alignment(&self, image: &mut NiftiImage) -> Result<bool> {
        let header = image.header();
        let qform_wrong = header.qform_code == XformCode::AlignedAnat;
        let sform_wrong = header.sform_code == XformCode::AlignedAnat;
        if !qform_wrong && !sform_wrong {
            return Ok(false);
        }

        // Derived before any field is touched.
        let aff = header.qform_affine()?;
        if affines_close(&header.sform_affine(), &aff) {
            warn!("sform already matches qform; alignment codes are the only defect");
        }

        let header = image.header_mut();
        if qform_wrong {
            header.qform_code = XformCode::ScannerAnat;
        }
        if sform_wrong {
            header.sform_code = XformCode::ScannerAnat;
        }

        // Both slots get the qform; a stale affine is written back over the
        // sform on save.
        image.set_affine(aff);
        image.header_mut().set_sform(&aff);

        info!(
            "reset alignment codes (qform: {}, sform: {}) and replaced sform with qform",
            qform_wrong, sform_wrong
        );
        Ok(true)
    }

    /// Fix the micrometer/radian units defect and the TR that comes with it.
    fn repair_units(&self, header: &mut NiftiHeader) -> Result<bool> {
        let units = header.xyzt_units;
        if units.spatial != SpatialUnits::Micrometer || units.temporal != TemporalUnits::Radian {
            return Ok(false);
        }

        let tr = header.pixdim[4];
        if tr != self.defective_tr {
            return Err(Error::UnexpectedRepetitionTime {
                expected: self.defective_tr,
                found: tr,
            });
        }

        header.xyzt_units.spatial = SpatialUnits::Millimeter;
        header.xyzt_units.temporal = TemporalUnits::Second;
        header.pixdim[4] = self.repaired_tr;

        warn!(
            "replaced micrometer/radian units with mm/s; verify TR of {} (was {})",
            self.repaired_tr, tr
        );
        Ok(true)
    }
}
