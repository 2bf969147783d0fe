//! One input/output run: load, correct, save, reorient.

use crate::correct::{Correction, HeaderCorrector};
use crate::error::{Error, Result};
use crate::nifti;
use crate::orientation::Orientation;
use crate::reorient::Reorienter;
use log::warn;
use std::path::PathBuf;

/// Paths and target orientation for a run.
#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Volume to read.
    pub input: PathBuf,
    /// Where the corrected volume is written; replaced if it exists.
    pub output: PathBuf,
    /// Orientation handed to the reorienter after an alignment repair.
    pub target: Orientation,
}

impl FixOptions {
    /// Options with the `LAI` target used for VISTASOFT volumes.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            target: Orientation::LAI,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOutcome {
    /// Header changes applied before saving.
    pub correction: Correction,
    /// An existing output file was replaced.
    pub replaced_output: bool,
    /// The reorienter was run on the output.
    pub reoriented: bool,
}

/// Correct `options.input` into `options.output`.
///
/// Nothing is written if loading or correcting fails. If the reorienter fails
/// the corrected output stays on disk and the error is returned.
pub fn run(
    options: &FixOptions,
    corrector: &HeaderCorrector,
    reorienter: &dyn Reorienter,
) -> Result<FixOutcome> {
    if !options.input.exists() {
        return Err(Error::InputNotFound(options.input.clone()));
    }

    let replaced_output = options.output.exists();
    if replaced_output {
        warn!(
            "output file {} exists and will be overwritten",
            options.output.display()
        );
    }

    let image = nifti::load(&options.input)?;
    let (image, correction) = corrector.correct(image)?;
    nifti::save(&image, &options.output)?;

    if !correction.needs_reorient() {
        return Ok(FixOutcome {
            correction,
            replaced_output,
            reoriented: false,
        });
    }

    warn!(
        "{}: headers suggest the image was mistakenly marked as aligned by VISTASOFT; \
         alignment codes and sform were reset to the qform",
        options.input.display()
    );
    // Reorienting assumes the repaired volume is LPI.
    match Orientation::from_affine(image.affine()) {
        Some(current) if current == Orientation::LPI => {}
        Some(current) => warn!(
            "repaired affine is {current}, not LPI; {} may end up mislabelled",
            options.target
        ),
        None => warn!("repaired affine has no well-defined orientation"),
    }
    drop(image);

    reorienter.reorient(&options.output, options.target)?;
    Ok(FixOutcome {
        correction,
        replaced_output,
        reoriented: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correct::VISTASOFT_DESCRIP;
    use crate::nifti::{NiftiHeader, XformCode, XyztUnits};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(PathBuf, Orientation)>>,
        fail: bool,
    }

    impl Reorienter for Recorder {
        fn reorient(&self, path: &Path, orientation: Orientation) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((path.to_path_buf(), orientation));
            if self.fail {
                return Err(Error::Reorient("exited with 1".to_string()));
            }
            Ok(())
        }
    }

    fn write_volume(path: &Path, tr: f64) {
        let mut header = NiftiHeader::default();
        header.descrip = VISTASOFT_DESCRIP.to_string();
        header.qform_code = XformCode::AlignedAnat;
        header.sform_code = XformCode::AlignedAnat;
        header.pixdim[4] = tr;
        header.xyzt_units = XyztUnits::from_code(0x03 | 0x30);
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0u8; 8]);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let options = FixOptions::new(dir.path().join("nope.nii"), dir.path().join("out.nii"));
        let recorder = Recorder::default();

        let err = run(&options, &HeaderCorrector::new(), &recorder).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
        assert!(!options.output.exists());
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn test_bad_tr_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let options = FixOptions::new(dir.path().join("in.nii"), dir.path().join("out.nii"));
        write_volume(&options.input, 3.0);
        let recorder = Recorder::default();

        let err = run(&options, &HeaderCorrector::new(), &recorder).unwrap_err();
        assert!(matches!(err, Error::UnexpectedRepetitionTime { .. }));
        assert!(!options.output.exists());
        assert!(recorder.calls.borrow().is_empty());
    }

    #[test]
    fn test_reorient_failure_keeps_output() {
        let dir = TempDir::new().unwrap();
        let options = FixOptions::new(dir.path().join("in.nii"), dir.path().join("out.nii"));
        write_volume(&options.input, 1.0);
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };

        let err = run(&options, &HeaderCorrector::new(), &recorder).unwrap_err();
        assert!(matches!(err, Error::Reorient(_)));
        assert!(options.output.exists());
        assert_eq!(recorder.calls.borrow().len(), 1);
    }

    #[test]
    fn test_existing_output_replaced() {
        let dir = TempDir::new().unwrap();
        let options = FixOptions::new(dir.path().join("in.nii"), dir.path().join("out.nii"));
        write_volume(&options.input, 1.0);
        std::fs::write(&options.output, b"stale").unwrap();

        let outcome = run(&options, &HeaderCorrector::new(), &Recorder::default()).unwrap();
        assert!(outcome.replaced_output);
        assert!(outcome.reoriented);
        assert_eq!(
            nifti::load_header(&options.output).unwrap().pixdim[4],
            2.0
        );
    }

    #[test]
    fn test_in_place_correction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vol.nii");
        write_volume(&path, 1.0);
        let options = FixOptions::new(&path, &path);

        let outcome = run(&options, &HeaderCorrector::new(), &Recorder::default()).unwrap();
        assert!(outcome.correction.alignment);
        let header = nifti::load_header(&path).unwrap();
        assert_eq!(header.qform_code, XformCode::ScannerAnat);
        assert_eq!(header.sform_code, XformCode::ScannerAnat);
    }
}
