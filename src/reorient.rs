//! External reorientation step run on corrected outputs.

use crate::error::{Error, Result};
use crate::orientation::Orientation;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Something that can rewrite a saved volume's declared orientation in place.
pub trait Reorienter {
    /// Reorient the file at `path` to `orientation`.
    fn reorient(&self, path: &Path, orientation: Orientation) -> Result<()>;
}

/// AFNI's `3drefit -orient <code> <file>`.
#[derive(Debug, Clone)]
pub struct Refit {
    program: PathBuf,
}

impl Default for Refit {
    fn default() -> Self {
        Self::new("3drefit")
    }
}

impl Refit {
    /// Use `program` instead of `3drefit` from `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Reorienter for Refit {
    fn reorient(&self, path: &Path, orientation: Orientation) -> Result<()> {
        let code = orientation.to_string();
        log::info!(
            "running {} -orient {} {}",
            self.program.display(),
            code,
            path.display()
        );

        let status = Command::new(&self.program)
            .arg("-orient")
            .arg(&code)
            .arg(path)
            .status()
            .map_err(|e| {
                Error::Reorient(format!(
                    "failed to launch {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(Error::Reorient(format!(
                "{} -orient {} {} exited with {}",
                self.program.display(),
                code,
                path.display(),
                status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_reorient_error() {
        let refit = Refit::new("/nonexistent/definitely-not-3drefit");
        let err = refit
            .reorient(Path::new("out.nii"), Orientation::LAI)
            .unwrap_err();
        assert!(matches!(err, Error::Reorient(_)));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reorient_error() {
        let err = Refit::new("false")
            .reorient(Path::new("out.nii"), Orientation::LAI)
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_exit_succeeds() {
        Refit::new("true")
            .reorient(Path::new("out.nii"), Orientation::LAI)
            .unwrap();
    }
}
