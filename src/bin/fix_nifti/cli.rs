use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fix_nifti",
    version,
    about = "Fix VISTASOFT NIfTI headers that AFNI misreads",
    long_about = "Fixes NIfTI headers written by VISTASOFT that AFNI brain warping misreads.\n\n\
                  Alignment codes of 2 (aligned to template) are reset to 1, the sform is\n\
                  replaced by the qform, and the output is reoriented to LAI with 3drefit.\n\
                  Micrometer/radian units are replaced by mm/s and the TR of 1 by 2.\n\
                  Files from other software are copied unchanged."
)]
pub struct Cli {
    /// Input NIfTI file (.nii or .nii.gz)
    #[arg(allow_hyphen_values = true)]
    pub input_file: PathBuf,

    /// Output NIfTI file; overwritten if it exists
    #[arg(allow_hyphen_values = true)]
    pub output_file: PathBuf,

    /// AFNI refit executable used for reorientation
    #[arg(long, value_name = "PROGRAM", default_value = "3drefit")]
    pub refit: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
