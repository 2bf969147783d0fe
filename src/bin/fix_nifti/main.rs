use clap::error::ErrorKind;
use clap::Parser;

mod cli;

use cli::Cli;
use nifti_fixup::fix::{self, FixOptions};
use nifti_fixup::reorient::Refit;
use nifti_fixup::{Error, HeaderCorrector};

mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::FAILURE,
            };
            // Printing to a closed stdout/stderr is not worth reporting.
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let options = FixOptions::new(&cli.input_file, &cli.output_file);
    let exit_code = match fix::run(&options, &HeaderCorrector::default(), &Refit::new(&cli.refit))
    {
        Ok(outcome) if !outcome.correction.any() => {
            log::info!(
                "{} has no VISTASOFT defects; copied unchanged to {}",
                options.input.display(),
                options.output.display()
            );
            exit_codes::SUCCESS
        }
        Ok(outcome) => {
            log::info!(
                "wrote {} (alignment repaired: {}, units repaired: {}, reoriented: {})",
                options.output.display(),
                outcome.correction.alignment,
                outcome.correction.units,
                outcome.reoriented
            );
            exit_codes::SUCCESS
        }
        Err(e @ Error::InputNotFound(_)) => {
            eprintln!("Error: {}", e);
            exit_codes::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}: {}", options.input.display(), e);
            exit_codes::FAILURE
        }
    };

    std::process::exit(exit_code);
}
