#![deny(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use clap::Parser;

use vectorscan::config::{JobParameters, OcrMode, OptimizeLevel, OutputType};
use vectorscan::error::TraceableError;
use vectorscan::pipeline::{self, PipelineResult};

/// The §6 CLI surface: `vectorscan <input.pdf> --out <output.pdf> [--lang ...]
/// [--mode fast|best] [--force-ocr] [--output-type pdf|pdfa-2] [--optimize 0-3]`.
/// Only `--out` is required; every other flag is forwarded to the fallback.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct CliArguments {
    input_path: PathBuf,

    #[arg(long = "out", value_name = "output.pdf")]
    output_path: PathBuf,

    #[arg(long = "lang", value_name = "lang-tag", default_value = "eng")]
    lang: String,

    #[arg(long = "mode", value_name = "fast|best", default_value = "best")]
    mode: String,

    #[arg(long = "force-ocr", action = clap::ArgAction::SetTrue, default_value_t = false)]
    force_ocr: bool,

    #[arg(long = "output-type", value_name = "pdf|pdfa-2", default_value = "pdf")]
    output_type: String,

    #[arg(long = "optimize", value_name = "0|1|2|3", default_value = "3")]
    optimize: String,

    #[arg(long = "debug", action = clap::ArgAction::SetTrue, default_value_t = false)]
    debug_mode: bool,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), TraceableError> {
    let arguments = CliArguments::parse();
    if arguments.debug_mode {
        env_logger::builder().filter_level(log::LevelFilter::Debug).init();
    } else {
        env_logger::builder().filter_level(log::LevelFilter::Info).init();
    }

    log::debug!("The program has been initialized with the parameters: {:?}", arguments);

    let parameters = JobParameters {
        lang: arguments.lang.clone(),
        mode: arguments.mode.parse::<OcrMode>()?,
        force_ocr: arguments.force_ocr,
        output_type: arguments.output_type.parse::<OutputType>()?,
        optimize: arguments.optimize.parse::<OptimizeLevel>()?,
    };

    match pipeline::run(&arguments.input_path, &arguments.output_path, &parameters)? {
        PipelineResult::Vectorised { output_bytes } => {
            log::info!(
                "Vectorised {} into {} ({output_bytes} bytes)",
                arguments.input_path.display(),
                arguments.output_path.display()
            );
            Ok(())
        }
        PipelineResult::FellBack { exit_code } => {
            log::info!("Fell back to ocrmypdf, exit code {exit_code}");
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}
