use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use technotaggr::audio::StratumTempoEstimator;
use technotaggr::config::{DEFAULT_MAX_BPM, DEFAULT_MIN_BPM, DEFAULT_MODELS_DIR, DEFAULT_OUTPUT_DIR};
use technotaggr::{run_postprocess, AnalyzeConfig, PostprocessConfig};

#[derive(Parser, Debug)]
#[command(name = "technotaggr")]
#[command(about = "Tag audio files with pretrained classifiers and 16-bar phrase predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every classifier over the audio files in a directory
    Analyze {
        /// Directory containing audio files
        input_dir: String,

        /// Directory the results JSON is written to
        #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: String,

        /// Model directory (classification-heads/ and feature-extractors/)
        #[arg(short = 'm', long, default_value = DEFAULT_MODELS_DIR)]
        models_dir: String,

        /// Search subdirectories for audio files
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Verbose logging
        #[arg(short = 'v', long)]
        verbose: bool,

        /// Don't print the summary after processing
        #[arg(long)]
        no_summary: bool,
    },

    /// Add 16-bar phrase predictions to a results JSON file
    Postprocess {
        /// Results JSON produced by `analyze`
        json_file: String,

        /// Output path (default: overwrite the input file)
        #[arg(short = 'o', long)]
        output: Option<String>,

        /// Base directory for relative audio paths (default: current directory)
        #[arg(short = 'a', long)]
        audio_base_path: Option<String>,

        /// Minimum BPM for detection range
        #[arg(long, default_value_t = DEFAULT_MIN_BPM)]
        min_bpm: f32,

        /// Maximum BPM for detection range
        #[arg(long, default_value_t = DEFAULT_MAX_BPM)]
        max_bpm: f32,

        /// Verbose logging
        #[arg(short = 'v', long)]
        verbose: bool,

        /// Don't print the summary after processing
        #[arg(long)]
        no_summary: bool,
    },
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            input_dir,
            output_dir,
            models_dir,
            recursive,
            verbose,
            no_summary,
        } => {
            init_logging(verbose);

            let config = AnalyzeConfig::new(expand(&input_dir))
                .with_output_dir(expand(&output_dir))
                .with_models_dir(expand(&models_dir))
                .with_recursive(recursive)
                .with_summary(!no_summary);

            log::info!("TechnoTaggr - analysis");
            log::info!("Input:  {:?}", config.input_dir);
            log::info!("Models: {:?}", config.models_dir);

            analyze(config)
        }
        Command::Postprocess {
            json_file,
            output,
            audio_base_path,
            min_bpm,
            max_bpm,
            verbose,
            no_summary,
        } => {
            init_logging(verbose);

            let config = PostprocessConfig::new(expand(&json_file))
                .with_output(output.as_deref().map(expand))
                .with_audio_base_path(audio_base_path.as_deref().map(expand))
                .with_bpm_range(min_bpm, max_bpm)
                .with_summary(!no_summary);

            log::info!("TechnoTaggr - phrase post-processing");
            log::info!("BPM detection range: {}-{} BPM", min_bpm, max_bpm);

            let estimator = StratumTempoEstimator::new().with_bpm_range(min_bpm, max_bpm);
            let (path, _) = run_postprocess(&config, estimator)?;
            log::info!("Results written to: {:?}", path);
            Ok(())
        }
    }
}

#[cfg(feature = "onnx")]
fn analyze(config: AnalyzeConfig) -> Result<()> {
    use technotaggr::audio::SymphoniaLoader;
    use technotaggr::inference::OnnxRuntime;
    use technotaggr::AnalysisPipeline;

    let mut pipeline = AnalysisPipeline::new(config, SymphoniaLoader::new(), OnnxRuntime::new())?;
    if let Some(path) = pipeline.run()? {
        log::info!("Results written to: {:?}", path);
    }
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn analyze(_config: AnalyzeConfig) -> Result<()> {
    anyhow::bail!("No inference backend compiled in; rebuild with `--features onnx`")
}
