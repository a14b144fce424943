//! rd-eval CLI - Video codec rate-distortion comparison tool

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::{BdArgs, RunArgs};

/// Video codec rate-distortion comparison and parameter search tool.
#[derive(Parser)]
#[command(name = "rd-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Catalog directory holding config.json, videos.json, metrics.json and presets.json
    #[arg(long, global = true, env = "RD_EVAL_CATALOG", default_value = ".")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep presets over the video catalog and score them against the base preset
    Evaluate {
        /// Presets to evaluate (defaults to the catalog's default presets)
        #[arg(short, long, value_delimiter = ',')]
        presets: Vec<String>,

        /// Restrict to these videos
        #[arg(long, value_delimiter = ',')]
        videos: Vec<String>,

        /// Output directory for summary.json and the BD table
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Score relative to the best configuration per video instead of the base preset
        #[arg(long)]
        relative_to_best: bool,

        /// Revision id to record instead of asking git
        #[arg(long)]
        revision: Option<String>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        bd: BdArgs,
    },

    /// Compare one candidate configuration head-to-head against a reference encoder
    Compare {
        /// Candidate preset
        #[arg(short, long)]
        candidate: String,

        /// Reference preset (x265 and x264 carry built-in QP offsets)
        #[arg(short, long, default_value = "x265")]
        reference: String,

        /// Override the reference QP offset
        #[arg(long, allow_hyphen_values = true)]
        qp_offset: Option<i32>,

        /// Candidate QPs (defaults to the preset's base values)
        #[arg(long, value_delimiter = ',')]
        qps: Vec<i32>,

        /// Candidate parameter as name=value (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Restrict to these videos
        #[arg(long, value_delimiter = ',')]
        videos: Vec<String>,

        /// Write the comparison result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        bd: BdArgs,
    },

    /// Search candidate encoder parameters that minimize the BD score
    Optimize {
        /// Search space JSON file
        #[arg(short, long)]
        space: PathBuf,

        /// Candidate preset
        #[arg(short, long)]
        candidate: String,

        /// Reference preset
        #[arg(short, long, default_value = "x264")]
        reference: String,

        /// Override the reference QP offset
        #[arg(long, allow_hyphen_values = true)]
        qp_offset: Option<i32>,

        /// Preset parameter that receives the serialized parameter vector
        #[arg(long, default_value = "extra_params")]
        param_name: String,

        /// Number of trials to run in this invocation
        #[arg(short = 'n', long, default_value_t = 1000)]
        trials: usize,

        /// Study file (resumed if it exists)
        #[arg(long, default_value = "study.json")]
        study_file: PathBuf,

        /// Study name
        #[arg(long, default_value = "optimize-bd-psnr")]
        study_name: String,

        /// Optimization direction
        #[arg(long, default_value = "minimize")]
        direction: rd_eval::Direction,

        /// Sampler seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Use independent uniform sampling instead of local search
        #[arg(long)]
        random: bool,

        /// Restrict to these videos
        #[arg(long, value_delimiter = ',')]
        videos: Vec<String>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        bd: BdArgs,
    },

    /// Compute the BD score between two curves stored as quality,bytes CSV files
    Bd {
        /// Reference curve CSV
        reference: PathBuf,

        /// Candidate curve CSV
        candidate: PathBuf,

        #[command(flatten)]
        bd: BdArgs,
    },
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Evaluate {
            presets,
            videos,
            output,
            relative_to_best,
            revision,
            run,
            bd,
        } => commands::evaluate::run(
            &cli.catalog,
            presets,
            videos,
            output,
            relative_to_best,
            revision,
            &run,
            &bd,
        ),
        Commands::Compare {
            candidate,
            reference,
            qp_offset,
            qps,
            params,
            videos,
            output,
            run,
            bd,
        } => commands::compare::run(
            &cli.catalog,
            commands::compare::CompareArgs {
                candidate,
                reference,
                qp_offset,
                qps,
                params,
                videos,
                output,
            },
            &run,
            &bd,
        ),
        Commands::Optimize {
            space,
            candidate,
            reference,
            qp_offset,
            param_name,
            trials,
            study_file,
            study_name,
            direction,
            seed,
            random,
            videos,
            run,
            bd,
        } => commands::optimize::run(
            &cli.catalog,
            commands::optimize::OptimizeArgs {
                space,
                candidate,
                reference,
                qp_offset,
                param_name,
                trials,
                study_file,
                study_name,
                direction,
                seed,
                random,
                videos,
            },
            &run,
            &bd,
        ),
        Commands::Bd {
            reference,
            candidate,
            bd,
        } => commands::bd::run(&reference, &candidate, &bd),
    }
}
