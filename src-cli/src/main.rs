//! bezelrec Command-Line Interface
//!
//! Drives the compositing/encoding engine from the terminal: wraps a PNG
//! (or a generated test pattern) in the synthetic device frame and writes
//! the recorded MP4/WebM or screenshot PNG artifacts to disk.

mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;
use std::path::PathBuf;

/// bezelrec - Device-Frame Capture CLI
#[derive(Parser, Debug)]
#[command(name = "bezelrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record the framed content into video files
    Record {
        #[command(flatten)]
        device: DeviceOptions,

        #[command(flatten)]
        options: RecordOptions,
    },
    /// Compose a single framed screenshot PNG
    Screenshot {
        #[command(flatten)]
        device: DeviceOptions,

        /// Output file path (default: suggested filename in the output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show which video codecs the runtime FFmpeg build provides
    Codecs,
}

#[derive(Parser, Debug, Clone)]
pub struct DeviceOptions {
    /// Logical content width in pixels
    #[arg(long, default_value_t = 390)]
    width: u32,

    /// Logical content height in pixels
    #[arg(long, default_value_t = 844)]
    height: u32,

    /// Device pixel ratio (clamped to >= 1)
    #[arg(long, default_value_t = 3.0)]
    dpr: f32,

    /// Hide the notch pill
    #[arg(long)]
    no_notch: bool,

    /// Hide the metal chassis frame
    #[arg(long)]
    no_frame: bool,

    /// Canvas background: 'transparent' or a #RRGGBB hex color
    #[arg(long, default_value = "transparent")]
    background: String,

    /// PNG used as the captured content; a test pattern when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct RecordOptions {
    /// Output formats, comma separated: mp4, webm
    #[arg(short, long, value_delimiter = ',', default_value = "mp4,webm")]
    format: Vec<String>,

    /// Recording length in seconds (Ctrl-C stops earlier)
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Directory the artifacts are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    let exit_code = runtime.block_on(run(cli));
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Record { device, options } => {
            commands::record(device, options, cli.json, cli.quiet).await
        }
        Commands::Screenshot { device, output } => {
            commands::screenshot(device, output, cli.json, cli.quiet).await
        }
        Commands::Codecs => commands::codecs(cli.json, cli.quiet).await,
    }
}
