//! QuickScan CLI
//!
//! Scan barcodes and QR codes from image files or from a camera frame source.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use quickscan::{
    collect_files, ChannelPresenter, ConsoleNotifier, CopyButton, DirectoryCamera, FacingMode,
    InputKind, Notifier, QrEngineFactory, ScanConfig, ScanError, ScanSession, ScannedResult,
    TerminalClipboard,
};

const ABOUT: &str = r#"
QuickScan - scan barcodes and QR codes from images or a camera

Examples:
  quickscan scan ticket.png                   Decode a single image
  quickscan scan a.png b.jpg photos/          Decode files and image directories
  quickscan scan photos/ --no-recursive       Only the top level of a directory
  quickscan scan ticket.png --json --copy     JSON output, copy the last code
  quickscan camera --frames ./frames          Scan frames replayed from a directory
"#;

/// Barcode and QR code scanner
#[derive(Parser)]
#[command(name = "quickscan")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print results and notifications as JSON
    #[arg(long)]
    json: bool,

    /// Copy the last decoded code to the terminal clipboard
    #[arg(long)]
    copy: bool,

    /// JSON config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode codes from image files or directories
    Scan {
        /// Files or directories to decode, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Treat the files as coming from the live-capture picker
        #[arg(long)]
        capture: bool,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Maximum directory depth
        #[arg(long)]
        max_depth: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scan frames from a camera source until a code is found
    Camera {
        /// Directory of frame images replayed as the camera stream
        #[arg(short = 'f', long)]
        frames: PathBuf,

        /// Target frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Request the front camera
        #[arg(long)]
        front: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ScanConfig, ScanError> {
    match path {
        Some(path) => ScanConfig::from_file(path),
        None => Ok(ScanConfig::default()),
    }
}

fn print_result(result: &ScannedResult, json: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize result: {}", e),
        }
    } else {
        println!("{}: {}", result.source_label, result.decoded_text);
    }
}

fn copy_last(results: &[ScannedResult], notifier: Arc<dyn Notifier>, config: &ScanConfig) {
    if let Some(last) = results.last() {
        let mut button = CopyButton::new(
            TerminalClipboard::stdout(),
            notifier,
            Duration::from_millis(config.copy_feedback_ms),
        );
        button.copy(&last.decoded_text);
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ScannedResult>) -> Vec<ScannedResult> {
    let mut results = Vec::new();
    while let Ok(result) = rx.try_recv() {
        results.push(result);
    }
    results
}

async fn run_scan(
    paths: Vec<PathBuf>,
    capture: bool,
    no_recursive: bool,
    max_depth: Option<usize>,
    output: OutputArgs,
) -> Result<bool, ScanError> {
    let mut config = load_config(output.config.as_ref())?;
    if no_recursive {
        config.recursive = false;
    }
    if let Some(depth) = max_depth {
        config.max_depth = depth;
    }

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(output.json));
    let collected = collect_files(&paths, &config);
    for err in &collected.errors {
        notifier.error(err.message.clone());
    }
    info!(
        "Scanning {} files from {} paths",
        collected.files.len(),
        paths.len()
    );

    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let session = ScanSession::new(
        config.clone(),
        Box::new(QrEngineFactory::new(None)),
        notifier.clone(),
        Box::new(ChannelPresenter::new(results_tx)),
    );
    let (handle, task) = quickscan::spawn(session);

    let input = if capture {
        InputKind::Capture
    } else {
        InputKind::Upload
    };
    handle.open_choice().await?;
    let summary = handle.select_files(input, collected.files).await?;
    handle.dispose().await?;
    if let Err(e) = task.await {
        error!("Session task failed: {}", e);
    }

    let results = drain(&mut results_rx);
    let summary = summary.unwrap_or_default();
    if output.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        for result in &results {
            print_result(result, false);
        }
        println!("Scan completed:");
        println!("  Files: {}", summary.total_files);
        println!("  Decoded: {}", summary.decoded);
        println!("  Not images: {}", summary.not_images);
        println!("  No code found: {}", summary.no_code);
        println!("  Read failures: {}", summary.read_failures);
        println!("  Duration: {}ms", summary.duration_ms);
    }

    if output.copy {
        copy_last(&results, notifier, &config);
    }
    Ok(!results.is_empty())
}

async fn run_camera(
    frames: PathBuf,
    fps: Option<u32>,
    front: bool,
    output: OutputArgs,
) -> Result<bool, ScanError> {
    let mut config = load_config(output.config.as_ref())?;
    if let Some(fps) = fps {
        config.fps = fps;
    }
    if front {
        config.facing_mode = FacingMode::User;
    }
    config.validate()?;

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(output.json));
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let camera = DirectoryCamera::new(frames);
    let session = ScanSession::new(
        config.clone(),
        Box::new(QrEngineFactory::new(Some(Box::new(camera)))),
        notifier.clone(),
        Box::new(ChannelPresenter::new(results_tx)),
    );
    let (handle, task) = quickscan::spawn(session);

    handle.open_choice().await?;
    if handle.start_camera().await? {
        info!("Scanning at {} fps; press Ctrl-C to cancel", config.fps);
        tokio::select! {
            idle = handle.wait_idle() => idle?,
            _ = tokio::signal::ctrl_c() => {
                info!("Cancelling scan");
                handle.cancel().await?;
            }
        }
    }
    handle.dispose().await?;
    if let Err(e) = task.await {
        error!("Session task failed: {}", e);
    }

    let results = drain(&mut results_rx);
    for result in &results {
        print_result(result, output.json);
    }
    if output.copy {
        copy_last(&results, notifier, &config);
    }
    Ok(!results.is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Some(Commands::Scan {
            paths,
            capture,
            no_recursive,
            max_depth,
            output,
        }) => run_scan(paths, capture, no_recursive, max_depth, output).await,
        Some(Commands::Camera {
            frames,
            fps,
            front,
            output,
        }) => run_camera(frames, fps, front, output).await,
        None => {
            println!("{}", ABOUT);
            println!("Use 'quickscan scan -h' or 'quickscan camera -h' for command help");
            return ExitCode::SUCCESS;
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
