use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use goalcam::{
    open_system_devices, waiting_backdrop, GoalcamConfig, LatestValueTelemetry, LoadingIndicator,
    SpinnerOverlay, VideoSink, VisionSystem,
};

#[derive(Parser, Debug)]
#[command(name = "goalcam")]
#[command(about = "Robot camera subsystem with HSV goal tracking, feed switching and MJPEG streaming")]
#[command(version)]
#[command(long_about = "Selects among the robot's two cameras, runs a color-segmentation \
pipeline on the front feed to locate the goal, exposes the goal position to the control \
loop, and streams a human-viewable MJPEG feed.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "goalcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Goalcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match GoalcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let cancel = CancellationToken::new();
    let telemetry = Arc::new(LatestValueTelemetry::new());

    let (sink, server_task) = build_sink(&config, Arc::clone(&telemetry), &cancel);

    let indicator: Arc<dyn LoadingIndicator> = Arc::new(SpinnerOverlay::new(
        Arc::clone(&sink),
        waiting_backdrop(&config.system),
    ));

    let (front, rear) = open_system_devices(&config.camera);

    let system = match VisionSystem::start(&config, front, rear, sink, telemetry, indicator) {
        Ok(system) => system,
        Err(e) => {
            // The subsystem stays absent for this process lifetime; there
            // is no construction retry.
            error!("Vision subsystem unavailable: {}", e);
            std::process::exit(1);
        }
    };

    info!("Goalcam running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    cancel.cancel();
    system.shutdown().await;
    if let Some(task) = server_task {
        let _ = task.await;
    }

    Ok(())
}

#[cfg(feature = "streaming")]
fn build_sink(
    config: &GoalcamConfig,
    telemetry: Arc<LatestValueTelemetry>,
    cancel: &CancellationToken,
) -> (Arc<dyn VideoSink>, Option<tokio::task::JoinHandle<()>>) {
    use goalcam::MjpegStreamServer;

    let server = Arc::new(MjpegStreamServer::new(&config.stream, telemetry));
    let server_task = {
        let server = Arc::clone(&server);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(cancel).await {
                error!("Stream server failed: {}", e);
            }
        })
    };

    let sink: Arc<dyn VideoSink> = server;
    (sink, Some(server_task))
}

#[cfg(not(feature = "streaming"))]
fn build_sink(
    _config: &GoalcamConfig,
    _telemetry: Arc<LatestValueTelemetry>,
    _cancel: &CancellationToken,
) -> (Arc<dyn VideoSink>, Option<tokio::task::JoinHandle<()>>) {
    info!("Streaming disabled; discarding published frames");
    let sink: Arc<dyn VideoSink> = Arc::new(goalcam::NullVideoSink);
    (sink, None)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("goalcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Goalcam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&GoalcamConfig::default())?);
    Ok(())
}
