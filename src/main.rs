use anyhow::Result;
use clap::Parser;
use doorsnap::{DoorsnapConfig, DoorsnapOrchestrator};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "doorsnap")]
#[command(about = "Door sensor driven photo capture and delivery")]
#[command(version)]
#[command(long_about = "Watches a door contact on a GPIO pin, captures still photos while the \
door is open and shortly after it closes, and delivers them over a messaging transport. \
Replies to an inbound trigger word with a fresh photo.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "doorsnap.toml", help = "Path to TOML configuration file")]
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

    /// Dry run mode - build and probe components but don't start them
    #[arg(long, help = "Build components and probe camera and GPIO, then exit")]
    dry_run: bool,

    /// Drive the door contact from the keyboard instead of GPIO
    #[arg(long, help = "Simulate the door sensor: SPACE toggles, 'c' captures, 'q' quits")]
    simulate: bool,

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

    info!("Starting doorsnap v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match DoorsnapConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) if args.validate_config => {
            info!("Configuration validation successful");
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    let orchestrator = if args.simulate {
        DoorsnapOrchestrator::simulated(config).await
    } else {
        DoorsnapOrchestrator::new(config).await
    };
    let mut orchestrator = orchestrator.map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    if args.dry_run {
        orchestrator.probe().await.map_err(|e| {
            error!("Dry run failed: {}", e);
            e
        })?;
        info!("Dry run mode - components probed but not started");
        println!("✓ Dry run completed successfully - camera and GPIO are usable");
        return Ok(());
    }

    if let Err(e) = orchestrator.start().await {
        error!("Failed to start system: {}", e);
        // Leave the terminal and transport in a sane state before exiting
        let _ = orchestrator.shutdown().await;
        return Err(e.into());
    }

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("doorsnap exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

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
        .unwrap_or_else(|_| EnvFilter::new(format!("doorsnap={}", log_level)));

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
    println!("# doorsnap configuration file");
    println!("# Every key is optional; environment variables override it, e.g.");
    println!("# DOORSNAP_TRANSPORT__BOT_TOKEN=123:abc");
    println!();
    println!("{}", toml::to_string_pretty(&DoorsnapConfig::default())?);
    Ok(())
}
