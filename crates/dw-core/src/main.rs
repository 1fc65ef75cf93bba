//! Docker Watcher - policy-driven garbage collector for Docker.
//!
//! The main entry point handles:
//! - Flag and config file resolution
//! - Runtime connectivity check
//! - The watch loop and one-shot status/config commands

use clap::{Args, Parser, Subcommand};
use dw_common::OutputFormat;
use dw_config::{load_config, ConfigError, ConfigOptions, Overrides, ResolvedConfig};
use dw_core::cycle::{CollectionCycle, SystemClock, ThreadSleeper, WatchOptions, Watcher};
use dw_core::exit_codes::ExitCode;
use dw_core::log_event;
use dw_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    Stage,
};
use dw_core::runtime::{DockerEngine, Runtime, RuntimeError};
use dw_core::status::fetch_status_report;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

/// Docker Watcher - removes stale containers and images on an interval
#[derive(Parser)]
#[command(name = "docker-watcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to a docker-watcher.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seconds an unreferenced image must age before removal [default: 259200]
    #[arg(long, global = true, alias = "imageLifetime", env = "DW_IMAGE_LIFETIME")]
    image_lifetime: Option<u64>,

    /// Seconds since a container finished before removal [default: 259200]
    #[arg(
        long,
        global = true,
        alias = "containerLifetime",
        env = "DW_CONTAINER_LIFETIME"
    )]
    container_lifetime: Option<u64>,

    /// Protect images by exact repo:tag or bare repository (repeatable)
    #[arg(long = "keep-image", global = true, alias = "keepImage")]
    keep_images: Vec<String>,

    /// Protect containers by name (repeatable)
    #[arg(long = "keep-container", global = true, alias = "keepContainer")]
    keep_containers: Vec<String>,

    /// Seconds to sleep between passes [default: 3600]
    #[arg(long, global = true, alias = "watchInterval", env = "DW_WATCH_INTERVAL")]
    watch_interval: Option<u64>,

    /// Engine endpoint, e.g. unix:///var/run/docker.sock [default: $DOCKER_HOST or the local socket]
    #[arg(long, global = true, env = "DW_DOCKER_HOST")]
    docker_host: Option<String>,

    /// Timeout for each engine API call in seconds [default: 60]
    #[arg(long, global = true)]
    call_timeout: Option<u64>,

    /// Evaluate and log, but never remove anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Skip the daemon status report around passes
    #[arg(long, global = true)]
    no_status_report: bool,

    /// Output format for reports printed on stdout
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error, off); overrides DW_LOG and RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run collection passes on an interval (default)
    Watch(WatchArgs),

    /// Resolve, validate and print the effective configuration
    CheckConfig,

    /// Print one daemon status report
    Status,
}

#[derive(Args, Debug, Default)]
struct WatchArgs {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Stop after this many passes
    #[arg(long, conflicts_with = "once")]
    max_passes: Option<u64>,
}

fn main() {
    let cli = Cli::parse();

    let verbosity = if cli.global.quiet {
        Some(LevelFilter::ERROR)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LevelFilter::DEBUG),
            _ => Some(LevelFilter::TRACE),
        }
    };
    let log_config = LogConfig::from_env(cli.global.log_level.or(verbosity), cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let resolved = match load_config(&config_options(&cli.global)) {
        Ok(resolved) => resolved,
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                err.to_string()
            );
            eprintln!("docker-watcher: {}", err);
            std::process::exit(config_exit_code(&err).as_i32());
        }
    };
    log_event!(
        ctx,
        INFO,
        event_names::CONFIG_LOADED,
        Stage::Init,
        format!("configuration loaded from {}", resolved.source),
        path = resolved.snapshot.path.as_deref().unwrap_or("-"),
        file_hash = resolved.snapshot.file_hash.as_deref().unwrap_or("-"),
        effective_hash = resolved.snapshot.effective_hash.as_str()
    );

    let exit_code = match cli.command {
        Some(Commands::CheckConfig) => run_check_config(&cli.global, &resolved),
        Some(Commands::Status) => run_status(&cli.global, &resolved, &ctx),
        Some(Commands::Watch(args)) => run_watch(&cli.global, &args, &resolved, &ctx),
        None => run_watch(&cli.global, &WatchArgs::default(), &resolved, &ctx),
    };

    std::process::exit(exit_code.as_i32());
}

fn config_options(global: &GlobalOpts) -> ConfigOptions {
    ConfigOptions {
        config_path: global.config.clone(),
        overrides: Overrides {
            image_lifetime_secs: global.image_lifetime,
            container_lifetime_secs: global.container_lifetime,
            keep_images: global.keep_images.clone(),
            keep_containers: global.keep_containers.clone(),
            interval_secs: global.watch_interval,
            call_timeout_secs: global.call_timeout,
            docker_host: global.docker_host.clone(),
            status_report: global.no_status_report.then_some(false),
            dry_run: global.dry_run.then_some(true),
        },
    }
}

fn config_exit_code(err: &ConfigError) -> ExitCode {
    match err {
        ConfigError::IoError { .. } => ExitCode::IoError,
        _ => ExitCode::ArgsError,
    }
}

fn runtime_exit_code(err: &RuntimeError) -> ExitCode {
    ExitCode::from(&dw_common::Error::from(err.clone()))
}

fn connect(resolved: &ResolvedConfig, ctx: &LogContext) -> Result<DockerEngine, ExitCode> {
    let watch = &resolved.config.watch;
    DockerEngine::connect(
        watch.docker_host.as_deref(),
        Duration::from_secs(watch.call_timeout_secs),
    )
    .map_err(|err| {
        log_event!(
            ctx,
            ERROR,
            event_names::RUN_FINISHED,
            Stage::Init,
            format!("cannot reach the docker daemon: {}", err)
        );
        eprintln!("docker-watcher: {}", err);
        runtime_exit_code(&err)
    })
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_check_config(global: &GlobalOpts, resolved: &ResolvedConfig) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "config": resolved.config,
                "snapshot": resolved.snapshot,
            });
            match serde_json::to_string_pretty(&doc) {
                Ok(text) => println!("{}", text),
                Err(err) => {
                    eprintln!("docker-watcher: {}", err);
                    return ExitCode::IoError;
                }
            }
        }
        OutputFormat::Summary => {
            let retention = &resolved.config.retention;
            println!(
                "config ok: source={} image_lifetime={}s container_lifetime={}s keep_images={} keep_containers={}",
                resolved.source,
                retention.image_lifetime_secs,
                retention.container_lifetime_secs,
                retention.keep_images.len(),
                retention.keep_containers.len()
            );
        }
        OutputFormat::Human => {
            let config = &resolved.config;
            println!("Configuration OK");
            match &resolved.path {
                Some(path) => println!("  source:             {} ({})", resolved.source, path.display()),
                None => println!("  source:             {}", resolved.source),
            }
            println!("  image lifetime:     {}s", config.retention.image_lifetime_secs);
            println!("  container lifetime: {}s", config.retention.container_lifetime_secs);
            println!("  keep images:        {}", list_or_none(&config.retention.keep_images));
            println!("  keep containers:    {}", list_or_none(&config.retention.keep_containers));
            println!("  watch interval:     {}s", config.watch.interval_secs);
            println!("  call timeout:       {}s", config.watch.call_timeout_secs);
            println!(
                "  docker host:        {}",
                config.watch.docker_host.as_deref().unwrap_or("(DOCKER_HOST or local socket)")
            );
            println!("  status report:      {}", config.watch.status_report);
            println!("  dry run:            {}", config.watch.dry_run);
        }
    }
    ExitCode::Clean
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn run_status(global: &GlobalOpts, resolved: &ResolvedConfig, ctx: &LogContext) -> ExitCode {
    let runtime = match connect(resolved, ctx) {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };
    let result = match global.format {
        OutputFormat::Json => runtime.status().and_then(|status| {
            serde_json::to_string_pretty(&status)
                .map_err(|e| RuntimeError::Parse(e.to_string()))
        }),
        OutputFormat::Summary => runtime.status().map(|s| {
            format!(
                "docker {} containers={} running={} images={}",
                s.server_version, s.containers, s.containers_running, s.images
            )
        }),
        OutputFormat::Human => fetch_status_report(&runtime),
    };
    match result {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::STATUS_UNAVAILABLE,
                Stage::Report,
                format!("status report unavailable: {}", err)
            );
            eprintln!("docker-watcher: {}", err);
            runtime_exit_code(&err)
        }
    }
}

fn run_watch(
    global: &GlobalOpts,
    args: &WatchArgs,
    resolved: &ResolvedConfig,
    ctx: &LogContext,
) -> ExitCode {
    let runtime = match connect(resolved, ctx) {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };
    let config = &resolved.config;

    // Startup check: the only runtime failure allowed to end the process.
    match runtime.status() {
        Ok(status) => log_event!(
            ctx,
            INFO,
            event_names::RUN_STARTED,
            Stage::Init,
            format!(
                "connected to docker {} (API {})",
                status.server_version, status.api_version
            ),
            dry_run = config.watch.dry_run,
            interval_secs = config.watch.interval_secs
        ),
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::RUN_FINISHED,
                Stage::Init,
                format!("cannot reach the docker daemon: {}", err)
            );
            eprintln!("docker-watcher: {}", err);
            return runtime_exit_code(&err);
        }
    }

    let max_passes = if args.once { Some(1) } else { args.max_passes };
    let options = WatchOptions {
        interval: Duration::from_secs(config.watch.interval_secs),
        max_passes,
        status_report: config.watch.status_report,
    };

    let cycle = CollectionCycle::new(&runtime, &config.retention, ctx)
        .with_dry_run(config.watch.dry_run);
    let clock = SystemClock;
    let sleeper = ThreadSleeper;
    let mut watcher = Watcher::new(cycle, &runtime, ctx, &clock, &sleeper, options);
    let stats = watcher.run().clone();

    let exit_code = ExitCode::from_last_pass(stats.last_pass.as_ref());
    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Watch,
        format!("finished after {} pass(es): {}", stats.passes_started(), exit_code),
        passes_completed = stats.passes_completed,
        passes_aborted = stats.passes_aborted
    );

    match global.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&stats) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("docker-watcher: {}", err),
        },
        OutputFormat::Summary => println!(
            "passes={} aborted={} containers_removed={} images_removed={} failures={}",
            stats.passes_completed,
            stats.passes_aborted,
            stats.containers_removed,
            stats.images_removed,
            stats.removal_failures
        ),
        OutputFormat::Human => {}
    }
    exit_code
}

