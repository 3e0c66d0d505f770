//! Pipeliner command-line runner
//!
//! Runs one pipeline through the full session lifecycle and prints what the
//! UI side would see.
//!
//! Usage:
//!   pipeliner [OPTIONS]
//!
//! Options:
//!   --pipeline <desc>     Launch description to run (overrides config)
//!   --saved <name>        Run a pipeline from the saved library by name
//!   --headless            Use the dry-run engine instead of GStreamer
//!   --seconds <n>         How long to run before shutting down (default 10)
//!   --config <path>       Config file (default: user config dir)
//!   --list                List saved pipelines and exit
//!   --verbose             Extra debug output

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use pipeliner_lib::config::{default_config_path, Config};
use pipeliner_lib::library::{templates, PipelineLibrary, SortOrder, StatusTracker};
use pipeliner_lib::notify::notification_channel;
use pipeliner_lib::poller::ErrorPoller;
use pipeliner_lib::{DisplaySurface, Notification, PipelineHost, SessionOptions};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let headless = args.iter().any(|a| a == "--headless");
    let list_only = args.iter().any(|a| a == "--list");
    let seconds: u64 = match flag_value(args, "--seconds") {
        Some(s) => s.parse().context("--seconds expects a whole number")?,
        None => 10,
    };

    let config_path = flag_value(args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path);
    log::debug!("Config loaded from {}", config_path.display());

    let library = PipelineLibrary::open(&config.library_dir, config.backup_dir.as_deref())
        .context("Failed to open pipeline library")?;
    templates::load_defaults_if_empty(&library)?;
    let status = StatusTracker::new(&config.library_dir);

    if list_only {
        let items = library.sorted(SortOrder::Recent)?;
        println!("\n  Saved pipelines ({}):", items.len());
        for item in &items {
            let marker = if status.is_active(&item.id) { ">" } else { " " };
            let star = if item.is_favorite { "*" } else { " " };
            println!("  {}{} [{:<7}] {}", marker, star, item.category(), item.name);
            println!("        {}", item.pipeline);
        }
        return Ok(());
    }

    let host = Arc::new(PipelineHost::new(
        pipeliner_lib::default_engine(headless),
        SessionOptions::from_config(&config),
    ));

    let description = if let Some(name) = flag_value(args, "--saved") {
        let item = library
            .load()?
            .into_iter()
            .find(|item| item.name == name)
            .with_context(|| format!("No saved pipeline named '{}'", name))?;
        let item = library.touch(&item.id)?;
        status.set_active(&item.id)?;
        Some(item.pipeline)
    } else {
        flag_value(args, "--pipeline")
            .map(str::to_string)
            .or_else(|| config.pipeline.clone())
    };
    if let Some(description) = description {
        host.set_pipeline(&description);
    }

    let (ui, notifications) = notification_channel();
    host.init(ui).context("Failed to start pipeline worker")?;

    // The dry-run engine has no real window; a stand-in lets the readiness path run
    if headless {
        host.surface_init(DisplaySurface::unmanaged(0x1));
    }

    let poll_host = host.clone();
    let mut poller = ErrorPoller::spawn(
        config.error_poll_interval(),
        move || poll_host.get_error(),
        |error| println!("  [poll] {}", error),
    )?;

    println!("\n=== Pipeliner ({}s) ===\n", seconds);
    let deadline = Instant::now() + Duration::from_secs(seconds);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match notifications.recv_timeout(remaining) {
            Ok(Notification::Message(text)) => println!("  {}", text),
            Ok(Notification::Initialized) => println!("  Display ready"),
            // Also delivered as Message
            Ok(Notification::Error(_)) | Ok(Notification::StateChanged(_)) => {}
            Err(_) => break,
        }
    }

    poller.stop();
    host.surface_finalize();
    host.finalize();
    println!("\n  Done.");
    Ok(())
}
