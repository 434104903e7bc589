//! # Campus Inventory console
//!
//! Entry point: parses the command line, loads the configuration, opens the
//! log file, asks for credentials and then hands control to the menu loop.
//!
//! Logging starts before anything can fail, so every fatal error ends up in
//! the log file with its context chain and a backtrace.

use std::backtrace::Backtrace;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use campus_inventory::clicommands::build_menu_registry;
use campus_inventory::cliconfig::{AppConfig, SessionContext, StorageKind};
use campus_inventory::console::{Console, TerminalConsole};
use campus_inventory::errors::LoginError;
use campus_inventory::execute::{run_session, SessionEnd};
use campus_inventory::logging::init_logging;
use campus_inventory::passwd::login;

/// Records and inspects the network devices of each campus.
#[derive(Parser, Debug)]
#[command(name = "campus-inventory", version, about)]
struct Args {
    /// JSON configuration file; missing means built-in defaults
    #[arg(short, long, default_value = "campus-inventory.json")]
    config: PathBuf,

    /// Inventory file used with JSON storage
    #[arg(short, long)]
    data_file: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum)]
    storage: Option<StorageKind>,

    /// Campus to open right after login
    #[arg(long)]
    campus: Option<String>,

    /// Log file; overrides the configured one
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let loaded = AppConfig::load(&args.config)
        .with_context(|| format!("loading configuration {}", args.config.display()));

    // A broken configuration still gets logged, to the default location.
    let log_file = args
        .log_file
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|config| config.log_file.clone()))
        .unwrap_or_else(|| AppConfig::default().log_file);
    let _guard = match init_logging(&log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        error!(%panic_info, %backtrace, "panic");
        eprintln!("Unexpected failure: {}", panic_info);
    }));

    match loaded.and_then(|config| run(args, config)) {
        Ok(code) => code,
        Err(e) => {
            report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_fatal(e: &anyhow::Error) {
    let backtrace = Backtrace::force_capture();
    error!(error = %format!("{:#}", e), chain = ?e, %backtrace, "fatal error");
    eprintln!("Error: {:#}", e);
}

fn run(args: Args, mut config: AppConfig) -> anyhow::Result<ExitCode> {
    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }
    if let Some(storage) = args.storage {
        config.storage = storage;
    }

    info!(storage = ?config.storage, data_file = %config.data_file.display(), "starting");

    let mut console = TerminalConsole::new(&config.history_file).context("initializing the console")?;
    let mut context = SessionContext::new(config);

    // Ctrl+C outside a prompt sends the session back to the main menu.
    let interrupted = Arc::clone(&context.interrupted);
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
    })
    .context("installing the Ctrl+C handler")?;

    console.say("Campus network device inventory");
    match login(&mut console, &context.config.users, context.config.max_login_attempts) {
        Ok(user) => context.user = Some(user),
        Err(LoginError::Aborted) => {
            info!("login aborted");
            return Ok(ExitCode::FAILURE);
        }
        Err(e @ LoginError::TooManyAttempts(_)) => {
            error!(error = %e, "login refused");
            return Ok(ExitCode::FAILURE);
        }
    }

    if let Some(campus) = args.campus {
        if !context.config.campuses.contains(&campus) {
            console.say(&format!("Unknown campus '{}', none selected.", campus));
        } else if let Some(e) = context.select_campus(&campus) {
            console.say(&format!("Warning: could not read the campus file ({}).", e));
        }
    }

    let registry = build_menu_registry();
    let end = run_session(&mut context, &mut console, &registry);
    console.save_history();

    match end {
        SessionEnd::Quit => console.say("Goodbye."),
        SessionEnd::InputClosed => console.say(""),
    }
    Ok(ExitCode::SUCCESS)
}
