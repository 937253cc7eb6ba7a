//! sessionkeep - command-line front-end for the session manager.
//!
//! Signs in, signs up, signs out and reports the persisted session, using
//! the same storage the mobile client would.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chrono::{DateTime, Utc};

use sessionkeep_core::{Config, SessionError, SessionManager, SessionState, User};

/// Environment variable naming a log file to write alongside stderr
const ENV_LOG_FILE: &str = "SESSIONKEEP_LOG_FILE";

/// Shown when a sign-in failure carries no message from the service
const SIGN_IN_FALLBACK: &str = "Unable to sign in. Please try again later.";

/// Shown when a sign-up failure carries no message from the service
const SIGN_UP_FALLBACK: &str = "Unable to create account. Please try again later.";

const USAGE: &str = "\
Usage: sessionkeep <command>

Commands:
  login [email]   Sign in and persist the session
  signup          Create an account and sign in
  logout          Sign out and erase the stored session
  whoami          Print the signed-in user
  status          Print the full session state
";

/// Initialize the tracing subscriber for logging.
/// The returned guard must be held until exit so buffered file logs flush.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_FILE) {
        Ok(path) if !path.is_empty() => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "sessionkeep.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// A parsed command line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login { email: Option<String> },
    Signup,
    Logout,
    WhoAmI,
    Status,
    Help,
}

impl Command {
    /// Parse the arguments after the program name.
    /// `Err` carries the text to print before the usage message.
    fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let Some(command) = args.first().map(String::as_str) else {
            return Err(String::new());
        };
        match command {
            "login" => Ok(Command::Login {
                email: args.get(1).cloned(),
            }),
            "signup" => Ok(Command::Signup),
            "logout" => Ok(Command::Logout),
            "whoami" => Ok(Command::WhoAmI),
            "status" => Ok(Command::Status),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => Err(format!("Unknown command: {}\n\n", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(Command::Help) => {
            print!("{}", USAGE);
            return Ok(ExitCode::SUCCESS);
        }
        Ok(command) => command,
        Err(prefix) => {
            eprint!("{}{}", prefix, USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let mut config = Config::load()?;
    config.apply_env_overrides()?;
    info!(
        api = %config.api_base_url,
        storage = ?config.storage,
        malformed_response = %config.malformed_response,
        "sessionkeep starting"
    );

    let manager = SessionManager::start(
        config.api_client()?,
        config.open_storage()?,
        config.malformed_response,
    )
    .await;
    let state = manager.wait_until_initialized().await;
    if let Some(ref err) = state.startup_error {
        eprintln!("Warning: could not restore saved session: {}", err);
    }

    match command {
        Command::Login { email } => login(&manager, &mut config, email).await?,
        Command::Signup => signup(&manager, &mut config).await?,
        Command::Logout => {
            manager.sign_out().await.context("Failed to erase stored session")?;
            println!("Signed out.");
        }
        Command::WhoAmI => match manager.current_user() {
            Some(user) => println!("{} <{}>", user.display_name(), user.email),
            None => println!("Not signed in."),
        },
        Command::Status => print_status(manager.api().base_url(), &manager.snapshot()),
        Command::Help => print!("{}", USAGE),
    }
    Ok(ExitCode::SUCCESS)
}

async fn login(manager: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    println!("\nSigning in...");
    let before = manager.snapshot().established_at;
    manager
        .sign_in(&email, &password)
        .await
        .map_err(|e| report(e, SIGN_IN_FALLBACK))?;

    match new_session(manager, before) {
        Some(user) => {
            remember_email(config, email);
            println!("Signed in as {}.", user.display_name());
        }
        None => println!("The service accepted the credentials but returned no session."),
    }
    Ok(())
}

async fn signup(manager: &SessionManager, config: &mut Config) -> Result<()> {
    let name = prompt("Name: ")?;
    let email = prompt("Email: ")?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;

    if name.is_empty() || email.is_empty() {
        bail!("Name and email required");
    }
    if password.len() < 6 {
        bail!("Password must be at least 6 characters");
    }
    if password != confirm {
        bail!("Passwords do not match");
    }

    println!("\nCreating account...");
    let before = manager.snapshot().established_at;
    manager
        .sign_up(&name, &email, &password)
        .await
        .map_err(|e| report(e, SIGN_UP_FALLBACK))?;

    match new_session(manager, before) {
        Some(user) => {
            remember_email(config, email);
            println!("Welcome, {}!", user.display_name());
        }
        None => println!("Account created, but the service returned no session. Try `sessionkeep login`."),
    }
    Ok(())
}

fn print_status(service: &str, state: &SessionState) {
    println!("Service:     {}", service);
    println!("Signed in:   {}", if state.is_authenticated() { "yes" } else { "no" });
    if let Some(ref user) = state.current_user {
        println!("User:        {} <{}>", user.display_name(), user.email);
        println!("User id:     {}", user.id);
        if let Some(ref avatar) = user.avatar {
            println!("Avatar:      {}", avatar);
        }
        if let Some(at) = state.established_at {
            println!("Restored at: {}", at.to_rfc3339());
        }
    }
    if let Some(ref err) = state.startup_error {
        println!("Startup:     {}", err);
    }
}

/// The user of a session established since `before`, if any
fn new_session(manager: &SessionManager, before: Option<DateTime<Utc>>) -> Option<User> {
    let state = manager.snapshot();
    if state.established_at != before {
        state.current_user
    } else {
        None
    }
}

/// Turn a session error into the message a user should see
fn report(err: SessionError, fallback: &str) -> anyhow::Error {
    tracing::error!(error = %err, "Session operation failed");
    anyhow::anyhow!(err.user_message(fallback))
}

fn remember_email(config: &mut Config, email: String) {
    config.last_email = Some(email);
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => {
            let input = prompt(&format!("Email [{}]: ", last))?;
            Ok(if input.is_empty() { last.to_string() } else { input })
        }
        None => prompt("Email: "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(&args(&["login", "ana@example.com"])),
            Ok(Command::Login {
                email: Some("ana@example.com".to_string())
            })
        );
        assert_eq!(Command::parse(&args(&["login"])), Ok(Command::Login { email: None }));
        assert_eq!(Command::parse(&args(&["logout"])), Ok(Command::Logout));
        assert_eq!(Command::parse(&args(&["--help"])), Ok(Command::Help));
    }

    #[test]
    fn test_parse_missing_or_unknown_command_is_usage_error() {
        // Both return an error instead of exiting so the log guard is dropped
        assert_eq!(Command::parse(&[]), Err(String::new()));
        let err = Command::parse(&args(&["reboot"])).expect_err("unknown command");
        assert!(err.starts_with("Unknown command: reboot"));
    }
}
