//! nutritrack - a command-line client for the nutritrack API.
//!
//! This binary is integration glue around `nutritrack-core`: it prompts for
//! credentials, keeps tokens in a file under the cache directory, and prints
//! fetched data. All authentication behavior lives in the core crate.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nutritrack_core::{AuthClient, AuthError, Config, FileTokenStore};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Set up logging with environment-based filter
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn print_usage() {
    eprintln!(
        "Usage: nutritrack <command>\n\n\
         Commands:\n\
         \x20 login [email]   Authenticate and store the session tokens\n\
         \x20 profile         Show the authenticated user's profile\n\
         \x20 get <url>       Authenticated GET; prints the JSON response\n\
         \x20 refresh         Renew the token pair now\n\
         \x20 logout          Drop the stored session tokens\n\
         \x20 status          Show server URL and session state"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("nutritrack client starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    let mut config = Config::load().context("Failed to load configuration")?;
    let client = build_client(&config)?;

    match command {
        "login" => login(&client, &mut config, args.get(2).map(String::as_str)).await,
        "profile" => profile(&client).await,
        "get" => {
            let url = args
                .get(2)
                .context("Usage: nutritrack get <url>")?;
            get(&client, url).await
        }
        "refresh" => refresh(&client).await,
        "logout" => logout(&client),
        "status" => status(&client, &config),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn build_client(config: &Config) -> Result<AuthClient> {
    let storage_dir = config
        .storage_dir()
        .context("Failed to determine token storage directory")?;

    let mut builder = AuthClient::builder()
        .base_url(config.base_url())
        .store(Arc::new(FileTokenStore::new(storage_dir)));

    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().context("Failed to build API client")
}

async fn login(client: &AuthClient, config: &mut Config, email_arg: Option<&str>) -> Result<()> {
    let email = match email_arg {
        Some(email) => email.to_string(),
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let outcome = client.login(&email, &password).await?;

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        // Losing the remembered email is not worth failing the login over
        eprintln!("Warning: could not save config: {}", e);
    }

    println!("Logged in as {}", outcome.user.display_name());
    Ok(())
}

async fn profile(client: &AuthClient) -> Result<()> {
    let user = client.fetch_profile().await.map_err(hint_on_expiry)?;

    println!("Name:  {}", user.display_name());
    if let Some(ref email) = user.email {
        println!("Email: {}", email);
    }
    if let Some(ref role) = user.role {
        println!("Role:  {}", role);
    }
    Ok(())
}

async fn get(client: &AuthClient, url: &str) -> Result<()> {
    let body = client
        .authenticated_request(url)
        .await
        .map_err(hint_on_expiry)?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn refresh(client: &AuthClient) -> Result<()> {
    if client.refresh().await? {
        println!("Token pair refreshed");
    } else {
        println!("Could not refresh - run 'nutritrack login' to start a new session");
    }
    Ok(())
}

fn logout(client: &AuthClient) -> Result<()> {
    client.logout()?;
    println!("Logged out");
    Ok(())
}

fn status(client: &AuthClient, config: &Config) -> Result<()> {
    println!("Server:        {}", client.base_url());
    if let Some(ref email) = config.last_email {
        println!("Last login:    {}", email);
    }
    println!(
        "Session:       {}",
        if client.is_authenticated() {
            "tokens stored"
        } else {
            "not logged in"
        }
    );
    Ok(())
}

/// The re-authentication signal deserves a hint; everything else surfaces as-is
fn hint_on_expiry(e: AuthError) -> anyhow::Error {
    match e {
        AuthError::SessionExpired | AuthError::NotAuthenticated => {
            eprintln!("Run 'nutritrack login' to start a new session.");
            e.into()
        }
        other => other.into(),
    }
}

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("Email [{}]: ", default),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        default
            .map(str::to_string)
            .context("Email is required")
    } else {
        Ok(input.to_string())
    }
}
