//! fresh - personal Gmail triage and password CLI
//!
//! Authorizes against Gmail with a pasted OAuth2 code, dumps unread inbox mail
//! and optionally archives or labels it.

mod api;
mod auth;
mod config;
mod error;
mod models;
mod password;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{LinkShortener, UnreadOptions};
use auth::{AuthorizationFlow, StdinReader, TokenStatus};
use config::Config;
use password::Generator;

#[derive(Parser)]
#[command(name = "fresh")]
#[command(about = "Triage unread Gmail and generate passwords", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to OAuth 2.0 token JSON
    #[arg(short, long, global = true, value_name = "PATH")]
    token: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize with Gmail, prompting for a code if no tokens are stored
    Login,

    /// Remove stored tokens
    Logout,

    /// Show stored token status
    Status,

    /// Print unread inbox messages
    Unread {
        /// Archive the messages after printing them
        #[arg(short, long)]
        archive: bool,

        /// Apply a hidden label, created if missing
        #[arg(short, long, value_name = "NAME")]
        label: Option<String>,

        /// One line per message instead of JSON
        #[arg(short, long)]
        summary: bool,
    },

    /// Shorten a URL with the configured shortener
    Shorten {
        url: String,
    },

    /// Generate a random password
    Password {
        /// Number of characters
        #[arg(short, long, default_value = "50")]
        length: usize,

        #[arg(short, long, value_enum, default_value_t = Kind::Base64)]
        kind: Kind,

        /// Character repeated by `--kind char`
        #[arg(long, default_value = "a")]
        fill: char,

        /// String repeated by `--kind str`
        #[arg(
            long,
            value_name = "STRING",
            default_value = "password",
            value_parser = clap::builder::NonEmptyStringValueParser::new()
        )]
        fill_str: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Base64,
    Hex,
    Printable,
    Char,
    Str,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ref token) = cli.token {
        config.token_path = Some(token.clone());
    }
    Ok(config)
}

fn build_flow(config: &Config) -> Result<AuthorizationFlow<StdinReader>> {
    let credentials = config.credentials()?;
    let http = reqwest::Client::new();

    let mut flow = AuthorizationFlow::new(
        &credentials,
        config.token_store()?,
        StdinReader::new(),
        http.clone(),
        &config.endpoints.api_base,
    )?;
    if let Some(ref shortener) = config.shortener {
        flow = flow.with_shortener(LinkShortener::new(
            http,
            &shortener.endpoint,
            &shortener.api_key,
        ));
    }
    Ok(flow)
}

fn print_status(path: &std::path::Path, status: &TokenStatus) {
    println!("Token file:  {}", path.display());
    match status {
        TokenStatus::Missing => {
            println!("Tokens:      none");
            println!("\nRun 'fresh login' to authenticate.");
        }
        TokenStatus::Present {
            expired,
            expires_at,
            has_refresh_token,
        } => {
            println!(
                "Access tok:  {}",
                if *expired { "expired" } else { "valid" }
            );
            if let Some(exp) = expires_at {
                println!("  expires_at: {}", exp);
            }
            println!(
                "Refresh tok: {}",
                if *has_refresh_token { "present" } else { "none" }
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match &cli.command {
        Commands::Password {
            length,
            kind,
            fill,
            fill_str,
        } => {
            let length = *length;
            let password = match kind {
                Kind::Base64 => password::Base64.generate(length),
                Kind::Hex => password::Hex.generate(length),
                Kind::Printable => password::Printable.generate(length),
                Kind::Char => password::Char(*fill).generate(length),
                Kind::Str => password::Str(fill_str.clone()).generate(length),
            };
            println!("{}", password);
        }
        Commands::Login => {
            let config = load_config(&cli)?;
            let mut flow = build_flow(&config)?;
            flow.authorize().await.context("Authorization failed")?;
            println!("Login successful. Tokens saved to {}", flow.store().path().display());
        }
        Commands::Logout => {
            let config = load_config(&cli)?;
            let store = config.token_store()?;
            auth::oauth::deauthorize(&store).await?;
            println!("Logged out.");
        }
        Commands::Status => {
            let config = load_config(&cli)?;
            let store = config.token_store()?;
            let status = auth::oauth::token_status(&store).await?;
            print_status(store.path(), &status);
        }
        Commands::Unread {
            archive,
            label,
            summary,
        } => {
            let config = load_config(&cli)?;
            let client = build_flow(&config)?
                .authorize()
                .await
                .context("Authorization failed")?;
            let options = UnreadOptions {
                archive: *archive,
                label: label.clone(),
                summary: *summary,
            };
            api::unread(&client, &options).await?;
        }
        Commands::Shorten { url } => {
            let config = load_config(&cli)?;
            let settings = config
                .shortener
                .context("No [shortener] section in the config file")?;
            let shortener =
                LinkShortener::new(reqwest::Client::new(), settings.endpoint, settings.api_key);
            println!("{}", shortener.shorten(url).await?);
        }
    }

    Ok(())
}
