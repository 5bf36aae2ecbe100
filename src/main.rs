//! Command-line front end for the WebDAV client
//!
//! Usage: webdav-client [--url URL] [--username U] [--password P] <ls|get|put|rm> ...
//!
//! Connection settings fall back to WEBDAV_URL, WEBDAV_USERNAME, WEBDAV_PASSWORD
//! and WEBDAV_TIMEOUT_SECONDS (a `.env` file is honoured).

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use webdav_client::{ResourceEntry, ResourceType, WebDAVClient, WebDAVConfig, WebDAVError};

#[derive(Parser)]
#[command(name = "webdav-client")]
#[command(about = "List, download, upload and delete files on a WebDAV server")]
struct Args {
    /// Base URL of the WebDAV root (overrides WEBDAV_URL)
    #[arg(long)]
    url: Option<String>,

    /// Basic auth username (overrides WEBDAV_USERNAME)
    #[arg(short, long)]
    username: Option<String>,

    /// Basic auth password (overrides WEBDAV_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// Request timeout in seconds (overrides WEBDAV_TIMEOUT_SECONDS)
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a collection and its immediate children
    Ls {
        #[arg(default_value = "")]
        path: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download a remote file
    Get { remote: String, local: PathBuf },
    /// Upload a local file
    Put { remote: String, local: PathBuf },
    /// Delete a remote resource
    Rm { remote: String },
}

fn load_config(args: &Args) -> Result<WebDAVConfig> {
    let mut config = match &args.url {
        Some(url) => {
            let mut config = WebDAVConfig::new(url.clone());
            config.username = std::env::var("WEBDAV_USERNAME").ok();
            config.password = std::env::var("WEBDAV_PASSWORD").ok();
            config
        }
        None => WebDAVConfig::from_env().context("No --url given and WEBDAV_URL is not usable")?,
    };

    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_seconds = timeout;
    }

    config.validate()?;
    Ok(config)
}

fn print_listing(entries: &[ResourceEntry]) {
    for entry in entries {
        let kind = match entry.resource_type() {
            ResourceType::Folder => "d",
            ResourceType::File => "-",
        };
        println!(
            "{} {:>12} {:<31} {}",
            kind,
            entry.size(),
            entry.last_modified.as_deref().unwrap_or("-"),
            entry.name
        );
    }
}

async fn run(client: &WebDAVClient, command: Commands) -> Result<()> {
    match command {
        Commands::Ls { path, json } => {
            let entries = client.propfind(&path, None).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_listing(&entries);
            }
        }
        Commands::Get { remote, local } => {
            let written = client.get(&remote, &local, None).await?;
            info!("✅ Saved {}", written.display());
        }
        Commands::Put { remote, local } => {
            let status = client.put(&remote, &local, None).await?;
            if !status.is_success() {
                return Err(anyhow!("Upload of {} failed: HTTP {}", remote, status));
            }
            info!("✅ Uploaded {} (HTTP {})", remote, status.as_u16());
        }
        Commands::Rm { remote } => {
            let status = client.delete(&remote, None).await?;
            if !status.is_success() {
                return Err(anyhow!("Delete of {} failed: HTTP {}", remote, status));
            }
            info!("🗑️ Deleted {}", remote);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let client = WebDAVClient::new(config)?;

    let command = args.command;
    let result = run(&client, command).await;
    client.close();

    if let Err(e) = &result {
        match e.downcast_ref::<WebDAVError>() {
            Some(WebDAVError::Unauthorized { method, path, status, .. }) => {
                error!("❌ {} {} was rejected with HTTP {}; check credentials", method, path, status);
            }
            Some(WebDAVError::RemoteNotFound { path }) => {
                error!("❌ {} does not exist on the server", path);
            }
            _ => error!("❌ {:#}", e),
        }
    }
    result
}
