//! CLI module for the oracle console
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `devices` - List, add and remove monitored devices
//! - `settings` - Show or change global server settings
//! - `login` / `logout` - Session management
//! - `watch` - Live monitoring console
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Log in and keep the token for later commands
//! export ORACLE_TOKEN=$(oracle login --name admin --password secret)
//!
//! # Live view of device reachability
//! oracle --url http://oracle.lan:8080 watch
//! ```

pub mod completions;
pub mod config;
pub mod devices;
pub mod output;
pub mod session;
pub mod settings;
pub mod watch;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::api::ConsoleClient;
use crate::config::ConsoleConfig;
use crate::session::{ChannelNavigator, CredentialStore, RequestGuard};
use clap::{Args, Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Oracle - device reachability console
#[derive(Parser, Debug)]
#[command(
    name = "oracle",
    version,
    about = "Monitoring console for the oracle device reachability server"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "oracle.toml")]
    pub config: PathBuf,

    /// Override the server base URL
    #[arg(short, long, global = true, env = "ORACLE_URL")]
    pub url: Option<String>,

    /// Session token sent as a Bearer credential
    #[arg(short, long, global = true, env = "ORACLE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "ORACLE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage monitored devices
    #[command(subcommand)]
    Devices(DevicesCommands),
    /// Show or change server settings
    #[command(subcommand)]
    Settings(SettingsCommands),
    /// Log in and print the session token
    Login(LoginArgs),
    /// End the session
    Logout,
    /// Live monitoring console
    Watch(WatchArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Subcommand, Debug)]
pub enum DevicesCommands {
    /// List devices
    List(DevicesListArgs),
    /// Add a device
    Add(DevicesAddArgs),
    /// Remove a device
    Remove(DevicesRemoveArgs),
}

#[derive(Args, Debug)]
pub struct DevicesListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Wait for the first status update and include reachability
    #[arg(short, long)]
    pub status: bool,
}

#[derive(Args, Debug)]
pub struct DevicesAddArgs {
    /// Display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// IPv4 address to ping
    #[arg(short, long)]
    pub ipv4: Option<Ipv4Addr>,

    /// Also poll the device over SNMP
    #[arg(long)]
    pub snmp: bool,

    /// SNMP community string
    #[arg(long, requires = "snmp")]
    pub community: Option<String>,
}

#[derive(Args, Debug)]
pub struct DevicesRemoveArgs {
    /// Device id
    pub id: u32,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings
    Show(SettingsShowArgs),
    /// Change settings
    Set(SettingsSetArgs),
}

#[derive(Args, Debug)]
pub struct SettingsShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("changes").required(true).multiple(true))]
pub struct SettingsSetArgs {
    /// Port of the server's web interface
    #[arg(long, group = "changes")]
    pub web_port: Option<u16>,

    /// Seconds between pings
    #[arg(long, group = "changes")]
    pub ping_interval: Option<u32>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// User name
    #[arg(short, long)]
    pub name: String,

    /// Password (read from stdin when omitted)
    #[arg(short, long, env = "ORACLE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Do not subscribe to the server log
    #[arg(long)]
    pub no_log: bool,

    /// Number of log lines to show
    #[arg(long, default_value = "10")]
    pub log_lines: usize,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "oracle.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load configuration with CLI overrides
pub fn load_config(global: &GlobalArgs) -> Result<ConsoleConfig, Box<dyn std::error::Error>> {
    let mut config = if global.config.exists() {
        ConsoleConfig::load(Some(&global.config))?
    } else {
        ConsoleConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(ref url) = global.url {
        config.server.base_url = url.clone();
    }
    if let Some(ref log_level) = global.log_level {
        config.logging.level = log_level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Everything a networked command needs.
pub struct ConsoleContext {
    pub config: ConsoleConfig,
    pub client: Arc<ConsoleClient>,
    /// Routes requested by the request guard; `/login` means the session ended
    pub navigation: mpsc::UnboundedReceiver<String>,
}

/// Build the client, credential store and guard for one invocation.
pub fn connect(
    global: &GlobalArgs,
    config: ConsoleConfig,
) -> Result<ConsoleContext, Box<dyn std::error::Error>> {
    let credentials = match global.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => CredentialStore::with_token(token),
        _ => CredentialStore::new(),
    };
    let (navigator, navigation) = ChannelNavigator::new();
    let guard = RequestGuard::new(credentials, Arc::new(navigator));
    let client = ConsoleClient::new(
        &config.server.base_url,
        config.server.request_timeout(),
        guard,
    )?;

    Ok(ConsoleContext {
        config,
        client: Arc::new(client),
        navigation,
    })
}
