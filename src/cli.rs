// ABOUTME: Command line interface for podbridge
// Turns flags or a page address into a session identity and endpoint

use crate::config::Config;
use crate::identity::{
    self, AddressFields, AddressStyle, IdentityError, PageAddress, SessionIdentity, SessionMode,
};
use crate::terminal::Endpoint;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "podbridge",
    version,
    about = "Attach to a container's log stream or shell over WebSocket"
)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host[:port], overrides config and page address
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Connect with wss
    #[arg(long, global = true)]
    pub secure: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream a container's logs (receive-only)
    Logs(LogsArgs),
    /// Open an interactive shell in a container
    Shell(ShellArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    #[arg(short, long)]
    pub namespace: Option<String>,

    #[arg(short, long)]
    pub pod: Option<String>,

    #[arg(short, long)]
    pub container: Option<String>,

    /// Page address carrying the coordinates, e.g. `http://host/logs?pod=..&container=..`
    #[arg(long)]
    pub address: Option<String>,

    /// How the page address carries coordinates (default from config)
    #[arg(long, value_enum)]
    pub address_style: Option<AddressStyle>,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Number of trailing lines, or `all`
    #[arg(long)]
    pub tail: Option<String>,

    /// Keep streaming new lines (`true` or `false`)
    #[arg(long)]
    pub follow: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShellArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl Cli {
    pub const fn mode(&self) -> SessionMode {
        match self.command {
            Command::Logs(_) => SessionMode::Logs,
            Command::Shell(_) => SessionMode::Shell,
        }
    }

    const fn target(&self) -> &TargetArgs {
        match &self.command {
            Command::Logs(args) => &args.target,
            Command::Shell(args) => &args.target,
        }
    }

    /// Identity input surface: page address fields overlaid with explicit flags
    pub fn page(&self, config: &Config) -> Result<PageAddress, IdentityError> {
        let target = self.target();
        let mut page = match &target.address {
            Some(address) => target
                .address_style
                .unwrap_or(config.address_style)
                .parser()
                .parse(address)?,
            None => PageAddress::default(),
        };

        let mut flags: Vec<(&str, Option<&String>)> = vec![
            ("namespace", target.namespace.as_ref()),
            ("pod", target.pod.as_ref()),
            ("container", target.container.as_ref()),
        ];
        if let Command::Logs(args) = &self.command {
            flags.push(("tail", args.tail.as_ref()));
            flags.push(("follow", args.follow.as_ref()));
        }
        overlay(&mut page.fields, &flags);
        Ok(page)
    }

    /// Resolve the session identity and the endpoint to connect to.
    /// Nothing here touches the network.
    pub fn resolve(&self, config: &Config) -> Result<(SessionIdentity, Endpoint), IdentityError> {
        let page = self.page(config)?;
        let identity = identity::resolve(&page.fields, self.mode())?;

        let endpoint = match (&self.host, page.host) {
            (Some(host), _) => Endpoint::new(host.as_str(), self.secure || config.secure),
            (None, Some(host)) => Endpoint::new(host, self.secure || page.secure),
            (None, None) => Endpoint::new(config.host.as_str(), self.secure || config.secure),
        };
        Ok((identity, endpoint))
    }
}

fn overlay(fields: &mut AddressFields, flags: &[(&str, Option<&String>)]) {
    for (key, value) in flags {
        if let Some(value) = value {
            fields.insert((*key).to_string(), (*value).clone());
        }
    }
}
