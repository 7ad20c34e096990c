//! presence - set Discord rich presence from the command line
//!
//! # Usage
//!
//! ```bash
//! # Show an activity until Ctrl-C
//! presence --client-id 1234567890 set --details "Compiling" --state "crate 3 of 40" --elapsed
//!
//! # Clear whatever is shown
//! presence clear
//!
//! # List the endpoints that would be probed
//! presence probe
//!
//! # With verbose logging
//! RUST_LOG=presence_core=trace presence set --details "Debugging"
//! ```
//!
//! # Environment Variables
//!
//! - `PRESENCE_CONFIG`: Configuration file (default `~/.config/presence/presence.toml`)
//! - `PRESENCE_CLIENT_ID`, `PRESENCE_IPC_PATH`, ...: see `presence_core::config`
//! - `RUST_LOG`: Log filter, overrides `-v`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use presence_core::{
    config, Activity, ActivityType, Assets, ClientConfig, ClientEvent, ConfigOverrides,
    DisconnectReason, Emoji, EndpointLocator, RichClient,
};

/// How long `clear` waits for the endpoint to confirm
const CLEAR_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Set or clear Discord rich presence
#[derive(Parser, Debug)]
#[command(name = "presence")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PRESENCE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Application id (overrides config and environment)
    #[arg(long, value_name = "ID")]
    client_id: Option<String>,

    /// Directory to probe for endpoints; repeat for several
    #[arg(long = "ipc-path", value_name = "DIR")]
    ipc_paths: Vec<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show an activity until interrupted
    Set(SetArgs),
    /// Clear the current activity
    Clear,
    /// List candidate endpoints and whether they exist
    Probe,
}

#[derive(ClapArgs, Debug, Default)]
struct SetArgs {
    /// Activity kind
    #[arg(long, value_enum, default_value_t = Kind::Game)]
    kind: Kind,

    /// First line of the activity
    #[arg(long)]
    details: Option<String>,

    /// Second line of the activity
    #[arg(long)]
    state: Option<String>,

    /// Stream URL shown with `--kind streaming`
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Emoji of a custom status (`--kind custom`)
    #[arg(long, value_name = "EMOJI")]
    emoji: Option<String>,

    /// Show elapsed time from now
    #[arg(long)]
    elapsed: bool,

    /// Large image key or URL
    #[arg(long, value_name = "KEY")]
    large_image: Option<String>,

    /// Hover text of the large image
    #[arg(long, value_name = "TEXT", requires = "large_image")]
    large_text: Option<String>,

    /// Small image key or URL
    #[arg(long, value_name = "KEY")]
    small_image: Option<String>,

    /// Hover text of the small image
    #[arg(long, value_name = "TEXT", requires = "small_image")]
    small_text: Option<String>,

    /// Link button as LABEL=URL; at most two
    #[arg(long = "button", value_name = "LABEL=URL", value_parser = parse_button)]
    buttons: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Kind {
    #[default]
    Game,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl From<Kind> for ActivityType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Game => Self::Game,
            Kind::Streaming => Self::Streaming,
            Kind::Listening => Self::Listening,
            Kind::Watching => Self::Watching,
            Kind::Custom => Self::Custom,
            Kind::Competing => Self::Competing,
        }
    }
}

fn parse_button(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((label, url)) if !label.is_empty() && !url.is_empty() => {
            Ok((label.to_string(), url.to_string()))
        }
        _ => Err(format!("expected LABEL=URL, got {value:?}")),
    }
}

fn build_activity(args: &SetArgs) -> Result<Activity> {
    let mut builder = Activity::builder().kind(args.kind.into());

    if let Some(details) = &args.details {
        builder = builder.details(details);
    }
    if let Some(state) = &args.state {
        builder = builder.state(state);
    }
    if let Some(url) = &args.url {
        if args.kind != Kind::Streaming {
            warn!("--url is only shown for streaming activities");
        }
        builder = builder.url(url);
    }
    if let Some(emoji) = &args.emoji {
        builder = builder.emoji(Emoji::new(emoji));
    }
    if args.elapsed {
        builder = builder.started_now();
    }
    if args.large_image.is_some() || args.small_image.is_some() {
        builder = builder.assets(Assets {
            large_image: args.large_image.clone(),
            large_text: args.large_text.clone(),
            small_image: args.small_image.clone(),
            small_text: args.small_text.clone(),
        });
    }
    for (label, url) in &args.buttons {
        builder = builder.button(label, url);
    }

    builder.build().context("Invalid activity")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("presence={level},presence_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_client_config(args: &Args) -> Result<ClientConfig> {
    let path = args.config.clone().or_else(config::default_config_path);
    let mut client_config = config::load_config_from_path(path).context("Failed to load config")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(id) = &args.client_id {
        overrides = overrides.with_client_id(id.clone());
    }
    if !args.ipc_paths.is_empty() {
        overrides = overrides.with_ipc_paths(args.ipc_paths.clone());
    }
    overrides.apply(&mut client_config);

    info!(source = %client_config.source(), "Configuration loaded");
    Ok(client_config)
}

async fn run_set(client: &RichClient, activity: Activity) -> Result<()> {
    let mut events = client.subscribe();
    client.connect().await.context("Failed to connect")?;
    client
        .update(Some(activity))
        .await
        .context("Failed to set activity")?;
    info!("Presence set, press Ctrl-C to clear");

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, clearing presence");
                break;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::Disconnected { reason: DisconnectReason::ClosedByPeer(detail) }) => {
                    anyhow::bail!("Discord closed the connection: {detail}");
                }
                Ok(event) => tracing::debug!(?event, "Client event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed client events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.shutdown().await;
    Ok(())
}

async fn run_clear(client: &RichClient) -> Result<()> {
    let mut events = client.subscribe();
    client.connect().await.context("Failed to connect")?;
    client.clear().await.context("Failed to clear activity")?;

    let acked = tokio::time::timeout(CLEAR_ACK_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::ActivityUpdated(_)) => return true,
                Ok(ClientEvent::Disconnected { .. }) | Err(RecvError::Closed) => return false,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    })
    .await
    .unwrap_or(false);

    if acked {
        info!("Presence cleared");
    } else {
        warn!("Clear sent but not confirmed");
    }
    client.shutdown().await;
    Ok(())
}

async fn run_probe(locator: &EndpointLocator) -> Result<()> {
    let mut found = false;
    for candidate in locator.candidates() {
        let exists = tokio::fs::try_exists(candidate.as_path())
            .await
            .unwrap_or(false);
        found |= exists;
        println!("{} {candidate}", if exists { "+" } else { "-" });
    }
    if !found {
        warn!("No presence endpoint found, is Discord running?");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let client_config = load_client_config(&args)?;

    match &args.command {
        Command::Probe => run_probe(&client_config.locator()).await,
        Command::Set(set_args) => {
            let activity = build_activity(set_args)?;
            run_set(&client_for(client_config)?, activity).await
        }
        Command::Clear => run_clear(&client_for(client_config)?).await,
    }
}

fn client_for(client_config: ClientConfig) -> Result<RichClient> {
    client_config.validate().context("Invalid configuration")?;
    Ok(RichClient::new(client_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_set_command() {
        let args = Args::parse_from([
            "presence",
            "--client-id",
            "42",
            "-vv",
            "set",
            "--kind",
            "listening",
            "--details",
            "Lo-fi",
            "--button",
            "Stream=https://example.com",
        ]);

        assert_eq!(args.client_id.as_deref(), Some("42"));
        assert_eq!(args.verbose, 2);
        let Command::Set(set) = args.command else {
            panic!("expected set");
        };
        assert_eq!(set.kind, Kind::Listening);
        assert_eq!(
            set.buttons,
            vec![("Stream".to_string(), "https://example.com".to_string())]
        );
    }

    #[test]
    fn test_parse_button_rejects_missing_url() {
        assert!(parse_button("label").is_err());
        assert!(parse_button("label=").is_err());
        assert_eq!(
            parse_button("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
    }

    #[test]
    fn test_build_activity() {
        let args = SetArgs {
            kind: Kind::Watching,
            details: Some("A film".to_string()),
            large_image: Some("poster".to_string()),
            ..SetArgs::default()
        };

        let activity = build_activity(&args).unwrap();
        assert_eq!(activity.kind, ActivityType::Watching);
        assert_eq!(activity.details.as_deref(), Some("A film"));
        let assets = activity.assets.unwrap();
        assert_eq!(assets.large_image.as_deref(), Some("poster"));
        assert!(assets.large_text.is_none());
    }

    #[test]
    fn test_build_activity_rejects_empty_details() {
        let args = SetArgs {
            details: Some(String::new()),
            ..SetArgs::default()
        };
        assert!(build_activity(&args).is_err());

        let args = SetArgs {
            details: Some("x".to_string()),
            ..SetArgs::default()
        };
        assert!(build_activity(&args).is_ok());
    }

    #[test]
    fn test_streaming_and_custom_flags() {
        let args = Args::parse_from([
            "presence",
            "set",
            "--kind",
            "streaming",
            "--details",
            "Speedrun",
            "--url",
            "https://twitch.tv/someone",
        ]);
        let Command::Set(set) = args.command else {
            panic!("expected set");
        };
        let activity = build_activity(&set).unwrap();
        assert_eq!(activity.kind, ActivityType::Streaming);
        assert_eq!(activity.url.as_deref(), Some("https://twitch.tv/someone"));

        let args = SetArgs {
            kind: Kind::Custom,
            state: Some("Out for lunch".to_string()),
            emoji: Some("🍜".to_string()),
            ..SetArgs::default()
        };
        let activity = build_activity(&args).unwrap();
        assert_eq!(activity.kind, ActivityType::Custom);
        assert_eq!(activity.emoji.map(|e| e.name).as_deref(), Some("🍜"));
    }
}
