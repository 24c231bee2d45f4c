use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;

use grip::config::{GripConfig, load_config, parse_grip_uri};
use grip::format::{HttpStreamFormat, Item};
use grip::publish::Publisher;
use grip::websocket::{control_message, decode_events};

#[derive(Parser)]
#[command(name = "gripctl")]
#[command(about = "Inspect WebSocket-over-HTTP bodies and publish to a GRIP proxy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a WebSocket-over-HTTP body and print its events
    Decode(DecodeArgs),

    /// Print a WebSocket control message
    Control(ControlArgs),

    /// Publish one http-stream item and wait for the result
    Publish(PublishArgs),

    /// Check a Grip-Sig token against a key
    ValidateSig(ValidateSigArgs),
}

#[derive(Parser)]
struct DecodeArgs {
    /// File holding the body (reads stdin when omitted)
    file: Option<PathBuf>,
}

#[derive(Parser)]
struct ControlArgs {
    /// Message type, e.g. subscribe
    kind: String,

    /// Extra string fields as KEY=VALUE
    fields: Vec<String>,
}

#[derive(Parser)]
struct PublishArgs {
    #[arg(short, long)]
    channel: String,

    /// Content to publish
    #[arg(short, long, conflicts_with = "close")]
    text: Option<String>,

    /// Publish a close action instead of content
    #[arg(long)]
    close: bool,

    /// GRIP URI, repeatable; overrides the config file
    #[arg(long)]
    uri: Vec<String>,

    /// TOML config file (GRIP_* env vars also apply)
    #[arg(long, default_value = "grip.toml")]
    config: PathBuf,
}

#[derive(Parser)]
struct ValidateSigArgs {
    #[arg(long)]
    token: String,

    #[arg(long)]
    key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "grip=debug,info"
    } else {
        "grip=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    match cli.command {
        Commands::Decode(args) => decode_command(args),
        Commands::Control(args) => control_command(args),
        Commands::Publish(args) => publish_command(args).await,
        Commands::ValidateSig(args) => validate_sig_command(args),
    }
}

fn decode_command(args: DecodeArgs) -> Result<()> {
    let body = match &args.file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    for event in decode_events(&body)? {
        match &event.content {
            Some(content) => println!(
                "{} {} {:?}",
                event.kind,
                content.len(),
                String::from_utf8_lossy(content)
            ),
            None => println!("{}", event.kind),
        }
    }
    Ok(())
}

fn control_command(args: ControlArgs) -> Result<()> {
    let mut fields = serde_json::Map::new();
    for field in &args.fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("expected KEY=VALUE, got {:?}", field);
        };
        fields.insert(key.to_string(), value.into());
    }
    let args_map = (!fields.is_empty()).then_some(&fields);
    println!("{}", control_message(&args.kind, args_map));
    Ok(())
}

async fn publish_command(args: PublishArgs) -> Result<()> {
    let endpoints: Vec<GripConfig> = if args.uri.is_empty() {
        vec![
            GripConfig::from_figment(&load_config(&args.config))
                .with_context(|| format!("Failed to load {}", args.config.display()))?,
        ]
    } else {
        args.uri
            .iter()
            .map(|uri| parse_grip_uri(uri))
            .collect::<Result<_, _>>()?
    };

    let format = match (&args.text, args.close) {
        (_, true) => HttpStreamFormat::Close,
        (Some(text), false) => HttpStreamFormat::content(text.as_bytes()),
        (None, false) => bail!("either --text or --close is required"),
    };

    let publisher = Publisher::new(endpoints);
    publisher
        .publish_blocking(&args.channel, Item::new(format))
        .await
        .with_context(|| format!("Failed to publish to {}", args.channel))?;
    for endpoint in publisher.endpoints() {
        info!("published to {} on {}", args.channel, endpoint.control_uri);
    }
    Ok(())
}

fn validate_sig_command(args: ValidateSigArgs) -> Result<()> {
    if grip::validate_sig(&args.token, args.key.as_bytes()) {
        println!("valid");
        Ok(())
    } else {
        bail!("invalid signature")
    }
}
