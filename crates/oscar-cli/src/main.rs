//! OSCAR CLI - Command-line tool for OSC packets
//!
//! Decode packets to JSON, encode messages from typed arguments, test
//! address patterns and route packets through a dispatcher.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use oscar_core::{
    Argument, Codec, CodecConfig, Color, Message, MidiMessage, Packet, Selector, TimeTag,
    TypeRegistry,
};
use oscar_dispatch::{listener_fn, Dispatcher, DispatcherConfig, Receiver};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// OSCAR - Open Sound Control packet tool
#[derive(Parser)]
#[command(name = "oscar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "OSCAR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a packet and print it as JSON
    Decode {
        /// Packet bytes as hex (whitespace allowed)
        hex: Option<String>,

        /// Read raw packet bytes from a file instead
        #[arg(short, long, conflicts_with = "hex")]
        file: Option<PathBuf>,

        /// Compact single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Encode a message and print it as hex
    Encode {
        /// Message address
        address: String,

        /// Arguments as `tag:value` (i:1 u:7 f:2.5 s:text h:9 d:1.5 S:sym c:x
        /// b:cafe t:now m:0,144,60,100 r:255,0,0,255) or bare T F N I;
        /// untyped values are inferred
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Wrap the message in a bundle due this many milliseconds from now
        #[arg(long)]
        bundle_in: Option<u64>,
    },

    /// Test an address pattern against addresses
    Match {
        /// Address pattern
        pattern: String,

        /// Addresses to test
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Route hex packets through a dispatcher and print matching messages
    Route {
        /// Address pattern to listen on
        #[arg(short, long, default_value = "//")]
        pattern: String,

        /// Optional type-tag pattern the message must also match
        #[arg(short, long)]
        type_tags: Option<String>,

        /// Packets as hex
        #[arg(required = true)]
        packets: Vec<String>,

        /// Milliseconds to wait for deferred bundles before exiting
        #[arg(short, long, default_value = "0")]
        wait_ms: u64,
    },
}

/// Configuration file contents
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CliConfig {
    codec: CodecConfig,
    dispatcher: DispatcherConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CliConfig::default(),
    };
    debug!("Using config: {:?}", config);

    match cli.command {
        Commands::Decode { hex, file, compact } => {
            let codec = Codec::with_config(TypeRegistry::standard(), config.codec);
            let data = match (hex, file) {
                (Some(hex), _) => parse_hex(&hex)?,
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("provide packet hex or --file"),
            };
            let packet = codec.parse(&data)?;
            let json = if compact {
                serde_json::to_string(&packet)?
            } else {
                serde_json::to_string_pretty(&packet)?
            };
            println!("{}", json);
        }

        Commands::Encode {
            address,
            args,
            bundle_in,
        } => {
            let codec = Codec::with_config(TypeRegistry::standard(), config.codec);
            let arguments = args
                .iter()
                .map(|arg| parse_argument(arg))
                .collect::<Result<Vec<_>>>()?;
            let message = Message::with_arguments(address, arguments);
            let packet = match bundle_in {
                Some(ms) => {
                    let timetag = TimeTag::after(Duration::from_millis(ms))
                        .with_context(|| format!("bundle delay of {} ms is out of range", ms))?;
                    info!("Bundling for {}", timetag);
                    Packet::from(oscar_core::Bundle::new(timetag).packet(message))
                }
                None => Packet::from(message),
            };
            let bytes = codec.serialize(&packet)?;
            println!("{}", hex::encode(&bytes));
        }

        Commands::Match { pattern, addresses } => {
            let selector = Selector::address(pattern.as_str());
            let mut matched = 0;
            for address in &addresses {
                if oscar_core::MessageSelector::matches(&selector, &Message::new(address.as_str())) {
                    matched += 1;
                    println!("{} {}", "MATCH".green().bold(), address);
                } else {
                    println!("{} {}", "miss ".dimmed(), address);
                }
            }
            info!("{} of {} addresses matched {}", matched, addresses.len(), pattern);
        }

        Commands::Route {
            pattern,
            type_tags,
            packets,
            wait_ms,
        } => {
            run_route(config, &pattern, type_tags.as_deref(), &packets, wait_ms)?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<CliConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn run_route(
    config: CliConfig,
    pattern: &str,
    type_tags: Option<&str>,
    packets: &[String],
    wait_ms: u64,
) -> Result<()> {
    let registry = Arc::new(TypeRegistry::standard());
    let dispatcher = Arc::new(Dispatcher::with_registry(config.dispatcher, registry.clone()));
    let receiver = Receiver::with_config(registry, config.codec);

    let selector = match type_tags {
        Some(tags) => Selector::address(pattern).and(Selector::type_tags(tags)),
        None => Selector::address(pattern),
    };
    dispatcher.add_listener(
        selector,
        listener_fn(|event| {
            println!(
                "{} {} {}",
                event.time.to_string().cyan(),
                event.message.address.bold(),
                serde_json::to_string(event.message.arguments()).unwrap_or_default()
            );
        }),
    );
    dispatcher.add_bad_data_listener(Arc::new(|event: &oscar_dispatch::BadDataEvent| {
        println!("{} {}", "BAD".red().bold(), event.error);
    }));
    receiver.add_listener(dispatcher.clone());

    for hex in packets {
        let data = parse_hex(hex)?;
        // Parse failures were already reported through the bad-data path
        let _ = receiver.receive(&data, None);
    }

    if dispatcher.pending_bundles() > 0 {
        if wait_ms == 0 {
            warn!(
                "{} deferred bundles discarded, use --wait-ms to wait for them",
                dispatcher.pending_bundles()
            );
        } else {
            std::thread::sleep(Duration::from_millis(wait_ms));
        }
    }

    Ok(())
}

// ============================================================================
// Argument and hex parsing
// ============================================================================

fn parse_argument(text: &str) -> Result<Argument> {
    match text {
        "T" | "true" => return Ok(Argument::Bool(true)),
        "F" | "false" => return Ok(Argument::Bool(false)),
        "N" | "nil" => return Ok(Argument::Nil),
        "I" | "impulse" => return Ok(Argument::Impulse),
        _ => {}
    }

    let Some((tag, value)) = text.split_once(':').filter(|(tag, _)| tag.chars().count() == 1)
    else {
        return Ok(infer_argument(text));
    };

    let argument = match tag {
        "i" => Argument::Int(value.parse().context("invalid int32")?),
        "f" => Argument::Float(value.parse().context("invalid float32")?),
        "u" => Argument::Unsigned(value.parse().context("invalid uint32")?),
        "h" => Argument::Long(value.parse().context("invalid int64")?),
        "d" => Argument::Double(value.parse().context("invalid float64")?),
        "s" => Argument::String(value.to_string()),
        "S" => Argument::Symbol(value.to_string()),
        "b" => Argument::Blob(parse_hex(value)?.into()),
        "c" => match value.as_bytes() {
            [c] if c.is_ascii() => Argument::Char(*c),
            _ => bail!("char argument must be a single ASCII character"),
        },
        "t" => match value {
            "now" => Argument::TimeTag(TimeTag::now()),
            "immediate" => Argument::TimeTag(TimeTag::IMMEDIATE),
            raw => Argument::TimeTag(TimeTag::from_raw(raw.parse().context("invalid time tag")?)),
        },
        "m" => {
            let [port, status, data1, data2] = parse_quad(value)?;
            Argument::Midi(MidiMessage::new(port, status, data1, data2))
        }
        "r" => {
            let [red, green, blue, alpha] = parse_quad(value)?;
            Argument::Color(Color::new(red, green, blue, alpha))
        }
        _ => return Ok(infer_argument(text)),
    };
    Ok(argument)
}

fn infer_argument(text: &str) -> Argument {
    if let Ok(int) = text.parse::<i32>() {
        Argument::Int(int)
    } else if let Ok(float) = text.parse::<f32>() {
        Argument::Float(float)
    } else {
        Argument::String(text.to_string())
    }
}

fn parse_quad(text: &str) -> Result<[u8; 4]> {
    let bytes = text
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("expected four comma-separated bytes")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected four comma-separated bytes"))
}

/// Decode hex digits, ignoring whitespace and an optional `0x` prefix
fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex input {:?}", digits))
}
