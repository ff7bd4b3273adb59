// paylink — operator CLI over the PayLink envelope codec
//
// Encodes messages for a terminal, decodes wire payloads, and manages the
// session keys and clock offset the codec needs.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use paylink_core::{
    EnvelopeCodec, Event, Message, Secrets, SuccessState, TerminalStatusRequest,
    TerminalStatusResponse,
};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paylink")]
#[command(about = "PayLink — POS ↔ terminal message envelopes", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh pair of session keys
    Keygen {
        /// Store the keys in the config file
        #[arg(long)]
        save: bool,
    },
    /// Encode a message for the wire
    Encode {
        /// Event name, e.g. `purchase` or `ping`
        event: String,
        /// JSON object for the message data
        #[arg(short, long, default_value = "{}")]
        data: String,
        /// Message id (generated when omitted)
        #[arg(short, long)]
        id: Option<String>,
        /// Send in plain form (pairing only)
        #[arg(long)]
        plain: bool,
    },
    /// Encode a terminal status request
    Status,
    /// Decode a wire payload (reads stdin when omitted)
    Decode { payload: Option<String> },
    /// Store the clock offset implied by a terminal's stamped message
    SyncClock { payload: Option<String> },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen { save } => cmd_keygen(&mut config, save),
        Commands::Encode { event, data, id, plain } => cmd_encode(&config, event, data, id, plain),
        Commands::Status => cmd_status(&config),
        Commands::Decode { payload } => cmd_decode(&config, payload),
        Commands::SyncClock { payload } => cmd_sync_clock(&mut config, payload),
        Commands::Config { action } => cmd_config(&mut config, action),
    }
}

fn cmd_keygen(config: &mut config::Config, save: bool) -> Result<()> {
    let secrets = Secrets::generate();
    let (enc_key, hmac_key) = secrets.to_hex();

    println!("{}", "Session keys".bold());
    println!("  enc_key:  {}", enc_key.bright_yellow());
    println!("  hmac_key: {}", hmac_key.bright_yellow());

    if save {
        config.set_secrets(&secrets)?;
        println!();
        println!("{} Saved to {}", "✓".green(), config.path().display());
    }

    Ok(())
}

fn cmd_encode(
    config: &config::Config,
    event: String,
    data: String,
    id: Option<String>,
    plain: bool,
) -> Result<()> {
    let data: serde_json::Value =
        serde_json::from_str(&data).context("--data must be valid JSON")?;
    let event = Event::from_wire(&event);
    let id = id.unwrap_or_else(|| paylink_core::request_id(&short_prefix(&event)));

    let mut message = Message::new(id, event, data, !plain);
    print_encoded(config, &mut message)
}

fn cmd_status(config: &config::Config) -> Result<()> {
    let mut message = TerminalStatusRequest.to_message();
    print_encoded(config, &mut message)
}

fn print_encoded(config: &config::Config, message: &mut Message) -> Result<()> {
    let stamp = if message.needs_encryption() {
        config.stamp()?
    } else {
        // Plain messages only need the sender id
        paylink_core::MessageStamp::new(
            config.pos_id.clone(),
            Secrets::new(Vec::new(), Vec::new()),
            config.server_time_delta,
        )
    };

    let wire = EnvelopeCodec::default()
        .encode(message, &stamp)
        .context("Failed to encode message")?;

    tracing::debug!("Encoded {} ({})", message.id, message.decrypted_json);
    println!("{}", wire);
    Ok(())
}

fn cmd_decode(config: &config::Config, payload: Option<String>) -> Result<()> {
    let message = decode_payload(config, payload)?;

    if message.is_sentinel() {
        println!("{} {}", "✗".red(), message.event.to_string().bright_red().bold());
        if let Some(raw) = message.data.get("msg").and_then(|v| v.as_str()) {
            println!("  Raw: {}", raw.dimmed());
        }
        return Ok(());
    }

    println!("{}", "Message".bold());
    println!("  Event:     {}", message.event.to_string().bright_cyan());
    println!("  Id:        {}", message.id);
    println!("  Sender:    {}", message.sender_id);
    println!("  Datetime:  {}", message.date_time_stamp);
    println!(
        "  Encrypted: {}",
        if message.needs_encryption() { "yes".green() } else { "no".yellow() }
    );

    match message.success_state() {
        SuccessState::Unknown => {}
        SuccessState::Success => println!("  Result:    {}", "success".green()),
        SuccessState::Failed => println!(
            "  Result:    {} ({})",
            "failed".red(),
            message.error().unwrap_or_default()
        ),
    }

    if message.event == Event::TerminalStatusResponse {
        let status = TerminalStatusResponse::new(message.clone());
        println!("  Status:    {}", status.status().unwrap_or("?"));
        if let Some(level) = status.battery_level() {
            println!("  Battery:   {}%{}", level, if status.is_charging() { " (charging)" } else { "" });
        }
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&message.data)?);
    Ok(())
}

fn cmd_sync_clock(config: &mut config::Config, payload: Option<String>) -> Result<()> {
    let message = decode_payload(config, payload)?;
    if message.is_sentinel() {
        anyhow::bail!("Cannot sync clock from a {} message", message.event);
    }

    let codec = EnvelopeCodec::default();
    let delta = message
        .try_server_time_delta(codec.clock())
        .with_context(|| format!("Unparsable datetime {:?}", message.date_time_stamp))?;

    config.set("server_time_delta", &delta.to_string())?;
    println!("{} server_time_delta = {} ms", "✓".green(), delta);
    Ok(())
}

fn cmd_config(config: &mut config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("{} Set {}", "✓".green(), key.bright_cyan());
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{} ({})", "Configuration".bold(), config.path().display());
            println!();

            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }
    }

    Ok(())
}

fn decode_payload(config: &config::Config, payload: Option<String>) -> Result<Message> {
    let text = match payload {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read payload from stdin")?;
            buf
        }
    };

    // Plain payloads decode without keys
    let secrets = config
        .secrets()
        .unwrap_or_else(|_| Secrets::new(Vec::new(), Vec::new()));

    EnvelopeCodec::default()
        .decode(text.trim(), &secrets)
        .context("Failed to decode payload")
}

/// Request id prefix: the event name without vowels, at most five chars.
fn short_prefix(event: &Event) -> String {
    event
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() && !"aeiou".contains(*c))
        .take(5)
        .collect()
}
