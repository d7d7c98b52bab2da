//! ChannelBridge - reactive consumer bridge demo CLI
//!
//! CLI entry point for exercising bridges over each channel kind.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use channelbridge::cli::{Cli, Command, DemoKind, get_log_dir, get_log_path};
use channelbridge::config::Config;
use channelbridge::{
    BroadcastChannel, Channel, ChannelKind, DirectChannel, HandlerError, HandlerSubscriber, Lifecycle, Message,
    MessageChannel, MessageHandler, QueueChannel, ReactiveConsumer,
};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(get_log_path()).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Demo { kind, count, request } => cmd_demo(&config, kind, count, request).await,
        Command::Config => cmd_config(&config),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}

fn build_channel(config: &Config, kind: ChannelKind) -> Channel<String> {
    let name = format!("demo-{kind}");
    match kind {
        ChannelKind::Direct => Arc::new(DirectChannel::new(name)).into(),
        ChannelKind::Broadcast => Arc::new(BroadcastChannel::new(name, config.channels.broadcast_capacity)).into(),
        ChannelKind::Queue => Arc::new(QueueChannel::new(name, config.channels.queue_capacity)).into(),
    }
}

fn send(channel: &Channel<String>, payload: String) {
    match channel.send(Message::new(payload.clone())) {
        Ok(()) => println!("{} sent {}", "→".cyan(), payload),
        Err(e) => println!("{} {} not sent: {}", "✗".red(), payload, e.to_string().red()),
    }
}

/// Wait for `expected` deliveries, giving up after the receive timeout per message
async fn await_deliveries(rx: &mut mpsc::UnboundedReceiver<String>, expected: usize, timeout: Duration) -> usize {
    let mut received = 0;
    while received < expected {
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(payload)) => {
                println!("{} received {}", "✓".green(), payload);
                received += 1;
            }
            Ok(None) | Err(_) => break,
        }
    }
    received
}

async fn cmd_demo(config: &Config, kind: DemoKind, count: usize, request: Option<u64>) -> Result<()> {
    let kind = ChannelKind::from(kind);
    debug!(%kind, count, ?request, "cmd_demo: called");
    let timeout = config.channels.receive_timeout();

    let channel = build_channel(config, kind);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler: Arc<dyn MessageHandler<String>> = Arc::new(move |m: Message<String>| -> Result<(), HandlerError> {
        tx.send(m.into_payload()).map_err(|e| Box::new(e) as HandlerError)
    });
    let batch = request.or(config.consumer.request_batch);
    let subscriber = Arc::new(HandlerSubscriber::with_batch(handler, batch));
    let mut consumer = ReactiveConsumer::new(channel.clone(), subscriber);

    println!("{} {} bridge", "Starting".bold(), kind.to_string().yellow());
    consumer.initialize()?;
    consumer.start().await?;

    for i in 1..=count {
        send(&channel, format!("message-{i}"));
    }
    let mut delivered = await_deliveries(&mut rx, count, timeout).await;

    println!("{} bridge", "Stopping".bold());
    consumer.stop().await;
    send(&channel, "while-stopped".to_string());

    println!("{} bridge", "Restarting".bold());
    consumer.start().await?;
    send(&channel, "after-restart".to_string());
    // Direct channels reject sends while stopped; the others hold them for the restart
    let expected = if kind == ChannelKind::Direct { 1 } else { 2 };
    delivered += await_deliveries(&mut rx, expected, timeout).await;

    consumer.stop().await;
    println!("{} delivered {} messages", "Done:".bold(), delivered.to_string().green());
    info!(%kind, delivered, "cmd_demo: complete");
    Ok(())
}
