//! MsgSync - realtime messaging synchronization engine
//!
//! CLI entry point for running the sync engine and inspecting the
//! messaging API.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use msgsync::cli::{Cli, Command, OutputFormat};
use msgsync::config::Config;
use msgsync::events::create_event_bus;
use msgsync::fetch::MessageApiClient;
use msgsync::state::{StateEvent, StateManager, spawn_event_pump};
use msgsync::sync::{ApiSyncHandler, SyncCoordinator, SyncSnapshot};
use msgsync::transport::{WsTransport, WsTransportConfig};
use msgcache::{ChatMessage, Conversation};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("msgsync")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{s}', defaulting to INFO");
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("msgsync.log")).context("Failed to create log file")?;

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

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { conversation } => cmd_run(&config, conversation).await,
        Command::Conversations { format } => cmd_conversations(&config, format).await,
        Command::Messages {
            conversation_id,
            limit,
            format,
        } => cmd_messages(&config, &conversation_id, limit, format).await,
    }
}

/// Run the sync engine in the foreground until Ctrl-C
async fn cmd_run(config: &Config, conversation: Option<String>) -> Result<()> {
    info!(?conversation, "cmd_run: starting sync engine");

    // Event bus and state actor
    let bus = create_event_bus(config.sync.event_channel_capacity);
    let state = StateManager::spawn();
    let pump = spawn_event_pump(bus.clone(), state.clone());

    // Push transport
    let token = std::env::var(&config.api.token_env).ok();
    let transport = WsTransport::spawn(
        WsTransportConfig {
            url: config.realtime.resolved_ws_url(&config.api.base_url),
            token,
            etab_id: config.realtime.etab_id.clone(),
            role: config.realtime.role.clone(),
            reconnect_initial_delay: Duration::from_millis(config.realtime.reconnect_initial_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.realtime.reconnect_max_delay_ms),
            max_reconnect_attempts: config.realtime.max_reconnect_attempts,
        },
        bus.clone(),
    )?;

    // Polling fallback
    let api = Arc::new(MessageApiClient::new(&config.api)?);
    let handler = Arc::new(ApiSyncHandler::new(api, state.clone()));
    let (active_tx, active_rx) = watch::channel(conversation);
    let (coordinator, snapshot_rx) = SyncCoordinator::new(
        transport.status(),
        active_rx,
        handler,
        Duration::from_millis(config.sync.poll_interval_ms),
    );
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let coordinator_task = tokio::spawn(coordinator.run(shutdown_rx));

    // Display loop
    let display = tokio::spawn(display_loop(state.clone(), snapshot_rx));

    println!("{}", "MsgSync running (Ctrl-C to stop)".bold());
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, shutting down");
    println!("\nShutting down...");

    // Orderly teardown: coordinator first so no refetch lands on a
    // stopped state actor, then transport, then state.
    let _ = shutdown_tx.send(()).await;
    if let Err(e) = coordinator_task.await {
        warn!(error = %e, "Coordinator task did not shut down cleanly");
    }
    transport.shutdown().await;
    state.shutdown().await;
    display.abort();
    pump.abort();
    drop(active_tx);

    println!("Stopped");
    Ok(())
}

/// Print state changes and sync status transitions as they happen
async fn display_loop(state: StateManager, mut snapshot_rx: watch::Receiver<SyncSnapshot>) {
    let mut events = state.subscribe_events();

    loop {
        tokio::select! {
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = *snapshot_rx.borrow_and_update();
                let mode = if snapshot.is_polling {
                    "polling".yellow()
                } else if snapshot.connection.is_connected() {
                    "live".green()
                } else {
                    "idle".dimmed()
                };
                println!("{} {} ({})", "sync".bold(), mode, snapshot.connection);
            }
            event = events.recv() => match event {
                Ok(event) => print_state_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    println!("{}", format!("... {n} events skipped").dimmed());
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

fn print_state_event(event: &StateEvent) {
    match event {
        StateEvent::MessageReceived { message } => {
            println!(
                "{} {} {}: {}",
                message.created_at.format("%H:%M:%S").to_string().dimmed(),
                format!("[{}]", message.conversation_id).cyan(),
                message.sender_id.bold(),
                message.content
            );
        }
        StateEvent::ConversationsReplaced { count } => {
            println!("{}", format!("refreshed {count} conversations").dimmed());
        }
        StateEvent::MessagesReplaced { conversation_id, count } => {
            println!("{}", format!("refreshed {count} messages in {conversation_id}").dimmed());
        }
        StateEvent::ConversationChanged { conversation_id } => {
            println!("{} {}", "conversation updated".magenta(), conversation_id);
        }
        StateEvent::TypingChanged { conversation_id } => {
            println!("{} {}", "typing".blue(), conversation_id);
        }
        StateEvent::PresenceChanged { user_id, status } => {
            println!("{} {} is {}", "presence".blue(), user_id.bold(), status_label(*status));
        }
    }
}

fn status_label(status: msgcache::PresenceStatus) -> colored::ColoredString {
    match status {
        msgcache::PresenceStatus::Online => "online".green(),
        msgcache::PresenceStatus::Away => "away".yellow(),
        msgcache::PresenceStatus::Offline => "offline".dimmed(),
    }
}

/// Fetch and display the conversation list
async fn cmd_conversations(config: &Config, format: OutputFormat) -> Result<()> {
    debug!("cmd_conversations: called");
    let api = MessageApiClient::new(&config.api)?;
    let conversations = api.list_conversations().await.context("Failed to fetch conversations")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&conversations)?);
        }
        OutputFormat::Table => print_conversations_table(&conversations),
    }
    Ok(())
}

fn print_conversations_table(conversations: &[Conversation]) {
    if conversations.is_empty() {
        println!("No conversations");
        return;
    }

    println!("{:<24} {:<6} {:<30} {:>6}  {}", "ID".bold(), "TYPE".bold(), "TITLE".bold(), "UNREAD".bold(), "LAST MESSAGE".bold());
    for conv in conversations {
        let kind = match conv.kind {
            msgcache::ConversationType::Dm => "DM",
            msgcache::ConversationType::Group => "GROUP",
        };
        let last = conv
            .last_message_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let unread = if conv.unread_count > 0 {
            conv.unread_count.to_string().yellow().to_string()
        } else {
            conv.unread_count.to_string()
        };
        println!(
            "{:<24} {:<6} {:<30} {:>6}  {}",
            conv.id,
            kind,
            conv.title.as_deref().unwrap_or("-"),
            unread,
            last
        );
    }
}

/// Fetch and display one conversation's messages
async fn cmd_messages(config: &Config, conversation_id: &str, limit: Option<u32>, format: OutputFormat) -> Result<()> {
    debug!(%conversation_id, ?limit, "cmd_messages: called");
    let api = MessageApiClient::new(&config.api)?;
    let messages = api
        .list_messages(conversation_id, limit)
        .await
        .context("Failed to fetch messages")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
        OutputFormat::Table => print_messages_table(&messages),
    }
    Ok(())
}

fn print_messages_table(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages");
        return;
    }

    for msg in messages {
        let content = if msg.deleted_at.is_some() {
            "(deleted)".dimmed().to_string()
        } else {
            msg.content.clone()
        };
        println!(
            "{} {}: {}",
            msg.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            msg.sender_id.bold(),
            content
        );
        for attachment in &msg.attachments {
            println!("    {} {} ({})", "attachment".blue(), attachment.filename, attachment.kind);
        }
    }
}
