// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, QueueCommands, TokenCommands};
use conduit_channels::ChannelBus;
use conduit_config::Config;
use conduit_core::SupervisorAgent;
use conduit_memory::MemorySystem;
use conduit_queue::{DeliveryHandler, DeliveryOutcome, DeliveryQueue, QueuedDelivery};
use conduit_session::SessionStore;
use conduit_tools::{MemoryNoteTool, TaskClearTool, TaskListTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = conduit_config::load(cli.config.as_deref())?;
            serve(config).await
        }
        Commands::ShowConfig => {
            let config = conduit_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Commands::Token { command } => match command {
            TokenCommands::Regenerate => {
                println!("{}", conduit_gateway::generate_token());
                println!("\nSet this as gateway.auth_token in your config, or export");
                println!("GATEWAY_AUTH_TOKEN before starting the gateway.");
                Ok(())
            }
        },
        Commands::Queue { command } => match command {
            QueueCommands::Inspect => {
                let config = conduit_config::load(cli.config.as_deref())?;
                queue_inspect(&config).await
            }
        },
    }
}

/// Read-only dump of the delivery queue's on-disk state: pending deliveries
/// due for another attempt, pending deliveries still waiting out their
/// backoff, and dead-lettered ones in `failed/`. Never starts the worker.
async fn queue_inspect(config: &Config) -> anyhow::Result<()> {
    let queue = DeliveryQueue::new(config.data_dir.join("delivery-queue"));
    queue.recover().await.context("recovering delivery queue for inspection")?;

    let pending = queue.load_pending().await?;
    let failed = queue.load_failed().await?;
    let now = chrono::Utc::now();
    let (due, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|d| d.due(now));

    println!("pending (due now): {}", due.len());
    for d in &due {
        println!(
            "  {}  channel={} to={} retry={}/{}",
            d.id, d.channel, d.to, d.retry_count, d.max_retries
        );
    }
    println!("pending (awaiting backoff): {}", waiting.len());
    for d in &waiting {
        println!(
            "  {}  channel={} to={} retry={}/{} next_retry_at={}",
            d.id, d.channel, d.to, d.retry_count, d.max_retries, d.next_retry_at
        );
    }
    println!("dead-lettered: {}", failed.len());
    for d in &failed {
        println!(
            "  {}  channel={} to={} retry={}/{} last_error={}",
            d.id,
            d.channel,
            d.to,
            d.retry_count,
            d.max_retries,
            d.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Build every long-lived component and run the gateway, the channel bus's
/// outbound delivery worker, and session archival side by side until the
/// process is asked to stop.
async fn serve(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let model: Arc<dyn conduit_model::ModelProvider> = Arc::from(conduit_model::from_config(&config.model)?);

    let note_buffer: conduit_tools::builtin::memory_note::NoteBuffer = Arc::new(Mutex::new(Vec::new()));
    let task_state: conduit_tools::builtin::task_list::TaskListState = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(MemoryNoteTool { buffer: note_buffer });
    registry.register(TaskListTool { state: task_state.clone() });
    registry.register(TaskClearTool { state: task_state });
    let tools = Arc::new(registry);

    let memory = Arc::new(MemorySystem::open(&config.data_dir, config.memory.clone())?);

    let sessions = Arc::new(
        SessionStore::open(
            config.data_dir.join("sessions"),
            config.agent.working_memory_max_tokens,
        )
        .await?,
    );

    let agent = Arc::new(SupervisorAgent::new(
        model,
        tools,
        memory,
        sessions.clone(),
        config.agent.clone(),
        conduit_core::DEFAULT_IDENTITY,
    ));

    let bus = Arc::new(ChannelBus::new(config.channels.clone()));

    let queue = Arc::new(
        DeliveryQueue::new(config.data_dir.join("delivery-queue"))
            .with_scan_interval(Duration::from_secs(config.queue.scan_interval_secs))
            .with_max_retries(config.queue.max_retries)
            .with_backoff_schedule_secs(
                config.queue.backoff_schedule_secs.iter().map(|&s| s as i64).collect(),
            ),
    );
    queue.recover().await.context("recovering delivery queue")?;

    let queue_worker = {
        let queue = queue.clone();
        let handler = BusDeliveryHandler { bus: bus.clone() };
        tokio::spawn(async move { queue.run_worker(&handler).await })
    };

    let archival_worker = {
        let sessions = sessions.clone();
        let archive_age_days = i64::from(config.session.archive_age_days);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.archive_old_sessions(archive_age_days).await {
                    tracing::warn!(error = %e, "session archival pass failed");
                }
            }
        })
    };

    let gateway = conduit_gateway::Gateway::new(config.gateway.clone(), agent, sessions);
    info!("conduit gateway starting");
    let result = gateway.serve().await;

    queue_worker.abort();
    archival_worker.abort();
    result
}

/// Forwards queued deliveries onto the channel bus's outbound topic.
///
/// The bus itself is a fire-and-forget pub/sub fanout with no delivery
/// confirmation - whether a message actually reaches a peer is up to
/// whichever channel adapter is subscribed. Queued deliveries are therefore
/// considered delivered as soon as they are handed to the bus; per-transport
/// retry (rate limits, transient network errors) belongs to the adapter, not
/// this core runtime.
struct BusDeliveryHandler {
    bus: Arc<ChannelBus>,
}

#[async_trait::async_trait]
impl DeliveryHandler for BusDeliveryHandler {
    async fn deliver(&self, delivery: &QueuedDelivery) -> DeliveryOutcome {
        self.bus.publish_outbound(conduit_channels::OutboundMessage::new(
            delivery.channel.clone(),
            delivery.to.clone(),
            delivery.text.clone(),
        ));
        DeliveryOutcome::Delivered
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
