//! # entigated: entigate daemon
//!
//! Composition root that wires the gateway core to its collaborators.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise tracing
//! - Build the domain registry from the built-in domains
//! - Construct the storage adapter, the envelope bus and the virtual plugin
//! - Construct the gateway service, injecting collaborators via port traits
//! - Pump plugin events into the gateway and log bus envelopes
//! - Optionally serve JSON-RPC on stdin/stdout
//! - Handle graceful shutdown (SIGINT), writing the storage snapshot
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It only wires; no domain logic belongs here.

mod config;
mod rpc;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use entigate_adapter_storage_memory::MemoryStorage;
use entigate_adapter_virtual::{VirtualPlugin, domains};
use entigate_app::event_bus::InProcessEventBus;
use entigate_app::registry::DomainRegistry;
use entigate_app::services::gateway_service::GatewayService;
use entigate_domain::event::{EntityEventEnvelope, InboundEvent};
use entigate_domain::id::{DeviceId, EntityId};

use crate::config::Config;

/// The gateway as wired by this daemon.
pub type Gateway = GatewayService<Arc<MemoryStorage>, Arc<VirtualPlugin>, Arc<InProcessEventBus>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    let storage = Arc::new(load_storage(config.storage.snapshot.as_deref())?);

    let mut registry = DomainRegistry::new();
    domains::register_builtin(&mut registry);
    tracing::info!(domains = registry.len(), "domain registry ready");

    let bus = Arc::new(InProcessEventBus::new(config.bus.capacity));
    let (plugin, events) = VirtualPlugin::new(config.integrations.virtual_plugin_id.as_str());
    let plugin = Arc::new(plugin);

    let gateway: Arc<Gateway> = Arc::new(GatewayService::new(
        Arc::new(registry),
        Arc::clone(&storage),
        Arc::clone(&plugin),
        Arc::clone(&bus),
    ));
    gateway.restore().await?;

    let bus_logger = tokio::spawn(log_envelopes(bus.subscribe()));
    tracing::debug!(subscribers = bus.subscriber_count(), "envelope bus ready");

    if config.integrations.virtual_enabled {
        start_virtual(&gateway, &plugin, events).await?;
    }
    if config.integrations.demo {
        run_demo(&gateway).await;
    }

    let rpc = config
        .rpc
        .stdio
        .then(|| tokio::spawn(rpc::serve_stdio(Arc::clone(&gateway))));

    tracing::info!("entigated running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    if let Some(rpc) = rpc {
        rpc.abort();
    }
    bus_logger.abort();

    if let Some(path) = &config.storage.snapshot {
        std::fs::write(path, storage.to_json()?)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_storage(snapshot: Option<&Path>) -> anyhow::Result<MemoryStorage> {
    let Some(path) = snapshot else {
        return Ok(MemoryStorage::new());
    };
    match std::fs::read_to_string(path) {
        Ok(json) => MemoryStorage::from_json(&json)
            .with_context(|| format!("failed to load snapshot {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(MemoryStorage::new()),
        Err(err) => Err(err).with_context(|| format!("failed to read snapshot {}", path.display())),
    }
}

/// Register the virtual plugin, report its devices and start pumping its
/// events into the gateway.
async fn start_virtual(
    gateway: &Arc<Gateway>,
    plugin: &VirtualPlugin,
    mut events: mpsc::UnboundedReceiver<InboundEvent>,
) -> anyhow::Result<()> {
    gateway.register_plugin(plugin.registration())?;
    for discovered in plugin.discover()? {
        gateway.report_device(discovered.device).await?;
        for entity in discovered.entities {
            gateway.report_entity(entity).await?;
        }
    }

    let pump = Arc::clone(gateway);
    let plugin_id = plugin.plugin_id().clone();
    tokio::spawn(async move {
        while let Some(inbound) = events.recv().await {
            if let Err(err) = pump.ingest_event(plugin_id.clone(), inbound).await {
                tracing::warn!(error = %err, "virtual event rejected");
            }
        }
    });

    plugin.report_all()?;
    Ok(())
}

async fn run_demo(gateway: &Gateway) {
    let result = gateway
        .send_command(
            DeviceId::from("virtual-light"),
            EntityId::from("light.virtual_light"),
            json!({"on": true, "brightness": 128}),
        )
        .await;
    match result {
        Ok(command) => tracing::info!(command_id = %command.id, "demo command sent"),
        Err(err) => tracing::warn!(error = %err, "demo command failed"),
    }
}

async fn log_envelopes(mut rx: broadcast::Receiver<EntityEventEnvelope>) {
    loop {
        match rx.recv().await {
            Ok(envelope) => tracing::info!(
                event_id = %envelope.event_id,
                entity_id = %envelope.entity_id,
                entity_type = %envelope.entity_type,
                payload = %envelope.payload,
                "entity event"
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "envelope logger lagging");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
