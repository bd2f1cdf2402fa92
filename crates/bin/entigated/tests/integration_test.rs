//! End-to-end tests for the full entigated stack.
//!
//! Each test wires the complete gateway (built-in domains, real core, memory
//! storage, envelope bus, virtual plugin) and drives it the way the daemon
//! does. Plugin events are pumped into the gateway explicitly so every step
//! is deterministic.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use entigate_adapter_storage_memory::MemoryStorage;
use entigate_adapter_virtual::{DEFAULT_PLUGIN_ID, VirtualPlugin, domains};
use entigate_app::event_bus::InProcessEventBus;
use entigate_app::ports::CommandRepository;
use entigate_app::registry::DomainRegistry;
use entigate_app::services::gateway_service::GatewayService;
use entigate_domain::command::CommandState;
use entigate_domain::entity::SyncStatus;
use entigate_domain::error::GatewayError;
use entigate_domain::event::InboundEvent;
use entigate_domain::id::{DeviceId, EntityId};
use entigate_domain::search::SearchQuery;
use entigate_domain::transport::{Request, codes};

type Gateway = GatewayService<Arc<MemoryStorage>, Arc<VirtualPlugin>, Arc<InProcessEventBus>>;

struct Stack {
    gateway: Gateway,
    storage: Arc<MemoryStorage>,
    plugin: Arc<VirtualPlugin>,
    bus: Arc<InProcessEventBus>,
    events: mpsc::UnboundedReceiver<InboundEvent>,
}

impl Stack {
    /// Feed every queued plugin event into the gateway.
    async fn pump(&mut self) -> usize {
        let mut count = 0;
        while let Ok(inbound) = self.events.try_recv() {
            self.gateway
                .ingest_event(self.plugin.plugin_id().clone(), inbound)
                .await
                .unwrap();
            count += 1;
        }
        count
    }
}

fn registry() -> Arc<DomainRegistry> {
    let mut registry = DomainRegistry::new();
    domains::register_builtin(&mut registry);
    Arc::new(registry)
}

async fn stack_with(storage: Arc<MemoryStorage>) -> Stack {
    let bus = Arc::new(InProcessEventBus::new(64));
    let (plugin, events) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
    let plugin = Arc::new(plugin);

    let gateway = GatewayService::new(
        registry(),
        Arc::clone(&storage),
        Arc::clone(&plugin),
        Arc::clone(&bus),
    );
    gateway.restore().await.unwrap();
    gateway.register_plugin(plugin.registration()).unwrap();
    for discovered in plugin.discover().unwrap() {
        gateway.report_device(discovered.device).await.unwrap();
        for entity in discovered.entities {
            gateway.report_entity(entity).await.unwrap();
        }
    }

    Stack {
        gateway,
        storage,
        plugin,
        bus,
        events,
    }
}

async fn stack() -> Stack {
    stack_with(Arc::new(MemoryStorage::new())).await
}

fn light() -> (DeviceId, EntityId) {
    (
        DeviceId::from("virtual-light"),
        EntityId::from("light.virtual_light"),
    )
}

// ---------------------------------------------------------------------------
// Command lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_resolve_command_when_plugin_reports_state() {
    let mut stack = stack().await;
    let mut rx = stack.bus.subscribe();
    let (device_id, entity_id) = light();

    let command = stack
        .gateway
        .send_command(device_id, entity_id.clone(), json!({"on": true}))
        .await
        .unwrap();

    let entity = stack.gateway.store().get_entity(&entity_id).unwrap();
    assert_eq!(entity.data.sync_status, SyncStatus::Pending);
    assert_eq!(entity.data.last_command_id, Some(command.id));
    assert_eq!(
        stack.gateway.commands().status(command.id).unwrap().state,
        CommandState::Pending
    );

    assert_eq!(stack.pump().await, 1);

    let entity = stack.gateway.store().get_entity(&entity_id).unwrap();
    assert_eq!(entity.data.sync_status, SyncStatus::InSync);
    assert_eq!(
        entity.data.effective,
        Some(json!({"on": true, "brightness": 255}))
    );
    assert_eq!(
        stack.gateway.commands().status(command.id).unwrap().state,
        CommandState::Succeeded
    );

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.entity_type, "light");
    assert_eq!(envelope.correlation_id, Some(command.id));

    let stored = stack.storage.get_status(command.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CommandState::Succeeded);
}

#[tokio::test]
async fn should_not_record_command_for_missing_entity() {
    let stack = stack().await;

    let result = stack
        .gateway
        .send_command(
            DeviceId::from("virtual-light"),
            EntityId::from("missing"),
            json!({"on": true}),
        )
        .await;

    assert!(matches!(result, Err(GatewayError::UnknownEntity(_))));
    let snapshot = stack.storage.snapshot();
    assert!(snapshot.commands.is_empty());
    assert!(snapshot.statuses.is_empty());
    assert!(stack.gateway.commands().pending().is_empty());
}

#[tokio::test]
async fn should_keep_first_failure_reason() {
    let mut stack = stack().await;
    let (device_id, entity_id) = light();
    let command = stack
        .gateway
        .send_command(device_id, entity_id.clone(), json!({"on": true}))
        .await
        .unwrap();

    let first = stack
        .gateway
        .fail_command(command.id, "timeout".to_string())
        .await
        .unwrap();
    let second = stack
        .gateway
        .fail_command(command.id, "device busy".to_string())
        .await
        .unwrap();

    assert_eq!(first.state, CommandState::Failed);
    assert_eq!(second.state, CommandState::Failed);
    assert_eq!(second.error.as_deref(), Some("timeout"));

    // A late correlated event updates state but never revives the command.
    stack.pump().await;
    let status = stack.gateway.commands().status(command.id).unwrap();
    assert_eq!(status.state, CommandState::Failed);
    assert_eq!(status.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn should_fail_command_when_plugin_is_offline() {
    let mut stack = stack().await;
    stack.plugin.set_offline(true);
    let (device_id, entity_id) = light();

    let result = stack
        .gateway
        .send_command(device_id, entity_id.clone(), json!({"on": true}))
        .await;
    assert!(matches!(result, Err(GatewayError::Collaborator(_))));

    let entity = stack.gateway.store().get_entity(&entity_id).unwrap();
    assert_eq!(entity.data.sync_status, SyncStatus::Error);

    let snapshot = stack.storage.snapshot();
    assert_eq!(snapshot.statuses.len(), 1);
    assert_eq!(snapshot.statuses[0].state, CommandState::Failed);
    assert_eq!(
        snapshot.statuses[0].error.as_deref(),
        Some("collaborator error: plugin is offline")
    );
    assert_eq!(stack.pump().await, 0);
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_reject_commands_for_read_only_sensor() {
    let stack = stack().await;

    let result = stack
        .gateway
        .send_command(
            DeviceId::from("virtual-sensor"),
            EntityId::from("sensor.virtual_temperature"),
            json!({"temperature": 30}),
        )
        .await;

    match result {
        Err(GatewayError::InvalidPayload { domain, reason }) => {
            assert_eq!(domain, "sensor");
            assert_eq!(reason, "sensor is read-only");
        }
        other => panic!("expected invalid payload, got {other:?}"),
    }
    assert!(stack.storage.snapshot().commands.is_empty());
}

#[tokio::test]
async fn should_track_uncorrelated_sensor_readings() {
    let mut stack = stack().await;
    let mut rx = stack.bus.subscribe();

    stack.plugin.report_temperature(18.5).unwrap();
    assert_eq!(stack.pump().await, 1);

    let entity = stack
        .gateway
        .store()
        .get_entity(&EntityId::from("sensor.virtual_temperature"))
        .unwrap();
    assert_eq!(entity.data.reported.as_ref().unwrap()["temperature"], 18.5);
    assert_eq!(entity.data.sync_status, SyncStatus::InSync);

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.entity_type, "sensor");
    assert!(envelope.correlation_id.is_none());
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_drive_command_through_json_rpc() {
    let mut stack = stack().await;

    let response = stack
        .gateway
        .handle_request(Request::new(
            1,
            "command.send",
            json!({
                "device_id": "virtual-switch",
                "entity_id": "switch.virtual_switch",
                "payload": {"on": true},
            }),
        ))
        .await
        .unwrap();
    assert!(response.is_success());
    let command_id = response.result.unwrap()["id"].clone();

    stack.pump().await;

    let response = stack
        .gateway
        .handle_request(Request::new(
            2,
            "command.status",
            json!({"command_id": command_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.id, json!(2));
    assert_eq!(response.result.unwrap()["state"], "succeeded");

    let response = stack
        .gateway
        .handle_request(Request::new(
            3,
            "entity.get",
            json!({"entity_id": "switch.virtual_switch"}),
        ))
        .await
        .unwrap();
    let entity = response.result.unwrap();
    assert_eq!(entity["data"]["sync_status"], "in_sync");
    assert_eq!(entity["data"]["reported"], json!({"on": true}));
}

#[tokio::test]
async fn should_map_errors_to_json_rpc_codes() {
    let stack = stack().await;

    let response = stack
        .gateway
        .handle_request(Request::new(
            1,
            "command.send",
            json!({
                "device_id": "virtual-light",
                "entity_id": "light.virtual_light",
                "payload": {"brightness": 999},
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, codes::INVALID_PAYLOAD);

    let response = stack
        .gateway
        .handle_request(Request::new(
            2,
            "entity.get",
            json!({"entity_id": "nope"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, codes::UNKNOWN_ENTITY);
}

// ---------------------------------------------------------------------------
// Registry, search and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_find_devices_and_entities_by_name() {
    let stack = stack().await;

    let results = stack.gateway.store().search(&SearchQuery::new("VIRTUAL LIGHT"));
    assert_eq!(results.devices.len(), 1);
    assert_eq!(results.devices[0].id, DeviceId::from("virtual-light"));
    assert_eq!(results.entities.len(), 1);

    let everything = stack.gateway.store().search(&SearchQuery::new(""));
    assert_eq!(everything.devices.len(), 3);
    assert_eq!(everything.entities.len(), 3);
}

#[tokio::test]
async fn should_restore_state_from_snapshot() {
    let mut stack = stack().await;
    let (device_id, entity_id) = light();
    stack
        .gateway
        .send_command(device_id, entity_id.clone(), json!({"brightness": 40}))
        .await
        .unwrap();
    stack.pump().await;

    let json = stack.storage.to_json().unwrap();
    let restored = stack_with(Arc::new(MemoryStorage::from_json(&json).unwrap())).await;

    let before = stack.gateway.store().get_entity(&entity_id).unwrap();
    let after = restored.gateway.store().get_entity(&entity_id).unwrap();
    assert_eq!(after.data, before.data);
    assert_eq!(restored.gateway.store().list_devices().len(), 3);
}

#[tokio::test]
async fn should_resume_pending_command_after_restart() {
    let stack = stack().await;
    let (device_id, entity_id) = light();
    let command = stack
        .gateway
        .send_command(device_id, entity_id.clone(), json!({"on": true}))
        .await
        .unwrap();

    let json = stack.storage.to_json().unwrap();
    let restored = stack_with(Arc::new(MemoryStorage::from_json(&json).unwrap())).await;

    let entity = restored.gateway.store().get_entity(&entity_id).unwrap();
    assert_eq!(entity.data.last_command_id, Some(command.id));

    let response = restored
        .gateway
        .handle_request(Request::new(
            1,
            "command.status",
            json!({"command_id": command.id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.result.unwrap()["state"], "pending");

    let response = restored
        .gateway
        .handle_request(Request::new(
            2,
            "command.complete",
            json!({"command_id": command.id}),
        ))
        .await
        .unwrap();
    assert!(response.is_success());
    let stored = restored.storage.get_status(command.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CommandState::Succeeded);
}

#[tokio::test]
async fn should_refuse_events_for_another_plugins_entity() {
    let stack = stack().await;
    let (device_id, entity_id) = light();
    let (impostor, _events) = VirtualPlugin::new("impostor");
    stack
        .gateway
        .register_plugin(impostor.registration())
        .unwrap();
    let command = stack
        .gateway
        .send_command(device_id.clone(), entity_id.clone(), json!({"on": true}))
        .await
        .unwrap();

    let result = stack
        .gateway
        .ingest_event(
            impostor.plugin_id().clone(),
            InboundEvent {
                device_id,
                entity_id,
                correlation_id: Some(command.id),
                payload: json!({"on": true}),
            },
        )
        .await;

    assert!(matches!(result, Err(GatewayError::UnknownEntity(_))));
    assert_eq!(
        stack.gateway.commands().status(command.id).unwrap().state,
        CommandState::Pending
    );
}

#[tokio::test]
async fn should_remove_device_with_its_entities() {
    let stack = stack().await;

    stack
        .gateway
        .remove_device(DeviceId::from("virtual-switch"))
        .await
        .unwrap();

    assert!(stack
        .gateway
        .store()
        .get_entity(&EntityId::from("switch.virtual_switch"))
        .is_none());
    let snapshot = stack.storage.snapshot();
    assert_eq!(snapshot.devices.len(), 2);
    assert_eq!(snapshot.entities.len(), 2);
}

#[tokio::test]
async fn should_list_builtin_domains_sorted() {
    let stack = stack().await;
    let keys: Vec<String> = stack
        .gateway
        .registry()
        .all()
        .into_iter()
        .map(|d| d.domain)
        .collect();
    assert_eq!(keys, vec!["light", "sensor", "switch"]);
}
