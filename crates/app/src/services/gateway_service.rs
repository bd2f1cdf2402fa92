//! Gateway service: runs the pure core operations and calls the
//! collaborators (persistence, transport, bus) around them.
//!
//! Every mutation is applied to the in-memory core first; the resulting
//! snapshots are then persisted, and only then are commands dispatched or
//! envelopes published.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use entigate_domain::Payload;
use entigate_domain::command::{Command, CommandState, CommandStatus};
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::event::InboundEvent;
use entigate_domain::id::{CommandId, DeviceId, EntityId, PluginId};
use entigate_domain::plugin::Registration;
use entigate_domain::search::SearchQuery;
use entigate_domain::transport::{Request, Response, RpcError, codes};

use crate::command_engine::CommandEngine;
use crate::locks;
use crate::ports::{
    CommandDispatcher, CommandRepository, DeviceRepository, EntityRepository, EnvelopePublisher,
};
use crate::reconciler::{EventReconciler, Reconciled};
use crate::registry::DomainRegistry;
use crate::state_store::EntityStateStore;

/// Record counts reloaded by [`GatewayService::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Restored {
    pub devices: usize,
    pub entities: usize,
    pub commands: usize,
    /// Restored commands still awaiting an outcome.
    pub pending: usize,
}

/// Entry point of the gateway for transports and composition roots.
pub struct GatewayService<R, D, P> {
    store: Arc<EntityStateStore>,
    commands: Arc<CommandEngine>,
    reconciler: EventReconciler,
    plugins: RwLock<HashMap<PluginId, Registration>>,
    repo: R,
    dispatcher: D,
    publisher: P,
}

impl<R, D, P> GatewayService<R, D, P>
where
    R: DeviceRepository + EntityRepository + CommandRepository + Sync,
    D: CommandDispatcher + Sync,
    P: EnvelopePublisher + Sync,
{
    /// Wire the core around `registry` with the given collaborators.
    pub fn new(registry: Arc<DomainRegistry>, repo: R, dispatcher: D, publisher: P) -> Self {
        let store = Arc::new(EntityStateStore::new(registry));
        let commands = Arc::new(CommandEngine::new(Arc::clone(&store)));
        let reconciler = EventReconciler::new(Arc::clone(&store), Arc::clone(&commands));
        Self {
            store,
            commands,
            reconciler,
            plugins: RwLock::new(HashMap::new()),
            repo,
            dispatcher,
            publisher,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<EntityStateStore> {
        &self.store
    }

    #[must_use]
    pub fn commands(&self) -> &Arc<CommandEngine> {
        &self.commands
    }

    #[must_use]
    pub fn registry(&self) -> &DomainRegistry {
        self.store.registry()
    }

    /// Reload persisted devices, entities and commands into the core.
    ///
    /// Entities whose device or domain is gone are skipped with a warning.
    /// Commands resume with their stored status, so pending ones can still
    /// be completed or failed after a restart.
    ///
    /// # Errors
    ///
    /// Returns a collaborator error if the repository cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<Restored, GatewayError> {
        let mut restored = Restored::default();
        for device in self.repo.load_devices().await? {
            self.store.upsert_device(device)?;
            restored.devices += 1;
        }

        for entity in self.repo.load_entities().await? {
            let entity_id = entity.id.clone();
            match self.store.restore_entity(entity) {
                Ok(_) => restored.entities += 1,
                Err(err) => tracing::warn!(entity_id = %entity_id, error = %err, "skipping stored entity"),
            }
        }

        let mut statuses: HashMap<CommandId, CommandStatus> = self
            .repo
            .load_statuses()
            .await?
            .into_iter()
            .map(|status| (status.command_id, status))
            .collect();
        for command in self.repo.load_commands().await? {
            let status = statuses.remove(&command.id);
            if self.commands.restore(command, status).state == CommandState::Pending {
                restored.pending += 1;
            }
            restored.commands += 1;
        }

        tracing::info!(
            devices = restored.devices,
            entities = restored.entities,
            commands = restored.commands,
            pending = restored.pending,
            "state restored"
        );
        Ok(restored)
    }

    // ── Plugins ────────────────────────────────────────────────────

    /// Record a plugin announcement; a repeated announcement replaces the
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the manifest has no id.
    #[tracing::instrument(skip(self, registration), fields(plugin_id = %registration.manifest.id))]
    pub fn register_plugin(&self, registration: Registration) -> Result<Registration, GatewayError> {
        registration.validate()?;
        tracing::info!(
            name = %registration.manifest.name,
            version = %registration.manifest.version,
            rpc_subject = %registration.rpc_subject,
            "plugin registered"
        );
        locks::write(&self.plugins).insert(registration.plugin_id().clone(), registration.clone());
        Ok(registration)
    }

    /// Registered plugins, ordered by id.
    #[must_use]
    pub fn plugins(&self) -> Vec<Registration> {
        let mut plugins: Vec<Registration> = locks::read(&self.plugins).values().cloned().collect();
        plugins.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
        plugins
    }

    fn require_plugin(&self, id: &PluginId) -> Result<(), GatewayError> {
        if locks::read(&self.plugins).contains_key(id) {
            Ok(())
        } else {
            Err(GatewayError::UnknownPlugin(id.clone()))
        }
    }

    // ── Devices & entities ─────────────────────────────────────────

    /// Create or update a device reported by its plugin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownPlugin`] if the plugin never registered,
    /// a validation error, or a collaborator error from the repository.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn report_device(&self, device: Device) -> Result<Device, GatewayError> {
        self.require_plugin(&device.plugin_id)?;
        let device = self.store.upsert_device(device)?;
        self.repo.save_device(device.clone()).await?;
        Ok(device)
    }

    /// Create or update an entity reported by its plugin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] or [`GatewayError::UnknownDomain`]
    /// for dangling references, a validation error, or a collaborator error.
    #[tracing::instrument(skip(self, entity), fields(entity_id = %entity.id))]
    pub async fn report_entity(&self, entity: Entity) -> Result<Entity, GatewayError> {
        let entity = self.store.upsert_entity(entity)?;
        self.repo.save_entity(entity.clone()).await?;
        Ok(entity)
    }

    /// Set the user-assigned name of a device.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] or a collaborator error.
    #[tracing::instrument(skip(self, local_name))]
    pub async fn rename_device(
        &self,
        id: DeviceId,
        local_name: String,
    ) -> Result<Device, GatewayError> {
        let device = self.store.rename_device(&id, local_name)?;
        self.repo.save_device(device.clone()).await?;
        Ok(device)
    }

    /// Remove a device and its entities.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] or a collaborator error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_device(&self, id: DeviceId) -> Result<Device, GatewayError> {
        let (device, entities) = self.store.remove_device(&id)?;
        for entity_id in entities {
            self.repo.delete_entity(entity_id).await?;
        }
        self.repo.delete_device(id).await?;
        Ok(device)
    }

    /// Remove a single entity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] or a collaborator error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_entity(&self, id: EntityId) -> Result<Entity, GatewayError> {
        let entity = self.store.remove_entity(&id)?;
        self.repo.delete_entity(id).await?;
        Ok(entity)
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Create a command, persist it, and hand it to the transport.
    ///
    /// A persistence or dispatch failure resolves the command as `failed`
    /// with the collaborator's error text before the error is returned, so
    /// no command is left pending without having been dispatched.
    ///
    /// # Errors
    ///
    /// Returns the command engine's validation errors, or a collaborator
    /// error from persistence or dispatch.
    #[tracing::instrument(skip(self, payload))]
    pub async fn send_command(
        &self,
        device_id: DeviceId,
        entity_id: EntityId,
        payload: Payload,
    ) -> Result<Command, GatewayError> {
        let command = self.commands.create(&device_id, &entity_id, payload)?;

        if let Err(err) = self.persist_command(&command).await {
            tracing::warn!(command_id = %command.id, error = %err, "command not persisted");
            if let Err(fail_err) = self.fail_command(command.id, err.to_string()).await {
                tracing::warn!(command_id = %command.id, error = %fail_err, "failed status not persisted");
            }
            return Err(err);
        }

        if let Err(err) = self.dispatcher.dispatch(command.clone()).await {
            tracing::warn!(command_id = %command.id, error = %err, "dispatch failed");
            self.fail_command(command.id, err.to_string()).await?;
            return Err(err);
        }

        tracing::info!(command_id = %command.id, plugin_id = %command.plugin_id, "command dispatched");
        Ok(command)
    }

    async fn persist_command(&self, command: &Command) -> Result<(), GatewayError> {
        self.persist_entity(&command.entity_id).await?;
        self.repo.save_command(command.clone()).await?;
        self.repo.save_status(CommandStatus::pending(command)).await
    }

    /// Record an explicit success reported by the transport.
    ///
    /// Reports against an already-failed command are logged and answered with
    /// the current status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownCommand`] or a collaborator error.
    #[tracing::instrument(skip(self))]
    pub async fn complete_command(&self, id: CommandId) -> Result<CommandStatus, GatewayError> {
        let status = match self.commands.mark_succeeded(id) {
            Err(GatewayError::AlreadyTerminal { state, .. }) => {
                tracing::warn!(command_id = %id, %state, "ignoring success report for terminal command");
                return self.commands.require_status(id);
            }
            other => other?,
        };
        self.repo.save_status(status.clone()).await?;
        Ok(status)
    }

    /// Record an explicit failure reported by the transport, or forced by a
    /// caller-side timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownCommand`] or a collaborator error.
    #[tracing::instrument(skip(self, reason))]
    pub async fn fail_command(
        &self,
        id: CommandId,
        reason: String,
    ) -> Result<CommandStatus, GatewayError> {
        let status = match self.commands.mark_failed(id, reason) {
            Err(GatewayError::AlreadyTerminal { state, .. }) => {
                tracing::warn!(command_id = %id, %state, "ignoring failure report for terminal command");
                return self.commands.require_status(id);
            }
            other => other?,
        };
        self.repo.save_status(status.clone()).await?;
        self.persist_entity(&status.entity_id).await?;
        Ok(status)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Reconcile an event from `plugin_id`, persist the outcome and publish
    /// the envelope on the bus.
    ///
    /// Once reconciled, the event is part of the core state and its envelope
    /// is published even when persisting the outcome fails; that failure is
    /// returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownPlugin`] for unregistered plugins, the
    /// reconciler's errors, or a collaborator error.
    #[tracing::instrument(skip(self, inbound), fields(entity_id = %inbound.entity_id))]
    pub async fn ingest_event(
        &self,
        plugin_id: PluginId,
        inbound: InboundEvent,
    ) -> Result<Reconciled, GatewayError> {
        self.require_plugin(&plugin_id)?;
        let reconciled = self.reconciler.ingest(plugin_id, inbound)?;

        let persisted = self.persist_reconciled(&reconciled).await;
        if let Err(err) = &persisted {
            tracing::warn!(event_id = %reconciled.event.id, error = %err, "event outcome not persisted");
        }
        self.publisher.publish(reconciled.envelope.clone()).await?;
        persisted?;
        Ok(reconciled)
    }

    async fn persist_reconciled(&self, reconciled: &Reconciled) -> Result<(), GatewayError> {
        self.repo.save_entity(reconciled.entity.clone()).await?;
        if let Some(status) = &reconciled.resolved {
            self.repo.save_status(status.clone()).await?;
        }
        Ok(())
    }

    async fn persist_entity(&self, id: &EntityId) -> Result<(), GatewayError> {
        if let Some(entity) = self.store.get_entity(id) {
            self.repo.save_entity(entity).await?;
        }
        Ok(())
    }

    // ── JSON-RPC ───────────────────────────────────────────────────

    /// Serve one JSON-RPC request. Notifications are executed but produce
    /// no response.
    pub async fn handle_request(&self, request: Request) -> Option<Response> {
        let id = request.id.clone();
        let method = request.method.clone();
        let outcome = self.route(request).await;
        if let Err(err) = &outcome {
            tracing::debug!(%method, code = err.code, message = %err.message, "request failed");
        }

        let id = id?;
        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(err) => Response::failure(id, err),
        })
    }

    async fn route(&self, request: Request) -> Result<Payload, RpcError> {
        request
            .validate()
            .map_err(|err| RpcError::new(codes::INVALID_REQUEST, err.to_string()))?;
        let params = request.params.unwrap_or(Payload::Null);

        match request.method.as_str() {
            "plugin.register" => reply(self.register_plugin(parse(params)?)),
            "plugin.list" => reply(Ok(self.plugins())),
            "device.report" => reply(self.report_device(parse(params)?).await),
            "device.list" => reply(Ok(self.store.list_devices())),
            "device.rename" => {
                let RenameDevice {
                    device_id,
                    local_name,
                } = parse(params)?;
                reply(self.rename_device(device_id, local_name).await)
            }
            "device.remove" => {
                let DeviceRef { device_id } = parse(params)?;
                reply(self.remove_device(device_id).await)
            }
            "entity.report" => reply(self.report_entity(parse(params)?).await),
            "entity.list" => {
                let EntityFilter { device_id } = parse_or_default(params)?;
                reply(Ok(match device_id {
                    Some(device_id) => self.store.entities_for_device(&device_id),
                    None => self.store.list_entities(),
                }))
            }
            "entity.get" => {
                let EntityRef { entity_id } = parse(params)?;
                reply(self.store.require_entity(&entity_id))
            }
            "entity.remove" => {
                let EntityRef { entity_id } = parse(params)?;
                reply(self.remove_entity(entity_id).await)
            }
            "domain.list" => reply(Ok(self.registry().all())),
            "command.send" => {
                let SendCommand {
                    device_id,
                    entity_id,
                    payload,
                } = parse(params)?;
                reply(self.send_command(device_id, entity_id, payload).await)
            }
            "command.list" => {
                let CommandFilter { entity_id } = parse_or_default(params)?;
                reply(Ok(match entity_id {
                    Some(entity_id) => self.commands.for_entity(&entity_id),
                    None => self.commands.pending(),
                }))
            }
            "command.status" => {
                let CommandRef { command_id } = parse(params)?;
                reply(self.commands.require_status(command_id))
            }
            "command.complete" => {
                let CommandRef { command_id } = parse(params)?;
                reply(self.complete_command(command_id).await)
            }
            "command.fail" => {
                let FailCommand { command_id, error } = parse(params)?;
                reply(self.fail_command(command_id, error).await)
            }
            "event.ingest" => {
                let IngestEvent { plugin_id, event } = parse(params)?;
                reply(
                    self.ingest_event(plugin_id, event)
                        .await
                        .map(|reconciled| reconciled.event),
                )
            }
            "search" => reply(Ok(self.store.search(&parse::<SearchQuery>(params)?))),
            other => Err(RpcError::method_not_found(other)),
        }
    }
}

#[derive(Deserialize)]
struct DeviceRef {
    device_id: DeviceId,
}

#[derive(Deserialize)]
struct RenameDevice {
    device_id: DeviceId,
    local_name: String,
}

#[derive(Default, Deserialize)]
struct EntityFilter {
    #[serde(default)]
    device_id: Option<DeviceId>,
}

#[derive(Default, Deserialize)]
struct CommandFilter {
    #[serde(default)]
    entity_id: Option<EntityId>,
}

#[derive(Deserialize)]
struct EntityRef {
    entity_id: EntityId,
}

#[derive(Deserialize)]
struct CommandRef {
    command_id: CommandId,
}

#[derive(Deserialize)]
struct SendCommand {
    device_id: DeviceId,
    entity_id: EntityId,
    payload: Payload,
}

#[derive(Deserialize)]
struct FailCommand {
    command_id: CommandId,
    error: String,
}

#[derive(Deserialize)]
struct IngestEvent {
    plugin_id: PluginId,
    event: InboundEvent,
}

fn parse<T: DeserializeOwned>(params: Payload) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|err| RpcError::invalid_params(&err))
}

fn parse_or_default<T: DeserializeOwned + Default>(params: Payload) -> Result<T, RpcError> {
    if params.is_null() {
        Ok(T::default())
    } else {
        parse(params)
    }
}

fn reply<T: Serialize>(result: Result<T, GatewayError>) -> Result<Payload, RpcError> {
    let value = result.map_err(|err| RpcError::from(&err))?;
    serde_json::to_value(value).map_err(|err| RpcError::new(codes::INTERNAL_ERROR, err.to_string()))
}
