//! # entigate-app
//!
//! Gateway core and application layer.
//!
//! ## Responsibilities
//! - The pure, in-memory core:
//!   - [`registry::DomainRegistry`]: domain descriptors keyed by domain name
//!   - [`state_store::EntityStateStore`]: devices, entities and their
//!     desired / reported / effective state
//!   - [`command_engine::CommandEngine`]: command creation and status lifecycle
//!   - [`reconciler::EventReconciler`]: inbound events to canonical events,
//!     reported state and command resolution
//! - Define **port traits** that collaborators implement:
//!   - `CommandDispatcher`: hands commands to the owning plugin
//!   - `EnvelopePublisher`: fans event envelopes out on the bus
//!   - `DeviceRepository`, `EntityRepository`, `CommandRepository`: persistence
//! - Provide **in-process infrastructure** (envelope bus) that doesn't need IO
//! - [`services::gateway_service::GatewayService`] runs the core operations
//!   and calls the ports around them
//!
//! ## Dependency rule
//! Depends on `entigate-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod command_engine;
pub mod event_bus;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod services;
pub mod state_store;

mod locks;
