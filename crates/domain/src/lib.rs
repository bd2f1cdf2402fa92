//! # entigate-domain
//!
//! Pure domain model for the entigate device gateway.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (physical or logical sources of entities)
//! - Define **Entities** and their desired / reported / effective state triple
//! - Define **Commands** (intent sent to a plugin) and their lifecycle status
//! - Define **Events** (facts reported by plugins) and the bus envelope
//! - Define **Domain descriptors** and the capability trait domains implement
//! - Define the JSON-RPC transport envelopes, plugin manifests and search queries
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod device;
pub mod domain;
pub mod entity;
pub mod event;
pub mod plugin;
pub mod search;
pub mod transport;

/// Opaque, domain-typed payload carried by commands, events and entity state.
pub type Payload = serde_json::Value;
