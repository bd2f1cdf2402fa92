//! Port definitions: traits that collaborators implement.
//!
//! Ports are the boundaries between the gateway core and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod dispatch;
pub mod event_bus;
pub mod storage;

pub use dispatch::CommandDispatcher;
pub use event_bus::EnvelopePublisher;
pub use storage::{CommandRepository, DeviceRepository, EntityRepository};
