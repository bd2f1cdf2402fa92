//! Transport port: hands commands to the plugin that owns the target entity.

use std::future::Future;

use entigate_domain::command::Command;
use entigate_domain::error::GatewayError;

/// Delivers [`Command`]s to plugins.
///
/// Delivery failures (plugin unreachable, timeout, …) are reported as
/// `Err`. The transport owns retries; the core never retries a dispatch.
pub trait CommandDispatcher {
    /// Deliver `command` to `command.plugin_id`.
    fn dispatch(&self, command: Command) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: CommandDispatcher + Send + Sync> CommandDispatcher for std::sync::Arc<T> {
    fn dispatch(&self, command: Command) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).dispatch(command)
    }
}
