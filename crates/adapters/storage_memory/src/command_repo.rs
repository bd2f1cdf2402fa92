//! In-memory implementation of [`CommandRepository`].

use std::future::Future;

use entigate_app::ports::CommandRepository;
use entigate_domain::command::{Command, CommandStatus};
use entigate_domain::error::GatewayError;
use entigate_domain::id::CommandId;

use crate::{MemoryStorage, read, write};

impl CommandRepository for MemoryStorage {
    fn save_command(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.commands).entry(command.id).or_insert(command);
        async { Ok(()) }
    }

    fn save_status(
        &self,
        status: CommandStatus,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.statuses).insert(status.command_id, status);
        async { Ok(()) }
    }

    fn get_status(
        &self,
        id: CommandId,
    ) -> impl Future<Output = Result<Option<CommandStatus>, GatewayError>> + Send {
        let status = read(&self.statuses).get(&id).cloned();
        async { Ok(status) }
    }

    fn load_commands(&self) -> impl Future<Output = Result<Vec<Command>, GatewayError>> + Send {
        let mut commands: Vec<Command> = read(&self.commands).values().cloned().collect();
        commands.sort_by_key(|c| c.created_at);
        async { Ok(commands) }
    }

    fn load_statuses(
        &self,
    ) -> impl Future<Output = Result<Vec<CommandStatus>, GatewayError>> + Send {
        let statuses: Vec<CommandStatus> = read(&self.statuses).values().cloned().collect();
        async { Ok(statuses) }
    }
}
