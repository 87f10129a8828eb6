use async_trait::async_trait;
use hearth_core::{ActorId, Command, CommandDefinition};

/// Executes one dequeued command. Invoked by the queue worker only, never
/// concurrently with another invocation.
///
/// A call that exceeds the queue's time limit is dropped and the next command
/// starts. Implementations that move work off the runtime must make sure that
/// work cannot overlap the next call's writes.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, actor: &ActorId, command: Command) -> anyhow::Result<serde_json::Value>;
}

/// Where the worker reports a failed command so the actor sees it.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify_failure(
        &self,
        actor: &ActorId,
        definition: &'static CommandDefinition,
    ) -> anyhow::Result<()>;
}
