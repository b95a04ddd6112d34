use tokio::sync::broadcast;
use tracing::trace;

use super::CommandDescriptor;

/// Typed change notification replayed to subscribers.
///
/// Emission happens strictly after the cache mutation is visible: a
/// subscriber reacting to `Removed` never finds the id in a concurrently
/// taken snapshot.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    /// A descriptor appeared under the command root
    Created(CommandDescriptor),
    /// A descriptor's node was deleted
    Removed(CommandDescriptor),
    /// A tracked descriptor's bytes changed
    Changed {
        new: CommandDescriptor,
        old: CommandDescriptor,
    },
}

/// Fan-out bus for change events.
#[derive(Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<CommandEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.sender.subscribe()
    }

    /// Fire-and-forget publish; delivery to nobody is not an error.
    pub(crate) fn publish(&self, event: CommandEvent) {
        if self.sender.send(event).is_err() {
            trace!("command event dropped: no subscribers");
        }
    }
}
