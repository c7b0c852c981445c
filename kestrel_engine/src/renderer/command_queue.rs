/// Command queue: the only channel from resource mutators to the render thread

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::renderer::resource_table::ResourceId;

/// Deferred work for the render thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Reconcile the native object with the logical state
    Upload(ResourceId),
    /// Release the native object and drop the table entry
    Destroy(ResourceId),
}

impl Command {
    pub fn id(&self) -> ResourceId {
        match self {
            Command::Upload(id) | Command::Destroy(id) => *id,
        }
    }
}

/// FIFO of commands, appended by any thread and drained by the render thread
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Mutex<Vec<Command>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn commands(&self) -> MutexGuard<'_, Vec<Command>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, command: Command) {
        self.commands().push(command);
    }

    pub fn extend(&self, commands: impl IntoIterator<Item = Command>) {
        self.commands().extend(commands);
    }

    /// Take every queued command, leaving the queue empty
    pub fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands())
    }

    pub fn len(&self) -> usize {
        self.commands().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands().is_empty()
    }
}
