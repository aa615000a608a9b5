//! Deferred world mutations issued from component hooks.
//!
//! Hooks never touch the world's entity lists directly. Spawns, disposals,
//! messages and world control requests are queued here and applied by the
//! world in FIFO order after the update pass, so an update loop never sees
//! its own lists change underneath it.
//!
//! # Example
//!
//! ```
//! use tessera_ecs::command::{CommandKind, WorldCommands};
//! use tessera_ecs::prelude::*;
//!
//! let mut commands = WorldCommands::new();
//! commands.spawn(EntityInstance::new("Bullet").with("speed", serde_json::json!(400)), None);
//! commands.stop_world(None);
//!
//! let queued = commands.take();
//! assert_eq!(queued.len(), 2);
//! assert!(matches!(queued[0].kind, CommandKind::Spawn(_)));
//! assert_eq!(queued[1].command_index, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::factory::EntityInstance;
use crate::message::{Message, MessageTarget};

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What the world should do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Preload and add an entity; it reaches the lists once its resources are in.
    Spawn(EntityInstance),
    Dispose(EntityId),
    /// Subscribe or unsubscribe an entity from `on_render`.
    RenderEvents { entity: EntityId, enabled: bool },
    /// Deliver a message inside this world after the activation pass.
    Send {
        target: MessageTarget,
        message: Message,
    },
    /// Hand a message to another world through the manager.
    PostToWorld { world: String, message: Message },
    StopWorld,
    RestartWorld,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    /// The entity whose hook issued the command, if any.
    pub issued_by: Option<EntityId>,
    /// Sequential index within the queue (set on insertion).
    pub command_index: u32,
}

// ---------------------------------------------------------------------------
// WorldCommands
// ---------------------------------------------------------------------------

/// FIFO queue of [`Command`]s.
#[derive(Debug, Default)]
pub struct WorldCommands {
    commands: Vec<Command>,
    next_index: u32,
}

impl WorldCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: CommandKind, issued_by: Option<EntityId>) {
        let command_index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        self.commands.push(Command {
            kind,
            issued_by,
            command_index,
        });
    }

    pub fn spawn(&mut self, instance: EntityInstance, issued_by: Option<EntityId>) {
        self.push(CommandKind::Spawn(instance), issued_by);
    }

    pub fn dispose(&mut self, target: EntityId, issued_by: Option<EntityId>) {
        self.push(CommandKind::Dispose(target), issued_by);
    }

    pub fn render_events(&mut self, entity: EntityId, enabled: bool) {
        self.push(CommandKind::RenderEvents { entity, enabled }, Some(entity));
    }

    pub fn send(&mut self, target: MessageTarget, message: Message, issued_by: Option<EntityId>) {
        self.push(CommandKind::Send { target, message }, issued_by);
    }

    pub fn post_to_world(&mut self, world: &str, message: Message, issued_by: Option<EntityId>) {
        self.push(
            CommandKind::PostToWorld {
                world: world.to_owned(),
                message,
            },
            issued_by,
        );
    }

    pub fn stop_world(&mut self, issued_by: Option<EntityId>) {
        self.push(CommandKind::StopWorld, issued_by);
    }

    pub fn restart_world(&mut self, issued_by: Option<EntityId>) {
        self.push(CommandKind::RestartWorld, issued_by);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Removes and returns every queued command in insertion order. The index
    /// counter restarts for the next batch.
    pub fn take(&mut self) -> Vec<Command> {
        self.next_index = 0;
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_keep_fifo_order() {
        let mut commands = WorldCommands::new();
        let a = EntityId::new(1, 0);
        let b = EntityId::new(2, 0);
        commands.dispose(a, Some(b));
        commands.send(MessageTarget::Entity(b), Message::new("hit"), Some(a));
        commands.restart_world(None);

        let queued = commands.take();
        let indices: Vec<u32> = queued.iter().map(|c| c.command_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(queued[0].kind, CommandKind::Dispose(a));
        assert_eq!(queued[0].issued_by, Some(b));
        assert!(commands.is_empty());
    }

    #[test]
    fn take_restarts_index() {
        let mut commands = WorldCommands::new();
        commands.stop_world(None);
        commands.take();
        commands.stop_world(None);
        assert_eq!(commands.take()[0].command_index, 0);
    }
}
