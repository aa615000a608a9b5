//! The rendering collaborator.
//!
//! Worlds do not draw. Components that opted into render events receive a
//! [`Renderer`] during [`World::render`](crate::world::World::render) and
//! submit [`DrawCommand`]s to it.

use serde::{Deserialize, Serialize};

use crate::property::Color;

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// A textured quad from a loaded image resource.
    Sprite {
        /// Canonical resource URL of the image.
        image: String,
        x: f32,
        y: f32,
        rotation: f32,
        scale: f32,
        tint: Color,
    },
    /// A solid rectangle.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
}

/// Receives draw commands for one frame.
pub trait Renderer {
    fn submit(&mut self, command: DrawCommand);
}

/// Collects draw commands, for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub commands: Vec<DrawCommand>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the commands recorded so far.
    pub fn drain(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Renderer for RecordingRenderer {
    fn submit(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}
