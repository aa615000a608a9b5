//! Fixed-step frame driver for a [`WorldManager`].
//!
//! Each [`FrameLoop::frame`] updates every world with the fixed step, routes
//! cross-world messages and, when a renderer is attached, renders. Wall-clock
//! time per world is kept in [`FrameDiagnostics`].
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessera_engine::prelude::*;
//! use tessera_edf::prelude::MemoryTextSource;
//!
//! let source = MemoryTextSource::new().with_file("empty.edf", "");
//! let manager = WorldManager::builder()
//!     .text_source(Rc::new(source))
//!     .world("main", "empty.edf")
//!     .build()
//!     .unwrap();
//!
//! let mut frames = FrameLoop::new(manager, FrameConfig::default());
//! frames.manager_mut().start_all();
//! frames.run_frames(10);
//! assert_eq!(frames.frame_count(), 10);
//! assert_eq!(frames.manager().world("main").map(|w| w.state()), Some(WorldState::Populated));
//! ```

use std::time::{Duration, Instant};

use tessera_ecs::render::Renderer;

use crate::manager::WorldManager;

#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Seconds passed to every world update. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for FrameConfig {
    /// 60 frames per second.
    fn default() -> Self {
        Self { fixed_dt: 1.0 / 60.0 }
    }
}

/// Timing of the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Update time per world, in creation order.
    pub world_times: Vec<(String, Duration)>,
    pub render_time: Duration,
    pub total_time: Duration,
    pub routed_messages: usize,
}

pub struct FrameLoop {
    manager: WorldManager,
    fixed_dt: f64,
    frame_counter: u64,
    renderer: Option<Box<dyn Renderer>>,
    last_diagnostics: FrameDiagnostics,
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame", &self.frame_counter)
            .field("fixed_dt", &self.fixed_dt)
            .field("rendering", &self.renderer.is_some())
            .finish()
    }
}

impl FrameLoop {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(manager: WorldManager, config: FrameConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            manager,
            fixed_dt: config.fixed_dt,
            frame_counter: 0,
            renderer: None,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn frame(&mut self) {
        let frame_start = Instant::now();
        let mut world_times = Vec::new();
        for name in self.manager.world_names().into_iter().map(str::to_owned).collect::<Vec<_>>() {
            let started = Instant::now();
            if let Some(world) = self.manager.world_mut(&name) {
                world.update(self.fixed_dt);
            }
            world_times.push((name, started.elapsed()));
        }
        let routed_messages = self.manager.route_outboxes();

        let render_start = Instant::now();
        if let Some(renderer) = self.renderer.as_deref_mut() {
            self.manager.render(self.fixed_dt, renderer);
        }
        let render_time = render_start.elapsed();

        self.frame_counter += 1;
        self.last_diagnostics = FrameDiagnostics {
            world_times,
            render_time,
            total_time: frame_start.elapsed(),
            routed_messages,
        };
    }

    /// Run `count` frames and return the number of routed messages.
    pub fn run_frames(&mut self, count: u64) -> usize {
        let mut routed = 0;
        for _ in 0..count {
            self.frame();
            routed += self.last_diagnostics.routed_messages;
        }
        routed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// `frame_count * fixed_dt`, free of accumulated rounding.
    pub fn elapsed(&self) -> f64 {
        self.frame_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn manager(&self) -> &WorldManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WorldManager {
        &mut self.manager
    }

    pub fn into_manager(self) -> WorldManager {
        self.manager
    }

    pub fn renderer_mut(&mut self) -> Option<&mut (dyn Renderer + 'static)> {
        self.renderer.as_deref_mut()
    }

    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tessera_ecs::component::{Component, ComponentType, InitError};
    use tessera_ecs::context::EntityCtx;
    use tessera_ecs::property::Color;
    use tessera_ecs::render::{DrawCommand, RecordingRenderer};
    use tessera_edf::source::MemoryTextSource;

    #[derive(Default)]
    struct Dot;
    impl Component for Dot {
        fn on_init(&mut self, ctx: &mut EntityCtx<'_>) -> Result<(), InitError> {
            ctx.request_render_events(true);
            Ok(())
        }
        fn on_render(&mut self, _ctx: &mut EntityCtx<'_>, renderer: &mut dyn Renderer, _elapsed: f64) {
            renderer.submit(DrawCommand::Rect {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
                color: Color::WHITE,
            });
        }
    }
    impl ComponentType for Dot {
        const NAME: &'static str = "Dot";
    }

    fn frames() -> FrameLoop {
        let source = MemoryTextSource::new().with_file("dots.edf", "[!Dot]\n@Dot\n");
        let manager = WorldManager::builder()
            .component::<Dot>()
            .text_source(Rc::new(source))
            .world("dots", "dots.edf")
            .build()
            .unwrap();
        FrameLoop::new(manager, FrameConfig { fixed_dt: 0.5 })
    }

    #[test]
    fn frames_advance_time_and_record_diagnostics() {
        let mut frames = frames();
        frames.manager_mut().start_all();
        frames.run_frames(4);
        assert_eq!(frames.frame_count(), 4);
        assert_eq!(frames.elapsed(), 2.0);
        assert_eq!(frames.last_diagnostics().world_times.len(), 1);
        assert_eq!(frames.last_diagnostics().world_times[0].0, "dots");
    }

    /// Counts submissions into a cell the test keeps.
    struct Counting(Rc<Cell<usize>>);
    impl Renderer for Counting {
        fn submit(&mut self, _command: DrawCommand) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn attached_renderer_receives_draws() {
        let drawn = Rc::new(Cell::new(0));
        let mut frames = frames().with_renderer(Box::new(Counting(Rc::clone(&drawn))));
        frames.manager_mut().start_all();
        frames.run_frames(3);
        assert!(drawn.get() > 0);

        let mut recorder = RecordingRenderer::new();
        frames.manager_mut().render(0.5, &mut recorder);
        assert_eq!(recorder.drain().len(), 1);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn zero_step_is_rejected() {
        let manager = WorldManager::builder().build().unwrap();
        FrameLoop::new(manager, FrameConfig { fixed_dt: 0.0 });
    }
}
