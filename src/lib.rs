//! Platform layer for 2D games.
//!
//! Owns the window, a lost-device aware GPU renderer, normalized input routing and a paced frame loop with background loading.
//! The game implements the [`Game`] trait and hands control to [`Game::run`].
//!
//! ```no_run
//! use plinth::{Config, Game, Platform, Renderer, Services};
//!
//! struct MyGame;
//!
//! impl Game for MyGame {
//!     type Loaded = ();
//!
//!     fn update(&mut self, _delta: f32, _platform: &mut Platform) {}
//!
//!     fn draw(&mut self, scene: &mut Renderer) {
//!         scene.draw_rect(10.0, 10.0, 64.0, 48.0, 0.5, 0xFFFF0000);
//!     }
//! }
//!
//! fn main() -> miette::Result<()> {
//!     MyGame.run(Config::default().with_title("My Game"), Services::default())
//! }
//! ```

mod config;
mod diagnostics;
mod graphics;
mod input;
mod loading;
mod services;
mod timing;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use miette::{Context as _, IntoDiagnostic as _};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

pub use config::Config;
pub use graphics::{Renderer, Texture, Vertex};
pub use input::{
    Gamepad, GamepadButtons, Input, InputEvent, Key, Modifiers, Mouse, MouseButton,
};
pub use services::{
    DeviceResources, MemorySettings, NoDeviceResources, Services, SettingsStore,
};

use graphics::device::GraphicsDevice;
use loading::LoadGate;
use timing::TimingState;

/// Backoff while the render device recovers from a loss.
const DEVICE_RETRY_THROTTLE: Duration = Duration::from_millis(100);

/// The game itself, driven by the frame loop.
///
/// Only [`Game::update`] and [`Game::draw`] are required, every lifecycle hook has an empty default.
pub trait Game: Sized + 'static {
    /// Result of the background load, handed to [`Game::load_complete`].
    ///
    /// Use `()` when [`Game::background_load`] stays unimplemented.
    type Loaded: Send + 'static;

    /// Advance the simulation a single tick.
    ///
    /// Skipped while the platform is paused, `delta` is the wall-clock seconds since the previous update.
    fn update(&mut self, delta: f32, platform: &mut Platform);

    /// Draw the frame inside an open scene bracket.
    ///
    /// Called once per loop iteration, also while paused.
    fn draw(&mut self, scene: &mut Renderer);

    /// One-time load before anything is drawn, for assets the splash frame needs.
    #[inline]
    #[allow(unused_variables)]
    fn pre_init_load(&mut self, platform: &mut Platform) {}

    /// Draw the single splash frame shown while the game initializes.
    #[inline]
    #[allow(unused_variables)]
    fn splash(&mut self, scene: &mut Renderer) {}

    /// Initialize the game, called once after the splash frame.
    #[inline]
    #[allow(unused_variables)]
    fn init(&mut self, platform: &mut Platform) {}

    /// Work to run on the background loading thread.
    ///
    /// The closure must not touch GPU resources, it only produces CPU-side data; [`Game::load_complete`] runs on the main thread and may upload.
    /// Returning `None` skips background loading entirely.
    #[inline]
    fn background_load(&mut self) -> Option<Box<dyn FnOnce() -> Self::Loaded + Send>> {
        None
    }

    /// The background load finished, called exactly once.
    #[inline]
    #[allow(unused_variables)]
    fn load_complete(&mut self, loaded: Self::Loaded, platform: &mut Platform) {}

    /// A translated input event arrived.
    #[inline]
    #[allow(unused_variables)]
    fn handle_event(&mut self, event: InputEvent, platform: &mut Platform) {}

    /// The drawable size changed, also fired after every device reset.
    #[inline]
    #[allow(unused_variables)]
    fn window_resized(&mut self, width: u32, height: u32) {}

    /// The window switched between fullscreen and windowed mode.
    #[inline]
    #[allow(unused_variables)]
    fn fullscreen_toggled(&mut self, fullscreen: bool) {}

    /// The loop is about to exit, called exactly once.
    #[inline]
    fn pre_shutdown(&mut self) {}

    /// Run the frame loop until the game exits.
    ///
    /// # Errors
    ///
    /// - When the window, the event loop or the GPU can't be set up.
    /// - When fullscreen is requested and the monitor exposes no matching display mode.
    #[inline]
    fn run(self, config: Config, services: Services) -> miette::Result<()> {
        run(self, config, services)
    }
}

/// Handle games use to control the loop and read input state.
pub struct Platform {
    /// Input state and event translation.
    input: Input,
    /// Frame clock and pacing.
    timing: TimingState,
    /// The loop exits at the end of the current iteration.
    exit_requested: bool,
    /// A game-driven fullscreen toggle is pending.
    fullscreen_toggle_requested: bool,
    /// Amount of unmatched toggle disables, Alt+Enter is ignored above zero.
    fullscreen_toggle_disabled: u32,
}

impl Platform {
    /// Set up the loop state.
    fn new(config: &Config) -> Self {
        Self {
            input: Input::new(config),
            timing: TimingState::new(config.max_frame_rate),
            exit_requested: false,
            fullscreen_toggle_requested: false,
            fullscreen_toggle_disabled: 0,
        }
    }

    /// Mouse and gamepad state.
    #[inline]
    #[must_use]
    pub const fn input(&self) -> &Input {
        &self.input
    }

    /// Seconds of game time since startup, paused spans excluded.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.timing.elapsed()
    }

    /// Stop simulation updates, nestable.
    ///
    /// Drawing continues while paused and game time stands still.
    #[inline]
    pub fn pause(&mut self) {
        self.timing.pause();
    }

    /// Undo one [`Self::pause`], updates resume when every pause is matched.
    ///
    /// # Panics
    ///
    /// - When called without a matching pause.
    #[inline]
    pub fn resume(&mut self) {
        self.timing.resume();
    }

    /// Whether at least one pause is active.
    #[inline]
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.timing.is_paused()
    }

    /// Change the frame rate cap, zero disables pacing.
    #[inline]
    pub fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        self.timing.set_max_frame_rate(max_frame_rate);
    }

    /// Exit the loop at the end of the current iteration.
    #[inline]
    pub fn exit(&mut self) {
        self.exit_requested = true;
    }

    /// Switch between fullscreen and windowed mode on the next iteration.
    #[inline]
    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen_toggle_requested = true;
    }

    /// Ignore Alt+Enter and game-driven toggles, nestable.
    #[inline]
    pub fn disable_fullscreen_toggle(&mut self) {
        self.fullscreen_toggle_disabled += 1;
    }

    /// Undo one [`Self::disable_fullscreen_toggle`].
    ///
    /// # Panics
    ///
    /// - When called without a matching disable.
    #[inline]
    pub fn enable_fullscreen_toggle(&mut self) {
        assert!(
            self.fullscreen_toggle_disabled > 0,
            "Fullscreen toggle enabled without a matching disable"
        );

        self.fullscreen_toggle_disabled -= 1;
    }

    /// Whether a toggle should happen now, clearing the pending request.
    fn take_fullscreen_toggle(&mut self, input_request: bool) -> bool {
        let requested = std::mem::take(&mut self.fullscreen_toggle_requested) || input_request;

        requested && self.fullscreen_toggle_disabled == 0
    }
}

/// Run the frame loop until the game exits.
///
/// # Errors
///
/// - When the window, the event loop or the GPU can't be set up.
/// - When fullscreen is requested and the monitor exposes no matching display mode.
pub fn run<G: Game>(game: G, config: Config, services: Services) -> miette::Result<()> {
    diagnostics::init(config.log_file.as_deref())?;

    let event_loop = EventLoop::new()
        .into_diagnostic()
        .wrap_err("Error setting up window event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        game,
        config,
        services: Some(services),
        state: None,
        phase: Phase::Bootstrapping,
        error: None,
    };

    event_loop
        .run_app(&mut app)
        .into_diagnostic()
        .wrap_err("Error running window event loop")?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Lifecycle of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Window and device are being created, splash and init hooks run.
    Bootstrapping,
    /// The loop iterates.
    Running,
    /// An exit was requested, no more updates or draws.
    ShuttingDown,
    /// The shutdown hook ran.
    Terminated,
}

/// Everything that only exists once the window is created.
struct LoopState<G: Game> {
    /// Renderer owning the device.
    renderer: Renderer,
    /// Loop control and input handed to the game.
    platform: Platform,
    /// Pending background load, `None` once consumed or never started.
    load_gate: Option<LoadGate<G::Loaded>>,
}

/// Application handler driving one loop iteration per redraw.
struct App<G: Game> {
    /// User passed game state.
    game: G,
    /// Initial settings.
    config: Config,
    /// Host services, taken at window creation.
    services: Option<Services>,
    /// Window-bound state, `None` until the first resume.
    state: Option<LoopState<G>>,
    /// Lifecycle state.
    phase: Phase,
    /// Fatal error reported after the event loop returns.
    error: Option<miette::Report>,
}

impl<G: Game> App<G> {
    /// Create the window and device and run the bootstrap hooks.
    fn bootstrap(&mut self, event_loop: &ActiveEventLoop) -> miette::Result<LoopState<G>> {
        profiling::scope!("bootstrap");

        let services = self
            .services
            .take()
            .ok_or_else(|| miette::miette!("Bootstrap ran twice"))?;

        // Create the window
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .into_diagnostic()
                .wrap_err("Error creating window")?,
        );

        // Negotiate the exclusive fullscreen mode, a failure here is fatal
        if self.config.fullscreen {
            let monitor = window
                .current_monitor()
                .or_else(|| event_loop.primary_monitor())
                .ok_or_else(|| miette::miette!("No monitor available for fullscreen"))?;
            let mode = graphics::device::negotiate_display_mode(
                &monitor,
                self.config.width,
                self.config.height,
                self.config.refresh_rate,
            )?;
            window.set_fullscreen(Some(Fullscreen::Exclusive(mode)));
        }

        // Setup the GPU and attach it to the window surface
        let device = pollster::block_on(GraphicsDevice::new(
            &self.config,
            Arc::clone(&window),
            services.resources,
            services.settings,
        ))?;
        let mut renderer = Renderer::new(device);
        let mut platform = Platform::new(&self.config);

        // One-time load for assets the splash frame needs
        self.game.pre_init_load(&mut platform);

        // Single splash frame shown while the game initializes
        if renderer.begin_scene() {
            self.game.splash(&mut renderer);
            renderer.end_scene();
        }

        self.game.init(&mut platform);

        // Kick off the background load
        let load_gate = self.game.background_load().map(LoadGate::spawn);
        if load_gate.is_some() {
            log::debug!("Started background load");
        }

        Ok(LoopState {
            renderer,
            platform,
            load_gate,
        })
    }

    /// Run one iteration of the frame loop.
    fn iterate(&mut self, event_loop: &ActiveEventLoop) {
        profiling::scope!("frame");

        if self.phase != Phase::Running {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let iteration_start = Instant::now();

        // Move virtual pointers before the events are drained
        state.platform.input.integrate_virtual_pointers();

        // Pump translated events into the game
        for event in state.platform.input.take_events() {
            self.game.handle_event(event, &mut state.platform);
        }

        // Apply a pending fullscreen toggle
        let input_request = state.platform.input.take_fullscreen_toggle_request();
        if state.platform.take_fullscreen_toggle(input_request) {
            let fullscreen = state.renderer.device.toggle_fullscreen();
            self.game.fullscreen_toggled(fullscreen);
        }

        // Consume the background load completion exactly once
        if let Some(gate) = state.load_gate.as_mut() {
            if let Some(loaded) = gate.poll() {
                state.load_gate = None;
                log::debug!("Background load complete");
                self.game.load_complete(loaded, &mut state.platform);
            }
        }

        // Update unless paused, a paused game still draws
        if !state.platform.timing.is_paused() {
            state.platform.input.poll_gamepads();
            let delta = state.platform.timing.begin_update();
            self.game.update(delta, &mut state.platform);
        }

        // Draw, throttled while the device recovers from a loss
        if state.renderer.begin_scene() {
            self.game.draw(&mut state.renderer);
            state.renderer.end_scene();
        } else {
            std::thread::sleep(DEVICE_RETRY_THROTTLE);
        }

        // Report the new drawable size after a device reset
        if let Some((width, height)) = state.renderer.device.take_resize_notification() {
            self.game.window_resized(width, height);
        }

        state.platform.timing.log_frame_rate();
        state.platform.timing.fold_finished_pauses();

        if state.platform.exit_requested {
            self.phase = Phase::ShuttingDown;
            event_loop.exit();

            return;
        }

        // Sleep away the rest of the frame budget
        if let Some(remaining) = state
            .platform
            .timing
            .pacing_sleep(iteration_start.elapsed())
        {
            std::thread::sleep(remaining);
        }
    }
}

impl<G: Game> ApplicationHandler for App<G> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.bootstrap(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                self.phase = Phase::Running;
            }
            Err(error) => {
                self.error = Some(error);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::RedrawRequested => self.iterate(event_loop),
            WindowEvent::CloseRequested => {
                self.phase = Phase::ShuttingDown;
                event_loop.exit();
            }
            WindowEvent::Resized(..) => {
                if let Some(state) = self.state.as_mut() {
                    state.renderer.device.request_reset();
                }
            }
            WindowEvent::KeyboardInput { .. }
            | WindowEvent::ModifiersChanged(..)
            | WindowEvent::CursorMoved { .. }
            | WindowEvent::MouseInput { .. }
            | WindowEvent::MouseWheel { .. } => {
                if let Some(state) = self.state.as_mut() {
                    state.platform.input.handle_window_event(&event);
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Drive the loop, one iteration per redraw
        if let Some(state) = &self.state {
            state.renderer.device.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.phase != Phase::Terminated {
            self.game.pre_shutdown();
            self.phase = Phase::Terminated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Platform};

    /// A disabled toggle swallows requests until every disable is matched.
    #[test]
    fn disabled_fullscreen_toggle_swallows_requests() {
        let mut platform = Platform::new(&Config::default());

        platform.disable_fullscreen_toggle();
        platform.toggle_fullscreen();
        assert!(!platform.take_fullscreen_toggle(false));

        platform.enable_fullscreen_toggle();
        platform.toggle_fullscreen();
        assert!(platform.take_fullscreen_toggle(false));
        // Consumed, a second take returns false
        assert!(!platform.take_fullscreen_toggle(false));
    }

    /// An input driven request passes through the same gate.
    #[test]
    fn input_request_respects_disable_count() {
        let mut platform = Platform::new(&Config::default());

        assert!(platform.take_fullscreen_toggle(true));

        platform.disable_fullscreen_toggle();
        assert!(!platform.take_fullscreen_toggle(true));
    }

    #[test]
    #[should_panic(expected = "Fullscreen toggle enabled without a matching disable")]
    fn unmatched_enable_panics() {
        let mut platform = Platform::new(&Config::default());
        platform.enable_fullscreen_toggle();
    }

    /// Pausing nests and only the outermost resume unpauses.
    #[test]
    fn pause_nests() {
        let mut platform = Platform::new(&Config::default());

        platform.pause();
        platform.pause();
        platform.resume();
        assert!(platform.is_paused());

        platform.resume();
        assert!(!platform.is_paused());
    }
}
