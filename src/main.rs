// =============================================================================
// LAZ ENGINE - Vulkan bootstrap and triangle renderer
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (App)                                         │
// │    └── GraphicsContext (instance .. pipeline)                   │
// │          └── FrameRenderer (framebuffers, commands, sync)       │
// └─────────────────────────────────────────────────────────────────┘
//
// STARTUP FLOW:
// 1. Parse `--key value` arguments, load config.toml, init logging
// 2. Load SPIR-V for the vertex and fragment stages
// 3. On resume: create the window, bootstrap the context, build the renderer
// 4. Draw until the window closes, then tear down in reverse order
//
// Every failure maps to a distinct process exit code.
//
// =============================================================================

mod args;
mod backend;
mod config;

use args::Arguments;
use backend::driver::Driver;
use backend::{
    BootstrapSettings, FrameRenderer, GraphicsContext, ShaderSet, VulkanDriver,
};
use config::{Config, DEFAULT_CONFIG_PATH};
use std::process::ExitCode;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

const EXIT_BAD_ARGUMENTS: u8 = 1;
const EXIT_WINDOW: u8 = 2;
const EXIT_SHADER_ASSET: u8 = 4;
const EXIT_FRAME: u8 = 30;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> ExitCode {
    let args = match Arguments::from_env() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: laz-engine [--config <path>] [--validation on|off] [--log <level>]");
            return ExitCode::from(EXIT_BAD_ARGUMENTS);
        }
    };

    // Load configuration, then let the command line override it
    let mut config = Config::load(args.get("config").unwrap_or(DEFAULT_CONFIG_PATH));
    config.apply_arguments(&args);

    init_logging(&config);
    log::info!("Starting laz engine");
    log::info!(
        "Window: {}x{}, validation {}",
        config.window.width,
        config.window.height,
        if config.debug.validation { "on" } else { "off" }
    );

    let shaders = match ShaderSet::load(&config.vertex_shader(), &config.shaders.fragment) {
        Ok(shaders) => shaders,
        Err(e) => {
            log::error!("{:#}", e);
            return ExitCode::from(EXIT_SHADER_ASSET);
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            return ExitCode::from(EXIT_WINDOW);
        }
    };

    let mut app = App::new(config, shaders);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        return ExitCode::from(EXIT_WINDOW);
    }
    app.shutdown();

    match app.exit_code {
        Some(code) => ExitCode::from(code),
        None => ExitCode::SUCCESS,
    }
}

/// Initialize logging. RUST_LOG wins over the configured level.
fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(config.log_level());
    }
    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: the renderer must be destroyed before the context, and the
/// context before the window. `shutdown` does this explicitly.
struct App {
    config: Config,
    shaders: ShaderSet,
    window: Option<Window>,
    context: Option<GraphicsContext<VulkanDriver>>,
    renderer: Option<FrameRenderer>,
    /// First failure seen; becomes the process exit code
    exit_code: Option<u8>,
}

impl App {
    fn new(config: Config, shaders: ShaderSet) -> Self {
        Self {
            config,
            shaders,
            window: None,
            context: None,
            renderer: None,
            exit_code: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, code: u8) {
        self.exit_code.get_or_insert(code);
        self.shutdown();
        event_loop.exit();
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    fn init_graphics(&mut self, window: &Window) -> Result<(), u8> {
        log::info!("Initializing Vulkan...");

        let driver = VulkanDriver::load().map_err(|e| {
            log::error!("{}", e);
            e.exit_code()
        })?;

        let settings = BootstrapSettings {
            diagnostics: self.config.debug.validation,
            vertex_layout: self.config.graphics.vertex_input,
        };

        // Stored before bootstrapping so a partial context is still torn down
        let context = self.context.insert(GraphicsContext::new(driver));
        if let Err(e) = context.bootstrap(window, &self.shaders, settings) {
            log::error!("Bootstrap failed: {}", e);
            return Err(e.exit_code());
        }

        let renderer = FrameRenderer::new(
            context,
            self.config.graphics.clear_color,
            self.config.graphics.max_frames_in_flight,
        )
        .map_err(|e| {
            log::error!("Failed to create frame renderer: {:#}", e);
            EXIT_FRAME
        })?;
        self.renderer = Some(renderer);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    /// Destroy renderer, context and window, in that order. Idempotent.
    fn shutdown(&mut self) {
        if let Some(context) = self.context.as_mut() {
            if let Some(mut renderer) = self.renderer.take() {
                if let Err(e) = context.driver().wait_idle() {
                    log::warn!("Device wait idle failed: {}", e);
                }
                if let Some(device) = context.driver().device() {
                    renderer.destroy(device);
                }
            }
            context.teardown();
        }
        self.context = None;
        self.window = None;
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_code.is_some() {
            return;
        }

        // Fixed size: the swapchain is never recreated
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                self.fail(event_loop, EXIT_WINDOW);
                return;
            }
        };

        if let Err(code) = self.init_graphics(&window) {
            self.fail(event_loop, code);
            return;
        }

        self.window = Some(window);
    }

    /// Handle window events.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                let (Some(context), Some(renderer)) = (self.context.as_ref(), self.renderer.as_mut())
                else {
                    return;
                };
                if let Err(e) = renderer.draw_frame(context) {
                    log::error!("Render error: {:#}", e);
                    self.fail(event_loop, EXIT_FRAME);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown();
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    /// Keep redrawing continuously.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
