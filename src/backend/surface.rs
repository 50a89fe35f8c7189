// Surface binding
//
// The window is an external collaborator: all the bootstrap needs from it is
// its raw handles and its framebuffer size in pixels.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};

use super::driver::Driver;
use super::error::{BootstrapError, BootstrapResult};

pub trait WindowTarget {
    fn display_handle(&self) -> RawDisplayHandle;
    fn window_handle(&self) -> RawWindowHandle;
    /// Framebuffer size in pixels, not in screen coordinates
    fn framebuffer_size(&self) -> (u32, u32);
}

impl WindowTarget for winit::window::Window {
    fn display_handle(&self) -> RawDisplayHandle {
        self.raw_display_handle()
    }

    fn window_handle(&self) -> RawWindowHandle {
        self.raw_window_handle()
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

pub fn create_surface<D: Driver, W: WindowTarget>(
    driver: &D,
    window: &W,
) -> BootstrapResult<vk::SurfaceKHR> {
    let surface = driver
        .create_surface(window.display_handle(), window.window_handle())
        .map_err(BootstrapError::SurfaceCreation)?;

    log::info!("Created window surface");
    Ok(surface)
}
