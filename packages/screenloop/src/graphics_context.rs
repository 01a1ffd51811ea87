//! Contract for the external graphics context the frame loop drives.

use anyhow::Result;


/// One frame's worth of application logic and rendering, owned by the
/// application and driven by [`Screen::run`](crate::Screen::run) from the
/// loop's own thread.
pub trait GraphicsContext {
    /// The logical screen size or effective device scale changed; the next
    /// `update` will render at the new geometry.
    fn set_size(&mut self, width: u32, height: u32, scale: f64);

    /// Advance one frame. An error ends the frame loop.
    fn update(&mut self) -> Result<()>;

    /// Rebind the default framebuffer. Called after `update` and before the
    /// frame is presented.
    fn bind_screen_framebuffer(&mut self) -> Result<()>;
}
