//! Contract between the screen controller and the platform windowing system.

use vek::*;


pub mod glfw_backend;

#[cfg(test)]
pub(crate) mod fake;


/// A display video mode: resolution in window units plus refresh rate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VideoMode {
    pub size: Extent2<u32>,
    pub refresh_rate: u32,
}

/// Operations the screen controller requires of the platform windowing
/// system and its one window.
///
/// Everything here is thread-affine: a `Platform` is created on the thread
/// that owns the native window/context and must only ever be touched from
/// that thread. The controller guarantees this by routing every call through
/// its dispatcher.
pub trait Platform {
    /// Process pending platform events.
    fn poll_events(&mut self);

    /// Whether the user has asked the window to close.
    fn should_close(&self) -> bool;

    /// Whether the window has input focus.
    fn is_focused(&self) -> bool;

    /// Present the back buffer.
    fn swap_buffers(&mut self);

    /// Make the window visible.
    fn show(&mut self);

    /// Window position in window units.
    fn position(&self) -> Vec2<i32>;

    fn set_position(&mut self, pos: Vec2<i32>);

    /// Resize the window, in window units.
    fn set_size(&mut self, size: Extent2<u32>);

    fn set_title(&mut self, title: &str);

    /// Attach the window to the primary monitor at the given mode.
    fn enter_fullscreen(&mut self, mode: &VideoMode);

    /// Detach the window from its monitor back to a normal windowed state at
    /// `pos`, with a small placeholder size the caller is expected to fix up
    /// with `set_size`.
    fn leave_fullscreen(&mut self, pos: Vec2<i32>, refresh_rate: u32);

    /// Current video mode of the primary monitor.
    fn primary_video_mode(&mut self) -> VideoMode;

    /// Native pixels per logical pixel.
    fn device_scale(&mut self) -> f64;

    /// Platform window units per logical pixel. Distinct from
    /// `device_scale` on platforms whose window coordinates are not pixels.
    fn window_scale(&mut self) -> f64;

    /// Arm a one-shot watch for the next framebuffer-size change.
    fn watch_framebuffer_resize(&mut self);

    /// Consume the armed watch: true once, after the platform has delivered
    /// a framebuffer-size change since the last `watch_framebuffer_resize`.
    fn framebuffer_resize_fired(&mut self) -> bool;

    fn set_cursor_visible(&mut self, visible: bool);

    /// Tear the window down. Called exactly once, after which no other
    /// method may be called.
    fn terminate(&mut self);
}
