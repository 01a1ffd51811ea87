//! GLFW-backed platform windowing.

use crate::platform::{Platform, VideoMode};
use anyhow::{anyhow, Context as _, Result};
use glfw::{
    fail_on_errors,
    Context,
    CursorMode,
    Glfw,
    GlfwReceiver,
    PWindow,
    SwapInterval,
    WindowEvent,
    WindowHint,
    WindowMode,
};
use vek::*;


// size of the hidden placeholder window and of the detached window while
// coming back from fullscreen, before the real size is applied
const PLACEHOLDER_SIZE: u32 = 16;

enum ResizeWatch {
    Idle,
    Armed,
    Fired,
}

/// The real `Platform`: one GLFW window with a GL 2.1 context.
///
/// Must be created on the main thread, and only ever touched from it.
pub struct GlfwPlatform {
    glfw: Glfw,
    window: Option<PWindow>,
    events: Option<GlfwReceiver<(f64, WindowEvent)>>,
    resize_watch: ResizeWatch,
}

impl GlfwPlatform {
    /// Initialize the windowing system and create the hidden placeholder
    /// window with its context made current and vsync-locked swapping
    /// enabled. Failure here is unrecoverable for the process.
    pub fn new() -> Result<Self> {
        debug!("initializing platform windowing system");
        let mut glfw = glfw::init(glfw::fail_on_errors!())
            .context("failed to initialize the platform windowing system")?;
        glfw.window_hint(WindowHint::Visible(false));
        glfw.window_hint(WindowHint::Resizable(false));
        glfw.window_hint(WindowHint::ContextVersion(2, 1));

        // temporary size; the frame loop applies the real geometry before
        // the window is shown
        let (mut window, events) = glfw
            .create_window(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, "", WindowMode::Windowed)
            .ok_or_else(|| anyhow!("failed to create the platform window"))?;
        window.set_framebuffer_size_polling(true);
        window.make_current();
        glfw.set_swap_interval(SwapInterval::Sync(1));

        Ok(GlfwPlatform {
            glfw,
            window: Some(window),
            events: Some(events),
            resize_watch: ResizeWatch::Idle,
        })
    }

    fn window(&self) -> &glfw::Window {
        self.window.as_deref().expect("platform window used after terminate")
    }

    fn window_mut(&mut self) -> &mut glfw::Window {
        self.window.as_deref_mut().expect("platform window used after terminate")
    }
}

impl Platform for GlfwPlatform {
    fn poll_events(&mut self) {
        self.glfw.poll_events();
        if let Some(events) = self.events.as_ref() {
            for (_, event) in glfw::flush_messages(events) {
                if let WindowEvent::FramebufferSize(w, h) = event {
                    if matches!(self.resize_watch, ResizeWatch::Armed) {
                        trace!(w, h, "armed framebuffer resize observed");
                        self.resize_watch = ResizeWatch::Fired;
                    }
                }
            }
        }
    }

    fn should_close(&self) -> bool {
        self.window().should_close()
    }

    fn is_focused(&self) -> bool {
        self.window().is_focused()
    }

    fn swap_buffers(&mut self) {
        self.window_mut().swap_buffers();
    }

    fn show(&mut self) {
        self.window_mut().show();
    }

    fn position(&self) -> Vec2<i32> {
        let (x, y) = self.window().get_pos();
        Vec2 { x, y }
    }

    fn set_position(&mut self, pos: Vec2<i32>) {
        self.window_mut().set_pos(pos.x, pos.y);
    }

    fn set_size(&mut self, size: Extent2<u32>) {
        self.window_mut().set_size(size.w as i32, size.h as i32);
    }

    fn set_title(&mut self, title: &str) {
        self.window_mut().set_title(title);
    }

    fn enter_fullscreen(&mut self, mode: &VideoMode) {
        let window = self.window.as_deref_mut().expect("platform window used after terminate");
        self.glfw.with_primary_monitor(|_, monitor| match monitor {
            Some(monitor) => window.set_monitor(
                WindowMode::FullScreen(monitor),
                0,
                0,
                mode.size.w,
                mode.size.h,
                Some(mode.refresh_rate),
            ),
            None => warn!("no primary monitor to enter fullscreen on"),
        });
    }

    fn leave_fullscreen(&mut self, pos: Vec2<i32>, refresh_rate: u32) {
        self.window_mut().set_monitor(
            WindowMode::Windowed,
            pos.x,
            pos.y,
            PLACEHOLDER_SIZE,
            PLACEHOLDER_SIZE,
            Some(refresh_rate),
        );
    }

    fn primary_video_mode(&mut self) -> VideoMode {
        self.glfw.with_primary_monitor(|_, monitor| {
            monitor
                .and_then(|monitor| monitor.get_video_mode())
                .map(|mode| VideoMode {
                    size: Extent2 { w: mode.width, h: mode.height },
                    refresh_rate: mode.refresh_rate,
                })
                .unwrap_or_else(|| {
                    warn!("no primary monitor video mode, assuming 640x480 at 60hz");
                    VideoMode {
                        size: Extent2 { w: 640, h: 480 },
                        refresh_rate: 60,
                    }
                })
        })
    }

    fn device_scale(&mut self) -> f64 {
        let (scale, _) = self.window().get_content_scale();
        scale as f64
    }

    fn window_scale(&mut self) -> f64 {
        // GLFW window units are logical points on macOS and pixels elsewhere
        if cfg!(target_os = "macos") {
            1.0
        } else {
            self.device_scale()
        }
    }

    fn watch_framebuffer_resize(&mut self) {
        self.resize_watch = ResizeWatch::Armed;
    }

    fn framebuffer_resize_fired(&mut self) -> bool {
        match self.resize_watch {
            ResizeWatch::Fired => {
                self.resize_watch = ResizeWatch::Idle;
                true
            }
            _ => false,
        }
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        let mode = if visible { CursorMode::Normal } else { CursorMode::Hidden };
        self.window_mut().set_cursor_mode(mode);
    }

    fn terminate(&mut self) {
        debug!("destroying the platform window");
        drop(self.events.take());
        drop(self.window.take());
    }
}
