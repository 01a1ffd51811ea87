//! Scripted in-memory platform for exercising the controller without a
//! window system.

use super::{Platform, VideoMode};
use std::sync::{Arc, Mutex};
use vek::*;


/// Shares its state behind an `Arc` so tests can script behavior up front
/// and inspect what the controller did after the fact.
#[derive(Clone)]
pub(crate) struct FakePlatform(Arc<Mutex<FakeState>>);

pub(crate) struct FakeState {
    pub mode: VideoMode,
    pub device_scale: f64,
    pub window_scale: f64,
    pub pos: Vec2<i32>,
    pub size: Extent2<u32>,
    pub title: String,
    pub visible: bool,
    pub focused: bool,
    pub close_requested: bool,
    pub cursor_visible: bool,
    /// `Some(mode)` while attached to the monitor.
    pub fullscreen_mode: Option<VideoMode>,
    pub swaps: u32,
    pub polls: u32,
    pub video_mode_queries: u32,
    pub terminates: u32,
    /// Polls (counted from arming) before an armed resize watch fires.
    /// `None` means the platform never confirms the resize.
    pub resize_fire_after_polls: Option<u32>,
    /// Request close once total polls reach this count.
    pub close_after_polls: Option<u32>,
    /// Regain focus once total polls reach this count.
    pub focus_after_polls: Option<u32>,
    resize_countdown: Option<u32>,
    resize_fired: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        FakePlatform(Arc::new(Mutex::new(FakeState {
            mode: VideoMode {
                size: Extent2 { w: 1920, h: 1080 },
                refresh_rate: 60,
            },
            device_scale: 1.0,
            window_scale: 1.0,
            pos: Vec2 { x: 100, y: 100 },
            size: Extent2 { w: 16, h: 16 },
            title: String::new(),
            visible: false,
            focused: true,
            close_requested: false,
            cursor_visible: true,
            fullscreen_mode: None,
            swaps: 0,
            polls: 0,
            video_mode_queries: 0,
            terminates: 0,
            resize_fire_after_polls: Some(1),
            close_after_polls: None,
            focus_after_polls: None,
            resize_countdown: None,
            resize_fired: false,
        })))
    }

    /// Handle for scripting and inspecting the state from the test.
    pub fn state(&self) -> Arc<Mutex<FakeState>> {
        Arc::clone(&self.0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }
}

impl Platform for FakePlatform {
    fn poll_events(&mut self) {
        let mut s = self.lock();
        s.polls += 1;
        if s.close_after_polls.map(|n| s.polls >= n).unwrap_or(false) {
            s.close_requested = true;
        }
        if s.focus_after_polls.map(|n| s.polls >= n).unwrap_or(false) {
            s.focused = true;
        }
        if let Some(left) = s.resize_countdown {
            if left <= 1 {
                s.resize_countdown = None;
                s.resize_fired = true;
            } else {
                s.resize_countdown = Some(left - 1);
            }
        }
    }

    fn should_close(&self) -> bool {
        self.lock().close_requested
    }

    fn is_focused(&self) -> bool {
        self.lock().focused
    }

    fn swap_buffers(&mut self) {
        self.lock().swaps += 1;
    }

    fn show(&mut self) {
        self.lock().visible = true;
    }

    fn position(&self) -> Vec2<i32> {
        self.lock().pos
    }

    fn set_position(&mut self, pos: Vec2<i32>) {
        self.lock().pos = pos;
    }

    fn set_size(&mut self, size: Extent2<u32>) {
        self.lock().size = size;
    }

    fn set_title(&mut self, title: &str) {
        self.lock().title = title.to_owned();
    }

    fn enter_fullscreen(&mut self, mode: &VideoMode) {
        let mut s = self.lock();
        s.fullscreen_mode = Some(*mode);
        s.size = mode.size;
    }

    fn leave_fullscreen(&mut self, pos: Vec2<i32>, _refresh_rate: u32) {
        let mut s = self.lock();
        s.fullscreen_mode = None;
        s.pos = pos;
        s.size = Extent2 { w: 16, h: 16 };
    }

    fn primary_video_mode(&mut self) -> VideoMode {
        let mut s = self.lock();
        s.video_mode_queries += 1;
        s.mode
    }

    fn device_scale(&mut self) -> f64 {
        self.lock().device_scale
    }

    fn window_scale(&mut self) -> f64 {
        self.lock().window_scale
    }

    fn watch_framebuffer_resize(&mut self) {
        let mut s = self.lock();
        s.resize_countdown = s.resize_fire_after_polls;
        s.resize_fired = false;
    }

    fn framebuffer_resize_fired(&mut self) -> bool {
        let mut s = self.lock();
        let fired = s.resize_fired;
        s.resize_fired = false;
        fired
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        self.lock().cursor_visible = visible;
    }

    fn terminate(&mut self) {
        self.lock().terminates += 1;
    }
}
