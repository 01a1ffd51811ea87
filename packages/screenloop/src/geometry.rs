//! Screen geometry state and the windowed/fullscreen transition algorithm.

use crate::{
    platform::Platform,
    policy::ScreenPolicy,
};
use std::time::Instant;
use anyhow::{ensure, Result};
use vek::*;


/// The one source of truth for screen geometry. Mutated only from inside
/// dispatched units of work, so it carries no locking of its own.
///
/// The cached scales are `None` until queried, and dropped back to `None`
/// whenever the logical size changes, so a stale value can never be read.
/// `orig_pos` is `Some` exactly while the window is fullscreen; it holds the
/// windowed position to restore on the way back out.
pub(crate) struct Geometry {
    pub(crate) size: Extent2<u32>,
    pub(crate) scale: f64,
    pub(crate) fullscreen: bool,
    pub(crate) size_changed: bool,
    pub(crate) orig_pos: Option<Vec2<i32>>,
    device_scale: Option<f64>,
    window_scale: Option<f64>,
    fullscreen_scale: Option<f64>,
}

impl Geometry {
    pub(crate) fn new() -> Self {
        Geometry {
            size: Extent2 { w: 0, h: 0 },
            scale: 0.0,
            fullscreen: false,
            size_changed: true,
            orig_pos: None,
            device_scale: None,
            window_scale: None,
            fullscreen_scale: None,
        }
    }

    /// Reconcile a requested (size, scale, fullscreen) tuple with the
    /// platform window. Returns whether anything took effect: `Ok(false)`
    /// means the request matched the current state or was rejected as
    /// unsafely small, and nothing was mutated.
    ///
    /// Leaving fullscreen blocks until the platform confirms the new
    /// framebuffer size, bounded by `policy.resize_wait_millis`. Some
    /// platforms apply the resize asynchronously, and everything downstream
    /// assumes the window has already reached its final size.
    pub(crate) fn set_screen_size(
        &mut self,
        platform: &mut dyn Platform,
        policy: &ScreenPolicy,
        title: &str,
        size: Extent2<u32>,
        scale: f64,
        fullscreen: bool,
    ) -> Result<bool> {
        if self.size == size && self.scale == scale && self.fullscreen == fullscreen {
            return Ok(false);
        }

        // tentatively apply the new scale so the guard sees the size the
        // window would actually take; roll back on rejection
        let orig_scale = self.scale;
        self.scale = scale;
        if ((size.w as f64 * self.actual_scale(platform)) as u32) < policy.min_window_width {
            debug!(
                width = size.w,
                scale,
                min = policy.min_window_width,
                "rejecting resize below minimum window width"
            );
            self.scale = orig_scale;
            return Ok(false);
        }

        if self.size != size {
            self.size = size;
            self.invalidate_scale_caches();
        }

        // flush the frame rendered at the old size before the window changes
        platform.swap_buffers();

        self.fullscreen = fullscreen;

        let mode = platform.primary_video_mode();
        if fullscreen {
            // remember where the window was, once, across repeated requests
            if self.orig_pos.is_none() {
                self.orig_pos = Some(platform.position());
            }
            debug!(?mode, "attaching window to primary monitor");
            platform.enter_fullscreen(&mode);
        } else {
            if let Some(pos) = self.orig_pos.take() {
                debug!(x = pos.x, y = pos.y, "restoring windowed position");
                platform.leave_fullscreen(pos, mode.refresh_rate);
            }
            platform.watch_framebuffer_resize();
            let win = self.window_size(platform);
            platform.set_size(win);
            let deadline = Instant::now() + policy.resize_wait_timeout();
            while !platform.framebuffer_resize_fired() {
                ensure!(
                    Instant::now() < deadline,
                    "timed out waiting for the platform to confirm the window resize",
                );
                platform.poll_events();
            }
            // the title can be dropped coming back from fullscreen
            platform.set_title(title);
        }

        self.size_changed = true;
        Ok(true)
    }

    /// Window-unit size the current geometry requires.
    pub(crate) fn window_size(&mut self, platform: &mut dyn Platform) -> Extent2<u32> {
        let window_scale = self.fetch_window_scale(platform);
        Extent2 {
            w: (self.size.w as f64 * self.scale * window_scale) as u32,
            h: (self.size.h as f64 * self.scale * window_scale) as u32,
        }
    }

    /// The scale in effect: the user's own when windowed, or the largest
    /// scale that fits the logical canvas inside the display without
    /// distortion when fullscreen.
    pub(crate) fn fit_scale(&mut self, platform: &mut dyn Platform) -> f64 {
        if !self.fullscreen {
            return self.scale;
        }
        if let Some(cached) = self.fullscreen_scale {
            return cached;
        }
        let window_scale = self.fetch_window_scale(platform);
        let mode = platform.primary_video_mode();
        let fit_w = mode.size.w as f64 / window_scale / self.size.w as f64;
        let fit_h = mode.size.h as f64 / window_scale / self.size.h as f64;
        let fit = fit_w.min(fit_h);
        self.fullscreen_scale = Some(fit);
        fit
    }

    /// Scale between logical pixels and native pixels: `fit_scale` times the
    /// device's own pixel density.
    pub(crate) fn actual_scale(&mut self, platform: &mut dyn Platform) -> f64 {
        let device_scale = self.fetch_device_scale(platform);
        self.fit_scale(platform) * device_scale
    }

    /// Consume the edge-triggered size-change flag, yielding the logical
    /// size and recomputed actual scale to push to the graphics context.
    pub(crate) fn take_size_change(
        &mut self,
        platform: &mut dyn Platform,
    ) -> Option<(Extent2<u32>, f64)> {
        if !self.size_changed {
            return None;
        }
        self.size_changed = false;
        let scale = self.actual_scale(platform);
        Some((self.size, scale))
    }

    fn fetch_device_scale(&mut self, platform: &mut dyn Platform) -> f64 {
        *self.device_scale.get_or_insert_with(|| platform.device_scale())
    }

    fn fetch_window_scale(&mut self, platform: &mut dyn Platform) -> f64 {
        *self.window_scale.get_or_insert_with(|| platform.window_scale())
    }

    fn invalidate_scale_caches(&mut self) {
        self.device_scale = None;
        self.window_scale = None;
        self.fullscreen_scale = None;
    }
}


#[cfg(test)]
use crate::platform::fake::FakePlatform;

#[cfg(test)]
fn set_up(fake: &mut FakePlatform) -> (Geometry, ScreenPolicy) {
    let mut geometry = Geometry::new();
    let policy = ScreenPolicy::default();
    let changed = geometry
        .set_screen_size(fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, false)
        .unwrap();
    assert!(changed);
    (geometry, policy)
}

#[test]
fn test_initial_resize_takes_effect() {
    let mut fake = FakePlatform::new();
    let (mut geometry, _) = set_up(&mut fake);
    assert_eq!(geometry.size, Extent2 { w: 640, h: 480 });
    assert_eq!(geometry.scale, 1.0);
    assert!(!geometry.fullscreen);
    assert!(geometry.size_changed);
    assert_eq!(fake.state().lock().unwrap().size, Extent2 { w: 640, h: 480 });

    let (size, scale) = geometry.take_size_change(&mut fake).unwrap();
    assert_eq!(size, Extent2 { w: 640, h: 480 });
    assert_eq!(scale, 1.0);
    assert!(geometry.take_size_change(&mut fake).is_none());
}

#[test]
fn test_equal_request_is_noop() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);
    let _ = geometry.take_size_change(&mut fake);
    let swaps = fake.state().lock().unwrap().swaps;

    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, false)
        .unwrap();
    assert!(!changed);
    assert!(!geometry.size_changed);
    // nothing touched the window either
    assert_eq!(fake.state().lock().unwrap().swaps, swaps);
}

#[test]
fn test_too_small_resize_rolls_back_scale() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);
    let _ = geometry.take_size_change(&mut fake);

    // 640 * 0.25 window units is below the 252 minimum
    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 0.25, false)
        .unwrap();
    assert!(!changed);
    assert_eq!(geometry.scale, 1.0);
    assert!(!geometry.size_changed);

    // a too-narrow logical width is rejected outright
    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 100, h: 480 }, 1.0, false)
        .unwrap();
    assert!(!changed);
    assert_eq!(geometry.size, Extent2 { w: 640, h: 480 });
}

#[test]
fn test_enter_fullscreen_remembers_position() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);

    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, true)
        .unwrap();
    assert!(changed);
    assert!(geometry.fullscreen);
    assert_eq!(geometry.orig_pos, Some(Vec2 { x: 100, y: 100 }));

    let state = fake.state();
    let state = state.lock().unwrap();
    // attached to the monitor at its native mode
    let mode = state.fullscreen_mode.expect("window not attached to monitor");
    assert_eq!(mode.size, Extent2 { w: 1920, h: 1080 });
    assert_eq!(mode.refresh_rate, 60);
}

#[test]
fn test_repeated_fullscreen_requests_keep_first_position() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);

    geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, true)
        .unwrap();
    // the platform has since moved the window
    fake.state().lock().unwrap().pos = Vec2 { x: 0, y: 0 };

    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 2.0, true)
        .unwrap();
    assert!(changed);
    assert_eq!(geometry.orig_pos, Some(Vec2 { x: 100, y: 100 }));
}

#[test]
fn test_leave_fullscreen_restores_position() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);

    geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, true)
        .unwrap();
    let changed = geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, false)
        .unwrap();
    assert!(changed);
    assert!(!geometry.fullscreen);
    assert_eq!(geometry.orig_pos, None);

    let state = fake.state();
    let state = state.lock().unwrap();
    assert!(state.fullscreen_mode.is_none());
    assert_eq!(state.pos, Vec2 { x: 100, y: 100 });
    // resized back to the windowed geometry once the platform confirmed
    assert_eq!(state.size, Extent2 { w: 640, h: 480 });
    assert_eq!(state.title, "demo");
}

#[test]
fn test_fullscreen_fit_scale_formula_and_cache() {
    let mut fake = FakePlatform::new();
    let (mut geometry, policy) = set_up(&mut fake);

    geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 480 }, 1.0, true)
        .unwrap();
    // min(1920/1/640, 1080/1/480)
    let fit = geometry.fit_scale(&mut fake);
    assert!((fit - 2.25).abs() < 1e-9);

    // cached: re-reading does not query the platform again
    let queries = fake.state().lock().unwrap().video_mode_queries;
    assert_eq!(geometry.fit_scale(&mut fake), fit);
    assert_eq!(fake.state().lock().unwrap().video_mode_queries, queries);

    // a size change invalidates the cache and the fit recomputes
    geometry
        .set_screen_size(&mut fake, &policy, "demo", Extent2 { w: 640, h: 600 }, 1.0, true)
        .unwrap();
    let fit = geometry.fit_scale(&mut fake);
    assert!((fit - 1.8).abs() < 1e-9);
    assert!(fake.state().lock().unwrap().video_mode_queries > queries);
}

#[test]
fn test_actual_scale_includes_device_scale() {
    let mut fake = FakePlatform::new();
    fake.state().lock().unwrap().device_scale = 2.0;
    let (mut geometry, _) = set_up(&mut fake);
    assert_eq!(geometry.actual_scale(&mut fake), 2.0);
}

#[test]
fn test_resize_wait_timeout_is_an_error() {
    let mut fake = FakePlatform::new();
    fake.state().lock().unwrap().resize_fire_after_polls = None;
    let mut geometry = Geometry::new();
    let policy = ScreenPolicy {
        resize_wait_millis: 10,
        ..ScreenPolicy::default()
    };
    let result = geometry.set_screen_size(
        &mut fake,
        &policy,
        "demo",
        Extent2 { w: 640, h: 480 },
        1.0,
        false,
    );
    assert!(result.is_err());
}
