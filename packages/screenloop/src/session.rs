//! The window/context session and the thread-safe control surface.

use crate::{
    geometry::Geometry,
    platform::Platform,
    policy::ScreenPolicy,
};
use std::{
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    thread,
};
use anyhow::{ensure, Result};
use mainthread::Handle;
use vek::*;


// the window is a process-wide resource
static SESSION_LIVE: AtomicBool = AtomicBool::new(false);


/// Owns the platform window, its geometry, and the policy. Lives on the
/// dispatcher's bound thread; everything else reaches it through dispatched
/// units of work, so none of its state needs locking.
pub(crate) struct Session {
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) geometry: Geometry,
    pub(crate) policy: ScreenPolicy,
    pub(crate) title: String,
}

impl Session {
    /// Construct the process's one session. Errors if another session is
    /// alive.
    pub(crate) fn new(platform: Box<dyn Platform>, policy: ScreenPolicy) -> Result<Self> {
        ensure!(
            !SESSION_LIVE.swap(true, Ordering::SeqCst),
            "a window session already exists in this process",
        );
        Ok(Session {
            platform,
            geometry: Geometry::new(),
            policy,
            title: String::new(),
        })
    }

    pub(crate) fn set_screen_size(
        &mut self,
        size: Extent2<u32>,
        scale: f64,
        fullscreen: bool,
    ) -> Result<bool> {
        self.geometry.set_screen_size(
            &mut *self.platform,
            &self.policy,
            &self.title,
            size,
            scale,
            fullscreen,
        )
    }

    pub(crate) fn window_size(&mut self) -> Extent2<u32> {
        self.geometry.window_size(&mut *self.platform)
    }

    pub(crate) fn take_size_change(&mut self) -> Option<(Extent2<u32>, f64)> {
        self.geometry.take_size_change(&mut *self.platform)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        SESSION_LIVE.store(false, Ordering::SeqCst);
    }
}


/// Thread-safe handle to the screen controller. Cheap to clone; every clone
/// talks to the same window.
///
/// The geometry requests ([`set_size`](Self::set_size),
/// [`set_scale`](Self::set_scale), [`set_fullscreen`](Self::set_fullscreen))
/// may only be called while [`run`](Self::run) is running: before that there
/// is no geometry baseline to change, and calling them is a programming error
/// that panics. The queries degrade to zero values instead, and
/// [`set_cursor_visible`](Self::set_cursor_visible) is safe at any time.
#[derive(Clone)]
pub struct Screen {
    pub(crate) handle: Handle<Session>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) started: Arc<AtomicBool>,
}

impl Screen {
    pub(crate) fn new(handle: Handle<Session>) -> Self {
        Screen {
            handle,
            running: Arc::new(AtomicBool::new(false)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request a new logical size, holding scale and fullscreen fixed.
    /// Returns whether the change took effect.
    pub fn set_size(&self, width: u32, height: u32) -> Result<bool> {
        self.require_running();
        self.handle
            .submit(move |session| {
                let scale = session.geometry.scale;
                let fullscreen = session.geometry.fullscreen;
                session.set_screen_size(Extent2 { w: width, h: height }, scale, fullscreen)
            })
            .unwrap_or(Ok(false))
    }

    /// Request a new user scale, holding size and fullscreen fixed. Returns
    /// whether the change took effect.
    pub fn set_scale(&self, scale: f64) -> Result<bool> {
        self.require_running();
        self.handle
            .submit(move |session| {
                let size = session.geometry.size;
                let fullscreen = session.geometry.fullscreen;
                session.set_screen_size(size, scale, fullscreen)
            })
            .unwrap_or(Ok(false))
    }

    /// Request entering or leaving fullscreen, holding size and scale fixed.
    /// Returns whether the change took effect.
    pub fn set_fullscreen(&self, fullscreen: bool) -> Result<bool> {
        self.require_running();
        self.handle
            .submit(move |session| {
                let size = session.geometry.size;
                let scale = session.geometry.scale;
                session.set_screen_size(size, scale, fullscreen)
            })
            .unwrap_or(Ok(false))
    }

    /// The current user scale, or 0 if the run loop is not running.
    pub fn scale(&self) -> f64 {
        if !self.running.load(Ordering::SeqCst) {
            return 0.0;
        }
        self.handle.submit(|session| session.geometry.scale).unwrap_or(0.0)
    }

    /// Whether the window is fullscreen, or false if the run loop is not
    /// running.
    pub fn is_fullscreen(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.handle
            .submit(|session| session.geometry.fullscreen)
            .unwrap_or(false)
    }

    /// Show or hide the cursor over the window. Fire-and-forget: safe to
    /// call before the run loop starts (it applies once the loop is up), and
    /// silently dropped if the dispatcher has already shut down.
    pub fn set_cursor_visible(&self, visible: bool) {
        let handle = self.handle.clone();
        thread::spawn(move || {
            let _ = handle.submit(move |session| session.platform.set_cursor_visible(visible));
        });
    }

    fn require_running(&self) {
        if !self.running.load(Ordering::SeqCst) {
            panic!("screenloop: the run loop is not running");
        }
    }
}


#[cfg(test)]
use crate::platform::fake::FakePlatform;

/// Serializes tests that construct a `Session`, since at most one may be
/// alive per process.
#[cfg(test)]
pub(crate) fn session_test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn test_at_most_one_session_per_process() {
    let _guard = session_test_lock();
    let first = Session::new(Box::new(FakePlatform::new()), ScreenPolicy::default()).unwrap();
    assert!(Session::new(Box::new(FakePlatform::new()), ScreenPolicy::default()).is_err());
    drop(first);
    // the slot frees up again
    let _second =
        Session::new(Box::new(FakePlatform::new()), ScreenPolicy::default()).unwrap();
}

#[test]
#[should_panic(expected = "run loop is not running")]
fn test_set_size_before_run_panics() {
    let _guard = session_test_lock();
    let session = Session::new(Box::new(FakePlatform::new()), ScreenPolicy::default()).unwrap();
    let (_mt, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);
    let _ = screen.set_size(800, 600);
}

#[test]
fn test_queries_return_zero_values_before_run() {
    let _guard = session_test_lock();
    let session = Session::new(Box::new(FakePlatform::new()), ScreenPolicy::default()).unwrap();
    let (_mt, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);
    assert_eq!(screen.scale(), 0.0);
    assert!(!screen.is_fullscreen());
}

#[test]
fn test_cursor_visibility_applies_once_loop_runs() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();
    let session = Session::new(Box::new(fake), ScreenPolicy::default()).unwrap();
    let (mt, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);

    // requested before any dispatch loop exists; queued, not dropped
    screen.set_cursor_visible(false);

    let (send_term, recv_term) = crossbeam_channel::bounded(1);
    {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            while state.lock().unwrap().cursor_visible {
                thread::sleep(std::time::Duration::from_millis(1));
            }
            send_term.send(()).unwrap();
        });
    }
    assert_eq!(mt.run(recv_term), Some(()));
    assert!(!state.lock().unwrap().cursor_visible);
}
