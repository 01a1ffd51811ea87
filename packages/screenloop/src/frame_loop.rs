//! The frame loop: drives the graphics context against the platform window.

use crate::{
    graphics_context::GraphicsContext,
    session::{Screen, Session},
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
    time::Duration,
};
use anyhow::{anyhow, ensure, Result};
use mainthread::Handle;
use vek::*;


/// Why the frame loop ended, short of an error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Termination {
    /// The user closed the window.
    Closed,
}

// resets the running flag however the loop exits
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// tears the platform down exactly once, whichever way the loop exits
struct TeardownGuard(Handle<Session>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let _ = self.0.submit(|session| session.platform.terminate());
    }
}

impl Screen {
    /// Apply the initial geometry, show the window, and drive the frame loop
    /// until the user closes the window (`Ok(Termination::Closed)`) or the
    /// graphics context fails (`Err`).
    ///
    /// Must be called at most once, and never from the dispatcher's bound
    /// thread. Blocks for the lifetime of the window; every
    /// platform-touching step runs as a dispatched unit of work, so requests
    /// from other threads interleave with the loop's own.
    pub fn run<G: GraphicsContext>(
        &self,
        width: u32,
        height: u32,
        scale: f64,
        title: &str,
        graphics: &mut G,
    ) -> Result<Termination> {
        if self.started.swap(true, Ordering::SeqCst) {
            panic!("screenloop: run called more than once");
        }
        self.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(Arc::clone(&self.running));
        let _teardown = TeardownGuard(self.handle.clone());

        let idle_interval = self
            .handle
            .submit(|session| session.policy.unfocused_poll_interval())
            .ok_or_else(|| anyhow!("dispatch loop is not available"))?;

        // initial geometry, title, visibility, position
        let title = title.to_owned();
        self.handle
            .submit(move |session| -> Result<()> {
                let mode = session.platform.primary_video_mode();
                let changed =
                    session.set_screen_size(Extent2 { w: width, h: height }, scale, false)?;
                ensure!(changed, "failed to apply the initial screen size");
                session.title = title;
                session.platform.set_title(&session.title);
                session.platform.show();
                // centered horizontally, a third of the way down
                let win = session.window_size();
                session.platform.set_position(Vec2 {
                    x: (mode.size.w as i32 - win.w as i32) / 2,
                    y: (mode.size.h as i32 - win.h as i32) / 3,
                });
                Ok(())
            })
            .ok_or_else(|| anyhow!("dispatch loop is not available"))??;

        info!(width, height, scale, "entering frame loop");
        loop {
            if self
                .handle
                .submit(|session| session.platform.should_close())
                .unwrap_or(true)
            {
                info!("window close requested");
                return Ok(Termination::Closed);
            }

            let resized = self.handle.submit(|session| session.take_size_change()).flatten();
            if let Some((size, actual_scale)) = resized {
                debug!(w = size.w, h = size.h, actual_scale, "screen size changed");
                graphics.set_size(size.w, size.h, actual_scale);
            }

            self.poll_events_idle(idle_interval);

            graphics.update()?;
            // the default framebuffer must be bound before presenting
            graphics.bind_screen_framebuffer()?;
            let _ = self.handle.submit(|session| session.platform.swap_buffers());
        }
    }

    /// Poll platform events, idling while the window is unfocused so a
    /// backgrounded window does not spin the CPU. Each re-poll is its own
    /// dispatched unit, so requests from other threads still interleave with
    /// the wait; a close request ends the wait early.
    fn poll_events_idle(&self, interval: Duration) {
        let mut focused = self
            .handle
            .submit(|session| {
                session.platform.poll_events();
                session.platform.is_focused()
            })
            .unwrap_or(true);
        while !focused {
            thread::sleep(interval);
            match self.handle.submit(|session| {
                session.platform.poll_events();
                (session.platform.is_focused(), session.platform.should_close())
            }) {
                Some((_, true)) | None => return,
                Some((now_focused, false)) => focused = now_focused,
            }
        }
    }
}


#[cfg(test)]
use crate::{
    platform::fake::FakePlatform,
    policy::ScreenPolicy,
    session::session_test_lock,
};
#[cfg(test)]
use std::{
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
    sync::Mutex,
};

#[cfg(test)]
#[derive(Default)]
struct GraphicsLog {
    updates: u32,
    sizes: Vec<(u32, u32, f64)>,
}

#[cfg(test)]
struct FakeGraphics {
    log: Arc<Mutex<GraphicsLog>>,
    fail_update_at: Option<u32>,
    on_update: Option<Box<dyn FnMut(u32) + Send>>,
}

#[cfg(test)]
impl FakeGraphics {
    fn new() -> (Self, Arc<Mutex<GraphicsLog>>) {
        let log = Arc::new(Mutex::new(GraphicsLog::default()));
        (
            FakeGraphics {
                log: Arc::clone(&log),
                fail_update_at: None,
                on_update: None,
            },
            log,
        )
    }
}

#[cfg(test)]
impl GraphicsContext for FakeGraphics {
    fn set_size(&mut self, width: u32, height: u32, scale: f64) {
        self.log.lock().unwrap().sizes.push((width, height, scale));
    }

    fn update(&mut self) -> Result<()> {
        let updates = {
            let mut log = self.log.lock().unwrap();
            log.updates += 1;
            log.updates
        };
        if let Some(callback) = self.on_update.as_mut() {
            callback(updates);
        }
        if self.fail_update_at.map(|n| updates >= n).unwrap_or(false) {
            anyhow::bail!("graphics update failed");
        }
        Ok(())
    }

    fn bind_screen_framebuffer(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Runs the dispatch loop on the test thread and `Screen::run` on a driver
/// thread, the same shape `screenloop::run` wires up for real use.
#[cfg(test)]
fn run_screen<F>(
    fake: FakePlatform,
    policy: ScreenPolicy,
    build: F,
) -> (Result<Termination>, Screen)
where
    F: FnOnce(&Screen) -> FakeGraphics,
{
    let session = Session::new(Box::new(fake), policy).unwrap();
    let (mt, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);
    let mut graphics = build(&screen);
    let (send_term, recv_term) = crossbeam_channel::bounded(1);
    let driver = {
        let screen = screen.clone();
        thread::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                screen.run(640, 480, 1.0, "demo", &mut graphics)
            }));
            let _ = send_term.send(());
            match result {
                Ok(result) => result,
                Err(payload) => resume_unwind(payload),
            }
        })
    };
    let _ = mt.run(recv_term);
    let result = match driver.join() {
        Ok(result) => result,
        Err(payload) => resume_unwind(payload),
    };
    (result, screen)
}

#[test]
fn test_loop_ends_on_close_and_tears_down() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();
    state.lock().unwrap().close_after_polls = Some(3);

    let mut log_slot = None;
    let (result, _) = run_screen(fake, ScreenPolicy::default(), |_| {
        let (graphics, log) = FakeGraphics::new();
        log_slot = Some(log);
        graphics
    });
    assert_eq!(result.unwrap(), Termination::Closed);

    let state = state.lock().unwrap();
    assert!(state.visible);
    assert_eq!(state.title, "demo");
    // centered horizontally, a third of the way down
    assert_eq!(state.pos, Vec2 { x: 640, y: 200 });
    assert_eq!(state.terminates, 1);

    let log = log_slot.unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log.sizes, vec![(640, 480, 1.0)]);
    assert_eq!(log.updates, 2);
}

#[test]
fn test_close_during_unfocused_wait_is_honored() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();
    {
        let mut state = state.lock().unwrap();
        state.focused = false;
        state.close_after_polls = Some(4);
    }

    let mut log_slot = None;
    let (result, _) = run_screen(fake, ScreenPolicy::default(), |_| {
        let (graphics, log) = FakeGraphics::new();
        log_slot = Some(log);
        graphics
    });
    // the wait noticed the close instead of idling forever
    assert_eq!(result.unwrap(), Termination::Closed);
    assert_eq!(log_slot.unwrap().lock().unwrap().updates, 1);
}

#[test]
fn test_graphics_error_ends_loop() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();

    let (result, _) = run_screen(fake, ScreenPolicy::default(), |_| {
        let (mut graphics, _) = FakeGraphics::new();
        graphics.fail_update_at = Some(2);
        graphics
    });
    let err = result.unwrap_err();
    assert!(err.to_string().contains("graphics update failed"));
    // torn down on the error path too
    assert_eq!(state.lock().unwrap().terminates, 1);
}

#[test]
fn test_size_notification_includes_device_scale() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();
    {
        let mut state = state.lock().unwrap();
        state.device_scale = 2.0;
        state.close_after_polls = Some(2);
    }

    let mut log_slot = None;
    let (result, _) = run_screen(fake, ScreenPolicy::default(), |_| {
        let (graphics, log) = FakeGraphics::new();
        log_slot = Some(log);
        graphics
    });
    assert_eq!(result.unwrap(), Termination::Closed);
    let log = log_slot.unwrap();
    assert_eq!(log.lock().unwrap().sizes[0], (640, 480, 2.0));
}

#[test]
fn test_control_surface_during_run() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    let state = fake.state();

    let mut log_slot = None;
    let (result, _) = run_screen(fake, ScreenPolicy::default(), |screen| {
        let (mut graphics, log) = FakeGraphics::new();
        log_slot = Some(log);
        let screen = screen.clone();
        let state = Arc::clone(&state);
        graphics.on_update = Some(Box::new(move |updates| {
            if updates == 1 {
                assert_eq!(screen.scale(), 1.0);
                assert!(screen.set_scale(2.0).unwrap());
                assert_eq!(screen.scale(), 2.0);
                assert!(!screen.is_fullscreen());
                assert!(screen.set_fullscreen(true).unwrap());
                assert!(screen.is_fullscreen());
                assert!(screen.set_size(800, 600).unwrap());
                // a matching request is a no-op
                assert!(!screen.set_size(800, 600).unwrap());
            }
            if updates == 2 {
                // the requests above landed in one notification by now
                state.lock().unwrap().close_requested = true;
            }
        }));
        graphics
    });
    assert_eq!(result.unwrap(), Termination::Closed);

    let log = log_slot.unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log.sizes[0], (640, 480, 1.0));
    // the final geometry lands in one notification: 800x600 at the
    // fullscreen fit scale min(1920/800, 1080/600) = 1.8
    assert_eq!(log.sizes[1].0, 800);
    assert_eq!(log.sizes[1].1, 600);
    assert!((log.sizes[1].2 - 1.8).abs() < 1e-9);
}

#[test]
#[should_panic(expected = "run called more than once")]
fn test_run_called_twice_panics() {
    let _guard = session_test_lock();
    let fake = FakePlatform::new();
    fake.state().lock().unwrap().close_requested = true;

    let session = Session::new(Box::new(fake), ScreenPolicy::default()).unwrap();
    let (mt, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);
    let (send_term, recv_term) = crossbeam_channel::bounded(1);
    let driver = {
        let screen = screen.clone();
        thread::spawn(move || {
            let (mut graphics, _) = FakeGraphics::new();
            let first = screen.run(640, 480, 1.0, "demo", &mut graphics);
            assert_eq!(first.unwrap(), Termination::Closed);
            let second = catch_unwind(AssertUnwindSafe(|| {
                screen.run(640, 480, 1.0, "demo", &mut graphics)
            }));
            let _ = send_term.send(());
            if let Err(payload) = second {
                resume_unwind(payload);
            }
        })
    };
    let _ = mt.run(recv_term);
    if let Err(payload) = driver.join() {
        resume_unwind(payload);
    }
}
