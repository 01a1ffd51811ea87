//! Single-owner controller for the one window and rendering surface of an
//! interactive graphics application.
//!
//! ## Rationale
//!
//! Native window handles and GL contexts may only be touched from the thread
//! that created them, yet the operations an application wants (resize,
//! rescale, toggle fullscreen, hide the cursor) arrive from whatever thread
//! its logic happens to run on. On top of that, screen geometry is genuinely
//! stateful: logical size, user scale, device pixel scale, and fullscreen
//! mode all have to agree with each other and with the platform window at
//! every moment.
//!
//! ## Shape
//!
//! [`run`] takes over the calling thread (which must be the process's main
//! thread) as the window's bound thread, running a dispatch loop that
//! serializes every window-touching operation. The application's own code
//! runs on a second thread with a [`Screen`] handle: [`Screen::run`] drives
//! the frame loop against a [`GraphicsContext`] of the application's
//! choosing, and the rest of the [`Screen`] surface, callable from any
//! thread while the loop runs, reads and writes the one source of truth for
//! screen geometry through the same serialization point.
//!
//! ```no_run
//! use anyhow::Result;
//! use screenloop::{GraphicsContext, ScreenPolicy};
//!
//! struct Blank;
//!
//! impl GraphicsContext for Blank {
//!     fn set_size(&mut self, _width: u32, _height: u32, _scale: f64) {}
//!     fn update(&mut self) -> Result<()> { Ok(()) }
//!     fn bind_screen_framebuffer(&mut self) -> Result<()> { Ok(()) }
//! }
//!
//! fn main() -> Result<()> {
//!     screenloop::run(ScreenPolicy::default(), |screen| {
//!         screen.run(640, 480, 1.0, "blank", &mut Blank)
//!     })?;
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate tracing;

pub mod logging;
pub mod policy;
pub mod platform;
pub mod graphics_context;
mod geometry;
mod session;
mod frame_loop;


pub use crate::{
    frame_loop::Termination,
    graphics_context::GraphicsContext,
    policy::ScreenPolicy,
    session::Screen,
};

use crate::{
    platform::glfw_backend::GlfwPlatform,
    session::Session,
};
use std::{
    panic::{
        catch_unwind,
        AssertUnwindSafe,
    },
    thread,
};
use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;


/// Create the window and take over the calling thread as its bound thread,
/// running `f` on a second thread with a [`Screen`] handle.
///
/// Must be called on the process's main thread, at most once per process.
/// Window/context creation failure is unrecoverable and surfaces here before
/// `f` ever runs. Blocks until `f` returns (its result is passed through) or
/// panics (reported as an error).
pub fn run<F>(policy: ScreenPolicy, f: F) -> Result<Termination>
where
    F: FnOnce(Screen) -> Result<Termination> + Send + 'static,
{
    let platform = GlfwPlatform::new()?;
    let session = Session::new(Box::new(platform), policy)?;
    let (main_thread, handle) = mainthread::main_thread(session);
    let screen = Screen::new(handle);

    let (send_term, recv_term) = bounded(1);
    thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(move || f(screen)));
        let payload = match result {
            Ok(result) => result,
            Err(_) => Err(anyhow!("application thread panicked")),
        };
        let _ = send_term.send(payload);
    });

    main_thread
        .run(recv_term)
        .unwrap_or_else(|| Err(anyhow!("application thread exited without a result")))
}
