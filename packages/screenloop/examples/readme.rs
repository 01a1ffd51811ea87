//! A window that counts frames, goes fullscreen for a while, and comes back.

use anyhow::Result;
use screenloop::{GraphicsContext, Screen, ScreenPolicy, Termination};


struct FrameCounter {
    screen: Screen,
    frames: u64,
}

impl GraphicsContext for FrameCounter {
    fn set_size(&mut self, width: u32, height: u32, scale: f64) {
        println!("canvas is now {}x{} at {:.2}x", width, height, scale);
    }

    fn update(&mut self) -> Result<()> {
        self.frames += 1;
        // a few seconds in, visit fullscreen and come back
        if self.frames == 300 {
            self.screen.set_fullscreen(true)?;
        }
        if self.frames == 600 {
            self.screen.set_fullscreen(false)?;
        }
        Ok(())
    }

    fn bind_screen_framebuffer(&mut self) -> Result<()> {
        Ok(())
    }
}

fn main() -> Result<()> {
    screenloop::logging::init_logging();
    let exit = screenloop::run(ScreenPolicy::default(), |screen| {
        let mut graphics = FrameCounter {
            screen: screen.clone(),
            frames: 0,
        };
        screen.run(640, 480, 1.0, "frame counter", &mut graphics)
    })?;
    assert_eq!(exit, Termination::Closed);
    Ok(())
}
