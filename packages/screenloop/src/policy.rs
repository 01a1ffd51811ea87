
use std::{
    path::Path,
    fs::File,
    io::{
        BufReader,
        BufWriter,
    },
    time::Duration,
};
use serde::{Serialize, Deserialize};
use anyhow::*;


pub const POLICY_FILE_NAME: &'static str = "screen-policy.json";


/// Tunable windowing policy. Defaults are safe everywhere; the knobs exist
/// because the right values are platform- and version-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenPolicy {
    /// Smallest window-unit width a resize request may produce. On some
    /// platforms an undersized window stops delivering resize callbacks,
    /// which would leave the resize wait hanging; requests that would shrink
    /// below this are rejected instead.
    pub min_window_width: u32,
    /// Microseconds to sleep between event polls while the window is
    /// unfocused.
    pub unfocused_poll_micros: u64,
    /// Milliseconds to wait for the platform to confirm a framebuffer resize
    /// when coming back from fullscreen, before giving up with an error.
    pub resize_wait_millis: u64,
}

impl Default for ScreenPolicy {
    fn default() -> Self {
        ScreenPolicy {
            min_window_width: 252,
            unfocused_poll_micros: 16_667,
            resize_wait_millis: 2_000,
        }
    }
}

impl ScreenPolicy {
    pub fn read(path: impl AsRef<Path>) -> Self {
        Self::try_read(path).unwrap_or_default()
    }

    pub fn try_read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    pub(crate) fn unfocused_poll_interval(&self) -> Duration {
        Duration::from_micros(self.unfocused_poll_micros)
    }

    pub(crate) fn resize_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.resize_wait_millis)
    }
}
