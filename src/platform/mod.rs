use crate::{error::LocalTrackError, model::TargetHandle};
use std::{thread, time::Duration};
use tracing::{debug, warn};

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "windows")]
pub use win32::Win32Desktop as NativeDesktop;

#[cfg(not(target_os = "windows"))]
mod unsupported;
#[cfg(not(target_os = "windows"))]
pub use unsupported::UnsupportedDesktop as NativeDesktop;

pub const SUPPORTED: bool = cfg!(target_os = "windows");

/// The parts of the window manager the sync loop and target resolver rely on.
pub trait Desktop {
    /// The window currently receiving keyboard input.
    fn foreground_window(&self) -> Option<TargetHandle>;

    /// Every top-level window the OS window listing reports.
    fn enumerable_windows(&self) -> Vec<TargetHandle>;

    fn window_process_id(&self, handle: TargetHandle) -> Option<u32>;

    /// Titles of the visible top-level windows owned by the named executable.
    fn process_window_titles(&self, process_name: &str) -> Result<Vec<String>, LocalTrackError>;

    /// Sends Ctrl+A followed by Ctrl+V to the foreground window.
    fn send_select_all_paste(&self) -> anyhow::Result<()>;
}

/// Pushes a finished text block into the focused target window.
pub trait Injector {
    fn inject(&mut self, text: &str) -> anyhow::Result<()>;
}

/// Clipboard set, select-all, paste, then clipboard restore.
pub struct ClipboardInjector<D> {
    desktop: D,
    settle: Duration,
}

impl<D: Desktop> ClipboardInjector<D> {
    pub fn new(desktop: D) -> Self {
        Self {
            desktop,
            settle: Duration::from_millis(150),
        }
    }
}

impl<D: Desktop> Injector for ClipboardInjector<D> {
    fn inject(&mut self, text: &str) -> anyhow::Result<()> {
        let mut clipboard = arboard::Clipboard::new()?;
        let previous = clipboard.get_text().ok();

        clipboard.set_text(text.to_owned())?;
        let sent = self.desktop.send_select_all_paste();
        // The target reads the clipboard asynchronously after the paste chord.
        thread::sleep(self.settle);

        match previous {
            Some(previous) => {
                if let Err(err) = clipboard.set_text(previous) {
                    warn!("Failed to restore clipboard: {err}");
                }
            }
            None => debug!("Clipboard held no text before injection; nothing to restore"),
        }
        sent
    }
}
