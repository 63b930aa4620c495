use super::Desktop;
use crate::{error::LocalTrackError, model::TargetHandle};

#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedDesktop;

impl Desktop for UnsupportedDesktop {
    fn foreground_window(&self) -> Option<TargetHandle> {
        None
    }

    fn enumerable_windows(&self) -> Vec<TargetHandle> {
        Vec::new()
    }

    fn window_process_id(&self, _handle: TargetHandle) -> Option<u32> {
        None
    }

    fn process_window_titles(&self, _process_name: &str) -> Result<Vec<String>, LocalTrackError> {
        Err(LocalTrackError::Unsupported)
    }

    fn send_select_all_paste(&self) -> anyhow::Result<()> {
        anyhow::bail!("keystroke injection is only available on Windows")
    }
}
