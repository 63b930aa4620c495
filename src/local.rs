use crate::model::TrackRef;

pub const TITLE_SEPARATOR: &str = " - ";
pub const PAUSED_MESSAGE: &str = "Playback paused";

/// Reads the track the desktop player shows in its window title.
///
/// The player titles its main window `"<artist> - <title>"` while playing and falls
/// back to a fixed product string (`paused_title`) when nothing is playing.
pub fn parse_window_title(window_title: &str, paused_title: &str) -> TrackRef {
    let window_title = window_title.trim();
    if window_title == paused_title {
        return TrackRef::new(window_title, PAUSED_MESSAGE);
    }

    match window_title.split_once(TITLE_SEPARATOR) {
        Some((artist, title)) => TrackRef::new(artist, title),
        None => TrackRef::new(window_title, ""),
    }
}
