//! Mirrors Spotify's "now playing / up next" into a text field of another desktop
//! application by pasting into its window whenever the rendered text changes.

pub mod clock;
pub mod config;
pub mod console;
pub mod credential;
pub mod error;
pub mod local;
pub mod model;
pub mod platform;
pub mod playback;
pub mod reauth;
pub mod render;
pub mod storage;
pub mod sync_loop;
pub mod target;
