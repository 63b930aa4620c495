use crate::{
    config::SpotifyConfig,
    error::{LocalTrackError, PollError},
    local::parse_window_title,
    model::{Credential, PlaybackSnapshot, TrackRef, MISSING_FIELD},
    platform::Desktop,
};
use reqwest::{blocking::Client, header::AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the sync loop gets "what is playing and what comes next".
pub trait PlaybackSource {
    /// One live request for the current track and up to three queued ones.
    fn current_and_queue(&mut self, credential: &Credential) -> Result<PlaybackSnapshot, PollError>;

    /// The track the local player window currently shows.
    fn local_track(&self) -> Result<TrackRef, LocalTrackError>;
}

pub struct SpotifyClient<D> {
    http: Client,
    queue_url: String,
    process_name: String,
    paused_title: String,
    desktop: D,
}

impl<D: Desktop> SpotifyClient<D> {
    pub fn new(config: &SpotifyConfig, desktop: D) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(concat!("nowplaying_sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            queue_url: format!("{}/me/player/queue", config.api_base.trim_end_matches('/')),
            process_name: config.process_name.clone(),
            paused_title: config.paused_title.clone(),
            desktop,
        })
    }

    fn fetch_queue(&self, credential: &Credential) -> Result<QueueResponse, PollError> {
        debug!("GET {}", self.queue_url);
        let response = self
            .http
            .get(&self.queue_url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.token))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Queue request failed ({}): {}", status.as_u16(), body);
            return Err(PollError::from_status_code(status.as_u16(), body));
        }

        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl<D: Desktop> PlaybackSource for SpotifyClient<D> {
    fn current_and_queue(&mut self, credential: &Credential) -> Result<PlaybackSnapshot, PollError> {
        let response = self.fetch_queue(credential)?;
        let current = match response.currently_playing.as_ref() {
            Some(item) => item.track_ref(),
            None => {
                debug!("Nothing reported as playing; using the local window title");
                self.local_track().unwrap_or_default()
            }
        };
        Ok(PlaybackSnapshot::from_queue(
            current,
            response.queue.iter().take(3).map(QueueItem::track_ref),
        ))
    }

    fn local_track(&self) -> Result<TrackRef, LocalTrackError> {
        let titles = self.desktop.process_window_titles(&self.process_name)?;
        let title = titles
            .first()
            .ok_or_else(|| LocalTrackError::NoLocalProcess(self.process_name.clone()))?;
        Ok(parse_window_title(title, &self.paused_title))
    }
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    currently_playing: Option<QueueItem>,
    #[serde(default)]
    queue: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
struct QueueItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    show: Option<ShowRef>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShowRef {
    name: String,
}

impl QueueItem {
    fn track_ref(&self) -> TrackRef {
        let artist = if !self.artists.is_empty() {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        } else if let Some(show) = &self.show {
            show.name.clone()
        } else {
            MISSING_FIELD.to_owned()
        };
        let title = self
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| MISSING_FIELD.to_owned());
        TrackRef::new(artist, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_queue_with_tracks_and_episodes() {
        let body = r#"{
            "currently_playing": {
                "name": "Track A",
                "artists": [{"name": "Artist A"}, {"name": "Guest"}]
            },
            "queue": [
                {"name": "Track B", "artists": [{"name": "Artist B"}]},
                {"name": "Episode 12", "show": {"name": "Some Podcast"}},
                {"name": "Track D", "artists": [{"name": "Artist D"}]},
                {"name": "Track E", "artists": [{"name": "Artist E"}]}
            ]
        }"#;
        let response: QueueResponse = serde_json::from_str(body).unwrap();
        let current = response.currently_playing.as_ref().unwrap().track_ref();
        assert_eq!(current, TrackRef::new("Artist A, Guest", "Track A"));

        let snapshot = PlaybackSnapshot::from_queue(
            current,
            response.queue.iter().take(3).map(QueueItem::track_ref),
        );
        assert_eq!(snapshot.next, TrackRef::new("Artist B", "Track B"));
        assert_eq!(snapshot.queued[0], TrackRef::new("Some Podcast", "Episode 12"));
        assert_eq!(snapshot.queued[1], TrackRef::new("Artist D", "Track D"));
    }

    #[test]
    fn nothing_playing_decodes_as_none() {
        let response: QueueResponse =
            serde_json::from_str(r#"{"currently_playing": null, "queue": []}"#).unwrap();
        assert!(response.currently_playing.is_none());
        assert!(response.queue.is_empty());
    }

    #[test]
    fn bare_item_falls_back_to_missing_markers() {
        let item: QueueItem = serde_json::from_str("{}").unwrap();
        assert_eq!(item.track_ref(), TrackRef::missing());
    }

    #[test]
    fn malformed_body_is_transient() {
        let err: PollError = serde_json::from_str::<QueueResponse>("<html>")
            .unwrap_err()
            .into();
        assert!(!err.is_auth_error());
    }
}
