use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MISSING_FIELD: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackRef {
    pub artist: String,
    pub title: String,
}

impl TrackRef {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    pub fn missing() -> Self {
        Self::new(MISSING_FIELD, MISSING_FIELD)
    }
}

impl Default for TrackRef {
    fn default() -> Self {
        Self::missing()
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Current track, the next one and two further queue entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub current: TrackRef,
    pub next: TrackRef,
    pub queued: [TrackRef; 2],
}

impl PlaybackSnapshot {
    /// Builds a snapshot from the current track and whatever the queue holds; slots
    /// past the end of `queue` stay `N/A`.
    pub fn from_queue(current: TrackRef, queue: impl IntoIterator<Item = TrackRef>) -> Self {
        let mut slots = queue.into_iter();
        let next = slots.next().unwrap_or_default();
        let first = slots.next().unwrap_or_default();
        let second = slots.next().unwrap_or_default();
        Self {
            current,
            next,
            queued: [first, second],
        }
    }

    /// Snapshot shown while the remote service is failing: the locally detected track
    /// stays visible and the "next" slot carries the outage marker.
    pub fn outage(current: TrackRef, failures: u32) -> Self {
        Self {
            current,
            next: TrackRef::new(format!("retry #{failures}"), "Spotify API unavailable"),
            queued: [TrackRef::missing(), TrackRef::missing()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            created_at,
        }
    }

    /// TokenClock: how long this credential has been alive.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).max(Duration::zero())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetHandle(pub isize);

impl TargetHandle {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_refs_compare_case_sensitively() {
        assert_eq!(TrackRef::new("A", "B"), TrackRef::new("A", "B"));
        assert_ne!(TrackRef::new("a", "B"), TrackRef::new("A", "B"));
    }

    #[test]
    fn from_queue_fills_missing_slots() {
        let snapshot = PlaybackSnapshot::from_queue(
            TrackRef::new("Artist A", "Track A"),
            vec![TrackRef::new("Artist B", "Track B")],
        );
        assert_eq!(snapshot.next, TrackRef::new("Artist B", "Track B"));
        assert_eq!(snapshot.queued[0], TrackRef::missing());
        assert_eq!(snapshot.queued[1], TrackRef::missing());
    }

    #[test]
    fn credential_age_never_negative() {
        let now = Utc::now();
        let credential = Credential::new("t", now + Duration::seconds(30));
        assert_eq!(credential.age(now), Duration::zero());
    }
}
