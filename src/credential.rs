use crate::{
    error::PollError,
    model::Credential,
    playback::PlaybackSource,
    storage::{StateDir, CREDENTIAL_FILE, TOKEN_CREATED_FILE},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

/// Persists the one active bearer credential and its creation time.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    state: StateDir,
}

impl CredentialStore {
    pub fn new(state: StateDir) -> Self {
        Self { state }
    }

    /// A stored credential keeps its recorded creation time. A token without one is
    /// treated as created now, and that time is recorded.
    pub fn load(&self, now: DateTime<Utc>) -> Option<Credential> {
        let stored: StoredToken = self.state.read(CREDENTIAL_FILE)?;
        if stored.token.trim().is_empty() {
            return None;
        }
        let created_at = match self.state.read::<DateTime<Utc>>(TOKEN_CREATED_FILE) {
            Some(created_at) => created_at,
            None => {
                warn!("Stored token has no creation time; assuming it was created now");
                if let Err(err) = self.state.write(TOKEN_CREATED_FILE, &now) {
                    warn!("{err:#}");
                }
                now
            }
        };
        Some(Credential::new(stored.token, created_at))
    }

    pub fn save(&self, credential: &Credential) -> anyhow::Result<()> {
        self.state.write(
            CREDENTIAL_FILE,
            &StoredToken {
                token: credential.token.clone(),
            },
        )?;
        self.state.write(TOKEN_CREATED_FILE, &credential.created_at)?;
        info!("Saved credential created at {}", credential.created_at);
        Ok(())
    }

    pub fn invalidate(&self) -> anyhow::Result<()> {
        self.state.remove(CREDENTIAL_FILE)?;
        self.state.remove(TOKEN_CREATED_FILE)?;
        info!("Stored credential invalidated");
        Ok(())
    }
}

/// Validates a freshly entered token with one live call. The only validity signal is
/// whether that call succeeds; a valid token starts its TokenClock at `now`.
pub fn validate_token(
    source: &mut dyn PlaybackSource,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Credential, PollError> {
    let candidate = Credential::new(token.trim(), now);
    source.current_and_queue(&candidate)?;
    Ok(candidate)
}

/// How far a credential is into its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenAge {
    Fresh,
    /// At least 75% of the TTL used.
    Aging,
    /// At least 90% of the TTL used.
    Expiring,
    /// The TTL has passed.
    Expired,
}

impl TokenAge {
    pub fn classify(age: Duration, ttl: Duration) -> Self {
        let used = ratio(age, ttl);
        if used >= 1.0 {
            TokenAge::Expired
        } else if used >= 0.90 {
            TokenAge::Expiring
        } else if used >= 0.75 {
            TokenAge::Aging
        } else {
            TokenAge::Fresh
        }
    }
}

pub fn ratio(age: Duration, ttl: Duration) -> f64 {
    let ttl_ms = ttl.num_milliseconds().max(1) as f64;
    age.num_milliseconds() as f64 / ttl_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::open(dir.path()).unwrap();
        (dir, CredentialStore::new(state))
    }

    #[test]
    fn saved_credential_reloads_with_its_timestamp() {
        let (_dir, store) = store();
        let created = Utc::now() - Duration::minutes(20);
        store.save(&Credential::new("abc", created)).unwrap();

        let loaded = store.load(Utc::now()).unwrap();
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.created_at, created);
    }

    #[test]
    fn missing_timestamp_defaults_to_now_and_is_recorded() {
        let (dir, store) = store();
        let created = Utc::now() - Duration::minutes(5);
        store.save(&Credential::new("abc", created)).unwrap();
        std::fs::remove_file(dir.path().join(TOKEN_CREATED_FILE)).unwrap();

        let now = Utc::now();
        assert_eq!(store.load(now).unwrap().created_at, now);
        assert!(dir.path().join(TOKEN_CREATED_FILE).exists());
    }

    #[test]
    fn invalidate_removes_both_values() {
        let (dir, store) = store();
        store.save(&Credential::new("abc", Utc::now())).unwrap();
        store.invalidate().unwrap();
        assert!(store.load(Utc::now()).is_none());
        assert!(!dir.path().join(TOKEN_CREATED_FILE).exists());
    }

    #[test]
    fn age_tiers() {
        let ttl = Duration::seconds(3600);
        assert_eq!(TokenAge::classify(Duration::seconds(0), ttl), TokenAge::Fresh);
        assert_eq!(TokenAge::classify(Duration::seconds(2699), ttl), TokenAge::Fresh);
        assert_eq!(TokenAge::classify(Duration::seconds(2700), ttl), TokenAge::Aging);
        assert_eq!(TokenAge::classify(Duration::seconds(3240), ttl), TokenAge::Expiring);
        assert_eq!(TokenAge::classify(Duration::seconds(3600), ttl), TokenAge::Expired);
        assert_eq!(TokenAge::classify(Duration::seconds(9000), ttl), TokenAge::Expired);
    }
}
