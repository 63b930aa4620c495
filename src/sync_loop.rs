use crate::{
    clock::Clock,
    config::Config,
    console::{Console, Status},
    credential::{ratio, validate_token, CredentialStore, TokenAge},
    error::PollError,
    model::{Credential, PlaybackSnapshot, TargetHandle, TrackRef},
    platform::{Desktop, Injector},
    playback::PlaybackSource,
    reauth::{acquire_credential, ReauthWorker},
    render::TextRenderer,
};
use chrono::{DateTime, Duration, Utc};
use std::{thread, time::Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub failure_tolerance: u32,
    pub token_ttl: Duration,
    pub reauth_ratio: f64,
    pub warning_every_ticks: u32,
    pub auth_retry_delay: std::time::Duration,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.sync.poll_interval(),
            failure_tolerance: config.sync.failure_tolerance,
            token_ttl: config.token.ttl(),
            reauth_ratio: config.token.reauth_ratio(),
            warning_every_ticks: config.token.warning_every_ticks(),
            auth_retry_delay: config.sync.tick_interval(),
        }
    }
}

/// Everything the loop talks to.
pub struct Collaborators {
    pub source: Box<dyn PlaybackSource>,
    pub desktop: Box<dyn Desktop>,
    pub injector: Box<dyn Injector>,
    pub renderer: TextRenderer,
    pub credentials: CredentialStore,
    pub reauth: ReauthWorker,
    pub clock: Box<dyn Clock>,
    pub console: Console,
}

/// What a single tick decided. Mostly useful for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub update_needed: bool,
    pub polled: bool,
    pub auth_failed: bool,
    pub delivered: bool,
    pub waiting: bool,
}

struct PendingDelivery {
    text: String,
    track: TrackRef,
}

/// The playback synchronization loop. Owns every piece of mutable state; collaborators
/// are only called from [`SyncLoop::tick`].
pub struct SyncLoop {
    settings: SyncSettings,
    source: Box<dyn PlaybackSource>,
    desktop: Box<dyn Desktop>,
    injector: Box<dyn Injector>,
    renderer: TextRenderer,
    credentials: CredentialStore,
    reauth: ReauthWorker,
    clock: Box<dyn Clock>,
    console: Console,

    target: TargetHandle,
    credential: Credential,
    last_pushed: Option<String>,
    last_delivered: Option<TrackRef>,
    pending: Option<PendingDelivery>,
    unverified_token: Option<String>,
    failures: u32,
    warning_countdown: u32,
    last_request_at: Option<DateTime<Utc>>,
    reminder_index: usize,
    waiting: bool,
    player_missing: bool,
}

impl SyncLoop {
    pub fn new(
        settings: SyncSettings,
        credential: Credential,
        target: TargetHandle,
        parts: Collaborators,
    ) -> Self {
        Self {
            settings,
            source: parts.source,
            desktop: parts.desktop,
            injector: parts.injector,
            renderer: parts.renderer,
            credentials: parts.credentials,
            reauth: parts.reauth,
            clock: parts.clock,
            console: parts.console,
            target,
            credential,
            last_pushed: None,
            last_delivered: None,
            pending: None,
            unverified_token: None,
            failures: 0,
            warning_countdown: 0,
            last_request_at: None,
            reminder_index: 0,
            waiting: false,
            player_missing: false,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn last_pushed(&self) -> Option<&str> {
        self.last_pushed.as_deref()
    }

    pub fn pending_text(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.text.as_str())
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reminder_index(&self) -> usize {
        self.reminder_index
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn reauth_in_flight(&self) -> bool {
        self.reauth.in_flight()
    }

    /// Ticks forever at the given cadence.
    pub fn run(&mut self, cadence: std::time::Duration) -> ! {
        info!("Sync loop started; target {}", self.target);
        loop {
            let started = Instant::now();
            let outcome = self.tick();
            debug!(?outcome, "tick");
            thread::sleep(cadence.saturating_sub(started.elapsed()));
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let now = self.clock.now();

        self.collect_background_token(now);
        self.check_token_age(now);

        // A pending text is retried as-is until the target has focus.
        if self.pending.is_none() {
            let local = self.detect_local_track();
            let update_needed = local
                .as_ref()
                .is_some_and(|track| self.last_delivered.as_ref() != Some(track));
            outcome.update_needed = update_needed;

            let poll_due = self
                .last_request_at
                .map_or(true, |at| now - at >= self.settings.poll_interval);
            if update_needed || poll_due {
                outcome.polled = true;
                match self.poll(now, local.as_ref()) {
                    Some(snapshot) => {
                        if update_needed {
                            self.advance_reminder();
                        }
                        self.stage(&snapshot, local);
                    }
                    None => {
                        outcome.auth_failed = true;
                        return outcome;
                    }
                }
            }
        }

        if self.pending.is_some() {
            outcome.delivered = self.deliver();
            outcome.waiting = self.waiting;
        }
        outcome
    }

    /// Validates a token the background prompt produced. A token that could not be
    /// checked because the service was unreachable is kept and tried again next tick.
    fn collect_background_token(&mut self, now: DateTime<Utc>) {
        let Some(token) = self
            .unverified_token
            .take()
            .or_else(|| self.reauth.try_take())
        else {
            return;
        };
        let validated = validate_token(self.source.as_mut(), &token, now);
        self.last_request_at = Some(now);
        match validated {
            Ok(credential) => self.install_credential(credential),
            Err(err) if err.is_auth_error() => {
                self.console.line(
                    Status::Authorization,
                    format!("Replacement token rejected: {err}"),
                );
                self.reauth
                    .dispatch("The replacement token was rejected; paste another one");
            }
            Err(err) => {
                self.console.line(
                    Status::Transient,
                    format!("Could not verify the replacement token ({err}); retrying"),
                );
                self.unverified_token = Some(token);
            }
        }
    }

    fn check_token_age(&mut self, now: DateTime<Utc>) {
        let ttl = self.settings.token_ttl;
        let age = self.credential.age(now);
        let used = ratio(age, ttl);

        if used >= self.settings.reauth_ratio
            && !self.reauth.in_flight()
            && self.unverified_token.is_none()
        {
            self.reauth.dispatch(format!(
                "The access token is {:.0}% through its lifetime; paste a fresh one",
                used * 100.0
            ));
        }

        let tier = TokenAge::classify(age, ttl);
        if tier == TokenAge::Fresh {
            self.warning_countdown = 0;
            return;
        }

        if self.warning_countdown == 0 {
            let remaining = (ttl - age).num_minutes();
            let message = match tier {
                TokenAge::Expired => "Access token has expired; updates will stop until it is replaced".to_string(),
                TokenAge::Expiring => format!("Access token expires in about {remaining} min; replace it now"),
                _ => format!("Access token expires in about {remaining} min"),
            };
            self.console.line(Status::Token, message);
            self.warning_countdown = self.settings.warning_every_ticks;
        }
        self.warning_countdown = self.warning_countdown.saturating_sub(1);
    }

    fn detect_local_track(&mut self) -> Option<TrackRef> {
        match self.source.local_track() {
            Ok(track) => {
                if self.player_missing {
                    self.console.line(Status::Info, "Local player detected again");
                    self.player_missing = false;
                }
                Some(track)
            }
            Err(err) => {
                if !self.player_missing {
                    self.console.line(Status::NoLocalProcess, err);
                    self.player_missing = true;
                }
                None
            }
        }
    }

    /// `None` means the credential was rejected and the tick must stop here.
    fn poll(&mut self, now: DateTime<Utc>, local: Option<&TrackRef>) -> Option<PlaybackSnapshot> {
        self.last_request_at = Some(now);
        match self.source.current_and_queue(&self.credential) {
            Ok(snapshot) => {
                if self.failures > 0 {
                    self.console.line(
                        Status::Info,
                        format!("Spotify reachable again after {} failures", self.failures),
                    );
                }
                self.failures = 0;
                Some(snapshot)
            }
            Err(err @ PollError::Unauthorized { .. }) => {
                self.replace_rejected_credential(err);
                None
            }
            Err(err) => {
                self.failures += 1;
                self.console.line(
                    Status::Transient,
                    format!("Poll failed ({} in a row): {err}", self.failures),
                );
                let current = local.cloned().unwrap_or_default();
                Some(PlaybackSnapshot::outage(current, self.failures))
            }
        }
    }

    fn replace_rejected_credential(&mut self, err: PollError) {
        self.console.line(
            Status::Authorization,
            format!("{err}; updates are paused until a new token is entered"),
        );
        if let Err(err) = self.credentials.invalidate() {
            warn!("{err:#}");
        }
        let credential = acquire_credential(
            &mut self.reauth,
            self.source.as_mut(),
            self.clock.as_ref(),
            &self.console,
            "Spotify rejected the access token",
            self.settings.auth_retry_delay,
        );
        // The accepted validation call was the most recent request.
        self.last_request_at = Some(credential.created_at);
        self.install_credential(credential);
    }

    fn install_credential(&mut self, credential: Credential) {
        if let Err(err) = self.credentials.save(&credential) {
            warn!("{err:#}");
        }
        self.credential = credential;
        self.unverified_token = None;
        self.warning_countdown = 0;
        self.console.line(Status::Token, "New access token is active");
    }

    fn advance_reminder(&mut self) {
        let count = self.renderer.reminder_count().max(1);
        self.reminder_index = (self.reminder_index + 1) % count;
    }

    fn stage(&mut self, snapshot: &PlaybackSnapshot, local: Option<TrackRef>) {
        let text = self.renderer.render(snapshot, self.reminder_index);
        let track = local.unwrap_or_else(|| snapshot.current.clone());
        let changed = self.last_pushed.as_deref() != Some(text.as_str());
        let tolerated = self.failures == 0 || self.failures > self.settings.failure_tolerance;

        if changed && tolerated {
            self.pending = Some(PendingDelivery { text, track });
        } else if !changed && self.failures == 0 {
            // The target already shows exactly this.
            self.last_delivered = Some(track);
        } else if changed {
            debug!(
                failures = self.failures,
                "Holding back outage text within failure tolerance"
            );
        }
    }

    fn deliver(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };

        if self.desktop.foreground_window() != Some(self.target) {
            if !self.waiting {
                self.console
                    .line(Status::Waiting, "Target window is not focused; holding the update");
                self.waiting = true;
            }
            self.pending = Some(pending);
            return false;
        }

        match self.injector.inject(&pending.text) {
            Ok(()) => {
                self.console
                    .line(Status::Delivered, format!("Now showing {}", pending.track));
                self.last_pushed = Some(pending.text);
                self.last_delivered = Some(pending.track);
                self.waiting = false;
                true
            }
            Err(err) => {
                warn!("Injection failed: {err:#}");
                self.console
                    .line(Status::Target, format!("Could not paste into the target: {err}"));
                self.pending = Some(pending);
                false
            }
        }
    }
}
