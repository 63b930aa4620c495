use crate::{
    clock::Clock,
    console::{Console, Status},
    credential::{validate_token, CredentialStore},
    model::Credential,
    playback::PlaybackSource,
};
use std::{
    io::{self, BufRead},
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info};

/// Asks the operator for a new bearer token. `None` means no answer will come (input
/// closed or prompt dismissed).
pub trait TokenPrompt: Send + Sync {
    fn prompt_token(&self, reason: &str) -> Option<String>;
}

pub struct ConsolePrompt {
    console: Console,
}

impl ConsolePrompt {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl TokenPrompt for ConsolePrompt {
    fn prompt_token(&self, reason: &str) -> Option<String> {
        self.console.line(Status::Authorization, reason);
        self.console.prompt("Paste a new access token and press Enter:");
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let token = line.trim().to_owned();
                (!token.is_empty()).then_some(token)
            }
            Err(err) => {
                error!("Failed to read token from stdin: {err}");
                None
            }
        }
    }
}

/// Runs at most one background token prompt and hands its answer back through a
/// single-slot channel.
pub struct ReauthWorker {
    prompt: Arc<dyn TokenPrompt>,
    inflight: Option<Receiver<Option<String>>>,
}

impl ReauthWorker {
    pub fn new(prompt: Arc<dyn TokenPrompt>) -> Self {
        Self {
            prompt,
            inflight: None,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.inflight.is_some()
    }

    /// Starts a background prompt unless one is already running.
    pub fn dispatch(&mut self, reason: impl Into<String>) -> bool {
        if self.inflight.is_some() {
            return false;
        }

        let reason = reason.into();
        let prompt = Arc::clone(&self.prompt);
        let (tx, rx) = mpsc::sync_channel(1);
        let spawned = thread::Builder::new()
            .name("reauth-prompt".into())
            .spawn(move || {
                let token = prompt.prompt_token(&reason);
                let _ = tx.send(token);
            });

        match spawned {
            Ok(_) => {
                info!("Background reauthorization started");
                self.inflight = Some(rx);
                true
            }
            Err(err) => {
                error!("Failed to start reauthorization prompt: {err}");
                false
            }
        }
    }

    /// Non-blocking. Returns the token once the background prompt has answered.
    pub fn try_take(&mut self) -> Option<String> {
        let rx = self.inflight.as_ref()?;
        match rx.try_recv() {
            Ok(token) => {
                self.inflight = None;
                token
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("Reauthorization prompt ended without an answer");
                self.inflight = None;
                None
            }
        }
    }

    /// Asks for a token on the calling thread. If a background prompt is already open,
    /// its answer is awaited instead of opening a second one.
    pub fn prompt_blocking(&mut self, reason: &str) -> Option<String> {
        match self.inflight.take() {
            Some(rx) => rx.recv().ok().flatten(),
            None => self.prompt.prompt_token(reason),
        }
    }
}

/// Blocks until the operator supplies a token that passes a live call. Unbounded: an
/// operator is assumed to be present.
pub fn acquire_credential(
    worker: &mut ReauthWorker,
    source: &mut dyn PlaybackSource,
    clock: &dyn Clock,
    console: &Console,
    reason: &str,
    retry_delay: Duration,
) -> Credential {
    loop {
        match worker.prompt_blocking(reason) {
            Some(token) => match validate_token(source, &token, clock.now()) {
                Ok(credential) => {
                    console.line(Status::Delivered, "Access token accepted");
                    return credential;
                }
                Err(err) => console.line(Status::Authorization, format!("Token rejected: {err}")),
            },
            None => console.line(Status::Authorization, "No token entered"),
        }
        thread::sleep(retry_delay);
    }
}

/// Startup check of the stored token. Only an authorization failure discards it; if the
/// service is unreachable the stored token is kept. Without a usable stored token the
/// operator is asked until one validates.
pub fn bootstrap_credential(
    store: &CredentialStore,
    source: &mut dyn PlaybackSource,
    worker: &mut ReauthWorker,
    clock: &dyn Clock,
    console: &Console,
    retry_delay: Duration,
) -> anyhow::Result<Credential> {
    if let Some(stored) = store.load(clock.now()) {
        match source.current_and_queue(&stored) {
            Ok(_) => {
                console.line(Status::Info, "Stored access token is valid");
                return Ok(stored);
            }
            Err(err) if err.is_auth_error() => {
                console.line(Status::Authorization, format!("Stored access token rejected: {err}"));
                store.invalidate()?;
            }
            Err(err) => {
                console.line(
                    Status::Transient,
                    format!("Could not verify the stored access token ({err}); keeping it"),
                );
                return Ok(stored);
            }
        }
    }

    let credential = acquire_credential(
        worker,
        source,
        clock,
        console,
        "An access token is required",
        retry_delay,
    );
    store.save(&credential)?;
    Ok(credential)
}
