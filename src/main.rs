use anyhow::Context;
use nowplaying_sync::{
    clock::SystemClock,
    config::Config,
    console::Console,
    credential::CredentialStore,
    platform::{self, ClipboardInjector, NativeDesktop},
    playback::SpotifyClient,
    reauth::{bootstrap_credential, ConsolePrompt, ReauthWorker, TokenPrompt},
    render::{EguiMeasure, TextRenderer},
    storage::StateDir,
    sync_loop::{Collaborators, SyncLoop, SyncSettings},
    target::{ConsoleOperator, TargetResolver},
};
use std::{
    fs::OpenOptions,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "nowplaying_sync.log";

fn init_logging(state: &StateDir) -> anyhow::Result<()> {
    let path = state.root().join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let (config, config_err) = match Config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    let state = StateDir::open(config.storage.state_dir()?)?;
    init_logging(&state)?;
    if let Some(err) = config_err {
        warn!("{err:#}; using default configuration");
    }

    if !platform::SUPPORTED {
        anyhow::bail!("window targeting and keystroke injection require Windows");
    }

    let console = Console::stdout();
    let clock = SystemClock;
    let desktop = NativeDesktop::default();
    let retry_delay = config.sync.tick_interval();
    info!("State directory: {}", state.root().display());

    let mut source = SpotifyClient::new(&config.spotify, desktop)?;
    let prompt: Arc<dyn TokenPrompt> = Arc::new(ConsolePrompt::new(console.clone()));
    let mut reauth = ReauthWorker::new(prompt);
    let credentials = CredentialStore::new(state.clone());
    let credential = bootstrap_credential(
        &credentials,
        &mut source,
        &mut reauth,
        &clock,
        &console,
        retry_delay,
    )?;

    let operator = ConsoleOperator::new(console.clone());
    let target = TargetResolver::new(
        &desktop,
        &operator,
        state.clone(),
        console.clone(),
        Duration::from_secs(config.target.capture_countdown_secs),
    )
    .resolve();

    let measure = EguiMeasure::from_config(&config.render)?;
    let renderer = TextRenderer::from_config(&config.render, Box::new(measure));

    let mut sync = SyncLoop::new(
        SyncSettings::from_config(&config),
        credential,
        target,
        Collaborators {
            source: Box::new(source),
            desktop: Box::new(desktop),
            injector: Box::new(ClipboardInjector::new(desktop)),
            renderer,
            credentials,
            reauth,
            clock: Box::new(clock),
            console,
        },
    );
    sync.run(config.sync.tick_interval())
}
