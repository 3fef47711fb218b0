//! Voxdrop application binary - composition root.
//!
//! Wires the crates together for one command:
//! 1. Load configuration from TOML
//! 2. Open the queue database under the data directory
//! 3. Either act on the queue as the host would (pending, clear, import,
//!    status) or run a simulated capture through the relay and controller

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};

use voxdrop_core::config::VoxdropConfig;
use voxdrop_queue::{PendingQueue, StatusStore};
use voxdrop_relay::{ExecutionContext, RelayOutcome, SimulatedPolicy, TriggerRelay, TriggerSignal};
use voxdrop_session::{
    ConsoleSurface, ControllerSettings, MockRecognizer, NoopHost, RecognitionError,
    RecognizerEvent, ScriptStep, SessionController, StatusPublisher,
};

use cli::{CliArgs, Command, ContextArg, FailArg};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config before tracing exists, then report how it went.
fn load_config(args: &CliArgs, config_file: &Path) -> VoxdropConfig {
    let loaded = VoxdropConfig::load(config_file);

    let level = args.resolve_log_level().unwrap_or_else(|| match &loaded {
        Ok(config) => config.general.log_level.clone(),
        Err(_) => "info".to_string(),
    });
    init_tracing(&level);

    let mut config = match loaded {
        Ok(config) => {
            info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            if config_file.exists() {
                warn!(path = %config_file.display(), "Failed to load config: {}. Using defaults.", e);
            } else {
                debug!(path = %config_file.display(), "No config file; using defaults");
            }
            VoxdropConfig::default()
        }
    };
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    config
}

/// Recognizer script for the simulated capture.
fn simulated_recognizer(text: &str, pace: Duration, fail_with: Option<FailArg>) -> MockRecognizer {
    let error = match fail_with {
        None => return MockRecognizer::dictation(text, pace),
        Some(FailArg::Unavailable) => return MockRecognizer::unavailable(),
        Some(FailArg::Permission) => RecognitionError::PermissionDenied,
        Some(FailArg::Network) => RecognitionError::NetworkUnavailable,
        Some(FailArg::NoSpeech) => RecognitionError::NoSpeechDetected,
    };

    let mut steps = vec![ScriptStep::now(RecognizerEvent::Ready)];
    if error != RecognitionError::NoSpeechDetected {
        let first_word = text.split_whitespace().next().unwrap_or_default();
        steps.push(ScriptStep::after(
            pace,
            RecognizerEvent::Partial(first_word.to_string()),
        ));
    }
    steps.push(ScriptStep::after(pace, RecognizerEvent::Error(error)));
    MockRecognizer::scripted(steps)
}

async fn run_capture(
    config: &VoxdropConfig,
    queue: PendingQueue,
    text: &str,
    context: ContextArg,
    pace: Duration,
    fail_with: Option<FailArg>,
) -> AppResult<()> {
    let publisher = Arc::new(StatusPublisher::new(StatusStore::new(queue.database())));
    publisher.attach(Arc::new(ConsoleSurface::new("console")))?;

    let before = queue.len()?;
    let controller = SessionController::spawn(
        ControllerSettings::from_config(config),
        Arc::new(simulated_recognizer(text, pace, fail_with)),
        queue.clone(),
        publisher,
        Arc::new(NoopHost),
    );

    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => debug!("event {}", json),
                Err(e) => debug!("Unserializable event: {}", e),
            }
        }
    });

    let relay = TriggerRelay::from_config(
        &config.relay,
        Arc::new(SimulatedPolicy::restricted()),
        Arc::new(controller.clone()),
    );
    let context = match context {
        ContextArg::Foreground => ExecutionContext::Foreground,
        ContextArg::Background => ExecutionContext::Background,
    };

    match relay.relay(TriggerSignal::Start, context).await? {
        RelayOutcome::Delivered => debug!("Start delivered directly"),
        RelayOutcome::Deferred(handle) => {
            let report = handle.wait().await?;
            info!(
                visible_ms = report.visible_for.as_millis() as u64,
                "Intermediary dismissed"
            );
        }
    }

    tokio::select! {
        result = controller.wait_idle() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; stopping capture");
            relay.relay(TriggerSignal::Stop, context).await?;
            controller.wait_idle().await?;
        }
    }
    controller.shutdown().await?;

    let queued = queue.len()?.saturating_sub(before);
    println!("Capture finished; {} result(s) queued", queued);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let config = load_config(&args, &config_file);

    if let Command::InitConfig = args.command {
        config.save(&config_file)?;
        println!("{}", config_file.display());
        return Ok(());
    }

    let queue_path = config.queue_path();
    let queue = PendingQueue::open(&queue_path)?;
    debug!(path = %queue_path.display(), "Queue opened");

    match args.command {
        Command::Capture {
            text,
            context,
            pace_ms,
            fail_with,
        } => {
            run_capture(
                &config,
                queue,
                &text,
                context,
                Duration::from_millis(pace_ms),
                fail_with,
            )
            .await?;
        }
        Command::Pending => {
            let pending = queue.read_all()?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        Command::Clear { id: Some(id) } => {
            if queue.clear_by_id(id)? {
                println!("Removed {}", id);
            } else {
                println!("No pending result {}", id);
            }
        }
        Command::Clear { id: None } => {
            let removed = queue.clear_all()?;
            println!("Removed {} pending result(s)", removed);
        }
        Command::Import => {
            let imported = queue.drain()?;
            println!("{}", serde_json::to_string_pretty(&imported)?);
        }
        Command::Status => {
            let state = StatusStore::new(queue.database()).latest()?;
            let status = serde_json::json!({
                "state": state,
                "icon": state.icon(),
                "label": state.label(),
                "pending": queue.len()?,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::InitConfig => {}
    }

    Ok(())
}
