use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, api_key_from_env};
use crate::console::run_voice_console;
use anyhow::Result;
use equilay_assistant::VoiceAssistant;
use equilay_market::GeminiSearchClient;
use equilay_realtime::gemini::GeminiRealtimeModel;
use equilay_realtime::{AudioBackend, VirtualAudioBackend};
use equilay_state::AppStore;
use equilay_telemetry::TelemetryConfig;
use std::sync::Arc;
use std::time::Duration;

const PLAYBACK_TICK: Duration = Duration::from_millis(50);

fn init_logging(config: &AppConfig) -> Result<()> {
    let result = match &config.otlp_endpoint {
        Some(endpoint) => equilay_telemetry::init_with_otlp("equilay", endpoint),
        None => equilay_telemetry::init_with_config(
            &TelemetryConfig::new("equilay")
                .with_default_filter(config.log_filter.clone())
                .with_json(config.json_logs),
        ),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

/// Virtual device whose playback clock follows wall time, so speech segments
/// complete on schedule without hardware.
fn headless_backend() -> Arc<dyn AudioBackend> {
    let backend = VirtualAudioBackend::new();
    let clock = backend.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PLAYBACK_TICK);
        loop {
            ticker.tick().await;
            clock.advance(PLAYBACK_TICK.as_secs_f64());
        }
    });
    Arc::new(backend)
}

#[cfg(feature = "desktop-audio")]
fn audio_backend(no_audio: bool) -> Arc<dyn AudioBackend> {
    if no_audio {
        headless_backend()
    } else {
        Arc::new(equilay_realtime::CpalAudioBackend::new())
    }
}

#[cfg(not(feature = "desktop-audio"))]
fn audio_backend(no_audio: bool) -> Arc<dyn AudioBackend> {
    if !no_audio {
        tracing::warn!("built without desktop-audio; using the silent virtual device");
    }
    headless_backend()
}

/// Run the parsed command line to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config)?;
    tracing::debug!(?config, "configuration loaded");

    let api_key = api_key_from_env()?;
    let store = AppStore::new();
    let feed = Arc::new(GeminiSearchClient::new(&api_key, config.search_model.clone())?);

    let outcome = match cli.command {
        Commands::Markets => match store.refresh_races(feed.as_ref()).await {
            Some(report) => {
                println!("{report}");
                Ok(())
            }
            None => {
                for entry in store.log_messages().iter().rev() {
                    eprintln!("{entry}");
                }
                Err(anyhow::anyhow!("market refresh failed"))
            }
        },
        Commands::Voice => {
            let model = Arc::new(GeminiRealtimeModel::new(&api_key, config.live_model.clone()));
            let voice = VoiceAssistant::spawn(
                config.voice_config(),
                store.clone(),
                feed.clone(),
                model,
                audio_backend(cli.no_audio),
            );
            run_voice_console(voice, store, feed).await
        }
    };

    equilay_telemetry::shutdown_telemetry();
    outcome
}
