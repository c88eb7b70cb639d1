mod config;
mod error;
mod routes;
mod services;
mod state;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use services::orchestrator::{Orchestrator, OrchestratorSettings};
use services::speech::{SpeechSynthesizer, TracingSynthesizer};
use services::suggestions::{SuggestionPool, SuggestionRotator};
use services::weather::WeatherClient;
use upstream::UpstreamClients;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let clients = UpstreamClients::from_config(&config.upstream).expect("upstream client init failed");

    // Speech is optional: without configured voices every utterance is a no-op.
    let synth: Option<Arc<dyn SpeechSynthesizer>> = if config.speech_voices.is_empty() {
        tracing::info!("no SPEECH_VOICES configured — replies will not be voiced");
        None
    } else {
        Some(Arc::new(TracingSynthesizer::new(config.speech_voices.clone())))
    };

    let settings = OrchestratorSettings {
        request_timeout: Duration::from_secs(config.upstream.timeouts.request_secs),
        voice_enabled: config.voice_replies,
    };
    let orchestrator = Orchestrator::new(clients, synth, settings);

    let pool = Arc::new(SuggestionPool::generate());
    tracing::info!(prompts = pool.len(), "suggestion pool generated");
    let suggestions = SuggestionRotator::new(pool);
    let _rotation = services::suggestions::spawn_rotation_task(suggestions.clone(), config.suggestion_interval);

    // Weather is non-fatal: the endpoint reports the missing key instead.
    let weather = match config.weather.clone() {
        Some(weather_config) => match WeatherClient::new(weather_config, config.upstream.timeouts) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "weather client init failed — weather disabled");
                None
            }
        },
        None => {
            tracing::warn!("OPENWEATHER_API_KEY not set — weather disabled");
            None
        }
    };

    let state = state::AppState::new(orchestrator.clone(), suggestions, weather);
    let app = routes::app(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "farmtips listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    orchestrator.end_session();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
