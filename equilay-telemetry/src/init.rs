//! Telemetry initialization and configuration

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Boxed error returned by the init functions.
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Console logging settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name attached to the startup event and exported spans.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `equilay_realtime=debug`.
    pub default_filter: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
}

impl TelemetryConfig {
    /// Console logging at `info` for `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), default_filter: "info".to_string(), json: false }
    }

    /// Set the filter used when `RUST_LOG` is unset.
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Switch to JSON output.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

fn env_filter(default: &str) -> Result<EnvFilter, InitError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default)?),
    }
}

/// Returns `true` the first time it is called.
fn claim() -> bool {
    !INITIALIZED.swap(true, Ordering::SeqCst)
}

/// Initialize basic telemetry with console logging
///
/// Later calls are no-ops.
///
/// # Example
/// ```
/// use equilay_telemetry::init_telemetry;
/// init_telemetry("equilay").expect("Failed to initialize telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), InitError> {
    init_with_config(&TelemetryConfig::new(service_name))
}

/// Initialize console logging with explicit settings.
pub fn init_with_config(config: &TelemetryConfig) -> Result<(), InitError> {
    if !claim() {
        return Ok(());
    }
    let filter = env_filter(&config.default_filter)?;

    let json = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
    });
    let plain = (!config.json).then(|| {
        tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(true).with_line_number(true)
    });

    tracing_subscriber::registry().with(filter).with(json).with(plain).try_init()?;

    tracing::info!(service.name = %config.service_name, "Telemetry initialized");
    Ok(())
}

/// Initialize telemetry with OpenTelemetry OTLP export
///
/// Spans are batched to an OTLP collector over gRPC. Must be called from
/// within a tokio runtime.
///
/// # Example
/// ```no_run
/// use equilay_telemetry::init_with_otlp;
/// init_with_otlp("equilay", "http://localhost:4317")
///     .expect("Failed to initialize telemetry");
/// ```
pub fn init_with_otlp(service_name: &str, endpoint: &str) -> Result<(), InitError> {
    use opentelemetry_otlp::WithExportConfig;
    use tracing_opentelemetry::OpenTelemetryLayer;

    if !claim() {
        return Ok(());
    }

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
            opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let filter = env_filter("info")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()?;

    tracing::info!(
        service.name = service_name,
        otlp.endpoint = endpoint,
        "Telemetry initialized with OpenTelemetry"
    );
    Ok(())
}

/// Shutdown telemetry and flush any pending spans
///
/// Should be called before exit so batched spans reach the collector.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
