use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, str::FromStr, time::Duration};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

const OTLP_EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human readable.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// What the gateway logs, how, and where spans are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    pub level: Level,
    pub format: LogFormat,
    /// gRPC collector; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Telemetry {
    /// Settings from the CLI plus `OTEL_EXPORTER_OTLP_ENDPOINT`.
    #[must_use]
    pub fn from_env(level: Option<Level>, format: LogFormat) -> Self {
        Self {
            level: level.unwrap_or(Level::ERROR),
            format,
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .and_then(|raw| collector_endpoint(&raw)),
        }
    }
}

/// Collectors given as `host:port` are reached over TLS.
fn collector_endpoint(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        None
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
        Some(raw.to_string())
    } else {
        Some(format!("https://{raw}"))
    }
}

fn init_tracer(endpoint: &str) -> Result<Tracer> {
    // OTEL_EXPORTER_OTLP_HEADERS is read by the exporter itself.
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(OTLP_EXPORT_TIMEOUT)
        .build()
        .with_context(|| format!("Failed to build OTLP exporter for {endpoint}"))?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes([
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", instance_id),
                ])
                .build(),
        )
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false);

    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
    }
}

/// Install the global subscriber: formatted logs, plus span export when a
/// collector is configured.
///
/// # Errors
///
/// Returns an error if the exporter or subscriber cannot be initialized
pub fn init(telemetry: &Telemetry) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(telemetry.level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let otel_layer = match &telemetry.otlp_endpoint {
        Some(endpoint) => Some(tracing_opentelemetry::layer().with_tracer(init_tracer(endpoint)?)),
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer(telemetry.format))
        .with(otel_layer)
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush and stop span export; a no-op when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("flushing spans");
        let _ = provider.shutdown();
    }
}
