//! Tracing initialization: fmt output plus optional OpenTelemetry OTLP export.
//!
//! OTLP export is off unless `enable_otel_export: true` is set in the config. When enabled, the
//! exporter is configured from the standard OpenTelemetry environment variables:
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - collector URL (default `http://localhost:4318`)
//! - `OTEL_EXPORTER_OTLP_PROTOCOL` - `http/protobuf` or `http/json`
//! - `OTEL_EXPORTER_OTLP_HEADERS` - comma-separated `key=value` pairs, `%20` decodes to a space
//! - `OTEL_SERVICE_NAME` - service name (default `iamctl`)
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Provider handle kept for shutdown; `tracing-opentelemetry` only holds the tracer, so spans
/// are flushed through this reference.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber.
pub fn init_telemetry(enable_otel_export: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    if !enable_otel_export {
        registry.try_init()?;
        info!("Telemetry initialized (OTLP export disabled)");
        return Ok(());
    }

    match create_otlp_tracer() {
        Ok(tracer) => {
            registry.with(tracing_opentelemetry::layer().with_tracer(tracer)).try_init()?;
            info!("Telemetry initialized with OTLP export enabled");
        }
        Err(e) => {
            // Fall back to console output only
            registry.try_init()?;
            info!("Telemetry initialized without OTLP export: {}", e);
        }
    }

    Ok(())
}

fn parse_otlp_headers(raw: &str) -> HashMap<String, String> {
    raw.replace("%20", " ")
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn create_otlp_tracer() -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    let service_name = std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "iamctl".to_string());
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| "http://localhost:4318".to_string());
    let headers = std::env::var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_otlp_headers(&raw))
        .unwrap_or_default();

    let protocol = match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
        Ok("http/json") => Protocol::HttpJson,
        _ => Protocol::HttpBinary,
    };

    eprintln!(
        "[OTLP] service={} endpoint={} custom_headers={}",
        service_name,
        endpoint,
        headers.len()
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&endpoint)
        .with_protocol(protocol)
        .with_headers(headers)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_attribute(KeyValue::new("service.name", service_name.clone()))
                .build(),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name);
    let _ = TRACER_PROVIDER.set(tracer_provider);

    Ok(tracer)
}

/// Flush pending spans before exit.
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        tracing::error!("Failed to shutdown tracer provider: {}", e);
    }
}
