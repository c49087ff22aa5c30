//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber` is always on. OpenTelemetry
//! export is opt-in.
//!
//! ## Feature matrix
//!
//! - `traces`: Enables OpenTelemetry distributed tracing (via spans).
//! - `metrics`: Enables OpenTelemetry metrics (refills, pool hits, etc.).
//! - `stdout`: Enables the stdout OpenTelemetry exporter.
//!
//! ## Feature constraints
//!
//! - `stdout` requires at least one of: `traces` or `metrics`.
//!
//! ## Metrics behavior
//!
//! - The recording helpers at the bottom of this module compile to no-ops
//!   when `metrics` is disabled, so call sites never need `cfg` guards.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features traces,metrics,stdout
//! ```

// Disallow using `stdout` without `traces` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "traces", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'traces' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

// Either
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_semantic_conventions as semvcns;

// Tracing-specific imports
#[cfg(feature = "traces")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "traces")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "traces")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "traces")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "traces")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "traces")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "traces"))]
    let scope = InstrumentationScope::builder("uidpool")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Always subscribe to standard tracing logs printed to the console via
    // `tracing_subscriber::fmt`. This is unrelated to the `opentelemetry_stdout`
    // exporter - it logs spans/events as human-readable output.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "traces")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "traces")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Flushes and shuts down whichever exporters are enabled.
pub fn shutdown_telemetry(_providers: TelemetryProviders) {
    #[cfg(feature = "traces")]
    {
        if let Err(err) = _providers.tracer_provider.force_flush() {
            eprintln!("Error flushing traces: {err:#?}");
        }
        if let Err(err) = _providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer: {err:#?}");
        }
    }

    #[cfg(feature = "metrics")]
    {
        if let Err(err) = _providers.meter_provider.force_flush() {
            eprintln!("Error flushing metrics: {err:#?}");
        }
        if let Err(err) = _providers.meter_provider.shutdown() {
            eprintln!("Error shutting down meter: {err:#?}");
        }
    }
}

#[cfg(any(feature = "metrics", feature = "traces"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("uidpool")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "traces")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static IDS_SERVED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static POOL_EXHAUSTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REFILLS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static IDS_PUSHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static LOCK_CONTENDED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static MAINTAIN_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static MAINTAIN_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = IDS_SERVED.set(
        meter
            .u64_counter("ids_served")
            .with_description("IDs handed out to clients")
            .build(),
    );

    let _ = POOL_EXHAUSTED.set(
        meter
            .u64_counter("pool_exhausted")
            .with_description("Requests that ran out of retries on an empty pool")
            .build(),
    );

    let _ = REFILLS.set(
        meter
            .u64_counter("refills")
            .with_description("Background refills performed by this process")
            .build(),
    );

    let _ = IDS_PUSHED.set(
        meter
            .u64_counter("ids_pushed")
            .with_description("IDs pushed into the pool by background refills")
            .build(),
    );

    let _ = LOCK_CONTENDED.set(
        meter
            .u64_counter("lock_contended")
            .with_description("Background refills skipped because another process held the lock")
            .build(),
    );

    let _ = MAINTAIN_ERRORS.set(
        meter
            .u64_counter("maintain_errors")
            .with_description("Background maintenance iterations that failed")
            .build(),
    );

    let _ = MAINTAIN_DURATION_MS.set(
        meter
            .f64_histogram("maintain_duration")
            .with_unit("ms")
            .with_description("Duration of a background maintenance iteration")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
fn add(counter: &OnceLock<Counter<u64>>, value: u64) {
    if let Some(counter) = counter.get() {
        counter.add(value, &[]);
    }
}

#[cfg(feature = "metrics")]
pub fn increment_ids_served() {
    add(&IDS_SERVED, 1);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_ids_served() {}

#[cfg(feature = "metrics")]
pub fn increment_pool_exhausted() {
    add(&POOL_EXHAUSTED, 1);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_pool_exhausted() {}

#[cfg(feature = "metrics")]
pub fn record_refill(pushed: u64) {
    add(&REFILLS, 1);
    add(&IDS_PUSHED, pushed);
}

#[cfg(not(feature = "metrics"))]
pub fn record_refill(_pushed: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_lock_contended() {
    add(&LOCK_CONTENDED, 1);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_lock_contended() {}

#[cfg(feature = "metrics")]
pub fn increment_maintain_errors() {
    add(&MAINTAIN_ERRORS, 1);
}

#[cfg(not(feature = "metrics"))]
pub fn increment_maintain_errors() {}

#[cfg(feature = "metrics")]
pub fn record_maintain_duration(duration_ms: f64) {
    if let Some(histogram) = MAINTAIN_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_maintain_duration(_duration_ms: f64) {}
