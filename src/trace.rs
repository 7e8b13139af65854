use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
	metrics::{
		reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
		Aggregation, Instrument, MeterProviderBuilder, PeriodicReader, SdkMeterProvider, Stream,
	},
	runtime,
	trace::{BatchConfig, Sampler, Tracer},
	Resource,
};
use opentelemetry_semantic_conventions::{
	resource::{DEPLOYMENT_ENVIRONMENT, SERVICE_NAME, SERVICE_VERSION},
	SCHEMA_URL,
};
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{
	filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::Config;

const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// The filter from `RUST_LOG`, or the default one.
fn filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Constructs a [`Resource`] which describes the service.
fn resource() -> Resource {
	Resource::from_schema_url(
		[
			KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
			KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
			KeyValue::new(
				DEPLOYMENT_ENVIRONMENT,
				if cfg!(debug_assertions) {
					"development"
				} else {
					"production"
				},
			),
		],
		SCHEMA_URL,
	)
}

/// Constructs an [`SdkMeterProvider`] with a custom view for storage latency.
fn init_meter_provider(endpoint: &str) -> anyhow::Result<SdkMeterProvider> {
	let exporter = opentelemetry_otlp::new_exporter()
		.tonic()
		.with_endpoint(endpoint)
		.build_metrics_exporter(
			Box::new(DefaultAggregationSelector::new()),
			Box::new(DefaultTemporalitySelector::new()),
		)?;

	let reader = PeriodicReader::builder(exporter, runtime::Tokio)
		.with_interval(std::time::Duration::from_secs(5))
		.build();

	let view_latency = |instrument: &Instrument| -> Option<Stream> {
		(instrument.name == "storage_latency_ms").then(|| {
			Stream::new()
				.name("storage_latency_ms")
				.aggregation(Aggregation::Default)
		})
	};

	let meter_provider = MeterProviderBuilder::default()
		.with_resource(resource())
		.with_reader(reader)
		.with_view(view_latency)
		.build();

	global::set_meter_provider(meter_provider.clone());

	Ok(meter_provider)
}

/// Constructs a [`Tracer`] that exports every span to `endpoint`.
fn init_tracer(endpoint: &str) -> anyhow::Result<Tracer> {
	Ok(opentelemetry_otlp::new_pipeline()
		.tracing()
		.with_trace_config(
			opentelemetry_sdk::trace::Config::default()
				.with_sampler(Sampler::TraceIdRatioBased(1.0))
				.with_resource(resource()),
		)
		.with_batch_config(BatchConfig::default())
		.with_exporter(
			opentelemetry_otlp::new_exporter()
				.tonic()
				.with_endpoint(endpoint),
		)
		.install_batch(runtime::Tokio)?)
}

/// Initializes the tracing subscriber, returning a guard that flushes
/// OpenTelemetry exporters when dropped.
///
/// The filter comes from `RUST_LOG`. Spans and metrics are only exported
/// when an OTLP endpoint is configured.
pub fn init(config: &Config) -> anyhow::Result<TraceGuard> {
	let registry = tracing_subscriber::registry().with(
		tracing_subscriber::fmt::layer()
			.with_ansi(cfg!(debug_assertions))
			.with_filter(filter()),
	);

	let Some(endpoint) = config.otlp_endpoint.as_deref() else {
		registry.try_init()?;

		return Ok(TraceGuard {
			meter_provider: None,
		});
	};

	let meter_provider = init_meter_provider(endpoint)?;

	// Metric events are recorded whatever the log level.
	let own_events = filter_fn(|metadata| metadata.target().starts_with(env!("CARGO_CRATE_NAME")));

	registry
		.with(MetricsLayer::new(meter_provider.clone()).with_filter(own_events))
		.with(
			tracing_opentelemetry::layer()
				.with_tracer(init_tracer(endpoint)?)
				.with_filter(filter()),
		)
		.try_init()?;

	tracing::info!(endpoint, "exporting telemetry");

	Ok(TraceGuard {
		meter_provider: Some(meter_provider),
	})
}

pub struct TraceGuard {
	meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TraceGuard {
	fn drop(&mut self) {
		let Some(meter_provider) = self.meter_provider.take() else {
			return;
		};

		if let Err(err) = meter_provider.shutdown() {
			eprintln!("{err:?}");
		}

		global::shutdown_tracer_provider();
	}
}
