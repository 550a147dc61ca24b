//! Metrics sink backed by a Prometheus registry
//!
//! The sink owns its registry instead of registering into the process-wide
//! default one, so every gateway instance (and every test) gets isolated
//! counters.

#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::warn;

/// Metric and label names emitted by the gateway
pub mod names {
    pub const PROXY_REQUESTS_TOTAL: &str = "gateway_proxy_requests_total";
    pub const PROXY_REQUEST_DURATION_SECONDS: &str = "gateway_proxy_request_duration_seconds";
    pub const HTTP_REQUESTS_TOTAL: &str = "gateway_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "gateway_http_request_duration_seconds";

    pub const LABEL_TARGET: &str = "target";
    pub const LABEL_STATUS: &str = "status";
    pub const LABEL_METHOD: &str = "method";
    pub const LABEL_ROUTE: &str = "route";
}

/// Histogram buckets for request durations, in seconds
pub const DURATION_BUCKETS: [f64; 7] = [0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Destination for counters and histograms
pub trait MetricsSink: Send + Sync {
    /// Increment the named counter by one
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);

    /// Record one observation on the named histogram
    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64);

    /// Render every metric in the text exposition format
    fn render(&self) -> Result<String, MetricsError>;

    /// Content type of [`MetricsSink::render`] output
    fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

struct CounterFamily {
    name: &'static str,
    label_names: &'static [&'static str],
    vec: IntCounterVec,
}

struct HistogramFamily {
    name: &'static str,
    label_names: &'static [&'static str],
    vec: HistogramVec,
}

/// Default sink: the gateway's metric families in a private registry
pub struct PrometheusMetrics {
    registry: Registry,
    counters: Vec<CounterFamily>,
    histograms: Vec<HistogramFamily>,
}

const PROXY_COUNTER_LABELS: &[&str] = &[names::LABEL_TARGET, names::LABEL_STATUS];
const PROXY_HISTOGRAM_LABELS: &[&str] = &[names::LABEL_TARGET];
const HTTP_LABELS: &[&str] = &[names::LABEL_METHOD, names::LABEL_ROUTE, names::LABEL_STATUS];

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let mut metrics = Self {
            registry: Registry::new(),
            counters: Vec::new(),
            histograms: Vec::new(),
        };

        metrics.register_counter(
            names::PROXY_REQUESTS_TOTAL,
            "Total number of requests forwarded to the upstream",
            PROXY_COUNTER_LABELS,
        )?;
        metrics.register_histogram(
            names::PROXY_REQUEST_DURATION_SECONDS,
            "Duration of upstream exchanges in seconds",
            PROXY_HISTOGRAM_LABELS,
        )?;
        metrics.register_counter(
            names::HTTP_REQUESTS_TOTAL,
            "Total number of HTTP requests served",
            HTTP_LABELS,
        )?;
        metrics.register_histogram(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "Duration of HTTP requests in seconds",
            HTTP_LABELS,
        )?;

        // CPU, memory, file descriptor and start time gauges for this process
        #[cfg(target_os = "linux")]
        metrics
            .registry
            .register(Box::new(ProcessCollector::for_self()))?;

        Ok(metrics)
    }

    fn register_counter(
        &mut self,
        name: &'static str,
        help: &str,
        label_names: &'static [&'static str],
    ) -> Result<(), MetricsError> {
        let vec = IntCounterVec::new(Opts::new(name, help), label_names)?;
        self.registry.register(Box::new(vec.clone()))?;
        self.counters.push(CounterFamily {
            name,
            label_names,
            vec,
        });
        Ok(())
    }

    fn register_histogram(
        &mut self,
        name: &'static str,
        help: &str,
        label_names: &'static [&'static str],
    ) -> Result<(), MetricsError> {
        let opts = HistogramOpts::new(name, help).buckets(DURATION_BUCKETS.to_vec());
        let vec = HistogramVec::new(opts, label_names)?;
        self.registry.register(Box::new(vec.clone()))?;
        self.histograms.push(HistogramFamily {
            name,
            label_names,
            vec,
        });
        Ok(())
    }

    /// The registry the families are registered in
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Order label values by the family's registered label names; missing labels are empty
fn ordered_values<'a>(label_names: &[&str], labels: &[(&str, &'a str)]) -> Vec<&'a str> {
    label_names
        .iter()
        .map(|name| {
            labels
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| *value)
                .unwrap_or("")
        })
        .collect()
}

impl MetricsSink for PrometheusMetrics {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let Some(family) = self.counters.iter().find(|family| family.name == name) else {
            warn!(metric = name, "Unknown counter");
            return;
        };

        let values = ordered_values(family.label_names, labels);
        match family.vec.get_metric_with_label_values(values.as_slice()) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(metric = name, error = %e, "Failed to resolve counter labels"),
        }
    }

    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let Some(family) = self.histograms.iter().find(|family| family.name == name) else {
            warn!(metric = name, "Unknown histogram");
            return;
        };

        let values = ordered_values(family.label_names, labels);
        match family.vec.get_metric_with_label_values(values.as_slice()) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!(metric = name, error = %e, "Failed to resolve histogram labels"),
        }
    }

    fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}
