use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;

/// Prometheus metrics for the search core
#[derive(Clone)]
pub struct EngineMetrics {
    pub searches_total: Counter,
    pub suggests_total: Counter,
    pub reloads_total: Counter,
    pub reload_failures_total: Counter,
    pub segments: Gauge,
    pub search_latency: Histogram,
    pub summary_calls_total: Counter,
    pub summary_cache_hits_total: Counter,

    registry: Arc<Registry>,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let searches_total = Counter::with_opts(Opts::new(
            "cordex_searches_total",
            "Total number of search requests",
        ))?;
        registry.register(Box::new(searches_total.clone()))?;

        let suggests_total = Counter::with_opts(Opts::new(
            "cordex_suggests_total",
            "Total number of autocomplete requests",
        ))?;
        registry.register(Box::new(suggests_total.clone()))?;

        let reloads_total = Counter::with_opts(Opts::new(
            "cordex_reloads_total",
            "Total number of successful index reloads",
        ))?;
        registry.register(Box::new(reloads_total.clone()))?;

        let reload_failures_total = Counter::with_opts(Opts::new(
            "cordex_reload_failures_total",
            "Total number of failed index reloads",
        ))?;
        registry.register(Box::new(reload_failures_total.clone()))?;

        let segments = Gauge::with_opts(Opts::new(
            "cordex_segments",
            "Number of live index segments",
        ))?;
        registry.register(Box::new(segments.clone()))?;

        let search_latency = Histogram::with_opts(
            HistogramOpts::new("cordex_search_latency_seconds", "Search latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        let summary_calls_total = Counter::with_opts(Opts::new(
            "cordex_summary_calls_total",
            "Total number of AI summary requests",
        ))?;
        registry.register(Box::new(summary_calls_total.clone()))?;

        let summary_cache_hits_total = Counter::with_opts(Opts::new(
            "cordex_summary_cache_hits_total",
            "AI summary requests served from cache",
        ))?;
        registry.register(Box::new(summary_cache_hits_total.clone()))?;

        Ok(Self {
            searches_total,
            suggests_total,
            reloads_total,
            reload_failures_total,
            segments,
            search_latency,
            summary_calls_total,
            summary_cache_hits_total,
            registry: Arc::new(registry),
        })
    }

    /// Get the Prometheus registry for exposition
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a search and its latency
    pub fn record_search(&self, duration_secs: f64) {
        self.searches_total.inc();
        self.search_latency.observe(duration_secs);
    }

    /// Record a reload outcome and the resulting segment count
    pub fn record_reload(&self, ok: bool, segments: usize) {
        if ok {
            self.reloads_total.inc();
            self.segments.set(segments as f64);
        } else {
            self.reload_failures_total.inc();
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
