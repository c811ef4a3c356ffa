use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static PRODUCED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("surge_produced_total", "Records pulled off the input queue").unwrap();
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

pub static CONSUMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("surge_consumed_total", "Records delivered to the sink").unwrap();
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

pub static PRODUCER_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(
        HistogramOpts::new(
            "surge_producer_latency_ms",
            "Creation-to-dispatch latency (ms)",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
        ]),
    )
    .unwrap();
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

pub static CONSUMER_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(
        HistogramOpts::new(
            "surge_consumer_latency_ms",
            "Creation-to-sink latency (ms)",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
        ]),
    )
    .unwrap();
    REGISTRY.register(Box::new(h.clone())).unwrap();
    h
});

pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new(
        "surge_queue_depth",
        "Current in-flight depth of the unbounded input queue",
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).unwrap();
    g
});

pub static GROUP_COUNT: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new(
        "surge_group_count",
        "Distinct keys with a group in the window operator",
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).unwrap();
    g
});

pub static DROPPED_RECORDS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("surge_dropped_records_total", "Records dropped before the sink"),
        &["reason"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
});

pub fn render_prometheus() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_touched_metrics() {
        PRODUCED_TOTAL.inc();
        CONSUMED_TOTAL.inc();
        DROPPED_RECORDS.with_label_values(&["truncated"]).inc();
        let text = render_prometheus();
        assert!(text.contains("surge_produced_total"));
        assert!(text.contains("surge_consumed_total"));
        assert!(text.contains("surge_dropped_records_total"));
    }

    #[test]
    fn latency_histograms_accept_samples() {
        PRODUCER_LATENCY_MS.observe(3.0);
        CONSUMER_LATENCY_MS.observe(7.0);
        let text = render_prometheus();
        assert!(text.contains("surge_producer_latency_ms"));
        assert!(text.contains("surge_consumer_latency_ms"));
    }
}
