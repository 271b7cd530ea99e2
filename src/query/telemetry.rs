//! Query-path telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct QueryInstruments {
    query_requests: Counter<u64>,
    query_duration_seconds: Histogram<f64>,
    query_series_matched: Histogram<u64>,
    query_predicate_nodes: Histogram<u64>,
}

fn instruments() -> &'static QueryInstruments {
    static INSTRUMENTS: OnceLock<QueryInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("seriescount.query");
        QueryInstruments {
            query_requests: meter
                .u64_counter("seriescount.cardinality.requests")
                .with_description("Cardinality queries by outcome")
                .init(),
            query_duration_seconds: meter
                .f64_histogram("seriescount.cardinality.duration")
                .with_description("Cardinality query latency")
                .with_unit("s")
                .init(),
            query_series_matched: meter
                .u64_histogram("seriescount.cardinality.series_matched")
                .with_description("Distinct series counted per query")
                .init(),
            query_predicate_nodes: meter
                .u64_histogram("seriescount.cardinality.predicate_nodes")
                .with_description("Predicate tree size per query")
                .init(),
        }
    })
}

pub struct QueryMetrics {
    pub outcome: &'static str,
    pub error_class: Option<&'static str>,
    pub duration_seconds: f64,
    pub series_matched: u64,
    pub predicate_nodes: u64,
}

pub fn record_query(metrics: QueryMetrics) {
    let i = instruments();
    let mut attrs = vec![KeyValue::new("outcome", metrics.outcome)];
    if let Some(error_class) = metrics.error_class {
        attrs.push(KeyValue::new("error.class", error_class));
    }

    i.query_requests.add(1, &attrs);
    i.query_duration_seconds.record(metrics.duration_seconds, &attrs);
    i.query_predicate_nodes.record(metrics.predicate_nodes, &attrs);
    if metrics.error_class.is_none() {
        i.query_series_matched.record(metrics.series_matched, &attrs);
    }
}
